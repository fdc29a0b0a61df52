use serde_json::json;
use fanout_log_sink::{AdapterConfig, AdapterRegistry, Level, Logger, LoggerConfig, Properties};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = LoggerConfig::default()
        .with_level(Level::Debug)
        .with_path("./logs")
        .with_both_output()
        .with_node_id("node-001")
        .with_module("basic-demo")
        .with_address("127.0.0.1");
    config
        .adapters
        .push(AdapterConfig::from_json("file", json!({ "path": "./logs/adapter", "batch_size": 10 })));

    let logger = Logger::new(config, &AdapterRegistry::with_builtins()).await?;

    logger.debug("demo starting");
    logger.info(format_args!("listening on {}", "127.0.0.1:8080"));

    let mut props = Properties::new();
    props.insert("user_id".to_string(), json!(42));
    props.insert("reason".to_string(), json!("bad password"));
    logger.log(Level::Warn, "authentication failed", props);

    logger.close().await?;
    Ok(())
}
