use std::sync::Arc;
use std::time::Instant;

use fanout_log_sink::noop_sink::NoopAdapter;
use fanout_log_sink::{AdapterRegistry, Level, Logger, LoggerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoggerConfig::default()
        .with_level(Level::Error)
        .with_path("./logs/load")
        .with_file_output();
    let logger = Logger::new(config, &AdapterRegistry::new()).await?;
    let noop = Arc::new(NoopAdapter::default());
    logger.add_adapter(noop.clone());

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        logger.error(format_args!("load test error {i}"));
    }

    let elapsed = start.elapsed();
    println!(
        "fan-out: sent {} entries in {:?} (~{:.0} entries/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.close().await?;
    let stats = logger.dispatcher().stats();
    println!("adapter saw {} entries, {:?}", noop.processed(), stats);
    Ok(())
}
