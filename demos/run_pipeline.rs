use std::env;
use std::sync::Arc;
use weatherflow::{memory_channel, ConsolidatedDataset, Pipeline, PipelineConfig, PipelineError};

/// Runs one ingest, sink and aggregate cycle for the configured station.
///
/// Requires `NOAA_API_TOKEN`; storage defaults to the local data directory
/// unless `WEATHER_STORAGE_URL` is set.
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    configure_polars_display();

    let config = PipelineConfig::from_env()?;
    let (publisher, mut subscription) = memory_channel(config.stream_name.clone());
    let pipeline = Pipeline::from_config(config, Arc::new(publisher)).await?;

    println!("{}", serde_json::to_string(&pipeline.ingest(None).await).unwrap_or_default());
    println!(
        "{}",
        serde_json::to_string(&pipeline.sink(subscription.drain_ready()).await).unwrap_or_default()
    );

    let report = pipeline.run_aggregate().await?;
    let csv = pipeline.store().get(&report.output_key).await?;
    match ConsolidatedDataset::from_csv(&csv).and_then(|dataset| dataset.to_dataframe()) {
        Ok(df) => println!("{}", df),
        Err(e) => eprintln!("Could not read back {}: {}", report.output_key, e),
    }

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    // show 20 rows
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
