use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use weatherflow::{
    memory_channel, ConsolidatedDataset, DateWindow, FieldValue, Observation, Pipeline,
    PipelineConfig, ProviderError, ProviderQuery, ProviderResponse, RecordStore, WeatherProvider,
};

/// Serves one canned response per call, in order.
struct ScriptedProvider {
    responses: Mutex<Vec<Vec<Observation>>>,
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn fetch(&self, _query: &ProviderQuery) -> Result<ProviderResponse, ProviderError> {
        let results = self.responses.lock().unwrap().remove(0);
        Ok(ProviderResponse {
            metadata: None,
            results,
        })
    }
}

fn day(d: u32) -> Option<DateWindow> {
    Some(DateWindow::single(NaiveDate::from_ymd_opt(2025, 4, d).unwrap()))
}

#[tokio::test]
async fn test_pipeline_on_local_filesystem() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempfile::tempdir()?;
    let url = format!("file://{}", temp.path().display());
    let config = PipelineConfig::builder()
        .storage_url(url.clone())
        .dataset_name("daily")
        .build();

    let provider = Arc::new(ScriptedProvider {
        responses: Mutex::new(vec![
            vec![
                Observation::new("2025-04-02T00:00:00", "S1", "TMAX", 75),
                Observation::new("2025-04-02T00:00:00", "S1", "PRCP", 0.3),
            ],
            vec![
                Observation::new("2025-04-01T00:00:00", "S1", "TMAX", 70),
                Observation::new("2025-04-01T00:00:00", "S1", "TMIN", 50),
            ],
            // A corrected re-fetch of the first of April.
            vec![Observation::new("2025-04-01T00:00:00", "S1", "TMAX", 71)],
        ]),
    });
    let (publisher, mut subscription) = memory_channel(config.stream_name.clone());
    let store = RecordStore::from_url(Some(&url)).await?;
    let pipeline = Pipeline::new(config, store, provider, Arc::new(publisher));

    for window in [day(2), day(1), day(1)] {
        assert!(pipeline.ingest(window).await.is_success());
        // Deliver each batch twice to mimic at-least-once delivery.
        let delivered = subscription.drain_ready();
        assert!(pipeline.sink(delivered.clone()).await.is_success());
        assert!(pipeline.sink(delivered).await.is_success());
    }

    let stored = std::fs::read_dir(temp.path().join("weather_data/2025-04-01"))?.count();
    assert_eq!(stored, 4);

    let report = pipeline.run_aggregate().await?;
    assert_eq!(report.objects_seen, 6);
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.duplicates_collapsed, 4);

    let csv_path = temp.path().join("weather_data/cleaned/daily.csv");
    let csv = std::fs::read(&csv_path)?;
    assert_eq!(
        String::from_utf8(csv.clone())?,
        "date,station,PRCP,TMAX\n2025-04-01,S1,,71\n2025-04-02,S1,0.3,75\n"
    );

    let dataset = ConsolidatedDataset::from_csv(&csv)?;
    let first = dataset.records().next().unwrap();
    assert_eq!(first.get("TMAX"), Some(&FieldValue::Integer(71)));
    assert_eq!(first.get("TMIN"), None);

    // A second run over the same objects rewrites the same bytes.
    pipeline.run_aggregate().await?;
    assert_eq!(std::fs::read(&csv_path)?, csv);
    Ok(())
}
