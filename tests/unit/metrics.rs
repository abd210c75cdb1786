//! Unit tests for metrics

use fuelstats::metrics::Metrics;
use fuelstats::models::geography::Granularity;
use fuelstats::models::run::RunResult;

#[test]
fn test_record_run_updates_counters() {
    let metrics = Metrics::new().unwrap();
    metrics.record_run(&RunResult::completed(Granularity::ZipPrefix, 3, 1, 2, 1500));
    metrics.record_run(&RunResult::aborted(
        Granularity::ZipPrefix,
        "database connection not available".to_string(),
        10,
    ));

    let label = ["zip3"];
    assert_eq!(metrics.runs_total.with_label_values(&label).get(), 2);
    assert_eq!(metrics.run_failures_total.with_label_values(&label).get(), 1);
    assert_eq!(metrics.geographies_updated_total.with_label_values(&label).get(), 3);
    assert_eq!(metrics.geography_failures_total.with_label_values(&label).get(), 1);
    assert_eq!(metrics.geographies_skipped_total.with_label_values(&label).get(), 2);
    assert_eq!(
        metrics
            .run_duration_seconds
            .with_label_values(&label)
            .get_sample_count(),
        2
    );
}

#[test]
fn test_run_duration_is_split_by_granularity() {
    let metrics = Metrics::new().unwrap();
    metrics.record_run(&RunResult::completed(Granularity::ZipPrefix, 1, 0, 0, 2000));
    metrics.record_run(&RunResult::completed(Granularity::County, 1, 0, 0, 90_000));
    metrics.weekly_rows_written_total.with_label_values(&["county"]).inc_by(14);

    let zip = metrics.run_duration_seconds.with_label_values(&["zip3"]);
    let county = metrics.run_duration_seconds.with_label_values(&["county"]);
    assert_eq!(zip.get_sample_count(), 1);
    assert!((zip.get_sample_sum() - 2.0).abs() < 1e-9);
    assert_eq!(county.get_sample_count(), 1);
    assert!((county.get_sample_sum() - 90.0).abs() < 1e-9);

    let text = metrics.render().unwrap();
    assert!(text.contains("fuelstats_run_duration_seconds_count{granularity=\"zip3\"} 1"));
    assert!(text.contains("fuelstats_weekly_rows_written_total{granularity=\"county\"} 14"));
    assert!(!text.contains("fuelstats_weekly_rows_written_total{granularity=\"zip3\"}"));
}

#[test]
fn test_render_text_format() {
    let metrics = Metrics::new().unwrap();
    metrics.record_run(&RunResult::completed(Granularity::County, 1, 0, 0, 20));
    metrics.database_connected.set(1.0);

    let text = metrics.render().unwrap();
    assert!(text.contains("fuelstats_runs_total{granularity=\"county\"} 1"));
    assert!(text.contains("fuelstats_database_connected 1"));
}

#[test]
fn test_run_result_json() {
    let result = RunResult::completed(Granularity::County, 4, 1, 2, 30);
    assert_eq!(result.total, 7);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["granularity"], "county");
    assert_eq!(json["total"], 7);
    assert!(json.get("error").is_none());

    let aborted = serde_json::to_value(RunResult::aborted(
        Granularity::ZipPrefix,
        "boom".to_string(),
        5,
    ))
    .unwrap();
    assert_eq!(aborted["granularity"], "zip3");
    assert_eq!(aborted["success"], false);
    assert_eq!(aborted["error"], "boom");
}

#[test]
fn test_aborted_all_reports_every_granularity() {
    let results = RunResult::aborted_all(
        &Granularity::ALL,
        "connection error: Connection refused",
    );
    assert_eq!(results.len(), Granularity::ALL.len());
    for (result, granularity) in results.iter().zip(Granularity::ALL) {
        assert_eq!(result.granularity, granularity);
        assert!(!result.success);
        assert_eq!(result.total, 0);
        assert_eq!(result.duration_ms, 0);
        assert_eq!(
            result.error.as_deref(),
            Some("connection error: Connection refused")
        );
    }

    let lines: Vec<String> = results
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect();
    assert!(lines[0].contains("\"success\":false"));
    assert!(lines[0].contains("\"error\":\"connection error: Connection refused\""));

    assert!(RunResult::aborted_all(&[], "boom").is_empty());
}
