//! End-to-end scan harness
//!
//! Validates the full scan loop:
//! request → provider → fusion → outcome + metrics


use mock_provider::{falling_window, sideways_window, trending_window, MockPhaseProvider};
use signal_fusion::{
    observability::metrics, Direction, FusionEngine, Grade, IndicatorPhaseProvider,
    MetricsCollector, PhaseScoreProvider, ScanOutcome, ScanRequest, Scanner,
};
use std::sync::Arc;
use std::time::Duration;

fn scanner_with(provider: Arc<dyn PhaseScoreProvider>) -> Arc<Scanner> {
    Arc::new(Scanner::new(
        Arc::new(FusionEngine::default()),
        provider,
        MetricsCollector::new(),
    ))
}

#[tokio::test]
async fn test_batch_scan_produces_one_call_per_symbol() {
    let provider = Arc::new(MockPhaseProvider::uniform(90.0));
    let scanner = scanner_with(provider.clone());

    let requests: Vec<ScanRequest> = ["BTC", "ETH", "SOL"]
        .iter()
        .map(|symbol| ScanRequest {
            symbol: symbol.to_string(),
            window: trending_window(),
        })
        .collect();

    let outcomes = scanner.scan(&requests).await;

    assert_eq!(outcomes.len(), 3);
    for (outcome, request) in outcomes.iter().zip(requests.iter()) {
        assert_eq!(outcome.symbol(), request.symbol);
        let call = outcome.call().expect("call produced");
        assert_eq!(call.direction, Direction::Buy);
        assert_eq!(call.grade, Grade::AiGrade);
        println!("✅ {}", call.summary_line());
    }

    assert_eq!(provider.calls(), 3);
    let m = scanner.metrics();
    assert_eq!(m.get_counter(metrics::SCANS_STARTED).await, 3);
    assert_eq!(m.get_counter(metrics::CALLS_GENERATED).await, 3);
    assert_eq!(m.get_counter(metrics::GRADE_AI).await, 3);
    assert_eq!(m.get_counter(metrics::PHASES_RECEIVED).await, 15);

    let snapshot = m.snapshot().await;
    assert_eq!(snapshot.histograms[metrics::FINAL_CONFIDENCE].count, 3);
    assert_eq!(snapshot.gauges[metrics::LAST_CONFIDENCE], 98.0);
}

#[tokio::test]
async fn test_provider_failure_falls_back_to_neutral_call() {
    let scanner = scanner_with(Arc::new(MockPhaseProvider::failing("phase service down")));

    let outcome = scanner.scan_symbol("ETH", &sideways_window()).await;

    let call = outcome.call().expect("neutral call despite provider failure");
    assert_eq!(call.direction, Direction::Hold);
    assert_eq!(call.ensemble.phase_count, 0);
    assert_eq!(call.ensemble.composite_score, 50.0);
    assert_eq!(call.grade, Grade::Standard);

    let m = scanner.metrics();
    assert_eq!(m.get_counter(metrics::PROVIDER_FAILURES).await, 1);
    assert_eq!(m.get_counter(metrics::CALLS_GENERATED).await, 1);
    println!("✅ Provider failure degraded to {}", call.signal_label());
}

#[tokio::test]
async fn test_slow_provider_times_out_to_neutral_call() {
    let provider = Arc::new(MockPhaseProvider::uniform(90.0).with_delay(Duration::from_millis(500)));
    let scanner = Scanner::new(
        Arc::new(FusionEngine::default()),
        provider.clone(),
        MetricsCollector::new(),
    )
    .with_provider_timeout(Duration::from_millis(20));

    let outcome = scanner.scan_symbol("BTC", &trending_window()).await;

    let call = outcome.call().expect("timeout degrades to a neutral call");
    assert_eq!(call.direction, Direction::Hold);
    assert_eq!(call.ensemble.phase_count, 0);
    assert_eq!(provider.calls(), 1);
    assert_eq!(scanner.metrics().get_counter(metrics::PROVIDER_FAILURES).await, 1);
    println!("✅ Slow provider cut off after 20ms");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_scan_runs_each_symbol_as_a_task() {
    let provider = Arc::new(MockPhaseProvider::uniform(20.0).with_delay(Duration::from_millis(100)));
    let scanner = scanner_with(provider.clone());

    let requests: Vec<ScanRequest> = ["SOL", "AVAX", "DOT", "ADA"]
        .iter()
        .map(|symbol| ScanRequest {
            symbol: symbol.to_string(),
            window: falling_window(),
        })
        .collect();

    let started = std::time::Instant::now();
    let outcomes = scanner.scan(&requests).await;

    // Four 100ms providers overlap instead of queueing
    assert!(started.elapsed() < Duration::from_millis(350));
    let symbols: Vec<&str> = outcomes.iter().map(|o| o.symbol()).collect();
    assert_eq!(symbols, vec!["SOL", "AVAX", "DOT", "ADA"]);
    assert!(outcomes.iter().all(|o| o.call().map(|c| c.direction) == Some(Direction::Sell)));
    assert_eq!(provider.calls(), 4);
}

#[tokio::test]
async fn test_overlapping_scan_of_same_symbol_is_skipped() {
    let provider = Arc::new(MockPhaseProvider::uniform(70.0).with_delay(Duration::from_millis(50)));
    let scanner = scanner_with(provider.clone());
    let window = trending_window();

    let (first, second) = tokio::join!(
        scanner.scan_symbol("BTC", &window),
        scanner.scan_symbol("BTC", &window)
    );

    assert!(first.call().is_some());
    assert!(matches!(second, ScanOutcome::Skipped { ref symbol } if symbol == "BTC"));
    assert_eq!(provider.calls(), 1);
    assert_eq!(scanner.metrics().get_counter(metrics::SCANS_SKIPPED).await, 1);

    // The guard is released once the first scan finishes
    let again = scanner.scan_symbol("BTC", &window).await;
    assert!(again.call().is_some());
    println!("✅ Overlap skipped, follow-up scan ran");
}

#[tokio::test]
async fn test_different_symbols_run_concurrently() {
    let provider = Arc::new(MockPhaseProvider::uniform(20.0).with_delay(Duration::from_millis(20)));
    let scanner = scanner_with(provider.clone());
    let window = falling_window();

    let (a, b) = tokio::join!(
        scanner.scan_symbol("SOL", &window),
        scanner.scan_symbol("AVAX", &window)
    );

    assert_eq!(a.call().map(|c| c.direction), Some(Direction::Sell));
    assert_eq!(b.call().map(|c| c.direction), Some(Direction::Sell));
    assert_eq!(provider.calls(), 2);
    assert_eq!(scanner.metrics().get_counter(metrics::SCANS_SKIPPED).await, 0);
}

#[tokio::test]
async fn test_empty_window_reports_failure() {
    let scanner = scanner_with(Arc::new(MockPhaseProvider::uniform(60.0)));

    let outcome = scanner.scan_symbol("VOID", &[]).await;

    match outcome {
        ScanOutcome::Failed { symbol, error } => {
            assert_eq!(symbol, "VOID");
            assert!(error.contains("VOID"), "error should name the symbol: {}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    let m = scanner.metrics();
    assert_eq!(m.get_counter(metrics::CALLS_FAILED).await, 1);
    assert_eq!(m.get_counter(metrics::CALLS_GENERATED).await, 0);
}

#[tokio::test]
async fn test_indicator_provider_over_fixture_windows() {
    let requests: Vec<ScanRequest> =
        serde_json::from_str(include_str!("../fixtures/windows.json")).unwrap();
    assert!(!requests.is_empty());

    let scanner = scanner_with(Arc::new(IndicatorPhaseProvider::new().with_jitter(7, 2.0)));
    let outcomes = scanner.scan(&requests).await;

    assert_eq!(outcomes.len(), requests.len());
    for outcome in &outcomes {
        let call = outcome.call().expect("fixture windows all produce calls");
        assert_eq!(call.per_phase_breakdown.len(), 5);
        assert!((10.0..=98.0).contains(&call.final_confidence));
        println!("✅ {}", call.summary_line());
    }

    // Same seed, same calls
    let rerun = scanner_with(Arc::new(IndicatorPhaseProvider::new().with_jitter(7, 2.0)))
        .scan(&requests)
        .await;
    for (a, b) in outcomes.iter().zip(rerun.iter()) {
        let (a, b) = (a.call().unwrap(), b.call().unwrap());
        assert_eq!(a.direction, b.direction);
        assert_eq!(a.final_confidence, b.final_confidence);
        assert_eq!(a.targets, b.targets);
    }
}
