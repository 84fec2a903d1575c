use std::sync::{Arc, Mutex};

use excel_tap::config::{SheetConfig, SyncConfig};
use excel_tap::sink::CollectingSink;
use excel_tap::sync::{
    Bookmark, CompositeObserver, ReplicationState, RunStatus, SyncEngine, SyncEvent, SyncMode,
    SyncObserver,
};
use excel_tap::types::Value;
use excel_tap::workbook::MemoryWorkbook;

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<SyncEvent>>,
}

impl SyncObserver for RecordingObserver {
    fn on_event(&self, event: &SyncEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl RecordingObserver {
    fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Event kinds with their stream, e.g. `"started:Orders"`.
    fn trace(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| match e {
                SyncEvent::RunStarted { .. } => "run_started".to_string(),
                SyncEvent::StreamSkipped { stream, .. } => format!("skipped:{stream}"),
                SyncEvent::StreamStarted { stream, .. } => format!("started:{stream}"),
                SyncEvent::BookmarkIgnored { stream, .. } => format!("bookmark_ignored:{stream}"),
                SyncEvent::RowMilestone { stream, rows_read, .. } => {
                    format!("milestone:{stream}:{rows_read}")
                }
                SyncEvent::StreamCompleted { stream, .. } => format!("completed:{stream}"),
                SyncEvent::StreamFailed { stream, .. } => format!("failed:{stream}"),
                SyncEvent::StateSaved { .. } => "state_saved".to_string(),
                SyncEvent::RunFinished { .. } => "run_finished".to_string(),
            })
            .collect()
    }
}

fn workbook() -> MemoryWorkbook {
    MemoryWorkbook::new()
        .with_sheet(
            "Orders",
            &["OrderID", "Amount"],
            (1..=5).map(|i| vec![Value::Int64(i), Value::Float64(1.0)]).collect(),
        )
        .with_sheet("Customers", &["Name"], vec![vec![Value::Utf8("Ada".into())]])
}

fn config() -> SyncConfig {
    SyncConfig::new(
        "book.xlsx",
        vec![
            SheetConfig::new("Orders", Some("OrderID")).unwrap(),
            SheetConfig::new("Missing", None).unwrap(),
            SheetConfig::new("Customers", Some("CustomerID")).unwrap(),
        ],
    )
    .unwrap()
}

#[test]
fn events_follow_run_lifecycle() {
    let obs = Arc::new(RecordingObserver::default());
    let engine = SyncEngine::new().with_observer(obs.clone());

    let outcome = engine
        .sync(
            &config().with_milestone_rows(2),
            &mut workbook(),
            &ReplicationState::new(),
            &mut CollectingSink::new(),
        )
        .unwrap();

    assert_eq!(
        obs.trace(),
        vec![
            "run_started",
            "skipped:Missing",
            "started:Orders",
            "milestone:Orders:2",
            "milestone:Orders:4",
            "completed:Orders",
            "failed:Customers",
            "run_finished",
        ]
    );
    assert_eq!(outcome.summary.status(), RunStatus::PartialSuccess);

    let events = obs.events();
    assert!(matches!(
        &events[1],
        SyncEvent::StreamSkipped { available, .. } if available == &["Orders", "Customers"]
    ));
    assert!(matches!(
        &events[2],
        SyncEvent::StreamStarted { mode: SyncMode::Incremental, watermark: None, .. }
    ));
    assert!(matches!(
        &events[5],
        SyncEvent::StreamCompleted { records: 5, watermark: Some(Value::Int64(5)), .. }
    ));
    assert!(matches!(
        &events[6],
        SyncEvent::StreamFailed { reason, .. } if reason.contains("CustomerID")
    ));
    assert!(matches!(
        events.last(),
        Some(SyncEvent::RunFinished { completed: 1, skipped: 1, failed: 1, status: RunStatus::PartialSuccess, .. })
    ));
}

#[test]
fn started_event_carries_prior_watermark() {
    let obs = Arc::new(RecordingObserver::default());
    let engine = SyncEngine::new().with_observer(obs.clone());
    let mut prior = ReplicationState::new();
    prior.set("Orders", Bookmark::new("OrderID", &Value::Int64(3)));

    engine
        .sync(&config(), &mut workbook(), &prior, &mut CollectingSink::new())
        .unwrap();

    let started = obs
        .events()
        .into_iter()
        .find(|e| matches!(e, SyncEvent::StreamStarted { .. }));
    assert_eq!(
        started,
        Some(SyncEvent::StreamStarted {
            stream: "Orders".into(),
            mode: SyncMode::Incremental,
            watermark: Some(Value::Int64(3)),
        })
    );
}

#[test]
fn stale_bookmark_is_reported_before_stream_starts() {
    let obs = Arc::new(RecordingObserver::default());
    let engine = SyncEngine::new().with_observer(obs.clone());
    let mut prior = ReplicationState::new();
    prior.set("Orders", Bookmark::new("Amount", &Value::Float64(9.0)));
    let config = SyncConfig::new(
        "book.xlsx",
        vec![SheetConfig::new("Orders", Some("OrderID")).unwrap()],
    )
    .unwrap();

    engine
        .sync(&config, &mut workbook(), &prior, &mut CollectingSink::new())
        .unwrap();

    let trace = obs.trace();
    assert_eq!(
        &trace[1..3],
        &["bookmark_ignored:Orders".to_string(), "started:Orders".to_string()]
    );
}

#[test]
fn discovery_reports_skips_and_failures_without_reading_records() {
    let obs = Arc::new(RecordingObserver::default());
    let engine = SyncEngine::new().with_observer(obs.clone());

    let plan = engine.discover(&config(), &mut workbook());

    assert_eq!(plan.stream_names(), vec!["Orders", "Customers"]);
    assert_eq!(plan.missing_sheets, vec!["Missing".to_string()]);
    assert_eq!(obs.trace(), vec!["skipped:Missing", "failed:Customers"]);
}

#[test]
fn composite_observer_fans_out() {
    let a = Arc::new(RecordingObserver::default());
    let b = Arc::new(RecordingObserver::default());
    let observers: Vec<Arc<dyn SyncObserver>> = vec![a.clone(), b.clone()];
    let composite = CompositeObserver::new(observers);
    let engine = SyncEngine::new().with_observer(Arc::new(composite));

    engine
        .sync(
            &config(),
            &mut workbook(),
            &ReplicationState::new(),
            &mut CollectingSink::new(),
        )
        .unwrap();

    assert!(!a.events().is_empty());
    assert_eq!(a.events(), b.events());
}
