//! Stream planning: reconcile the configured sheets with the sheets the workbook actually has.

use crate::config::{SheetConfig, SyncConfig};
use crate::error::{TapError, TapResult};
use crate::schema::infer_schema;
use crate::types::Schema;
use crate::workbook::WorkbookReader;

use super::observer::{SyncEvent, SyncObserver};

/// A sheet exposed as a stream on this run.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub stream_name: String,
    pub replication_key: Option<String>,
    pub schema: Schema,
}

impl StreamDescriptor {
    pub fn is_incremental(&self) -> bool {
        self.replication_key.is_some()
    }
}

/// One planned stream: either ready to sync, or already failed while resolving its schema.
#[derive(Debug)]
pub enum PlanEntry {
    Ready(StreamDescriptor),
    Failed { stream_name: String, error: TapError },
}

impl PlanEntry {
    pub fn stream_name(&self) -> &str {
        match self {
            PlanEntry::Ready(d) => &d.stream_name,
            PlanEntry::Failed { stream_name, .. } => stream_name,
        }
    }
}

/// Ordered streams of a run, plus the configured sheets that were not found.
#[derive(Debug, Default)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    /// Configured sheet names absent from the workbook, in config order.
    pub missing_sheets: Vec<String>,
}

impl Plan {
    /// Streams whose schema resolved, in plan order.
    pub fn descriptors(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.entries.iter().filter_map(|e| match e {
            PlanEntry::Ready(d) => Some(d),
            PlanEntry::Failed { .. } => None,
        })
    }

    pub fn stream_names(&self) -> Vec<&str> {
        self.entries.iter().map(PlanEntry::stream_name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the plan for `config` against `workbook`.
///
/// - With configured sheets: declared order; sheets missing from the workbook are skipped (reported
///   through `observer`, never an error); workbook sheets not listed are left out.
/// - Without configured sheets: every workbook sheet in native order, none incremental.
///
/// Each planned sheet is read once to infer its schema. A sheet that cannot be read, has a bad
/// header, or lacks its configured replication key becomes a [`PlanEntry::Failed`] entry; the
/// remaining sheets are still planned.
pub fn plan_streams(
    config: &SyncConfig,
    workbook: &mut dyn WorkbookReader,
    observer: Option<&dyn SyncObserver>,
) -> Plan {
    let available = workbook.sheet_names();
    let mut plan = Plan::default();

    let targets: Vec<SheetConfig> = if config.sheets().is_empty() {
        available
            .iter()
            .map(|name| SheetConfig::discovered(name))
            .collect()
    } else {
        config.sheets().to_vec()
    };

    for sheet in targets {
        if !available.iter().any(|a| a == sheet.name()) {
            if let Some(obs) = observer {
                obs.on_event(&SyncEvent::StreamSkipped {
                    stream: sheet.name().to_string(),
                    available: available.clone(),
                });
            }
            plan.missing_sheets.push(sheet.name().to_string());
            continue;
        }

        let entry = match resolve_stream(config, workbook, &sheet) {
            Ok(descriptor) => PlanEntry::Ready(descriptor),
            Err(error) => PlanEntry::Failed {
                stream_name: sheet.name().to_string(),
                error,
            },
        };
        plan.entries.push(entry);
    }

    plan
}

fn resolve_stream(
    config: &SyncConfig,
    workbook: &mut dyn WorkbookReader,
    sheet: &SheetConfig,
) -> TapResult<StreamDescriptor> {
    let data = workbook.read_sheet(sheet.name())?;
    let schema = infer_schema(sheet.name(), &data, config.schema_sample_rows())?;

    if let Some(key) = sheet.replication_key() {
        if schema.index_of(key).is_none() {
            return Err(TapError::ReplicationKey {
                stream: sheet.name().to_string(),
                column: key.to_string(),
            });
        }
    }

    Ok(StreamDescriptor {
        stream_name: sheet.name().to_string(),
        replication_key: sheet.replication_key().map(str::to_string),
        schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Value};
    use crate::workbook::MemoryWorkbook;

    fn workbook() -> MemoryWorkbook {
        MemoryWorkbook::new()
            .with_sheet(
                "Sheet1",
                &["OrderID", "Amount"],
                vec![vec![Value::Int64(1), Value::Float64(2.5)]],
            )
            .with_sheet("Sheet2", &["Name"], vec![vec![Value::Utf8("a".into())]])
            .with_sheet("Sheet3", &["id", "id"], vec![])
    }

    #[test]
    fn empty_config_plans_every_sheet_in_workbook_order() {
        let config = SyncConfig::new("Book1.xlsx", vec![]).unwrap();
        let mut wb = workbook();
        let plan = plan_streams(&config, &mut wb, None);
        assert_eq!(plan.stream_names(), vec!["Sheet1", "Sheet2", "Sheet3"]);
        assert!(plan.descriptors().all(|d| d.replication_key.is_none()));
        // Sheet3 has a duplicate header and fails on its own.
        assert!(matches!(
            &plan.entries[2],
            PlanEntry::Failed { error: TapError::Schema { .. }, .. }
        ));
    }

    #[test]
    fn configured_sheets_follow_declared_order_and_skip_missing() {
        let config = SyncConfig::new(
            "Book1.xlsx",
            vec![
                SheetConfig::new("Sheet2", None).unwrap(),
                SheetConfig::new("Nope", None).unwrap(),
                SheetConfig::new("Sheet1", Some("OrderID")).unwrap(),
            ],
        )
        .unwrap();
        let mut wb = workbook();
        let plan = plan_streams(&config, &mut wb, None);
        assert_eq!(plan.stream_names(), vec!["Sheet2", "Sheet1"]);
        assert_eq!(plan.missing_sheets, vec!["Nope".to_string()]);

        let sheet1 = plan.descriptors().find(|d| d.stream_name == "Sheet1").unwrap();
        assert_eq!(sheet1.replication_key.as_deref(), Some("OrderID"));
        assert_eq!(sheet1.schema.data_type_of("Amount"), Some(DataType::Float64));
    }

    #[test]
    fn blank_sheet_names_are_still_streams() {
        let config = SyncConfig::new("Book1.xlsx", vec![]).unwrap();
        let mut wb = MemoryWorkbook::new()
            .with_sheet("  ", &["id"], vec![vec![Value::Int64(1)]])
            .with_sheet("Sheet1", &["id"], vec![]);
        let plan = plan_streams(&config, &mut wb, None);
        assert_eq!(plan.stream_names(), vec!["  ", "Sheet1"]);
        assert_eq!(plan.descriptors().count(), 2);
    }

    #[test]
    fn unknown_replication_key_fails_only_that_stream() {
        let config = SyncConfig::new(
            "Book1.xlsx",
            vec![
                SheetConfig::new("Sheet1", Some("OrderID")).unwrap(),
                SheetConfig::new("Sheet2", Some("CustomerID")).unwrap(),
            ],
        )
        .unwrap();
        let mut wb = workbook();
        let plan = plan_streams(&config, &mut wb, None);
        assert_eq!(plan.descriptors().count(), 1);
        match &plan.entries[1] {
            PlanEntry::Failed {
                stream_name,
                error: TapError::ReplicationKey { stream, column },
            } => {
                assert_eq!(stream_name, "Sheet2");
                assert_eq!(stream, "Sheet2");
                assert_eq!(column, "CustomerID");
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }
}
