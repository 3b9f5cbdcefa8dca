pub mod cell;
pub mod config;
pub mod error;
pub mod export;
pub mod identity;
pub mod loader;
pub mod metric_upsert;
pub mod metrics_catalog;
pub mod query;
pub mod row_source;
pub mod slice;
pub mod store;
pub mod tournament;

pub use cell::{CellValue, RowRecord};
pub use error::{RowError, SkipReason, SkippedRow};
pub use loader::{LoadRequest, LoadSummary, StatsLoader};
pub use metrics_catalog::{MetricCatalog, MetricDef, MetricKind, PercentScale};
pub use slice::{PeriodKind, StatKind};
