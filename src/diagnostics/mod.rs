//! Serializable reports produced by the export pipeline and demo tools.
//!
//! [`ExportReport`] is what [`MapExporter`](crate::export::MapExporter)
//! returns alongside its output: the calibrated grid, what the snapper did,
//! the page plan and per-stage timings.

pub mod report;
pub mod timing;

pub use report::{ExportReport, InputDescriptor, PageSummary, SnapSummary};
pub use timing::{StageTiming, TimingBreakdown};
