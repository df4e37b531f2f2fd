//! Report pipeline: store seams, execution log, report document, and the
//! orchestrator that drives one run end to end.

pub mod document;
pub mod error;
pub mod execution_log;
pub mod orchestrator;
pub mod store;

pub use document::{
    CsvRenderer, DroppedCallRecord, MetricsSummary, RedirectionRecord, RenderedReport,
    ReportDocument, ReportRenderer,
};
pub use error::ReportError;
pub use execution_log::{
    CompletionStats, DeliveryStats, ExecutionLogStore, MemoryExecutionLog,
};
pub use orchestrator::{ReportOrchestrator, ReportOutcome};
pub use store::{
    BreakStore, CallRecordStore, DirectoryStore, HolidayStore, MemoryBreakStore,
    MemoryCallRecordStore, MemoryDirectoryStore, MemoryHolidayStore, Stores,
};
