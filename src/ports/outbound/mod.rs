/// Outbound ports (Driven ports) - Infrastructure interfaces
///
/// These ports define the interfaces that the application core uses
/// to interact with storage, the file system and the console.
pub mod progress_reporter;
pub mod report_reader;
pub mod scan_store;

pub use progress_reporter::ProgressReporter;
pub use report_reader::ReportReader;
pub use scan_store::{
    Association, Edge, EdgeAttribute, MaterializedView, ScanStore, SubtreeLoader,
    TreeTransaction,
};
