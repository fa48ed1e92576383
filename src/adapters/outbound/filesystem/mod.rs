/// Filesystem adapters for reading scan reports
mod report_reader;

pub use report_reader::FileSystemReportReader;
