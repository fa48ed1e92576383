/// Inbound ports (Driving ports) - Use case interfaces
///
/// These ports define the interfaces that external adapters (e.g., CLI)
/// use to interact with the application core.
pub mod scan_reconciliation_port;

pub use scan_reconciliation_port::ScanReconciliationPort;
