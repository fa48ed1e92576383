/// Domain services - reconciliation engine, attribution merge and tree writer
pub mod attribution_merge;
#[cfg(test)]
pub(crate) mod memory;
pub mod reconciler;
pub mod tree_writer;

pub use attribution_merge::merge_persisted_attribution;
pub use reconciler::TreeReconciler;
pub use tree_writer::{AssociationDiff, TreeWriter};
