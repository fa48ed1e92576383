use tracing::debug;

use crate::ports::outbound::TreeTransaction;
use crate::reconciliation::domain::{Resource, ResourceId, TransactionParams};
use crate::shared::Result;

/// Folds persisted edge analyzers of the given resources into the ledger and
/// recomputes each resource's reporting analyzers.
///
/// Runs inside the commit transaction so attribution recorded by a
/// concurrent writer is read from the same snapshot that is written.
pub fn merge_persisted_attribution<T: TreeTransaction + ?Sized>(
    tx: &mut T,
    ledger: &mut TransactionParams,
    resources: &mut [Resource],
) -> Result<()> {
    let resource_ids: Vec<ResourceId> = resources.iter().map(|r| r.id).collect();
    let persisted = tx.resource_package_analyzers(&resource_ids)?;
    debug!(
        resources = resource_ids.len(),
        persisted_edges = persisted.len(),
        "merging persisted analyzers"
    );
    ledger.merge_persisted_analyzers(persisted);

    for resource in resources.iter_mut() {
        resource.reporting_analyzers = ledger.reporting_analyzers(resource);
    }
    Ok(())
}
