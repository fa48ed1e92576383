use std::sync::Arc;
use tracing::info;

use crate::application::view_maintenance::ViewDirtyFlag;
use crate::ports::outbound::{Association, ScanStore};
use crate::reconciliation::domain::{Application, ApplicationId, ApplicationInfo, PackageId, ResourceId};
use crate::shared::error::ReconcileError;
use crate::shared::Result;

/// ManageApplicationsUseCase - application catalog and relationship cleanup
///
/// Every operation is one store transaction. Operations that change what
/// the aggregate views would show mark them stale.
pub struct ManageApplicationsUseCase<S> {
    store: Arc<S>,
    views: Arc<ViewDirtyFlag>,
}

impl<S> Clone for ManageApplicationsUseCase<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            views: Arc::clone(&self.views),
        }
    }
}

impl<S: ScanStore> ManageApplicationsUseCase<S> {
    pub fn new(store: Arc<S>, views: Arc<ViewDirtyFlag>) -> Self {
        Self { store, views }
    }

    /// Creates an application without resources.
    ///
    /// # Errors
    /// `ConflictOnCreate` carrying the stored application when one with the
    /// same name already exists.
    pub fn create_application(&self, info: ApplicationInfo) -> Result<Application> {
        let application = Application::from_info(info);
        self.store.in_transaction(|tx| {
            if let Some(existing) = tx.find_application(&application.id)? {
                return Err(ReconcileError::ConflictOnCreate {
                    existing: Box::new(existing),
                }
                .into());
            }
            tx.upsert_application(&application)
        })?;
        self.views.set_true();
        info!(application = %application.name, application_id = %application.id, "created application");
        Ok(application)
    }

    /// Returns the stored application, creating it first if needed. Labels
    /// and environments of an existing application are extended, never
    /// narrowed.
    pub fn get_or_create_application(&self, info: ApplicationInfo) -> Result<Application> {
        let id = info.id();
        let (application, changed) = self.store.in_transaction(|tx| match tx.find_application(&id)? {
            Some(mut existing) => {
                let known = existing.labels.is_superset(&info.labels)
                    && existing.environments.is_superset(&info.environments);
                if !known {
                    existing.labels.extend(info.labels);
                    existing.environments.extend(info.environments);
                    tx.upsert_application(&existing)?;
                }
                Ok((existing, !known))
            }
            None => {
                let application = Application::from_info(info);
                tx.upsert_application(&application)?;
                info!(application = %application.name, application_id = %application.id, "created application");
                Ok((application, true))
            }
        })?;
        if changed {
            self.views.set_true();
        }
        Ok(application)
    }

    /// Replaces the descriptive fields of an application. The ID and the
    /// resource associations are kept.
    pub fn update_application_info(
        &self,
        id: ApplicationId,
        info: ApplicationInfo,
    ) -> Result<Application> {
        let application = self.store.in_transaction(|tx| {
            let mut application = tx
                .find_application(&id)?
                .ok_or_else(|| not_found(&id))?;
            application.apply_info(info);
            tx.upsert_application(&application)?;
            Ok(application)
        })?;
        self.views.set_true();
        Ok(application)
    }

    /// Deletes an application and its resource associations. Resources and
    /// everything below them stay.
    pub fn delete_application(&self, id: ApplicationId) -> Result<()> {
        self.store.in_transaction(|tx| {
            if tx.delete_application(&id)? {
                Ok(())
            } else {
                Err(not_found(&id).into())
            }
        })?;
        self.views.set_true();
        info!(application_id = %id, "deleted application");
        Ok(())
    }

    /// Bulk-removes associations below the given parents in one
    /// transaction: application→resource edges of `application_ids`,
    /// resource→package and resource→CIS edges of `resource_ids`, and
    /// package→vulnerability edges of `package_ids`. Entity rows are kept.
    ///
    /// Returns the number of edges removed.
    pub fn delete_relationships(
        &self,
        application_ids: &[ApplicationId],
        resource_ids: &[ResourceId],
        package_ids: &[PackageId],
    ) -> Result<usize> {
        let removed = self.store.in_transaction(|tx| {
            let mut removed = 0;
            for id in application_ids {
                removed += tx.delete_all_edges(Association::ApplicationResources, id.as_uuid())?;
            }
            for id in resource_ids {
                removed += tx.delete_all_edges(Association::ResourcePackages, id.as_uuid())?;
                removed += tx.delete_all_edges(Association::ResourceCisChecks, id.as_uuid())?;
            }
            for id in package_ids {
                removed += tx.delete_all_edges(Association::PackageVulnerabilities, id.as_uuid())?;
            }
            Ok(removed)
        })?;
        self.views.set_true();
        info!(removed, "deleted relationships");
        Ok(removed)
    }

    /// Full tree of an application down to vulnerabilities and CIS checks.
    pub fn get_application_tree(&self, id: ApplicationId) -> Result<Application> {
        self.store.in_transaction(|tx| {
            tx.load_application(&id)?
                .ok_or_else(|| anyhow::Error::from(not_found(&id)))
        })
    }
}

fn not_found(id: &ApplicationId) -> ReconcileError {
    ReconcileError::NotFound {
        entity: "application",
        id: id.to_string(),
    }
}
