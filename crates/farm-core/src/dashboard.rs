//! Dashboard headline numbers

use std::sync::Arc;

use crate::error::Result;
use crate::local::LocalStore;
use crate::models::{DashboardSummary, Farmer, Farmland, Sourced, StoreSource};
use crate::remote::{RemoteStore, Result as RemoteResult};

/// Computes dashboard numbers for a profile
pub struct DashboardService {
    remote: Arc<dyn RemoteStore>,
    local: LocalStore,
}

impl DashboardService {
    /// Create a dashboard service
    pub fn new(remote: Arc<dyn RemoteStore>, local: LocalStore) -> Self {
        Self { remote, local }
    }

    /// Summary for a profile
    ///
    /// A remote profile asks the server-side procedure first, then counts
    /// the remote tables itself, and only then falls back to local data.
    pub async fn summary(&self, profile: &Sourced<Farmer>) -> Result<Sourced<DashboardSummary>> {
        let farmer_id = &profile.data.id;

        if profile.source == StoreSource::Remote {
            match self.remote.farmer_dashboard(farmer_id).await {
                Ok(summary) => return Ok(Sourced::remote(summary)),
                Err(err) => {
                    tracing::warn!(%farmer_id, %err, "dashboard procedure failed, counting tables");
                }
            }

            match self.remote_tables_summary(farmer_id).await {
                Ok(summary) => return Ok(Sourced::remote(summary)),
                Err(err) => {
                    tracing::warn!(%farmer_id, %err, "computing dashboard locally");
                }
            }
        }

        Ok(Sourced::local(self.local_summary(farmer_id)?))
    }

    async fn remote_tables_summary(&self, farmer_id: &str) -> RemoteResult<DashboardSummary> {
        let farmlands = self.remote.list_farmlands(farmer_id).await?;
        let crops = self.remote.list_crops().await?;
        Ok(summarize(&farmlands, crops.len()))
    }

    fn local_summary(&self, farmer_id: &str) -> Result<DashboardSummary> {
        let farmlands = self.local.farmlands(farmer_id).list()?;
        Ok(summarize(&farmlands, self.local.crops().len()?))
    }
}

fn summarize(farmlands: &[Farmland], crop_count: usize) -> DashboardSummary {
    DashboardSummary {
        farmland_count: farmlands.len() as u64,
        total_hectares: farmlands.iter().map(|f| f.size_hectares).sum(),
        crop_count: crop_count as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcePrecedence;
    use crate::models::NewFarmer;
    use crate::records::FarmRepository;
    use crate::remote::{MockRemoteStore, RemoteError};
    use crate::test_utils::{crop_form, demo_identity, farmland_form, MemoryRemote};
    use storage::KvStore;

    #[tokio::test]
    async fn test_remote_summary() {
        let remote = Arc::new(MemoryRemote::new());
        let profile = Sourced::remote(remote.seed_farmer(&demo_identity()));
        let local = LocalStore::new(KvStore::in_memory().unwrap());
        let records = FarmRepository::new(remote.clone(), local.clone(), SourcePrecedence::RemoteFirst);
        records.create_farmland(&profile, &farmland_form("A")).await.unwrap();
        records.create_farmland(&profile, &farmland_form("B")).await.unwrap();

        let summary = DashboardService::new(remote, local).summary(&profile).await.unwrap();

        assert_eq!(summary.source, StoreSource::Remote);
        assert_eq!(summary.data.farmland_count, 2);
        assert_eq!(summary.data.total_hectares, 5.0);
    }

    #[tokio::test]
    async fn test_failed_procedure_counts_remote_tables() {
        let remote = Arc::new(MemoryRemote::new());
        let profile = Sourced::remote(remote.seed_farmer(&demo_identity()));
        let local = LocalStore::new(KvStore::in_memory().unwrap());
        let records = FarmRepository::new(remote.clone(), local.clone(), SourcePrecedence::RemoteFirst);
        records.create_farmland(&profile, &farmland_form("A")).await.unwrap();
        records.create_crop(&crop_form("Maize")).await.unwrap();

        let mut failing = MockRemoteStore::new();
        failing
            .expect_farmer_dashboard()
            .returning(|_| Err(RemoteError::Rejected {
                status: 404,
                code: "PGRST202".to_string(),
                message: "function not found".to_string(),
            }));
        let rows = remote.farmlands();
        failing.expect_list_farmlands().returning(move |_| Ok(rows.clone()));
        let crops = remote.crops();
        failing.expect_list_crops().returning(move || Ok(crops.clone()));

        let summary = DashboardService::new(Arc::new(failing), local).summary(&profile).await.unwrap();

        assert_eq!(
            summary,
            Sourced::remote(DashboardSummary {
                farmland_count: 1,
                total_hectares: 2.5,
                crop_count: 1
            })
        );
    }

    #[tokio::test]
    async fn test_local_profile_summary() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_reachable(false);
        let local = LocalStore::new(KvStore::in_memory().unwrap());
        let profile = Sourced::local(NewFarmer::placeholder(&demo_identity()).into_local());
        let records = FarmRepository::new(remote.clone(), local.clone(), SourcePrecedence::RemoteFirst);
        records.create_farmland(&profile, &farmland_form("A")).await.unwrap();
        records.create_crop(&crop_form("Maize")).await.unwrap();

        let calls_before = remote.call_count();
        let summary = DashboardService::new(remote.clone(), local).summary(&profile).await.unwrap();

        assert_eq!(remote.call_count(), calls_before);
        assert_eq!(
            summary,
            Sourced::local(DashboardSummary {
                farmland_count: 1,
                total_hectares: 2.5,
                crop_count: 1
            })
        );
    }
}
