//! In-memory inventory of VMs, refreshed from `cbsd bls`.
//!
//! The snapshot is only ever swapped as a whole. Readers get an `Arc` to the
//! vector that was current when they asked, so a later `replace` never
//! changes what they hold.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::CapiError;
use crate::record::{self, VmRecord};
use crate::tool::{Cbsd, ToolRunner};

pub type Snapshot = Arc<Vec<VmRecord>>;

pub struct Inventory {
    snapshot: RwLock<Snapshot>,
    /// Serializes `sync` calls so an older listing never lands after a newer one.
    sync_lock: Mutex<()>,
    runner: Arc<dyn ToolRunner>,
    cbsd: Cbsd,
}

impl Inventory {
    pub fn new(runner: Arc<dyn ToolRunner>, cbsd: Cbsd) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            sync_lock: Mutex::new(()),
            runner,
            cbsd,
        }
    }

    /// The snapshot as of the last successful sync.
    pub async fn read(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Swap in a new snapshot wholesale and hand it back.
    pub async fn replace(&self, records: Vec<VmRecord>) -> Snapshot {
        let snapshot = Arc::new(records);
        *self.snapshot.write().await = snapshot.clone();
        snapshot
    }

    /// Run the listing command and replace the snapshot with its result.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn sync(&self) -> Result<Snapshot, CapiError> {
        let _guard = self.sync_lock.lock().await;

        let output = self.runner.capture(&self.cbsd.list()).await?;
        let records = record::parse_listing(&output);
        tracing::debug!(count = records.len(), "inventory synchronized");

        Ok(self.replace(records).await)
    }
}
