//! One execution slot per interpreter path.
//!
//! Stata licences usually allow a single running instance per host, and runs
//! against the same install also share log and working-directory state, so
//! launches against one path are serialised process-wide.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type SlotMap = HashMap<PathBuf, Arc<AsyncMutex<()>>>;

static SLOTS: LazyLock<Mutex<SlotMap>> = LazyLock::new(|| Mutex::new(HashMap::new()));

pub type SlotGuard = OwnedMutexGuard<()>;

/// Wait until no other execution holds `interpreter`.
pub async fn acquire(interpreter: &Path) -> SlotGuard {
    let slot = {
        let mut map = SLOTS.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(interpreter.to_path_buf()).or_default().clone()
    };
    slot.lock_owned().await
}
