//! Process-wide download resources.
//!
//! The chunk pool is created on first use and shared by every download for
//! the rest of the process. Later calls return the same pool; the
//! configuration of the first call wins.

use std::sync::Arc;

use parking_lot::{const_mutex, Mutex};
use tracing::info;

use crate::download::{ChunkPool, DownloadConfig, DownloadResult};

static CHUNK_POOL: Mutex<Option<Arc<ChunkPool>>> = const_mutex(None);

/// Create the shared chunk pool if it does not exist yet and return it.
///
/// Safe to call from several threads at once; exactly one pool is built.
pub fn ensure_initialized(config: &DownloadConfig) -> DownloadResult<Arc<ChunkPool>> {
    let mut slot = CHUNK_POOL.lock();
    if let Some(pool) = slot.as_ref() {
        return Ok(Arc::clone(pool));
    }

    let pool = Arc::new(ChunkPool::new(config.worker_threads)?);
    info!(threads = pool.threads(), "Chunk pool initialized");
    *slot = Some(Arc::clone(&pool));
    Ok(pool)
}

/// Whether the shared pool has been created.
pub fn is_initialized() -> bool {
    CHUNK_POOL.lock().is_some()
}
