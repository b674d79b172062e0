//! Reference-counted display handles for gallery blobs.
//!
//! Every mounted view showing an asset holds one reference to that asset's
//! handle. The handle is created on the first acquire and revoked when the last
//! holder releases it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A revocable view of an asset's blob
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    key: u64,
    asset_id: String,
    data: Arc<Vec<u8>>,
    revoked: Arc<AtomicBool>,
}

impl DisplayHandle {
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// `asset://<id>/<key>`
    pub fn uri(&self) -> String {
        format!("asset://{}/{}", self.asset_id, self.key)
    }

    /// The blob, or `None` once the handle has been revoked
    pub fn bytes(&self) -> Option<&[u8]> {
        if self.revoked.load(Ordering::Acquire) {
            None
        } else {
            Some(self.data.as_slice())
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }
}

struct CacheEntry {
    handle: DisplayHandle,
    refs: usize,
}

#[derive(Default)]
pub struct DisplayHandleCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    next_key: AtomicU64,
    created: AtomicU64,
    revoked: AtomicU64,
}

impl DisplayHandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to the handle for `asset_id`, creating it from `blob` if absent
    pub fn acquire(&self, asset_id: &str, blob: &[u8]) -> DisplayHandle {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(asset_id) {
            entry.refs += 1;
            return entry.handle.clone();
        }

        let handle = DisplayHandle {
            key: self.next_key.fetch_add(1, Ordering::Relaxed) + 1,
            asset_id: asset_id.to_string(),
            data: Arc::new(blob.to_vec()),
            revoked: Arc::new(AtomicBool::new(false)),
        };
        self.created.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            asset_id.to_string(),
            CacheEntry {
                handle: handle.clone(),
                refs: 1,
            },
        );
        handle
    }

    /// Drop one reference; the handle is revoked when none remain
    pub fn release(&self, asset_id: &str) {
        let mut entries = self.lock();
        let remove = match entries.get_mut(asset_id) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs == 0
            }
            None => false,
        };
        if remove {
            if let Some(entry) = entries.remove(asset_id) {
                entry.handle.revoked.store(true, Ordering::Release);
                self.revoked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Release every id a closing view held
    pub fn release_view<'a, I>(&self, asset_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for id in asset_ids {
            self.release(id);
        }
    }

    pub fn get(&self, asset_id: &str) -> Option<DisplayHandle> {
        self.lock().get(asset_id).map(|e| e.handle.clone())
    }

    pub fn ref_count(&self, asset_id: &str) -> usize {
        self.lock().get(asset_id).map_or(0, |e| e.refs)
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn revoked_count(&self) -> u64 {
        self.revoked.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
