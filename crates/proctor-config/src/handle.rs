use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::Settings;

/// Reloadable handle over the current [`Settings`] snapshot.
///
/// The first `current` call loads the snapshot lazily; `invalidate` marks
/// it stale so the next `current` recomputes it, exactly once per
/// invalidation. Snapshots are immutable and `Arc`-shared, so a reload
/// produces a fresh snapshot instead of mutating state readers may hold.
#[derive(Default)]
pub struct ConfigHandle {
    /// Cached snapshot, `None` until the first `current` call
    cached: RwLock<Option<Arc<Settings>>>,
    /// Set by `invalidate`, consumed by the next `current`
    stale: AtomicBool,
}

impl ConfigHandle {
    /// Create a handle with no cached snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current settings snapshot.
    pub fn current(&self) -> Arc<Settings> {
        // Only the caller that consumes the stale flag recomputes; everyone
        // else shares the cached snapshot.
        let reload = self.stale.swap(false, Ordering::AcqRel);
        if !reload {
            if let Some(settings) = self.cached.read().as_ref() {
                return Arc::clone(settings);
            }
        }

        let mut cached = self.cached.write();
        match cached.as_ref() {
            Some(settings) if !reload => Arc::clone(settings),
            _ => {
                let settings = Arc::new(Settings::load());
                *cached = Some(Arc::clone(&settings));
                settings
            }
        }
    }

    /// Mark the cached snapshot stale; the next `current` call reloads it.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }
}
