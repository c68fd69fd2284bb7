use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Live and cumulative counts of surfaces and textures.
///
/// Every surface and texture holds a [`Handle`] that decrements the live
/// count when dropped, so a count that keeps growing means handles are
/// being retained somewhere.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    surfaces: Arc<Counter>,
    textures: Arc<Counter>,
}

#[derive(Debug, Default)]
struct Counter {
    live: AtomicUsize,
    created: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub live_surfaces: usize,
    pub live_textures: usize,
    pub surfaces_created: u64,
    pub textures_created: u64,
}

#[derive(Debug)]
pub struct Handle {
    counter: Arc<Counter>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.counter.live.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_surface(&self) -> Handle {
        track(&self.surfaces)
    }

    pub fn track_texture(&self) -> Handle {
        track(&self.textures)
    }

    pub fn counts(&self) -> LedgerCounts {
        LedgerCounts {
            live_surfaces: self.surfaces.live.load(Ordering::Relaxed),
            live_textures: self.textures.live.load(Ordering::Relaxed),
            surfaces_created: self.surfaces.created.load(Ordering::Relaxed),
            textures_created: self.textures.created.load(Ordering::Relaxed),
        }
    }
}

fn track(counter: &Arc<Counter>) -> Handle {
    counter.live.fetch_add(1, Ordering::Relaxed);
    counter.created.fetch_add(1, Ordering::Relaxed);
    Handle {
        counter: Arc::clone(counter),
    }
}
