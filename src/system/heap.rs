//! Heap metrics for the running process.
//!
//! The binary installs [`CountingAlloc`] as its global allocator; every
//! allocation and free updates a handful of process-wide atomics that
//! [`HeapStats::current`] reads back. With the `dhat-heap` feature the dhat
//! profiler owns the allocator instead, and while a [`HeapProfile`] is alive
//! the same numbers come from it.

use std::alloc::{GlobalAlloc, Layout, System};
#[cfg(feature = "dhat-heap")]
use std::sync::atomic::AtomicBool;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);
static PEAK_BYTES: AtomicU64 = AtomicU64::new(0);
static LIVE_BLOCKS: AtomicU64 = AtomicU64::new(0);
static TOTAL_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static TOTAL_FREED: AtomicU64 = AtomicU64::new(0);

#[cfg(feature = "dhat-heap")]
static PROFILING: AtomicBool = AtomicBool::new(false);

const MIB: u64 = 1024 * 1024;

/// System allocator wrapper that keeps running totals.
pub struct CountingAlloc;

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        record_free(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            record_free(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

fn record_alloc(size: usize) {
    let size = size as u64;
    TOTAL_ALLOCATED.fetch_add(size, Ordering::Relaxed);
    LIVE_BLOCKS.fetch_add(1, Ordering::Relaxed);
    let live = LIVE_BYTES.fetch_add(size, Ordering::Relaxed) + size;
    PEAK_BYTES.fetch_max(live, Ordering::Relaxed);
}

fn record_free(size: usize) {
    let size = size as u64;
    TOTAL_FREED.fetch_add(size, Ordering::Relaxed);
    LIVE_BLOCKS.fetch_sub(1, Ordering::Relaxed);
    LIVE_BYTES.fetch_sub(size, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub live_bytes: u64,
    pub peak_bytes: u64,
    pub live_blocks: u64,
    pub total_allocated: u64,
    pub total_freed: u64,
}

impl HeapStats {
    /// Profiler numbers while a `HeapProfile` runs, the counters otherwise.
    pub fn current() -> Self {
        profiled().unwrap_or_else(Self::from_counters)
    }

    fn from_counters() -> Self {
        HeapStats {
            live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
            peak_bytes: PEAK_BYTES.load(Ordering::Relaxed),
            live_blocks: LIVE_BLOCKS.load(Ordering::Relaxed),
            total_allocated: TOTAL_ALLOCATED.load(Ordering::Relaxed),
            total_freed: TOTAL_FREED.load(Ordering::Relaxed),
        }
    }

    /// The heap part of a report line, in whole mebibytes.
    pub fn report_fragment(&self) -> String {
        format!(
            "inuse: {:4} M, peak: {:4} M, alloc: {:4} M, freed: {:4} M, blocks: {}     ",
            self.live_bytes / MIB,
            self.peak_bytes / MIB,
            self.total_allocated / MIB,
            self.total_freed / MIB,
            self.live_blocks
        )
    }
}

#[cfg(not(feature = "dhat-heap"))]
fn profiled() -> Option<HeapStats> {
    None
}

// dhat panics on a stats read with no profiler running.
#[cfg(feature = "dhat-heap")]
fn profiled() -> Option<HeapStats> {
    if !PROFILING.load(Ordering::Acquire) {
        return None;
    }
    let stats = dhat::HeapStats::get();
    Some(HeapStats {
        live_bytes: stats.curr_bytes as u64,
        peak_bytes: stats.max_bytes as u64,
        live_blocks: stats.curr_blocks as u64,
        total_allocated: stats.total_bytes,
        total_freed: stats.total_bytes.saturating_sub(stats.curr_bytes as u64),
    })
}

/// A running dhat heap profiler. Dropping it writes `dhat-heap.json`
/// (unless built for testing) and sends [`HeapStats::current`] back to the
/// counters.
#[cfg(feature = "dhat-heap")]
pub struct HeapProfile {
    _profiler: dhat::Profiler,
}

#[cfg(feature = "dhat-heap")]
impl HeapProfile {
    pub fn start() -> Self {
        Self::running(dhat::Profiler::new_heap())
    }

    /// Profiler that keeps its results in memory. One per process at a time.
    pub fn start_testing() -> Self {
        Self::running(dhat::Profiler::builder().testing().build())
    }

    fn running(profiler: dhat::Profiler) -> Self {
        PROFILING.store(true, Ordering::Release);
        HeapProfile {
            _profiler: profiler,
        }
    }
}

#[cfg(feature = "dhat-heap")]
impl Drop for HeapProfile {
    fn drop(&mut self) {
        PROFILING.store(false, Ordering::Release);
    }
}
