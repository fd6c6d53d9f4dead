//! Deferred deallocation of sample stores
//!
//! A raw sample store for a two hour film is tens of megabytes per channel.
//! The store is shared between the ingest side, the zoom worker and any
//! `ZoomedData` the UI is holding, and whichever of them drops the last
//! reference would pay for the free. Wrapping the store in
//! `basedrop::Shared<T>` moves that cost to a dedicated collector thread.
//!
//! ```ignore
//! use basedrop::Shared;
//! use subwave_core::gc::gc_handle;
//!
//! let store = Shared::new(&gc_handle(), SampleStore::new(channels, sample_rate, capacity));
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Collection period of the background thread
const COLLECT_INTERVAL: Duration = Duration::from_millis(250);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn spawn_collector() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("wave-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, it has to be created on the thread that runs it
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Sample store collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.map_err(|e| e.to_string()).and_then(|_| rx.recv().map_err(|e| e.to_string())) {
        Ok(handle) => handle,
        Err(e) => {
            // Without a collector thread the handle still works; stores are
            // just never reclaimed. Leak one collector rather than fail ingest.
            log::error!("Failed to start sample store collector: {}", e);
            let collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for allocating `Shared<T>` values reclaimed on the collector thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(spawn_collector).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_clone_and_drop() {
        let data = Shared::new(&gc_handle(), vec![1i16; 1024]);
        let other = data.clone();
        assert_eq!(other.len(), 1024);
        drop(data);
        assert_eq!(other[0], 1);
    }
}
