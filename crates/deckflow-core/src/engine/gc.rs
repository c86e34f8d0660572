//! RT-safe garbage collection for decoded audio
//!
//! A global `basedrop` collector defers deallocation of track PCM and slice
//! sets. When the last `Shared<T>` is dropped on the render thread, the
//! pointer is queued and freed later on the collector thread, so swapping a
//! track or regenerating slices never frees memory inside the audio callback.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Collection interval of the GC thread
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("deckflow-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread only
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("Failed to send GC handle");

            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Get a handle for creating `Shared<T>` allocations
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_survives_clone_and_drop() {
        let data = Shared::new(&gc_handle(), vec![1.0_f32; 1024]);
        let other = Shared::clone(&data);
        drop(data);
        assert_eq!(other.len(), 1024);
        drop(other);
    }
}
