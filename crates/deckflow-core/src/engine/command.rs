//! Lock-free command queue from the control context to the render thread
//!
//! The control context pushes [`EngineCommand`]s into an `rtrb` ring buffer
//! and the render thread drains it at the start of every block, so state
//! changes always land on block boundaries and neither side ever blocks.
//!
//! ```ignore
//! let (mut tx, mut rx) = command_channel();
//!
//! // Control context (never blocks)
//! tx.push(EngineCommand::Play { deck: DeckId::A });
//!
//! // Render thread, once per block
//! engine.process_commands(&mut rx);
//! ```

use basedrop::Shared;

use crate::loops::{LoopRegion, SliceSet};
use crate::track::PcmBuffer;
use crate::types::DeckId;

/// Decoded track handed to a deck
///
/// Boxed in the command enum so the queue slots stay small.
pub struct LoadRequest {
    pub pcm: Shared<PcmBuffer>,
    /// Load generation; slices and analysis from older loads are stale
    pub generation: u64,
}

/// Commands sent from the control context to the render thread
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Track Management
    // ─────────────────────────────────────────────────────────────
    LoadTrack {
        deck: DeckId,
        track: Box<LoadRequest>,
    },
    UnloadTrack { deck: DeckId },

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────
    Play { deck: DeckId },
    Pause { deck: DeckId },
    TogglePlay { deck: DeckId },
    /// Absolute seek in seconds (clamped to the track)
    Seek { deck: DeckId, seconds: f64 },
    /// Relative seek from the render-side playhead
    Skip { deck: DeckId, seconds: f64 },

    // ─────────────────────────────────────────────────────────────
    // Loops and Slices
    // ─────────────────────────────────────────────────────────────
    /// Activate (`Some`) or clear (`None`) the deck's wrap region
    SetLoop {
        deck: DeckId,
        region: Option<LoopRegion>,
    },
    /// Replace the deck's slice set wholesale
    SetSlices {
        deck: DeckId,
        slices: Option<Shared<SliceSet>>,
    },
    /// Start a voice playing slice `index` of the deck's slice set
    TriggerSlice { deck: DeckId, index: usize },
    /// Silence every playing slice voice
    StopVoices,
}

/// Capacity of the command queue
///
/// Knob sweeps from a controller send bursts of commands; 1024 slots keep
/// headroom without a noticeable memory cost.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Create a new command channel (producer/consumer pair)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_creation() {
        let (mut tx, mut rx) = command_channel();
        assert!(tx.push(EngineCommand::Play { deck: DeckId::A }).is_ok());
        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::Play { deck: DeckId::A }));
    }

    #[test]
    fn test_command_channel_empty() {
        let (_tx, mut rx) = command_channel();
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_channel_full() {
        let (mut tx, _rx) = command_channel();
        for _ in 0..COMMAND_QUEUE_CAPACITY {
            assert!(tx.push(EngineCommand::StopVoices).is_ok());
        }
        assert!(tx.push(EngineCommand::StopVoices).is_err());
    }

    #[test]
    fn test_command_size() {
        // Largest inline variant is SetLoop (deck + optional region)
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 40, "EngineCommand is {} bytes, expected <= 40", size);
    }
}
