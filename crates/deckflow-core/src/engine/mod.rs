//! Render engine - decks, slice voices, command queue
//!
//! This module contains the realtime side of the mixer:
//! - Deck: playhead, transport and sample-accurate loop wrap
//! - VoicePool: polyphonic one-shot slice playback
//! - AudioEngine: drains commands and renders decks and voices through the graph
//! - RT-safe garbage collection for buffers shared with the control context

mod command;
mod deck;
mod engine;
mod gc;
mod voices;

pub use command::*;
pub use deck::*;
pub use engine::*;
pub use gc::gc_handle;
pub use voices::*;
