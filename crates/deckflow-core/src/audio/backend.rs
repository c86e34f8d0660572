//! Engine startup and the handles shared with the control context
//!
//! Both backends use the same lock-free architecture:
//! - The control context sends commands via the ringbuffer
//! - The render thread owns the AudioEngine exclusively
//! - Deck state and meters are read back through atomics

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{command_channel, AudioEngine, DeckAtomics, EngineCommand};
use crate::graph::{analysis_tap, GraphParams, TapReader, TAP_CAPACITY};
use crate::types::NUM_DECKS;

use super::error::AudioError;

/// Command sender for the control context
///
/// Wraps the lock-free producer; every operation is non-blocking.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Queue a command for the render thread
    ///
    /// Returns `Err(cmd)` with the command if the queue is full.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}

/// Everything the control context needs to drive a running engine
pub struct EngineLink {
    pub command_sender: CommandSender,
    pub deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    pub params: Arc<GraphParams>,
    /// Master output samples for the spectrum analyser
    pub tap_reader: TapReader,
    pub sample_rate: u32,
    /// False when rendering without an output device
    pub backend_available: bool,
}

/// Create an engine and the link to drive it, without starting a thread
///
/// The caller owns the render side: drain `command_rx` with
/// [`AudioEngine::process_commands`] and call [`AudioEngine::process`] per
/// block. Backends use this; tests drive the engine by hand with it.
pub fn build_engine(
    config: &EngineConfig,
    sample_rate: u32,
    backend_available: bool,
) -> (AudioEngine, rtrb::Consumer<EngineCommand>, EngineLink) {
    let params = Arc::new(GraphParams::new());
    params
        .analysis_enabled
        .store(backend_available, Ordering::Relaxed);

    let (tap, tap_reader) = analysis_tap(TAP_CAPACITY);
    let engine = AudioEngine::new(Arc::clone(&params), config.engine_settings(sample_rate), tap);
    let (producer, command_rx) = command_channel();

    let link = EngineLink {
        command_sender: CommandSender { producer },
        deck_atomics: engine.deck_atomics(),
        params,
        tap_reader,
        sample_rate,
        backend_available,
    };
    (engine, command_rx, link)
}

/// Handle to the running render thread
///
/// Keeps the stream (or silent thread) alive. Drop this to stop audio.
pub enum AudioHandle {
    Cpal(super::cpal_backend::CpalAudioHandle),
    Silent(super::silent::SilentHandle),
}

impl AudioHandle {
    pub fn is_silent(&self) -> bool {
        matches!(self, AudioHandle::Silent(_))
    }
}

/// Result of starting the engine
pub struct AudioSystemResult {
    pub handle: AudioHandle,
    pub link: EngineLink,
    /// Frames per render block
    pub buffer_size: u32,
    /// Output latency in milliseconds (one-way)
    pub latency_ms: f32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Startup
// ═══════════════════════════════════════════════════════════════════════════════

/// Start the engine on the configured output device
///
/// Never fails: when no device can be opened the engine runs on a silent
/// render thread, so every control command still updates state.
pub fn start_engine(config: &EngineConfig) -> AudioSystemResult {
    if config.audio.silent {
        log::info!("Audio output disabled, starting silent engine");
        return super::silent::start_silent(config);
    }
    match super::cpal_backend::start(config) {
        Ok(result) => result,
        Err(e) => {
            log_fallback(&e);
            super::silent::start_silent(config)
        }
    }
}

fn log_fallback(error: &AudioError) {
    log::warn!(
        "Audio backend unavailable ({}); continuing in silent mode without output or analysis",
        error
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeckId;

    #[test]
    fn test_build_engine_links_params() {
        let config = EngineConfig::default();
        let (engine, _rx, link) = build_engine(&config, 48000, false);
        assert!(!link.backend_available);
        assert!(!link.params.analysis_enabled());
        assert!(Arc::ptr_eq(&link.deck_atomics[0], &engine.deck_atomics()[0]));
        assert_eq!(link.sample_rate, 48000);
    }

    #[test]
    fn test_sender_reports_full_queue() {
        let config = EngineConfig::default();
        let (_engine, _rx, mut link) = build_engine(&config, 48000, true);
        let mut sent = 0;
        while link.command_sender.has_space() {
            assert!(link.command_sender.send(EngineCommand::Play { deck: DeckId::A }).is_ok());
            sent += 1;
        }
        assert_eq!(sent, crate::engine::COMMAND_QUEUE_CAPACITY);
        let rejected = link.command_sender.send(EngineCommand::Pause { deck: DeckId::B });
        assert!(matches!(rejected, Err(EngineCommand::Pause { deck: DeckId::B })));
    }
}
