//! Silent render thread
//!
//! Used when no output device can be opened. The engine still drains
//! commands and advances playheads at the configured block cadence, so the
//! control surface behaves normally; the rendered audio is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::types::StereoBuffer;

use super::backend::{build_engine, AudioHandle, AudioSystemResult};

/// Keeps the silent thread alive; dropping it stops and joins the thread
pub struct SilentHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for SilentHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Silent render thread panicked");
            }
        }
    }
}

pub fn start_silent(config: &EngineConfig) -> AudioSystemResult {
    let sample_rate = config.audio.target_sample_rate();
    let buffer_size = config.audio.target_buffer_size();
    let (mut engine, mut command_rx, link) = build_engine(config, sample_rate, false);

    let running = Arc::new(AtomicBool::new(true));
    let block = Duration::from_secs_f64(buffer_size as f64 / sample_rate as f64);
    let thread = {
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("deckflow-silent".to_string())
            .spawn(move || {
                let mut output = StereoBuffer::silence(buffer_size as usize);
                while running.load(Ordering::Relaxed) {
                    engine.process_commands(&mut command_rx);
                    engine.process(&mut output);
                    thread::sleep(block);
                }
            })
            .expect("Failed to spawn silent render thread")
    };

    log::info!(
        "Silent engine started: {}Hz, {} frame blocks",
        sample_rate,
        buffer_size
    );

    AudioSystemResult {
        handle: AudioHandle::Silent(SilentHandle {
            running,
            thread: Some(thread),
        }),
        link,
        buffer_size,
        latency_ms: block.as_secs_f32() * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineCommand;
    use crate::types::DeckId;

    #[test]
    fn test_silent_thread_drains_commands() {
        let config = EngineConfig {
            audio: crate::audio::AudioConfig::silent().with_buffer_frames(64),
            ..Default::default()
        };
        let mut result = start_silent(&config);
        assert!(result.handle.is_silent());
        assert!(!result.link.params.analysis_enabled());

        for _ in 0..10 {
            assert!(result
                .link
                .command_sender
                .send(EngineCommand::Pause { deck: DeckId::A })
                .is_ok());
        }
        // The thread empties the queue within a few blocks
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while result.link.command_sender.producer.slots() < crate::engine::COMMAND_QUEUE_CAPACITY {
            assert!(std::time::Instant::now() < deadline, "commands never drained");
            thread::sleep(Duration::from_millis(5));
        }
        drop(result.handle);
    }
}
