//! Audio output for Deckflow
//!
//! The render thread owns the [`AudioEngine`](crate::engine::AudioEngine)
//! exclusively:
//!
//! - **Control context**: sends commands via the lock-free ringbuffer
//! - **Render thread**: a cpal output stream, or a silent thread when no
//!   device is available
//! - **Atomics**: playback state and meters are read back without locks
//!
//! ```ignore
//! let system = start_engine(&EngineConfig::default());
//! let mut controller = DjController::new(system.link, &config);
//! ```

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;
mod silent;

pub use backend::{
    build_engine, start_engine, AudioHandle, AudioSystemResult, CommandSender, EngineLink,
};
pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};
pub use cpal_backend::CpalAudioHandle;
pub use device::{find_device_by_id, get_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use silent::SilentHandle;
