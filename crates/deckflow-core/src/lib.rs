//! Deckflow Core - DJ mixing engine: signal graph, beat analysis, loops and deck mixing

pub mod analysis;
pub mod audio;
pub mod config;
pub mod control;
pub mod effect;
pub mod engine;
pub mod error;
pub mod graph;
pub mod loops;
pub mod mixer;
pub mod scheduler;
pub mod telemetry;
pub mod track;
pub mod types;

pub use control::{DjController, PollOutcome};
pub use error::{EngineError, EngineResult};
pub use types::*;
