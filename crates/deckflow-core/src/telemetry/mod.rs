//! Telemetry for the visualization collaborator: frequency bins and state
//! snapshots

mod snapshot;
mod spectrum;

pub use snapshot::{DeckSnapshot, EngineSnapshot};
pub use spectrum::SpectrumAnalyzer;
