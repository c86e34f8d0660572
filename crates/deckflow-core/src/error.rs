//! Errors returned by the control API

use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::loops::LoopError;
use crate::track::LoadError;
use crate::types::DeckId;

/// Errors reported to the UI/control collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The control → render command queue is full
    #[error("Engine command queue is full")]
    QueueFull,

    /// Operation needs a loaded track
    #[error("No track loaded on deck {0}")]
    DeckEmpty(DeckId),

    /// Operation needs a known tempo
    #[error("No BPM set")]
    BpmUnknown,

    /// Slice trigger without a current slice set
    #[error("No slices available")]
    NoSlices,

    /// Offline analysis cannot run (decode failure, silent mode)
    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("Unknown effect '{0}'")]
    UnknownEffect(String),

    #[error("Effect '{effect}' has no parameter '{param}'")]
    UnknownParam { effect: String, param: String },

    /// Argument out of its domain (non-finite value, bad name, bad index)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Loop(#[from] LoopError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

pub type EngineResult<T> = Result<T, EngineError>;
