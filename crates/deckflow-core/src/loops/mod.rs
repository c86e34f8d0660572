//! Loops, hot cues and the loop slicer

pub mod hot_cue;
pub mod loop_engine;
pub mod slicer;

use thiserror::Error;

pub use hot_cue::{HotCueAction, HotCues, HOT_CUE_SLOTS};
pub use loop_engine::{LoopEngine, LoopRegion, LoopState};
pub use slicer::{Slice, SliceSet};

/// Rejected loop operations; the loop state is unchanged
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoopError {
    #[error("Loop out requires a loop in point")]
    NoLoopIn,

    #[error("Loop out {end:.3}s is not after loop in {start:.3}s")]
    OutBeforeIn { start: f64, end: f64 },

    #[error("No BPM set")]
    BpmUnknown,

    #[error("Invalid beat count: {0}")]
    InvalidBeats(f64),

    #[error("Invalid loop position")]
    InvalidPosition,

    #[error("No active loop")]
    NotActive,

    #[error("Invalid slice count: {0}")]
    InvalidDivisions(usize),

    #[error("Loop of {frames} frames is too short for {divisions} slices")]
    LoopTooShort { frames: usize, divisions: usize },
}
