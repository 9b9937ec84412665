//! Temporal smoothing of per-frame classifier results.

mod buffer;

pub use buffer::{ResultBuffer, age_penalty};
