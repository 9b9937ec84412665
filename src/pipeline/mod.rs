//! Frame loop and query pipeline.

mod engine;
mod results;
mod session;

pub use engine::VisionEngine;
pub use results::{GeomodelResult, ImageResult, StabilizedResult};
pub use session::FrameSession;
