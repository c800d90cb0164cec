mod background;
mod motion;

pub use background::BackgroundModel;
pub use motion::{MotionDetector, MotionRegion, MotionVerdict};
