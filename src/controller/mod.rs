mod burst;
mod core;
mod recording;
mod session;
mod types;

#[cfg(test)]
mod tests;

pub use self::core::CaptureController;
pub use session::{Session, SessionKind, SessionStamp, TimestampZone};
pub use types::{ControllerMode, StepOutcome};
