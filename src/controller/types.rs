use std::fmt;

/// Operating mode of the capture controller; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    /// Running the motion detector over the live feed
    Scanning,
    /// Waiting on the command channel after a quiet scan
    Idle,
    /// Capturing photo `index` of `count`
    PhotoBurst { index: u32, count: u32 },
    /// Recording into segment `segment_index`
    VideoRecording { segment_index: u32 },
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerMode::Scanning => f.write_str("scanning"),
            ControllerMode::Idle => f.write_str("idle"),
            ControllerMode::PhotoBurst { index, count } => {
                write!(f, "photo burst ({}/{})", index + 1, count)
            }
            ControllerMode::VideoRecording { segment_index } => {
                write!(f, "video recording (segment {})", segment_index)
            }
        }
    }
}

/// What the run loop should do after one scan-and-act cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Every command producer is gone
    Shutdown,
}
