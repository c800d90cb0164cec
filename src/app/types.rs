/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why the application stopped
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// SIGINT or SIGTERM
    Signal(String),
    /// Every command producer went away and the controller wound down
    CommandsClosed,
    /// The capture controller failed
    Error(String),
}

impl ShutdownReason {
    /// Process exit code for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Signal(_) | ShutdownReason::CommandsClosed => 0,
            ShutdownReason::Error(_) => 1,
        }
    }
}
