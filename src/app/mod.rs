mod io;
mod orchestrator;
mod runtime;
mod shutdown;
mod types;


pub use io::{forward_commands, forward_events, render_event};
pub use orchestrator::SentryApp;
pub use types::{ComponentState, ShutdownReason};
