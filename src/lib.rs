pub mod analyzer;
pub mod app;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod frame;
pub mod source;
pub mod storage;

pub use analyzer::{BackgroundModel, MotionDetector, MotionRegion, MotionVerdict};
pub use app::{forward_commands, forward_events, ComponentState, SentryApp, ShutdownReason};
pub use commands::{command_channel, Command, CommandReceiver, CommandSender, Delivery};
pub use config::SentryConfig;
pub use controller::{CaptureController, ControllerMode};
pub use error::{Result, SentryError};
pub use events::{event_sinks, CaptureEvent, EventSinks, SinkKind, SinkMessage, SinkReceivers};
pub use frame::{FrameData, FrameFormat, Resolution};
pub use source::{FrameSource, FrameStream, MockFrameSource, SimulatedFrameSource};
pub use storage::prepare_directories;
