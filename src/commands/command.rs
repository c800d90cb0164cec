use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Instructions accepted by the capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireCommand", into = "WireCommand")]
pub enum Command {
    /// Take a burst of photos; `None` means the configured maximum
    TakePhoto { count: Option<NonZeroU32> },
    /// Record video segments; `None` means the configured maximum
    TakeVideo { count: Option<NonZeroU32> },
    /// End the active burst or recording
    Stop,
}

impl Command {
    pub fn take_photo(count: u32) -> Self {
        Command::TakePhoto {
            count: NonZeroU32::new(count),
        }
    }

    pub fn take_video(count: u32) -> Self {
        Command::TakeVideo {
            count: NonZeroU32::new(count),
        }
    }

    /// Parse a JSON command as sent by external producers
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::MalformedCommand {
            details: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode {
            details: e.to_string(),
        })
    }

    /// Get the command name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::TakePhoto { .. } => "take_photo",
            Command::TakeVideo { .. } => "take_video",
            Command::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::TakePhoto { count: Some(n) } | Command::TakeVideo { count: Some(n) } => {
                write!(f, "{}({})", self.name(), n)
            }
            Command::TakePhoto { count: None } | Command::TakeVideo { count: None } => {
                write!(f, "{}(max)", self.name())
            }
            Command::Stop => f.write_str(self.name()),
        }
    }
}

/// Replace an unset or oversized request with the configured maximum
pub fn clamp_count(requested: Option<NonZeroU32>, max: u32) -> u32 {
    match requested {
        Some(n) => n.get().min(max),
        None => max,
    }
}

/// JSON shape `{ "cmd": ..., "count"?: n }`; a count of 0 means "maximum"
#[derive(Debug, Serialize, Deserialize)]
struct WireCommand {
    cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<u32>,
}

impl TryFrom<WireCommand> for Command {
    type Error = String;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let count = wire.count.and_then(NonZeroU32::new);
        match wire.cmd.as_str() {
            "take_photo" => Ok(Command::TakePhoto { count }),
            "take_video" => Ok(Command::TakeVideo { count }),
            "stop" => Ok(Command::Stop),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

impl From<Command> for WireCommand {
    fn from(command: Command) -> Self {
        let count = match command {
            Command::TakePhoto { count } | Command::TakeVideo { count } => count.map(|n| n.get()),
            Command::Stop => None,
        };
        WireCommand {
            cmd: command.name().to_string(),
            count,
        }
    }
}
