use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// File-ready notifications produced by the capture controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureEvent {
    /// A still photo was written to disk
    PhotoReady {
        path: PathBuf,
        date: String,
        time: String,
        sequence: u32,
    },
    /// A video segment was closed and is ready for upload
    VideoSegmentReady {
        path: PathBuf,
        date: String,
        time: String,
        segment_index: u32,
    },
}

impl CaptureEvent {
    /// File the event refers to
    pub fn path(&self) -> &Path {
        match self {
            CaptureEvent::PhotoReady { path, .. } => path,
            CaptureEvent::VideoSegmentReady { path, .. } => path,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CaptureEvent::PhotoReady { path, sequence, .. } => {
                format!("Photo {} ready: {}", sequence, path.display())
            }
            CaptureEvent::VideoSegmentReady {
                path,
                segment_index,
                ..
            } => {
                format!("Video segment {} ready: {}", segment_index, path.display())
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CaptureEvent::PhotoReady { .. } => "photo_ready",
            CaptureEvent::VideoSegmentReady { .. } => "video_segment_ready",
        }
    }

    /// Sink that consumes this event
    pub fn sink(&self) -> SinkKind {
        match self {
            CaptureEvent::PhotoReady { .. } => SinkKind::Relay,
            CaptureEvent::VideoSegmentReady { .. } => SinkKind::Cloud,
        }
    }

    /// Build the wire message delivered to the event's sink
    pub fn to_sink_message(&self) -> SinkMessage {
        match self {
            CaptureEvent::PhotoReady {
                path, date, time, ..
            } => SinkMessage::SendPhoto(FileReady::describe(path, "JPG", date, time)),
            CaptureEvent::VideoSegmentReady {
                path, date, time, ..
            } => SinkMessage::UploadFile(FileReady::describe(path, "H264", date, time)),
        }
    }
}

impl fmt::Display for CaptureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Downstream consumers of capture events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Messaging relay (photos)
    Relay,
    /// Cloud uploader (video segments)
    Cloud,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Relay => f.write_str("relay"),
            SinkKind::Cloud => f.write_str("cloud"),
        }
    }
}

/// Wire message as consumed by the relay and uploader clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum SinkMessage {
    SendPhoto(FileReady),
    UploadFile(FileReady),
}

impl SinkMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode {
            details: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReady {
    /// Directory containing the file
    pub path: String,
    pub file_type: String,
    /// File stem without extension
    pub file_name: String,
    /// Extension including the leading dot
    pub extension: String,
    pub date: String,
    pub time: String,
}

impl FileReady {
    fn describe(file: &Path, file_type: &str, date: &str, time: &str) -> Self {
        let directory = file
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let file_name = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Self {
            path: directory,
            file_type: file_type.to_string(),
            file_name,
            extension,
            date: date.to_string(),
            time: time.to_string(),
        }
    }
}

/// Producer side of the relay and cloud mailboxes
#[derive(Clone)]
pub struct EventSinks {
    relay: mpsc::UnboundedSender<CaptureEvent>,
    cloud: mpsc::UnboundedSender<CaptureEvent>,
}

/// Consumer side of the relay and cloud mailboxes
pub struct SinkReceivers {
    pub relay: mpsc::UnboundedReceiver<CaptureEvent>,
    pub cloud: mpsc::UnboundedReceiver<CaptureEvent>,
}

/// Create the pair of unbounded event mailboxes
pub fn event_sinks() -> (EventSinks, SinkReceivers) {
    let (relay_tx, relay_rx) = mpsc::unbounded_channel();
    let (cloud_tx, cloud_rx) = mpsc::unbounded_channel();

    (
        EventSinks {
            relay: relay_tx,
            cloud: cloud_tx,
        },
        SinkReceivers {
            relay: relay_rx,
            cloud: cloud_rx,
        },
    )
}

impl EventSinks {
    /// Route an event to its sink without waiting on the consumer.
    ///
    /// Returns false when the consumer has gone away; the event is dropped.
    pub fn emit(&self, event: CaptureEvent) -> bool {
        let sink = event.sink();
        debug!("Emitting {} to {} sink", event.event_type(), sink);
        info!("{}", event.description());

        let sender = match sink {
            SinkKind::Relay => &self.relay,
            SinkKind::Cloud => &self.cloud,
        };

        match sender.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                warn!(
                    "{} sink is closed; dropping event: {}",
                    sink,
                    event.description()
                );
                false
            }
        }
    }
}
