use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// Date and time strings captured once when a session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStamp {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH-MM-SS`
    pub time: String,
}

impl SessionStamp {
    pub fn from_datetime<Z: TimeZone>(timestamp: &DateTime<Z>) -> Self
    where
        Z::Offset: fmt::Display,
    {
        Self {
            date: timestamp.format("%Y-%m-%d").to_string(),
            time: timestamp.format("%H-%M-%S").to_string(),
        }
    }

    pub fn photo_file_name(&self, index: u32) -> String {
        format!("{}_{}_photo{}.jpg", self.date, self.time, index)
    }

    pub fn video_file_name(&self, index: u32) -> String {
        format!("{}_video{}.h264", self.time, index)
    }
}

/// Timezone used for file timestamps
#[derive(Debug, Clone, Copy)]
pub enum TimestampZone {
    Local,
    Named(Tz),
}

impl TimestampZone {
    /// Resolve an optional IANA name; unknown names fall back to UTC
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            None => TimestampZone::Local,
            Some(tz_name) => match tz_name.parse::<Tz>() {
                Ok(tz) => TimestampZone::Named(tz),
                Err(_) => {
                    warn!(
                        "Invalid timestamp timezone '{}', falling back to UTC",
                        tz_name
                    );
                    TimestampZone::Named(chrono_tz::UTC)
                }
            },
        }
    }

    pub fn stamp(&self, instant: DateTime<Utc>) -> SessionStamp {
        match self {
            TimestampZone::Local => SessionStamp::from_datetime(&instant.with_timezone(&Local)),
            TimestampZone::Named(tz) => SessionStamp::from_datetime(&instant.with_timezone(tz)),
        }
    }

    pub fn now(&self) -> SessionStamp {
        self.stamp(Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    PhotoBurst,
    VideoRecording,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::PhotoBurst => f.write_str("photo burst"),
            SessionKind::VideoRecording => f.write_str("video recording"),
        }
    }
}

/// State of one photo burst or recording run; dropped when the mode exits
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    kind: SessionKind,
    count: u32,
    stamp: SessionStamp,
    photos_taken: u32,
}

impl Session {
    /// `count` must already be clamped to the configured maximum
    pub fn new(kind: SessionKind, count: u32, stamp: SessionStamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            count,
            stamp,
            photos_taken: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Photos for a burst, segments for a recording
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn stamp(&self) -> &SessionStamp {
        &self.stamp
    }

    /// Reserve the next photo index for this session
    pub fn next_photo_index(&mut self) -> u32 {
        let index = self.photos_taken;
        self.photos_taken += 1;
        index
    }

    pub fn photos_taken(&self) -> u32 {
        self.photos_taken
    }
}
