use super::interface::{FrameSource, FrameStream};
use super::simulated::uniform_frame;
use crate::error::{FrameSourceError, Result};
use crate::frame::{FrameData, Resolution};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const QUIET_LEVEL: u8 = 30;

/// A call made against the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    Configure(Resolution),
    CaptureStill { path: PathBuf, use_video_port: bool },
    StartRecording(PathBuf),
    SplitRecording(PathBuf),
    StopRecording,
    Frames(Resolution),
}

/// Operation kinds, used to inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOp {
    Configure,
    CaptureStill,
    StartRecording,
    SplitRecording,
    StopRecording,
    Frames,
}

impl SourceCall {
    pub fn op(&self) -> SourceOp {
        match self {
            SourceCall::Configure(_) => SourceOp::Configure,
            SourceCall::CaptureStill { .. } => SourceOp::CaptureStill,
            SourceCall::StartRecording(_) => SourceOp::StartRecording,
            SourceCall::SplitRecording(_) => SourceOp::SplitRecording,
            SourceCall::StopRecording => SourceOp::StopRecording,
            SourceCall::Frames(_) => SourceOp::Frames,
        }
    }
}

/// Shared view of the calls a mock has seen; stays readable after the mock
/// has moved into a controller task.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<SourceCall>>>,
}

impl CallLog {
    pub fn snapshot(&self) -> Vec<SourceCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, op: SourceOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op() == op).count()
    }

    fn push(&self, call: SourceCall) {
        self.calls.lock().push(call);
    }
}

/// Scriptable frame source for tests.
///
/// Each call to `frames` plays the next scripted scan, then falls back to an
/// endless run of identical quiet frames.
pub struct MockFrameSource {
    scans: VecDeque<Vec<FrameData>>,
    log: CallLog,
    listener: Option<mpsc::UnboundedSender<SourceCall>>,
    fail_on: Option<SourceOp>,
    recording: Option<PathBuf>,
    next_frame_id: u64,
}

impl MockFrameSource {
    pub fn new() -> Self {
        Self {
            scans: VecDeque::new(),
            log: CallLog::default(),
            listener: None,
            fail_on: None,
            recording: None,
            next_frame_id: 0,
        }
    }

    /// Queue the frames served by the next unscripted call to `frames`
    pub fn with_scan(mut self, frames: Vec<FrameData>) -> Self {
        self.scans.push_back(frames);
        self
    }

    /// Forward every call to `listener` as it happens
    pub fn with_listener(mut self, listener: mpsc::UnboundedSender<SourceCall>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Make every call of kind `op` fail
    pub fn fail_on(mut self, op: SourceOp) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }

    fn record(&mut self, call: SourceCall) -> Result<()> {
        debug!("Mock frame source call: {:?}", call);
        let op = call.op();
        self.log.push(call.clone());
        if let Some(listener) = &self.listener {
            let _ = listener.send(call);
        }

        if self.fail_on == Some(op) {
            return Err(FrameSourceError::Recording {
                details: format!("Injected {:?} failure", op),
            }
            .into());
        }
        Ok(())
    }

    fn invalid_state(details: &str) -> crate::error::SentryError {
        FrameSourceError::InvalidState {
            details: details.to_string(),
        }
        .into()
    }
}

impl Default for MockFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn configure(&mut self, resolution: Resolution) -> Result<()> {
        self.record(SourceCall::Configure(resolution))
    }

    async fn capture_still(&mut self, path: &Path, use_video_port: bool) -> Result<()> {
        self.record(SourceCall::CaptureStill {
            path: path.to_path_buf(),
            use_video_port,
        })?;

        match (&self.recording, use_video_port) {
            (Some(_), false) => Err(Self::invalid_state(
                "Still pipeline is busy while recording",
            )),
            (None, true) => Err(Self::invalid_state("Video port has no active recording")),
            _ => Ok(()),
        }
    }

    async fn start_recording(&mut self, path: &Path) -> Result<()> {
        self.record(SourceCall::StartRecording(path.to_path_buf()))?;
        if self.recording.is_some() {
            return Err(Self::invalid_state("Recording already active"));
        }
        self.recording = Some(path.to_path_buf());
        Ok(())
    }

    async fn split_recording(&mut self, path: &Path) -> Result<()> {
        self.record(SourceCall::SplitRecording(path.to_path_buf()))?;
        if self.recording.is_none() {
            return Err(Self::invalid_state("Split without active recording"));
        }
        self.recording = Some(path.to_path_buf());
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        self.record(SourceCall::StopRecording)?;
        if self.recording.take().is_none() {
            return Err(Self::invalid_state("Stop without active recording"));
        }
        Ok(())
    }

    fn frames(&mut self, resolution: Resolution) -> Result<FrameStream<'_>> {
        self.record(SourceCall::Frames(resolution))?;
        if self.recording.is_some() {
            return Err(Self::invalid_state("Frame feed requested while recording"));
        }

        let scripted = self.scans.pop_front().unwrap_or_default();
        let mut next_id = self.next_frame_id + scripted.len() as u64;
        self.next_frame_id = next_id;

        let quiet = stream::repeat_with(move || {
            next_id += 1;
            Ok(uniform_frame(
                next_id,
                resolution.width,
                resolution.height,
                QUIET_LEVEL,
            ))
        });

        Ok(stream::iter(scripted.into_iter().map(Ok)).chain(quiet).boxed())
    }
}
