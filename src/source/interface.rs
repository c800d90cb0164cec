use crate::error::Result;
use crate::frame::{FrameData, Resolution};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

/// Lazy feed of frames borrowed from a source; restartable by calling `frames` again
pub type FrameStream<'a> = BoxStream<'a, Result<FrameData>>;

/// Capabilities the capture controller needs from a camera device.
///
/// Calls are never interrupted mid-operation; the controller only checks for
/// `Stop` between them.
#[async_trait]
pub trait FrameSource: Send {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Apply the capture resolution
    async fn configure(&mut self, resolution: Resolution) -> Result<()>;

    /// Write a JPEG still to `path`. `use_video_port` takes the still from the
    /// active recording pipeline instead of the still pipeline.
    async fn capture_still(&mut self, path: &Path, use_video_port: bool) -> Result<()>;

    /// Begin recording H.264 video to `path`
    async fn start_recording(&mut self, path: &Path) -> Result<()>;

    /// Close the active segment and continue recording into `path`
    async fn split_recording(&mut self, path: &Path) -> Result<()>;

    /// End the active recording
    async fn stop_recording(&mut self) -> Result<()>;

    /// Start a fresh frame feed; frames keep coming until the stream is dropped
    fn frames(&mut self, resolution: Resolution) -> Result<FrameStream<'_>>;
}
