use super::interface::{FrameSource, FrameStream};
use crate::config::CameraConfig;
use crate::error::{FrameSourceError, Result, SentryError};
use crate::frame::{FrameData, FrameFormat, Resolution};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::GrayImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace};

const BACKGROUND_LEVEL: u8 = 40;
const BLOCK_LEVEL: u8 = 230;

/// Frames between simulated visitors
const MOTION_CYCLE: u64 = 300;
/// Frames a simulated visitor stays in view
const MOTION_FRAMES: u64 = 8;

/// Build a Gray8 frame filled with one level
pub fn uniform_frame(id: u64, width: u32, height: u32, level: u8) -> FrameData {
    FrameData::new(
        id,
        SystemTime::now(),
        vec![level; width as usize * height as usize],
        width,
        height,
        FrameFormat::Gray8,
    )
}

/// Build a Gray8 frame with a square block of `foreground` at `origin`
pub fn frame_with_block(
    id: u64,
    width: u32,
    height: u32,
    background: u8,
    foreground: u8,
    origin: (u32, u32),
    size: u32,
) -> FrameData {
    let mut data = vec![background; width as usize * height as usize];
    let (ox, oy) = origin;
    for y in oy..oy.saturating_add(size).min(height) {
        for x in ox..ox.saturating_add(size).min(width) {
            data[(y * width + x) as usize] = foreground;
        }
    }

    FrameData::new(id, SystemTime::now(), data, width, height, FrameFormat::Gray8)
}

/// Synthetic scene: a static background with a bright block that walks across
/// the frame for a few frames every cycle.
fn synthetic_frame(id: u64, resolution: Resolution) -> FrameData {
    let Resolution { width, height } = resolution;
    let phase = id % MOTION_CYCLE;
    if phase >= MOTION_FRAMES {
        return uniform_frame(id, width, height, BACKGROUND_LEVEL);
    }

    let size = (width.min(height) / 4).max(1);
    let step = width.saturating_sub(size) / MOTION_FRAMES as u32;
    let origin = (step * phase as u32, height.saturating_sub(size) / 2);
    frame_with_block(id, width, height, BACKGROUND_LEVEL, BLOCK_LEVEL, origin, size)
}

/// Stand-in camera that needs no hardware.
///
/// Frames are generated at the configured rate; stills are JPEG encoded
/// synthetic frames and recordings produce (empty) segment files.
pub struct SimulatedFrameSource {
    resolution: Resolution,
    fps: u32,
    frame_counter: Arc<AtomicU64>,
    recording: Option<PathBuf>,
}

impl SimulatedFrameSource {
    pub fn new(config: &CameraConfig) -> Self {
        info!(
            "Initializing simulated frame source ({}x{} @ {}fps)",
            config.resolution.0, config.resolution.1, config.fps
        );
        Self {
            resolution: Resolution::from(config.resolution),
            fps: config.fps,
            frame_counter: Arc::new(AtomicU64::new(0)),
            recording: None,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.fps.max(1) as u64)
    }

    async fn create_segment(path: &Path) -> Result<()> {
        tokio::fs::write(path, b"").await.map_err(|e| {
            FrameSourceError::Recording {
                details: format!("Failed to create segment {}: {}", path.display(), e),
            }
            .into()
        })
    }
}

#[async_trait]
impl FrameSource for SimulatedFrameSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn configure(&mut self, resolution: Resolution) -> Result<()> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(FrameSourceError::InvalidState {
                details: format!("Unsupported resolution {}", resolution),
            }
            .into());
        }
        debug!("Simulated source resolution set to {}", resolution);
        self.resolution = resolution;
        Ok(())
    }

    async fn capture_still(&mut self, path: &Path, use_video_port: bool) -> Result<()> {
        if use_video_port && self.recording.is_none() {
            return Err(FrameSourceError::InvalidState {
                details: "Video port still requested while not recording".to_string(),
            }
            .into());
        }

        let frame_id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
        let frame = synthetic_frame(frame_id, self.resolution);
        let image = GrayImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .ok_or_else(|| SentryError::component("simulated", "Synthetic frame size mismatch"))?;

        let jpeg_data = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            {
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
                encoder.encode_image(&image)?;
            }
            Ok::<_, image::ImageError>(buf)
        })
        .await
        .map_err(|e| SentryError::component("simulated", &format!("Encoder task failed: {}", e)))?
        .map_err(|e| FrameSourceError::Capture {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        tokio::fs::write(path, &jpeg_data)
            .await
            .map_err(|e| FrameSourceError::Capture {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;

        trace!(
            "Wrote simulated still {} ({} bytes, video port: {})",
            path.display(),
            jpeg_data.len(),
            use_video_port
        );
        Ok(())
    }

    async fn start_recording(&mut self, path: &Path) -> Result<()> {
        if let Some(active) = &self.recording {
            return Err(FrameSourceError::InvalidState {
                details: format!("Already recording to {}", active.display()),
            }
            .into());
        }

        Self::create_segment(path).await?;
        info!("Simulated recording started: {}", path.display());
        self.recording = Some(path.to_path_buf());
        Ok(())
    }

    async fn split_recording(&mut self, path: &Path) -> Result<()> {
        let Some(previous) = self.recording.take() else {
            return Err(FrameSourceError::InvalidState {
                details: "Split requested while not recording".to_string(),
            }
            .into());
        };

        Self::create_segment(path).await?;
        debug!(
            "Simulated recording split: {} -> {}",
            previous.display(),
            path.display()
        );
        self.recording = Some(path.to_path_buf());
        Ok(())
    }

    async fn stop_recording(&mut self) -> Result<()> {
        match self.recording.take() {
            Some(path) => {
                info!("Simulated recording stopped: {}", path.display());
                Ok(())
            }
            None => Err(FrameSourceError::InvalidState {
                details: "Stop requested while not recording".to_string(),
            }
            .into()),
        }
    }

    fn frames(&mut self, resolution: Resolution) -> Result<FrameStream<'_>> {
        if self.recording.is_some() {
            return Err(FrameSourceError::InvalidState {
                details: "Frame feed unavailable while recording".to_string(),
            }
            .into());
        }

        let frame_interval = self.frame_interval();
        let frame_counter = Arc::clone(&self.frame_counter);

        let stream = async_stream::stream! {
            let mut interval_timer = tokio::time::interval(frame_interval);
            loop {
                interval_timer.tick().await;
                let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                trace!("Generated simulated frame {} ({})", frame_id, resolution);
                yield Ok(synthetic_frame(frame_id, resolution));
            }
        };

        Ok(Box::pin(stream))
    }
}
