use super::background::BackgroundModel;
use crate::config::MotionConfig;
use crate::error::{AnalyzerError, FrameSourceError, Result};
use crate::frame::{FrameData, FrameFormat};

use futures::{Stream, StreamExt};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::{
    contrast::threshold,
    distance_transform::Norm,
    filter::gaussian_blur_f32,
    morphology::dilate,
    region_labelling::{connected_components, Connectivity},
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Bounding box and pixel area of a changed region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: u32,
}

/// Outcome of one scanning phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionVerdict {
    Motion { region: MotionRegion },
    Quiet,
}

/// Background-subtraction motion detector.
///
/// The detector is fed one frame at a time. It owns at most one background
/// model, which lives for a single scanning phase.
pub struct MotionDetector {
    config: MotionConfig,
    background: Option<BackgroundModel>,
    frames_processed: u64,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        info!("Initializing motion detector with config: {:?}", config);
        Self {
            config,
            background: None,
            frames_processed: 0,
        }
    }

    /// Drop the background model and quiet count; the next frame seeds a new model
    pub fn reset(&mut self) {
        self.background = None;
    }

    /// Run one scanning phase over `frames` until motion or the quiet cap.
    pub async fn scan<S>(&mut self, frames: &mut S) -> Result<MotionVerdict>
    where
        S: Stream<Item = Result<FrameData>> + Unpin + ?Sized,
    {
        self.reset();

        while let Some(frame) = frames.next().await {
            let frame = frame?;
            if let Some(verdict) = self.observe(&frame)? {
                return Ok(verdict);
            }
        }

        Err(FrameSourceError::FeedEnded.into())
    }

    /// Feed a single frame. Returns a verdict once one is reached.
    pub fn observe(&mut self, frame: &FrameData) -> Result<Option<MotionVerdict>> {
        let gray = self.prepare(frame)?;
        self.frames_processed += 1;

        let background = match self.background.take() {
            Some(model) if model.dimensions() == gray.dimensions() => {
                self.background.insert(model)
            }
            previous => {
                match previous {
                    Some(model) => info!(
                        "Frame size changed from {:?} to {:?}; reseeding background model",
                        model.dimensions(),
                        gray.dimensions()
                    ),
                    None => debug!("Seeding background model from frame {}", frame.id),
                }
                self.background = Some(BackgroundModel::seed(&gray));
                return Ok(None);
            }
        };

        let diff = background.blend_and_diff(&gray, self.config.blend_weight);
        let mut mask = threshold(&diff, self.config.delta_threshold);
        if self.config.dilate_radius > 0 {
            mask = dilate(&mask, Norm::LInf, self.config.dilate_radius);
        }

        if let Some(region) = first_qualifying_region(&mask, self.config.min_area) {
            info!(
                "Motion detected in frame {}: area = {} pixels at ({}, {}) {}x{}",
                frame.id, region.area, region.x, region.y, region.width, region.height
            );
            return Ok(Some(MotionVerdict::Motion { region }));
        }

        let quiet = background.record_quiet();
        debug!(
            "Frame {} quiet ({}/{})",
            frame.id, quiet, self.config.quiet_frame_cap
        );
        if quiet >= self.config.quiet_frame_cap {
            return Ok(Some(MotionVerdict::Quiet));
        }

        Ok(None)
    }

    /// Grayscale and optionally blur the frame
    fn prepare(&self, frame: &FrameData) -> Result<GrayImage> {
        let gray = frame_to_gray_image(frame)?;
        if self.config.blur_sigma > 0.0 {
            Ok(gaussian_blur_f32(&gray, self.config.blur_sigma))
        } else {
            Ok(gray)
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn background_initialized(&self) -> bool {
        self.background.is_some()
    }

    pub fn quiet_frames(&self) -> u32 {
        self.background
            .as_ref()
            .map(BackgroundModel::quiet_frames)
            .unwrap_or(0)
    }
}

/// First connected region, in label order, whose area reaches `min_area`
fn first_qualifying_region(mask: &GrayImage, min_area: f64) -> Option<MotionRegion> {
    let components = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    collect_regions(&components)
        .into_values()
        .find(|region| region.area as f64 >= min_area)
}

fn collect_regions(
    components: &ImageBuffer<Luma<u32>, Vec<u32>>,
) -> BTreeMap<u32, MotionRegion> {
    let mut bounds: BTreeMap<u32, (u32, u32, u32, u32, u32)> = BTreeMap::new();

    for (x, y, pixel) in components.enumerate_pixels() {
        let label = pixel[0];
        if label == 0 {
            continue;
        }
        let entry = bounds.entry(label).or_insert((x, y, x, y, 0));
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
        entry.4 += 1;
    }

    bounds
        .into_iter()
        .map(|(label, (min_x, min_y, max_x, max_y, area))| {
            (
                label,
                MotionRegion {
                    x: min_x,
                    y: min_y,
                    width: max_x - min_x + 1,
                    height: max_y - min_y + 1,
                    area,
                },
            )
        })
        .collect()
}

/// Convert frame data to a grayscale image
pub(crate) fn frame_to_gray_image(frame: &FrameData) -> Result<GrayImage> {
    match frame.format {
        FrameFormat::Gray8 => {
            GrayImage::from_raw(frame.width, frame.height, frame.data.to_vec()).ok_or_else(|| {
                AnalyzerError::FrameProcessing {
                    details: format!(
                        "Gray8 frame {} has {} bytes, expected {}",
                        frame.id,
                        frame.data.len(),
                        frame.width as usize * frame.height as usize
                    ),
                }
                .into()
            })
        }
        FrameFormat::Mjpeg => {
            let dynamic_image = image::load_from_memory(&frame.data).map_err(|e| {
                AnalyzerError::FrameProcessing {
                    details: format!("MJPEG decode failed: {}", e),
                }
            })?;
            Ok(dynamic_image.to_luma8())
        }
        FrameFormat::Yuyv => yuyv_to_gray(frame),
        FrameFormat::Rgb24 => rgb24_to_gray(frame),
    }
}

/// Convert YUYV frame to grayscale
fn yuyv_to_gray(frame: &FrameData) -> Result<GrayImage> {
    if !frame.validate_size() {
        return Err(AnalyzerError::FrameProcessing {
            details: format!(
                "YUYV frame {} has {} bytes, expected {:?}",
                frame.id,
                frame.data.len(),
                frame.expected_size()
            ),
        }
        .into());
    }

    let width = frame.width;
    let height = frame.height;
    let mut gray_image = GrayImage::new(width, height);

    // YUYV format: Y0 U Y1 V (4 bytes for 2 pixels)
    for y in 0..height {
        for x in 0..(width / 2) {
            let base_idx = ((y * width / 2 + x) * 4) as usize;
            let y0 = frame.data[base_idx];
            let y1 = frame.data[base_idx + 2];

            gray_image.put_pixel(x * 2, y, Luma([y0]));
            if x * 2 + 1 < width {
                gray_image.put_pixel(x * 2 + 1, y, Luma([y1]));
            }
        }
    }

    Ok(gray_image)
}

/// Convert RGB24 frame to grayscale
fn rgb24_to_gray(frame: &FrameData) -> Result<GrayImage> {
    let rgb_image = RgbImage::from_raw(frame.width, frame.height, frame.data.to_vec())
        .ok_or_else(|| AnalyzerError::FrameProcessing {
            details: "Failed to create RGB image from raw data".to_string(),
        })?;

    let mut gray_image = GrayImage::new(frame.width, frame.height);
    for (x, y, rgb) in rgb_image.enumerate_pixels() {
        let gray_value =
            (0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32) as u8;
        gray_image.put_pixel(x, y, Luma([gray_value]));
    }

    Ok(gray_image)
}
