use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SentryConfig {
    pub camera: CameraConfig,
    pub motion: MotionConfig,
    pub capture: CaptureConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second delivered by the frame feed
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionConfig {
    /// Weight of the newest frame in the running background average
    #[serde(default = "default_blend_weight")]
    pub blend_weight: f32,

    /// Per-pixel difference above which a pixel counts as changed
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold: u8,

    /// Gaussian blur sigma applied before comparison (0 disables)
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,

    /// Dilation radius applied to the thresholded mask (0 disables)
    #[serde(default = "default_dilate_radius")]
    pub dilate_radius: u8,

    /// Minimum region area in pixels to report motion
    #[serde(default = "default_min_area")]
    pub min_area: f64,

    /// Quiet frames tolerated before a scan yields control
    #[serde(default = "default_quiet_frame_cap")]
    pub quiet_frame_cap: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Directory receiving still photos
    #[serde(default = "default_photo_dir")]
    pub photo_dir: String,

    /// Directory receiving video segments
    #[serde(default = "default_video_dir")]
    pub video_dir: String,

    /// Pacing period between captures, in milliseconds
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Upper bound on photos in one burst
    #[serde(default = "default_max_photo_count")]
    pub max_photo_count: u32,

    /// IANA timezone for file timestamps; local time when unset
    #[serde(default)]
    pub timezone: Option<String>,

    /// Bound on the idle command wait; unset waits indefinitely
    #[serde(default)]
    pub idle_command_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VideoConfig {
    /// Upper bound on segments in one recording session
    #[serde(default = "default_max_video_count")]
    pub max_video_count: u32,

    /// Length of one segment in seconds
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: u64,

    /// Take a still before motion-triggered recording starts
    #[serde(default = "default_initial_photo")]
    pub initial_photo: bool,

    /// Take a still from the video port on every pacing tick while recording
    #[serde(default = "default_photo_during_recording")]
    pub photo_during_recording: bool,
}

impl CaptureConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn idle_command_timeout(&self) -> Option<Duration> {
        self.idle_command_timeout_ms.map(Duration::from_millis)
    }

    pub fn photo_path(&self) -> PathBuf {
        PathBuf::from(&self.photo_dir)
    }

    pub fn video_path(&self) -> PathBuf {
        PathBuf::from(&self.video_dir)
    }
}

impl VideoConfig {
    pub fn segment_length(&self) -> Duration {
        Duration::from_secs(self.segment_seconds)
    }

    /// Pacing ticks that fit in one segment
    pub fn ticks_per_segment(&self, period: Duration) -> u32 {
        if period.is_zero() {
            return 0;
        }
        (self.segment_length().as_millis() / period.as_millis()) as u32
    }
}

impl SentryConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("sentrycam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("motion.blend_weight", default_blend_weight() as f64)?
            .set_default("motion.delta_threshold", default_delta_threshold() as i64)?
            .set_default("motion.blur_sigma", default_blur_sigma() as f64)?
            .set_default("motion.dilate_radius", default_dilate_radius() as i64)?
            .set_default("motion.min_area", default_min_area())?
            .set_default("motion.quiet_frame_cap", default_quiet_frame_cap())?
            .set_default("capture.photo_dir", default_photo_dir())?
            .set_default("capture.video_dir", default_video_dir())?
            .set_default("capture.period_ms", default_period_ms())?
            .set_default("capture.max_photo_count", default_max_photo_count())?
            .set_default("video.max_video_count", default_max_video_count())?
            .set_default("video.segment_seconds", default_segment_seconds())?
            .set_default("video.initial_photo", default_initial_photo())?
            .set_default(
                "video.photo_during_recording",
                default_photo_during_recording(),
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(Environment::with_prefix("SENTRYCAM").separator("__"))
            .build()?;

        let config: SentryConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if !(self.motion.blend_weight > 0.0 && self.motion.blend_weight <= 1.0) {
            return Err(ConfigError::Message(
                "Motion blend_weight must be in (0, 1]".to_string(),
            ));
        }

        if self.motion.blur_sigma < 0.0 {
            return Err(ConfigError::Message(
                "Motion blur_sigma must not be negative".to_string(),
            ));
        }

        if self.motion.min_area < 0.0 {
            return Err(ConfigError::Message(
                "Motion min_area must not be negative".to_string(),
            ));
        }

        if self.motion.quiet_frame_cap == 0 {
            return Err(ConfigError::Message(
                "Motion quiet_frame_cap must be greater than 0".to_string(),
            ));
        }

        if self.capture.period_ms == 0 {
            return Err(ConfigError::Message(
                "Capture period_ms must be greater than 0".to_string(),
            ));
        }

        if self.capture.max_photo_count == 0 {
            return Err(ConfigError::Message(
                "Capture max_photo_count must be greater than 0".to_string(),
            ));
        }

        if self.capture.photo_dir.is_empty() || self.capture.video_dir.is_empty() {
            return Err(ConfigError::Message(
                "Capture photo_dir and video_dir must be set".to_string(),
            ));
        }

        if self.video.max_video_count == 0 {
            return Err(ConfigError::Message(
                "Video max_video_count must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
            },
            motion: MotionConfig::default(),
            capture: CaptureConfig {
                photo_dir: default_photo_dir(),
                video_dir: default_video_dir(),
                period_ms: default_period_ms(),
                max_photo_count: default_max_photo_count(),
                timezone: None,
                idle_command_timeout_ms: None,
            },
            video: VideoConfig {
                max_video_count: default_max_video_count(),
                segment_seconds: default_segment_seconds(),
                initial_photo: default_initial_photo(),
                photo_during_recording: default_photo_during_recording(),
            },
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            blend_weight: default_blend_weight(),
            delta_threshold: default_delta_threshold(),
            blur_sigma: default_blur_sigma(),
            dilate_radius: default_dilate_radius(),
            min_area: default_min_area(),
            quiet_frame_cap: default_quiet_frame_cap(),
        }
    }
}

// Default value functions
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    10
}

fn default_blend_weight() -> f32 {
    0.5
}
fn default_delta_threshold() -> u8 {
    25
}
fn default_blur_sigma() -> f32 {
    2.0
}
fn default_dilate_radius() -> u8 {
    2
}
fn default_min_area() -> f64 {
    1000.0
}
fn default_quiet_frame_cap() -> u32 {
    10
}

fn default_photo_dir() -> String {
    "./photos".to_string()
}
fn default_video_dir() -> String {
    "./videos".to_string()
}
fn default_period_ms() -> u64 {
    1000
}
fn default_max_photo_count() -> u32 {
    10
}

fn default_max_video_count() -> u32 {
    2
}
fn default_segment_seconds() -> u64 {
    30
}
fn default_initial_photo() -> bool {
    false
}
fn default_photo_during_recording() -> bool {
    true
}
