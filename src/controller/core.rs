use super::session::{Session, TimestampZone};
use super::types::{ControllerMode, StepOutcome};
use crate::analyzer::{MotionDetector, MotionVerdict};
use crate::commands::{Command, CommandPoll, CommandReceiver, Delivery};
use crate::config::{CaptureConfig, SentryConfig, VideoConfig};
use crate::error::Result;
use crate::events::{CaptureEvent, EventSinks};
use crate::frame::Resolution;
use crate::source::FrameSource;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Mode-arbitration state machine.
///
/// Owns the frame source, the motion detector and all session state. It is
/// the only consumer of the command channel and the only producer of capture
/// events.
pub struct CaptureController<S: FrameSource> {
    pub(super) source: S,
    pub(super) detector: MotionDetector,
    pub(super) commands: CommandReceiver,
    pub(super) sinks: EventSinks,
    pub(super) capture: CaptureConfig,
    pub(super) video: VideoConfig,
    resolution: Resolution,
    pub(super) zone: TimestampZone,
    mode_tx: watch::Sender<ControllerMode>,
}

impl<S: FrameSource> CaptureController<S> {
    /// Configure `source` and assemble the controller
    pub async fn new(
        config: &SentryConfig,
        mut source: S,
        commands: CommandReceiver,
        sinks: EventSinks,
    ) -> Result<Self> {
        let resolution = Resolution::from(config.camera.resolution);
        info!(
            "Initializing capture controller with {} source at {}",
            source.name(),
            resolution
        );
        source.configure(resolution).await?;

        let (mode_tx, _) = watch::channel(ControllerMode::Scanning);

        Ok(Self {
            source,
            detector: MotionDetector::new(config.motion.clone()),
            commands,
            sinks,
            capture: config.capture.clone(),
            video: config.video.clone(),
            resolution,
            zone: TimestampZone::from_name(config.capture.timezone.as_deref()),
            mode_tx,
        })
    }

    /// Watch mode transitions
    pub fn mode(&self) -> watch::Receiver<ControllerMode> {
        self.mode_tx.subscribe()
    }

    pub fn current_mode(&self) -> ControllerMode {
        *self.mode_tx.borrow()
    }

    /// Run until every command producer is gone or a frame source call fails
    pub async fn run(mut self) -> Result<()> {
        info!("Capture controller running");
        loop {
            if self.step().await? == StepOutcome::Shutdown {
                info!("Command channel closed; capture controller stopping");
                return Ok(());
            }
        }
    }

    /// One scanning phase and whatever it leads to
    pub async fn step(&mut self) -> Result<StepOutcome> {
        self.set_mode(ControllerMode::Scanning);
        match self.scan().await? {
            MotionVerdict::Motion { region } => {
                info!(
                    "Motion at ({}, {}) {}x{}; starting recording",
                    region.x, region.y, region.width, region.height
                );
                self.record_video(None, true).await?;
                Ok(StepOutcome::Continue)
            }
            MotionVerdict::Quiet => self.idle().await,
        }
    }

    async fn scan(&mut self) -> Result<MotionVerdict> {
        let mut frames = self.source.frames(self.resolution)?;
        self.detector.scan(&mut frames).await
    }

    async fn idle(&mut self) -> Result<StepOutcome> {
        self.set_mode(ControllerMode::Idle);

        let delivery = match self.capture.idle_command_timeout() {
            None => self.commands.recv().await,
            Some(timeout) => match self.commands.recv_until(Instant::now() + timeout).await {
                CommandPoll::Received(delivery) => Some(delivery),
                CommandPoll::Elapsed if self.commands.is_closed() => None,
                CommandPoll::Elapsed => {
                    debug!("No command within {:?}; resuming scan", timeout);
                    return Ok(StepOutcome::Continue);
                }
            },
        };

        match delivery {
            Some(delivery) => {
                self.dispatch(delivery).await?;
                Ok(StepOutcome::Continue)
            }
            None => Ok(StepOutcome::Shutdown),
        }
    }

    async fn dispatch(&mut self, delivery: Delivery) -> Result<()> {
        let command = delivery.ack();
        info!("Received command {}", command);

        match command {
            Command::TakePhoto { count } => self.photo_burst(count).await,
            Command::TakeVideo { count } => self.record_video(count, false).await,
            Command::Stop => {
                warn!("Received stop while idle; nothing to stop");
                Ok(())
            }
        }
    }

    /// Wait for `deadline`, returning true if a `Stop` arrives first.
    ///
    /// Other commands are acknowledged and ignored without moving the deadline.
    pub(super) async fn wait_for_stop(&mut self, deadline: Instant) -> bool {
        loop {
            match self.commands.recv_until(deadline).await {
                CommandPoll::Elapsed => return false,
                CommandPoll::Received(delivery) => match delivery.ack() {
                    Command::Stop => {
                        info!("Stop received during {}", self.current_mode());
                        return true;
                    }
                    other => warn!("Ignoring {} during {}", other, self.current_mode()),
                },
            }
        }
    }

    /// Take one still for `session` and announce it
    pub(super) async fn capture_photo(
        &mut self,
        session: &mut Session,
        use_video_port: bool,
    ) -> Result<()> {
        let sequence = session.next_photo_index();
        let path = self
            .capture
            .photo_path()
            .join(session.stamp().photo_file_name(sequence));

        self.source.capture_still(&path, use_video_port).await?;

        let stamp = session.stamp();
        self.sinks.emit(CaptureEvent::PhotoReady {
            path,
            date: stamp.date.clone(),
            time: stamp.time.clone(),
            sequence,
        });
        Ok(())
    }

    pub(super) fn set_mode(&self, mode: ControllerMode) {
        let previous = self.mode_tx.send_replace(mode);
        if previous != mode {
            debug!("Controller mode: {} -> {}", previous, mode);
        }
    }
}
