use super::core::CaptureController;
use super::session::{Session, SessionKind};
use super::types::ControllerMode;
use crate::commands::clamp_count;
use crate::error::Result;
use crate::events::CaptureEvent;
use crate::source::FrameSource;
use std::num::NonZeroU32;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::{debug, info};

impl<S: FrameSource> CaptureController<S> {
    /// Record up to `max_video_count` segments, splitting every segment length.
    ///
    /// A `Stop` closes the active segment and abandons the rest of the session.
    pub(super) async fn record_video(
        &mut self,
        requested: Option<NonZeroU32>,
        motion_triggered: bool,
    ) -> Result<()> {
        let count = clamp_count(requested, self.video.max_video_count);
        let ticks = self.video.ticks_per_segment(self.capture.period());
        let mut session = Session::new(SessionKind::VideoRecording, count, self.zone.now());
        info!(
            "Starting {} {} ({} segments of {} ticks)",
            session.kind(),
            session.id(),
            count,
            ticks
        );

        if motion_triggered && self.video.initial_photo {
            self.capture_photo(&mut session, false).await?;
        }

        let mut segment_index = 0;
        let mut segment_path = self.segment_path(&session, segment_index);
        self.set_mode(ControllerMode::VideoRecording { segment_index });
        self.source.start_recording(&segment_path).await?;

        loop {
            let stopped = self.record_segment(&mut session, ticks).await?;

            if stopped || segment_index + 1 >= count {
                self.source.stop_recording().await?;
                self.emit_segment(&session, segment_path, segment_index);
                if stopped {
                    info!(
                        "Recording {} stopped during segment {} of {}",
                        session.id(),
                        segment_index,
                        count
                    );
                } else {
                    info!("Recording {} complete: {} segments", session.id(), count);
                }
                return Ok(());
            }

            let next_path = self.segment_path(&session, segment_index + 1);
            self.source.split_recording(&next_path).await?;
            let closed = std::mem::replace(&mut segment_path, next_path);
            self.emit_segment(&session, closed, segment_index);

            segment_index += 1;
            self.set_mode(ControllerMode::VideoRecording { segment_index });
        }
    }

    /// Pace one segment; true if a `Stop` ended it early
    async fn record_segment(&mut self, session: &mut Session, ticks: u32) -> Result<bool> {
        let period = self.capture.period();
        let mut deadline = Instant::now();

        for tick in 0..ticks {
            deadline += period;
            if self.wait_for_stop(deadline).await {
                return Ok(true);
            }

            debug!("Recording tick {}/{}", tick + 1, ticks);
            if self.video.photo_during_recording {
                self.capture_photo(session, true).await?;
            }
        }

        Ok(false)
    }

    fn segment_path(&self, session: &Session, index: u32) -> PathBuf {
        self.capture
            .video_path()
            .join(session.stamp().video_file_name(index))
    }

    fn emit_segment(&self, session: &Session, path: PathBuf, segment_index: u32) {
        let stamp = session.stamp();
        self.sinks.emit(CaptureEvent::VideoSegmentReady {
            path,
            date: stamp.date.clone(),
            time: stamp.time.clone(),
            segment_index,
        });
    }
}
