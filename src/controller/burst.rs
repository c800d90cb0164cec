use super::core::CaptureController;
use super::session::{Session, SessionKind};
use super::types::ControllerMode;
use crate::commands::clamp_count;
use crate::error::Result;
use crate::source::FrameSource;
use std::num::NonZeroU32;
use tokio::time::Instant;
use tracing::info;

impl<S: FrameSource> CaptureController<S> {
    /// Take up to `max_photo_count` stills, one per period, until done or stopped
    pub(super) async fn photo_burst(&mut self, requested: Option<NonZeroU32>) -> Result<()> {
        let count = clamp_count(requested, self.capture.max_photo_count);
        let period = self.capture.period();
        let mut session = Session::new(SessionKind::PhotoBurst, count, self.zone.now());
        info!(
            "Starting {} {} ({} photos every {:?})",
            session.kind(),
            session.id(),
            count,
            period
        );

        let mut deadline = Instant::now();
        for index in 0..count {
            self.set_mode(ControllerMode::PhotoBurst { index, count });
            self.capture_photo(&mut session, false).await?;

            if index + 1 == count {
                break;
            }
            deadline += period;
            if self.wait_for_stop(deadline).await {
                info!(
                    "Photo burst {} stopped after {} of {} photos",
                    session.id(),
                    session.photos_taken(),
                    count
                );
                return Ok(());
            }
        }

        info!(
            "Photo burst {} complete: {} photos",
            session.id(),
            session.photos_taken()
        );
        Ok(())
    }
}
