use super::{ComponentState, SentryApp};
use crate::error::Result;
use crate::source::FrameSource;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl<S: FrameSource + 'static> SentryApp<S> {
    /// Stop the remaining tasks: controller first, then command input, then
    /// the event writer once it has flushed everything the controller emitted.
    pub(super) async fn shutdown(
        &mut self,
        controller_task: Option<JoinHandle<Result<()>>>,
        commands_task: JoinHandle<Result<usize>>,
        events_task: JoinHandle<Result<usize>>,
    ) {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        if let Some(task) = controller_task {
            // The controller only observes `Stop` at checkpoints; abort it instead
            self.set_component_state("controller", ComponentState::Stopping);
            task.abort();
            match task.await {
                Ok(Err(e)) => {
                    self.set_component_state("controller", ComponentState::Failed);
                    error!("Capture controller failed during shutdown: {}", e);
                }
                Err(e) if !e.is_cancelled() => {
                    self.set_component_state("controller", ComponentState::Failed);
                    error!("Capture controller task failed: {}", e);
                }
                _ => self.set_component_state("controller", ComponentState::Stopped),
            }
        }

        self.stop_task("commands", commands_task).await;
        self.stop_task("events", events_task).await;

        info!("Graceful shutdown completed");
    }

    async fn stop_task(&self, component: &'static str, task: JoinHandle<Result<usize>>) {
        self.set_component_state(component, ComponentState::Stopping);

        match timeout(STOP_TIMEOUT, task).await {
            Ok(Ok(Ok(count))) => {
                self.set_component_state(component, ComponentState::Stopped);
                info!("{} component stopped after {} messages", component, count);
            }
            Ok(Ok(Err(e))) => {
                self.set_component_state(component, ComponentState::Failed);
                error!("Error stopping {} component: {}", component, e);
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed);
                error!("{} task failed: {}", component, e);
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed);
                warn!("{} component stop timeout", component);
            }
        }
    }
}
