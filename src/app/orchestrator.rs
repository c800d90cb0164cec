use super::types::{ComponentState, ShutdownReason};
use crate::commands::{command_channel, CommandSender};
use crate::config::SentryConfig;
use crate::controller::{CaptureController, ControllerMode};
use crate::error::Result;
use crate::events::{event_sinks, SinkReceivers};
use crate::source::FrameSource;
use crate::storage::prepare_directories;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Wires configuration, storage, the command channel, the event sinks and
/// the capture controller into one runnable application.
pub struct SentryApp<S: FrameSource + 'static> {
    pub(super) config: SentryConfig,
    pub(super) controller: Option<CaptureController<S>>,
    pub(super) commands: Option<CommandSender>,
    pub(super) receivers: Option<SinkReceivers>,
    pub(super) mode: watch::Receiver<ControllerMode>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<&'static str, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl<S: FrameSource + 'static> SentryApp<S> {
    /// Provision directories and assemble the controller over `source`
    pub async fn new(config: SentryConfig, source: S) -> Result<Self> {
        info!("Assembling sentrycam application");
        prepare_directories(&config.capture).await?;

        let (commands, command_receiver) = command_channel();
        let (sinks, receivers) = event_sinks();
        let controller = CaptureController::new(&config, source, command_receiver, sinks).await?;
        let mode = controller.mode();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let app = Self {
            config,
            controller: Some(controller),
            commands: Some(commands),
            receivers: Some(receivers),
            mode,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        };

        for component in ["controller", "commands", "events"] {
            app.set_component_state(component, ComponentState::Stopped);
        }
        Ok(app)
    }

    /// Extra producer handle for the command channel.
    ///
    /// The controller only stops on its own once every handle is dropped.
    pub fn command_sender(&self) -> Option<CommandSender> {
        self.commands.clone()
    }

    /// Watch the controller's operating mode
    pub fn mode(&self) -> watch::Receiver<ControllerMode> {
        self.mode.clone()
    }

    pub fn config(&self) -> &SentryConfig {
        &self.config
    }

    pub(super) fn set_component_state(&self, component: &'static str, state: ComponentState) {
        debug!("Component '{}' state changed to: {:?}", component, state);
        self.component_states.lock().insert(component, state);
    }

    pub fn component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().get(component).cloned()
    }
}
