use super::io::{forward_commands, forward_events};
use super::{ComponentState, SentryApp, ShutdownReason};
use crate::error::{Result, SentryError};
use crate::source::FrameSource;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

impl<S: FrameSource + 'static> SentryApp<S> {
    /// Run until a signal arrives, the command input is exhausted and the
    /// controller winds down, or the controller fails.
    ///
    /// Commands are read as JSON lines from `input`; sink messages are written
    /// as JSON lines to `output`.
    pub async fn run<R, W>(&mut self, input: R, output: W) -> Result<ShutdownReason>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("Sentrycam is running");

        let controller = self
            .controller
            .take()
            .ok_or_else(|| SentryError::system("Capture controller already started"))?;
        let commands = self
            .commands
            .take()
            .ok_or_else(|| SentryError::system("Command sender already taken"))?;
        let receivers = self
            .receivers
            .take()
            .ok_or_else(|| SentryError::system("Sink receivers already taken"))?;
        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| SentryError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SentryError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let events_task = tokio::spawn(forward_events(receivers, output));
        self.set_component_state("events", ComponentState::Running);

        let commands_task = tokio::spawn(forward_commands(
            input,
            commands,
            self.cancellation_token.child_token(),
        ));
        self.set_component_state("commands", ComponentState::Running);

        let mut controller_task = tokio::spawn(controller.run());
        self.set_component_state("controller", ComponentState::Running);

        let mut controller_finished = false;
        let reason = tokio::select! {
            reason = shutdown_receiver => reason.map_err(|_| {
                SentryError::system("Shutdown channel closed unexpectedly")
            })?,
            joined = &mut controller_task => {
                controller_finished = true;
                match joined {
                    Ok(Ok(())) => {
                        self.set_component_state("controller", ComponentState::Stopped);
                        ShutdownReason::CommandsClosed
                    }
                    Ok(Err(e)) => {
                        error!("Capture controller failed: {}", e);
                        self.set_component_state("controller", ComponentState::Failed);
                        ShutdownReason::Error(e.to_string())
                    }
                    Err(e) => {
                        error!("Capture controller task failed: {}", e);
                        self.set_component_state("controller", ComponentState::Failed);
                        ShutdownReason::Error(e.to_string())
                    }
                }
            }
        };

        info!("Shutdown initiated: {:?}", reason);
        let controller_task = (!controller_finished).then_some(controller_task);
        self.shutdown(controller_task, commands_task, events_task)
            .await;

        info!("Sentrycam shutdown complete");
        Ok(reason)
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
