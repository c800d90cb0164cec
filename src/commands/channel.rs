use super::command::Command;
use crate::error::ProtocolError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Counts commands sent but not yet acknowledged by the consumer
#[derive(Debug, Default)]
struct PendingTracker {
    unfinished: AtomicUsize,
    drained: Notify,
}

impl PendingTracker {
    fn add(&self) {
        self.unfinished.fetch_add(1, Ordering::SeqCst);
    }

    fn complete(&self) {
        let previous = self.unfinished.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            self.drained.notify_waiters();
        }
    }

    fn pending(&self) -> usize {
        self.unfinished.load(Ordering::SeqCst)
    }
}

/// Create the command channel: many producers, one consumer
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let tracker = Arc::new(PendingTracker::default());

    (
        CommandSender {
            tx,
            tracker: Arc::clone(&tracker),
        },
        CommandReceiver {
            rx,
            tracker,
            closed: false,
        },
    )
}

/// Producer handle; cheap to clone
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
    tracker: Arc<PendingTracker>,
}

impl CommandSender {
    /// Enqueue a command
    pub fn send(&self, command: Command) -> Result<(), ProtocolError> {
        self.tracker.add();
        if self.tx.send(command).is_err() {
            self.tracker.complete();
            return Err(ProtocolError::ChannelClosed);
        }
        trace!("Queued command {}", command);
        Ok(())
    }

    /// Parse external JSON input and enqueue it; malformed input never enters the channel
    pub fn send_json(&self, raw: &str) -> Result<Command, ProtocolError> {
        let command = Command::from_json(raw)?;
        self.send(command)?;
        Ok(command)
    }

    /// Commands sent but not yet acknowledged
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    /// Wait until every queued command has been acknowledged
    pub async fn drain(&self) {
        loop {
            let drained = self.tracker.drained.notified();
            if self.tracker.pending() == 0 {
                return;
            }
            drained.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Result of a deadline-bounded command read
#[derive(Debug)]
pub enum CommandPoll {
    Received(Delivery),
    Elapsed,
}

/// Consumer handle, owned by the capture controller
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
    tracker: Arc<PendingTracker>,
    closed: bool,
}

impl CommandReceiver {
    /// Wait for the next command with no timeout. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.rx.recv().await {
            Some(command) => Some(self.deliver(command)),
            None => {
                self.closed = true;
                None
            }
        }
    }

    /// Wait for the next command until `deadline`.
    ///
    /// A closed channel still waits out the deadline so callers keep their pacing.
    pub async fn recv_until(&mut self, deadline: Instant) -> CommandPoll {
        match tokio::time::timeout_at(deadline, self.rx.recv()).await {
            Ok(Some(command)) => CommandPoll::Received(self.deliver(command)),
            Ok(None) => {
                if !self.closed {
                    debug!("Command channel closed; waiting out pacing deadlines");
                    self.closed = true;
                }
                tokio::time::sleep_until(deadline).await;
                CommandPoll::Elapsed
            }
            Err(_) => CommandPoll::Elapsed,
        }
    }

    /// True once a read has observed that every sender is gone
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn deliver(&self, command: Command) -> Delivery {
        Delivery {
            command,
            tracker: Some(Arc::clone(&self.tracker)),
        }
    }
}

impl Drop for CommandReceiver {
    fn drop(&mut self) {
        // Queued commands will never be delivered; release any drain waiters
        self.rx.close();
        while self.rx.try_recv().is_ok() {
            self.tracker.complete();
        }
    }
}

/// A received command awaiting acknowledgement.
///
/// Dropping an unacknowledged delivery acknowledges it, so a producer blocked in
/// `drain` is never stranded.
#[derive(Debug)]
pub struct Delivery {
    command: Command,
    tracker: Option<Arc<PendingTracker>>,
}

impl Delivery {
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Mark the command consumed and take it
    pub fn ack(mut self) -> Command {
        if let Some(tracker) = self.tracker.take() {
            tracker.complete();
        }
        self.command
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            trace!("Delivery of {} dropped without explicit ack", self.command);
            tracker.complete();
        }
    }
}
