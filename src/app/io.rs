use crate::commands::CommandSender;
use crate::error::{ProtocolError, Result};
use crate::events::{CaptureEvent, SinkKind, SinkMessage, SinkReceivers};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Read JSON command lines from `reader` into the command channel.
///
/// Malformed lines are logged and skipped. Returns the number of commands
/// forwarded once input ends, the channel closes, or `token` is cancelled.
/// `sender` is dropped on return.
pub async fn forward_commands<R>(
    reader: R,
    sender: CommandSender,
    token: CancellationToken,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    loop {
        let line = tokio::select! {
            _ = token.cancelled() => {
                debug!("Command input cancelled");
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            info!("Command input closed after {} commands", forwarded);
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match sender.send_json(line) {
            Ok(command) => {
                debug!("Forwarded command {}", command);
                forwarded += 1;
            }
            Err(ProtocolError::ChannelClosed) => {
                warn!("Command channel closed; dropping further input");
                break;
            }
            Err(e) => warn!("Skipping command line {:?}: {}", line, e),
        }
    }

    Ok(forwarded)
}

#[derive(Serialize)]
struct TaggedMessage {
    sink: String,
    #[serde(flatten)]
    message: SinkMessage,
}

/// Render one event as a JSON line tagged with its sink
pub fn render_event(event: &CaptureEvent) -> Result<String> {
    let tagged = TaggedMessage {
        sink: event.sink().to_string(),
        message: event.to_sink_message(),
    };
    serde_json::to_string(&tagged).map_err(|e| {
        ProtocolError::Encode {
            details: e.to_string(),
        }
        .into()
    })
}

/// Write every event from both sinks to `writer` as JSON lines until both
/// mailboxes close. Returns the number of lines written.
pub async fn forward_events<W>(receivers: SinkReceivers, mut writer: W) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let SinkReceivers {
        mut relay,
        mut cloud,
    } = receivers;
    let mut relay_open = true;
    let mut cloud_open = true;
    let mut written = 0;

    while relay_open || cloud_open {
        let (kind, event) = tokio::select! {
            event = relay.recv(), if relay_open => match event {
                Some(event) => (SinkKind::Relay, event),
                None => {
                    relay_open = false;
                    continue;
                }
            },
            event = cloud.recv(), if cloud_open => match event {
                Some(event) => (SinkKind::Cloud, event),
                None => {
                    cloud_open = false;
                    continue;
                }
            },
        };

        let line = render_event(&event)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        debug!("Delivered {} to {} output", event.event_type(), kind);
        written += 1;
    }

    info!("Event sinks closed after {} messages", written);
    Ok(written)
}
