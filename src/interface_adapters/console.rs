// Line-delimited JSON command loop: one `CommandRequest` in, one `CommandReply` out.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::domain::ports::{Clock, GameStore};
use crate::interface_adapters::dispatch::Dispatcher;
use crate::interface_adapters::protocol::{CommandReply, CommandRequest};

pub const MALFORMED_REQUEST: &str = "malformed_request";

/// Serves requests until the reader hits end of input. Returns the number of lines answered.
pub async fn serve<S, C, R, W>(
    dispatcher: &Dispatcher<S, C>,
    reader: R,
    mut writer: W,
) -> io::Result<usize>
where
    S: GameStore,
    C: Clock,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<CommandRequest>(line) {
            Ok(request) => {
                dispatcher
                    .reply(&request.channel_id, &request.actor_id, request.command)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "malformed request");
                CommandReply::Error {
                    code: MALFORMED_REQUEST,
                }
            }
        };

        let mut bytes = serde_json::to_vec(&reply).map_err(io::Error::other)?;
        bytes.push(b'\n');
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        answered += 1;
    }
    debug!(answered, "command input closed");
    Ok(answered)
}
