//! NDJSON request loop.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

use screenpilot_core::protocol::{Response, encode_response};

use super::handler::handle_line;
use crate::orchestration::{OrchestrationManager, SessionContext};

/// Serve requests from `reader` until EOF, writing one response line each.
///
/// One loop is one caller: a fresh [`SessionContext`] is created here and
/// lives until the loop ends. Blank lines are skipped. A line that is not
/// valid UTF-8 gets a failed response like any other malformed request.
pub async fn serve<R, W>(
    manager: &OrchestrationManager,
    mut reader: R,
    mut writer: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut ctx = SessionContext::new();
    let mut buf = Vec::new();
    let mut handled: u64 = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(manager, &mut ctx, line.trim_end_matches(['\r', '\n'])).await,
            Err(e) => {
                warn!(error = %e, "Request line is not valid UTF-8");
                Response::failed(format!("Invalid request: {e}"), None)
            }
        };
        write_response(&mut writer, &response).await?;
        handled += 1;
    }

    info!(handled, "Input closed, stopping request loop");
    Ok(())
}

/// Write one response followed by a newline and flush.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = match encode_response(response) {
        Ok(line) => line,
        Err(e) => {
            error!(error = %e, "Failed to encode response");
            let fallback = Response::failed(format!("Failed to encode response: {e}"), None)
                .with_id(response.id.clone());
            encode_response(&fallback).map_err(std::io::Error::other)?
        }
    };
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
