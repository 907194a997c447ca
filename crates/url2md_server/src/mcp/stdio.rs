use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use url2md_logging::{conv_error, conv_info};

use super::handle_message;
use super::types::JsonRpcResponse;
use crate::context::AppContext;

/// Serves newline-delimited JSON-RPC on the process's stdin/stdout.
pub async fn serve_stdio(ctx: &AppContext, cancel: CancellationToken) -> io::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    conv_info!("MCP server listening on stdio");
    serve_lines(ctx, reader, writer, cancel).await
}

/// Reads one request per line and writes one response per line until the
/// input ends or `cancel` fires. Blank lines are ignored.
pub async fn serve_lines<R, W>(
    ctx: &AppContext,
    reader: R,
    mut writer: W,
    cancel: CancellationToken,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            conv_info!("stdin closed, stopping MCP transport");
            break;
        };
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }
        if let Some(response) = handle_message(ctx, frame).await {
            write_frame(&mut writer, &response).await?;
        }
    }
    writer.flush().await
}

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> io::Result<()> {
    let mut frame = match serde_json::to_string(response) {
        Ok(text) => text,
        Err(err) => {
            conv_error!("Failed to serialize JSON-RPC response: {}", err);
            return Ok(());
        }
    };
    frame.push('\n');
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}
