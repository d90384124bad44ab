//! Minimal SMTP listener feeding the ingest pipeline.
//!
//! Supports HELO/EHLO, MAIL FROM, RCPT TO, DATA, RSET, NOOP, QUIT. Nothing is
//! ever relayed; every completed DATA phase becomes one captured record.

use crate::{
    app::AppState,
    ingest::{Envelope, ingest},
};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, error, warn};

/// Accept connections forever, one task per client.
pub async fn serve(state: AppState, listener: TcpListener) -> std::io::Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("smtp accept failed: {e}");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(state, stream, peer).await {
                warn!("smtp connection error from {}: {}", peer, e);
            }
        });
    }
}

async fn handle_client(
    state: AppState,
    stream: TcpStream,
    peer: SocketAddr,
) -> std::io::Result<()> {
    let domain = state.config.greeting_domain().to_string();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    writer
        .write_all(format!("220 {domain} mailsink ESMTP\r\n").as_bytes())
        .await?;

    let mut mail_from: Option<String> = None;
    let mut rcpts: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            break;
        }
        let decoded = String::from_utf8_lossy(&buf);
        let line = decoded.trim_end_matches(['\r', '\n']);
        debug!("smtp <= {}", line);
        let upper = line.to_ascii_uppercase();

        if upper.starts_with("EHLO") {
            mail_from = None;
            rcpts.clear();
            writer
                .write_all(format!("250-{domain}\r\n250 8BITMIME\r\n").as_bytes())
                .await?;
        } else if upper.starts_with("HELO") {
            mail_from = None;
            rcpts.clear();
            writer
                .write_all(format!("250 {domain}\r\n").as_bytes())
                .await?;
        } else if upper.starts_with("MAIL FROM:") {
            mail_from = Some(parse_path(line.get(10..).unwrap_or_default()));
            rcpts.clear();
            writer.write_all(b"250 OK\r\n").await?;
        } else if upper.starts_with("RCPT TO:") {
            if mail_from.is_none() {
                writer.write_all(b"503 Need MAIL command first\r\n").await?;
                continue;
            }
            rcpts.push(parse_path(line.get(8..).unwrap_or_default()));
            writer.write_all(b"250 Accepted\r\n").await?;
        } else if upper == "DATA" {
            if mail_from.is_none() || rcpts.is_empty() {
                writer.write_all(b"503 Need MAIL and RCPT first\r\n").await?;
                continue;
            }
            writer
                .write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")
                .await?;
            let Some(data) = read_data(&mut reader).await? else {
                // client vanished mid-message
                break;
            };

            let envelope = Envelope {
                sender: mail_from.take().unwrap_or_default(),
                recipients: std::mem::take(&mut rcpts),
                peer_ip: peer.ip().to_string(),
            };
            match ingest(&state, envelope, &data).await {
                Ok(_) => {
                    writer
                        .write_all(b"250 Message accepted for delivery\r\n")
                        .await?;
                }
                Err(e) => {
                    error!("smtp store error: {e}");
                    writer
                        .write_all(b"451 Requested action aborted: local error\r\n")
                        .await?;
                }
            }
        } else if upper == "RSET" {
            mail_from = None;
            rcpts.clear();
            writer.write_all(b"250 OK\r\n").await?;
        } else if upper == "NOOP" {
            writer.write_all(b"250 OK\r\n").await?;
        } else if upper == "QUIT" {
            writer.write_all(b"221 Bye\r\n").await?;
            break;
        } else {
            writer.write_all(b"502 Command not implemented\r\n").await?;
        }
    }
    Ok(())
}

/// Read the DATA section up to the lone-dot line, undoing dot-stuffing.
/// Returns `None` if the connection closes first.
async fn read_data<R>(reader: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut data = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if line == b".\r\n" || line == b".\n" {
            return Ok(Some(data));
        }
        let content = if line.starts_with(b"..") {
            &line[1..]
        } else {
            &line[..]
        };
        data.extend_from_slice(content);
    }
}

/// Address out of a `MAIL FROM:`/`RCPT TO:` argument, ignoring ESMTP parameters.
fn parse_path(arg: &str) -> String {
    let arg = arg.trim();
    match arg.strip_prefix('<') {
        Some(rest) => rest.split('>').next().unwrap_or_default().trim().to_string(),
        None => arg.split_whitespace().next().unwrap_or_default().to_string(),
    }
}
