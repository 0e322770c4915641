// client: helpers for terminal-style tools built on a btserial connection
use std::fmt::Write as _;

use btserial::{Channel, ServiceId};
use chrono::{DateTime, Local};

/// How inbound chunks are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFormat {
    /// Lossy UTF-8, control characters escaped.
    Text,
    /// Space separated hex octets.
    Hex,
}

/// Format one inbound chunk as a timestamped line.
///
/// Format: "YYYY/MM/DD HH:MM:SS.uuuuuu [len] payload"
pub fn format_chunk(data: &[u8], format: ChunkFormat, at: DateTime<Local>) -> String {
    let payload = match format {
        ChunkFormat::Text => escape_text(data),
        ChunkFormat::Hex => hex(data),
    };
    format!(
        "{} [{:4}] {}",
        at.format("%Y/%m/%d %H:%M:%S%.6f"),
        data.len(),
        payload
    )
}

/// Bytes to send for one line of terminal input.
pub fn line_to_frame(line: &str, raw: bool) -> Vec<u8> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut frame = Vec::with_capacity(line.len() + 2);
    frame.extend_from_slice(line.as_bytes());
    if !raw {
        frame.extend_from_slice(b"\r\n");
    }
    frame
}

/// Parse a `<uuid>=<channel>` service mapping.
pub fn parse_service_channel(s: &str) -> Result<(ServiceId, Channel), String> {
    let (service, channel) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <uuid>=<channel>, got '{}'", s))?;
    let service = ServiceId::parse(service.trim())
        .map_err(|e| format!("invalid service uuid '{}': {}", service, e))?;
    let channel = channel
        .trim()
        .parse::<Channel>()
        .map_err(|e| format!("invalid channel '{}': {}", channel, e))?;
    Ok((service, channel))
}

fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn escape_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .chars()
        .flat_map(|c| match c {
            '\r' | '\n' | '\t' => c.escape_default().collect::<Vec<_>>(),
            c if c.is_control() => c.escape_default().collect::<Vec<_>>(),
            c => vec![c],
        })
        .collect()
}
