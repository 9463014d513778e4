//! Inbound build-log event decoding

use openapi_client::LogEvent;

use crate::errors::DashError;
use crate::models::log_line::LogLine;

/// Decode one stream payload into a log line.
///
/// The payload must be a JSON object with a string `message` field; any
/// other fields are ignored.
pub fn decode_event(raw: &str) -> Result<LogLine, DashError> {
    let event: LogEvent =
        serde_json::from_str(raw).map_err(|e| DashError::MalformedEvent(e.to_string()))?;
    Ok(LogLine::new(event.message))
}

/// Decode a binary frame, which must carry UTF-8 JSON
pub fn decode_binary_event(raw: &[u8]) -> Result<LogLine, DashError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| DashError::MalformedEvent(format!("binary frame is not UTF-8: {e}")))?;
    decode_event(text)
}
