//! Handshake & announce (§4.J).

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::HandshakeError;
use crate::framing::{self, MAX_HANDSHAKE_LINE};
use rt_wire::{AnnounceBlob, InitBlob};

/// Read exactly one framed line from `source` and parse it as the
/// orchestrator's init record. Fails on an empty or over-limit line.
pub async fn read_init<R: tokio::io::AsyncRead + Unpin>(source: &mut R) -> Result<InitBlob, HandshakeError> {
    let line = framing::read_handshake_line(source).await.map_err(|e| HandshakeError(e.to_string()))?;
    if line.len() > MAX_HANDSHAKE_LINE {
        return Err(HandshakeError("init record exceeds 1 MiB".to_owned()));
    }
    serde_json::from_str(&line).map_err(|e| HandshakeError(format!("malformed init record: {e}")))
}

/// Write the module's announcement record and flush.
pub async fn send_announce<W: AsyncWrite + Unpin>(sink: &mut W, blob: &AnnounceBlob) -> Result<(), HandshakeError> {
    let mut json = serde_json::to_vec(blob).map_err(|e| HandshakeError(e.to_string()))?;
    json.push(b'\n');
    sink.write_all(&json).await.map_err(|e| HandshakeError(e.to_string()))?;
    sink.flush().await.map_err(|e| HandshakeError(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_happy_path_init_record() {
        let line = br#"{"orchestrator_api":"http://o","module_id":"m1","env":{},"listen":"127.0.0.1:0","security_level":"none","debug_mode":false,"log_level":"info"}
"#;
        let mut cursor = Cursor::new(line.to_vec());
        let init = read_init(&mut cursor).await.unwrap();
        assert_eq!(init.module_id, "m1");
        assert_eq!(init.orchestrator_api, "http://o");
    }

    #[tokio::test]
    async fn rejects_empty_line() {
        let mut cursor = Cursor::new(b"\n".to_vec());
        let result = read_init(&mut cursor).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn send_announce_writes_newline_terminated_json() {
        let blob = AnnounceBlob { listen: "127.0.0.1:54321".to_owned(), endpoints: vec![] };
        let mut buf = Vec::new();
        send_announce(&mut buf, &blob).await.unwrap();
        assert!(buf.ends_with(b"\n"));
        let without_newline = &buf[..buf.len() - 1];
        let parsed: AnnounceBlob = serde_json::from_slice(without_newline).unwrap();
        assert_eq!(parsed.listen, blob.listen);
    }
}
