//! Length+format-prefixed envelope framing (§4.A).
//!
//! Wire shape: a 4-byte big-endian payload length, a 1-byte encoding
//! tag, then exactly `length` payload bytes. Any short read on the
//! length, tag, or payload is treated as a closed connection.

use crate::error::MessageError;
use rt_wire::{EncodingFormat, EnvelopeMetadata};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Payloads above this size on the handshake line are protocol corruption.
pub const MAX_HANDSHAKE_LINE: usize = 1024 * 1024;

/// A framed message: opaque bytes plus the format they were encoded with
/// and the metadata that rides alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub metadata: EnvelopeMetadata,
}

impl Envelope {
    pub fn new(data: Vec<u8>, format: EncodingFormat) -> Self {
        Self { data, format, metadata: EnvelopeMetadata::default() }
    }

    pub fn with_metadata(mut self, metadata: EnvelopeMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Encode `message` into an envelope using `format`.
pub fn encode<T: Serialize>(message: &T, format: EncodingFormat) -> Result<Envelope, MessageError> {
    let data = match format {
        EncodingFormat::Json => serde_json::to_vec(message)?,
        EncodingFormat::MsgPack => {
            rmp_serde::to_vec(message).map_err(|e| MessageError::BinaryConversion(e.to_string()))?
        }
    };
    Ok(Envelope::new(data, format))
}

/// Decode an envelope's payload back into `T`.
pub fn decode<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, MessageError> {
    if envelope.data.is_empty() {
        return Err(MessageError::NoContent);
    }
    match envelope.format {
        EncodingFormat::Json => {
            serde_json::from_slice(&envelope.data).map_err(MessageError::JsonSerialization)
        }
        EncodingFormat::MsgPack => rmp_serde::from_slice(&envelope.data)
            .map_err(|e| MessageError::BinaryDecoding(e.to_string())),
    }
}

/// Re-encode an envelope's content as `target_format`; a no-op if the
/// envelope is already in that format.
pub fn convert<T: Serialize + DeserializeOwned>(
    envelope: &Envelope,
    target_format: EncodingFormat,
) -> Result<Envelope, MessageError> {
    if envelope.format == target_format {
        return Ok(envelope.clone());
    }
    let decoded: T = decode(envelope)?;
    let mut out = encode(&decoded, target_format)?;
    out.metadata = envelope.metadata.clone();
    Ok(out)
}

/// Write a framed envelope to `sink`.
pub async fn write<W: AsyncWrite + Unpin>(
    envelope: &Envelope,
    sink: &mut W,
) -> Result<(), MessageError> {
    let len: u32 = envelope
        .data
        .len()
        .try_into()
        .map_err(|_| MessageError::InvalidFormat("payload exceeds u32::MAX".to_owned()))?;
    sink.write_all(&len.to_be_bytes())
        .await
        .map_err(|e| MessageError::InvalidFormat(e.to_string()))?;
    sink.write_all(&[envelope.format.tag()])
        .await
        .map_err(|e| MessageError::InvalidFormat(e.to_string()))?;
    sink.write_all(&envelope.data)
        .await
        .map_err(|e| MessageError::InvalidFormat(e.to_string()))?;
    sink.flush().await.map_err(|e| MessageError::InvalidFormat(e.to_string()))?;
    Ok(())
}

/// Read one framed envelope from `source`. Returns `Ok(None)` on a clean
/// EOF before any bytes of the next frame have been read.
pub async fn read<R: AsyncRead + Unpin>(
    source: &mut R,
) -> Result<Option<Envelope>, MessageError> {
    let mut len_buf = [0u8; 4];
    match read_exact_or_eof(source, &mut len_buf).await? {
        false => return Ok(None),
        true => {}
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    let mut tag_buf = [0u8; 1];
    source
        .read_exact(&mut tag_buf)
        .await
        .map_err(|_| MessageError::InvalidFormat("short read on format tag".to_owned()))?;
    let format = EncodingFormat::from_tag(tag_buf[0])
        .ok_or(MessageError::UnsupportedFormat(tag_buf[0]))?;

    let mut data = vec![0u8; len];
    source
        .read_exact(&mut data)
        .await
        .map_err(|_| MessageError::InvalidFormat("short read on payload".to_owned()))?;

    Ok(Some(Envelope::new(data, format)))
}

async fn read_exact_or_eof<R: AsyncRead + Unpin>(
    source: &mut R,
    buf: &mut [u8],
) -> Result<bool, MessageError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source
            .read(&mut buf[filled..])
            .await
            .map_err(|e| MessageError::InvalidFormat(e.to_string()))?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(MessageError::InvalidFormat("short read on length prefix".to_owned()));
        }
        filled += n;
    }
    Ok(true)
}

/// Read exactly one line (handshake record) from `source`, rejecting
/// anything above [`MAX_HANDSHAKE_LINE`].
pub async fn read_handshake_line<R: AsyncRead + Unpin>(
    source: &mut R,
) -> Result<String, MessageError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = source
            .read(&mut byte)
            .await
            .map_err(|e| MessageError::InvalidFormat(e.to_string()))?;
        if n == 0 {
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
        if line.len() > MAX_HANDSHAKE_LINE {
            return Err(MessageError::FrameTooLarge {
                actual: line.len(),
                limit: MAX_HANDSHAKE_LINE,
            });
        }
    }
    if line.is_empty() {
        return Err(MessageError::InvalidFormat("empty handshake line".to_owned()));
    }
    String::from_utf8(line).map_err(|e| MessageError::InvalidFormat(e.to_string()))
}
