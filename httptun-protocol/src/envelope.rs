//! Payload envelope: optional gzip compression followed by base64 transport
//! encoding, carried as the raw HTTP request/response body.
//!
//! Encoding:      raw bytes -> [gzip if over threshold] -> base64 -> body
//! Decoding:      body -> base64 decode -> [gunzip if `X-Content-Encoding: gzip`] -> raw bytes

use base64::Engine;
use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;
use httptun_common::error::{Result, TunnelError};
use std::io::Read;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Result of encoding a payload: the body to send plus whether gzip was applied
/// (callers use this to decide whether to set `X-Content-Encoding: gzip`).
pub struct Encoded {
    /// Body ready to send as the request/response payload.
    pub body: Vec<u8>,
    /// Whether the body was gzip-compressed before base64 encoding.
    pub gzipped: bool,
}

/// Encode a raw payload for the wire, compressing it first when `gzip_enabled`
/// is set and `data` exceeds `threshold_bytes`.
pub fn encode(data: &[u8], gzip_enabled: bool, threshold_bytes: usize) -> Result<Encoded> {
    let gzipped = gzip_enabled && data.len() > threshold_bytes;
    let payload = if gzipped {
        let mut encoder = GzEncoder::new(data, Compression::default());
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| TunnelError::Envelope(format!("gzip compression failed: {e}")))?;
        compressed
    } else {
        data.to_vec()
    };

    Ok(Encoded {
        body: BASE64.encode(payload).into_bytes(),
        gzipped,
    })
}

/// Decode a wire body back into raw bytes. `gzipped` must reflect whether the
/// `X-Content-Encoding: gzip` header was present on the request/response.
pub fn decode(body: &[u8], gzipped: bool) -> Result<Vec<u8>> {
    let decoded = BASE64
        .decode(body)
        .map_err(|e| TunnelError::Envelope(format!("invalid base64: {e}")))?;

    if !gzipped {
        return Ok(decoded);
    }

    let mut decoder = GzDecoder::new(decoded.as_slice());
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| TunnelError::Envelope(format!("gzip decompression failed: {e}")))?;
    Ok(raw)
}
