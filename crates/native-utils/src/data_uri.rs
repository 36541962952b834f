//! `data:` URI helpers for audio payloads moved around as text.

use crate::audio::{self, AudioError, PcmFormat, WAV_MIME_TYPE};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Builds `data:<mime>;base64,<payload>`.
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Splits a data URI into its mime type and the still-encoded base64 payload.
///
/// The payload is everything after the first comma; a string without a comma
/// is treated as a bare base64 payload.
pub fn split(uri: &str) -> Result<(Option<&str>, &str), AudioError> {
    let Some((header, payload)) = uri.split_once(',') else {
        return Ok((None, uri.trim()));
    };

    let meta = header
        .strip_prefix("data:")
        .ok_or_else(|| AudioError::DataUri(format!("missing 'data:' scheme in {header:?}")))?;
    let mime = meta.split(';').next().unwrap_or_default();
    Ok(((!mime.is_empty()).then_some(mime), payload.trim()))
}

/// Decodes a base64 data URI.
pub fn decode(uri: &str) -> Result<DataUri, AudioError> {
    let (mime_type, payload) = split(uri)?;
    let bytes = STANDARD.decode(payload)?;
    Ok(DataUri {
        mime_type: mime_type.map(str::to_string),
        bytes,
    })
}

/// Reads the `rate=` parameter of an `audio/L16;codec=pcm;rate=24000` style mime type.
pub fn pcm_sample_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

/// Converts a data URI carrying raw synthesis PCM into a playable WAV data URI.
///
/// The sample rate advertised by the mime type wins over the one in `format`.
pub fn pcm_uri_to_wav_uri(uri: &str, format: PcmFormat) -> Result<String, AudioError> {
    let decoded = decode(uri)?;
    let format = match decoded.mime_type.as_deref().and_then(pcm_sample_rate) {
        Some(sample_rate) => PcmFormat {
            sample_rate,
            ..format
        },
        None => format,
    };
    let wav = audio::pcm_to_wav(&decoded.bytes, format)?;
    Ok(encode(WAV_MIME_TYPE, &wav))
}
