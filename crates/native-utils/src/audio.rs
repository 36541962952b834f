use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// Sample rate of the PCM16 audio produced by the speech synthesis model.
pub const SYNTHESIS_PCM16_SAMPLE_RATE: u32 = 24000;

/// Length of the canonical RIFF/WAVE header written for plain PCM formats.
pub const WAV_HEADER_LEN: usize = 44;

pub const WAV_MIME_TYPE: &str = "audio/wav";

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("unsupported PCM format: {channels} channel(s), {bits_per_sample}-bit")]
    UnsupportedFormat { channels: u16, bits_per_sample: u16 },
    #[error("failed to write WAV container: {0}")]
    Wav(#[from] hound::Error),
    #[error("malformed data URI: {0}")]
    DataUri(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Shape of a raw little-endian PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    /// Mono, 24kHz, 16-bit: what the synthesis endpoint returns.
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: SYNTHESIS_PCM16_SAMPLE_RATE,
            bits_per_sample: 16,
        }
    }
}

impl PcmFormat {
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample,
        }
    }

    pub fn sample_width(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes per frame (one sample for every channel).
    pub fn frame_len(&self) -> usize {
        self.sample_width() * usize::from(self.channels)
    }

    fn validate(&self) -> Result<(), AudioError> {
        let channels_ok = matches!(self.channels, 1 | 2);
        let bits_ok = matches!(self.bits_per_sample, 8 | 16);
        if channels_ok && bits_ok && self.sample_rate > 0 {
            Ok(())
        } else {
            Err(AudioError::UnsupportedFormat {
                channels: self.channels,
                bits_per_sample: self.bits_per_sample,
            })
        }
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: SampleFormat::Int,
        }
    }
}

/// Wraps raw PCM bytes in a WAV container.
///
/// The header declares `format` verbatim; the output is always
/// `WAV_HEADER_LEN` bytes longer than the (frame-aligned) payload.
/// A trailing partial frame is dropped.
pub fn pcm_to_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, AudioError> {
    format.validate()?;

    let frame_len = format.frame_len();
    let aligned = pcm.len() - pcm.len() % frame_len;
    if aligned != pcm.len() {
        tracing::warn!(
            "Dropping {} trailing byte(s) that do not form a whole PCM frame",
            pcm.len() - aligned
        );
    }
    let pcm = &pcm[..aligned];

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + pcm.len()));
    {
        let mut writer = WavWriter::new(&mut cursor, format.wav_spec())?;
        match format.bits_per_sample {
            // 8-bit WAV is unsigned on disk; hound re-biases signed samples by 128.
            8 => {
                for &byte in pcm {
                    writer.write_sample((i16::from(byte) - 128) as i8)?;
                }
            }
            _ => {
                for sample in pcm16_samples(pcm) {
                    writer.write_sample(sample)?;
                }
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Interprets little-endian bytes as i16 samples. An odd trailing byte is ignored.
pub fn pcm16_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    fn le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_wav_header_matches_format() {
        let samples: Vec<i16> = (0..480).map(|i| (i * 64) as i16).collect();
        let pcm = le_bytes(&samples);
        let format = PcmFormat::default();

        let wav = pcm_to_wav(&pcm, format).expect("wrap pcm");

        assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = WavReader::new(Cursor::new(wav)).expect("read back");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24000);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_wav_stereo_custom_rate() {
        let pcm = vec![0u8; 4 * 100];
        let format = PcmFormat::new(2, 16000, 16);

        let wav = pcm_to_wav(&pcm, format).unwrap();

        assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.len());
        let spec = WavReader::new(Cursor::new(wav)).unwrap().spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 16000);
    }

    #[test]
    fn test_wav_eight_bit_preserves_bytes() {
        let pcm: Vec<u8> = vec![0, 64, 128, 200, 255];
        let wav = pcm_to_wav(&pcm, PcmFormat::new(1, 8000, 8)).unwrap();

        assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(&wav[WAV_HEADER_LEN..], pcm.as_slice());
    }

    #[test]
    fn test_partial_frame_is_dropped() {
        let pcm = vec![1u8, 0, 2, 0, 3];
        let wav = pcm_to_wav(&pcm, PcmFormat::default()).unwrap();
        assert_eq!(wav.len(), WAV_HEADER_LEN + 4);
    }

    #[test]
    fn test_unsupported_format_is_rejected() {
        let err = pcm_to_wav(&[0u8; 6], PcmFormat::new(1, 24000, 24)).unwrap_err();
        assert!(matches!(
            err,
            AudioError::UnsupportedFormat {
                bits_per_sample: 24,
                ..
            }
        ));
        assert!(pcm_to_wav(&[0u8; 6], PcmFormat::new(6, 24000, 16)).is_err());
    }
}
