use anyhow::Result;
use interview_native_utils::data_uri;

/// A finished microphone capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl CapturedAudio {
    pub fn to_data_uri(&self) -> String {
        data_uri::encode(&self.mime_type, &self.bytes)
    }
}

/// Something that can capture audio, e.g. a microphone or an uploaded file.
pub trait AudioSource {
    fn acquire(&mut self) -> Result<()>;

    /// Stops capturing and hands back whatever was recorded.
    fn release(&mut self) -> Result<Option<CapturedAudio>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    Idle,
    Recording,
}

/// Holds at most one capture open at a time.
pub struct Recorder<S> {
    source: S,
    phase: RecordingPhase,
}

impl<S: AudioSource> Recorder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            phase: RecordingPhase::Idle,
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    /// Starting while already recording does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.phase == RecordingPhase::Recording {
            tracing::debug!("Recording already in progress");
            return Ok(());
        }
        self.source.acquire()?;
        self.phase = RecordingPhase::Recording;
        Ok(())
    }

    /// Stops the capture and returns it as a `data:` URI. Empty captures yield `None`.
    pub fn stop(&mut self) -> Result<Option<String>> {
        if self.phase == RecordingPhase::Idle {
            return Ok(None);
        }
        self.phase = RecordingPhase::Idle;
        let captured = self.source.release()?;
        Ok(captured
            .filter(|audio| !audio.bytes.is_empty())
            .map(|audio| audio.to_data_uri()))
    }

    /// Stops the capture and throws it away.
    pub fn cancel(&mut self) -> Result<()> {
        if self.phase == RecordingPhase::Recording {
            self.phase = RecordingPhase::Idle;
            self.source.release()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeMic {
        acquired: usize,
        released: usize,
        clip: Vec<u8>,
    }

    impl AudioSource for FakeMic {
        fn acquire(&mut self) -> Result<()> {
            self.acquired += 1;
            Ok(())
        }

        fn release(&mut self) -> Result<Option<CapturedAudio>> {
            self.released += 1;
            Ok(Some(CapturedAudio {
                mime_type: "audio/webm".to_string(),
                bytes: self.clip.clone(),
            }))
        }
    }

    #[test]
    fn test_start_is_exclusive() {
        let mut recorder = Recorder::new(FakeMic::default());

        recorder.start().unwrap();
        recorder.start().unwrap();

        assert_eq!(recorder.phase(), RecordingPhase::Recording);
        assert_eq!(recorder.source.acquired, 1);
    }

    #[test]
    fn test_stop_returns_data_uri() {
        let mut recorder = Recorder::new(FakeMic {
            clip: b"hello".to_vec(),
            ..Default::default()
        });

        recorder.start().unwrap();
        let uri = recorder.stop().unwrap();

        assert_eq!(uri.as_deref(), Some("data:audio/webm;base64,aGVsbG8="));
        assert_eq!(recorder.phase(), RecordingPhase::Idle);
    }

    #[test]
    fn test_stop_without_recording_or_audio_yields_nothing() {
        let mut recorder = Recorder::new(FakeMic::default());
        assert_eq!(recorder.stop().unwrap(), None);
        assert_eq!(recorder.source.released, 0);

        recorder.start().unwrap();
        assert_eq!(recorder.stop().unwrap(), None);
    }

    #[test]
    fn test_cancel_releases_source() {
        let mut recorder = Recorder::new(FakeMic::default());
        recorder.start().unwrap();
        recorder.cancel().unwrap();

        assert_eq!(recorder.phase(), RecordingPhase::Idle);
        assert_eq!(recorder.source.released, 1);
    }
}
