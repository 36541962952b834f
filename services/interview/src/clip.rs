use anyhow::{Context, Result};
use interview_core::recording::{AudioSource, CapturedAudio};
use std::path::{Path, PathBuf};

/// Treats a pre-recorded audio file as the microphone.
///
/// The terminal has no capture device, so the user records with any tool and
/// hands the file over; "releasing" the source reads it.
pub struct ClipFile {
    path: PathBuf,
}

impl ClipFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSource for ClipFile {
    fn acquire(&mut self) -> Result<()> {
        if !self.path.is_file() {
            anyhow::bail!("Audio clip not found: {}", self.path.display());
        }
        Ok(())
    }

    fn release(&mut self) -> Result<Option<CapturedAudio>> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read audio clip: {}", self.path.display()))?;
        Ok(Some(CapturedAudio {
            mime_type: mime_for(&self.path).to_string(),
            bytes,
        }))
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "audio/webm",
    }
}
