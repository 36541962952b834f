mod client;
pub mod types;

pub use client::{BASE_URL, DEFAULT_TEXT_MODEL, DEFAULT_TTS_MODEL, GeminiClient};
