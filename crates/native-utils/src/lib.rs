pub mod audio;
pub mod data_uri;

pub use audio::{AudioError, PcmFormat};
