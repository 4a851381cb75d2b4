mod api;
pub mod prompts;
mod provider;

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;

use crate::error::{CaseLensError, Result};

pub use api::LlmApiClient;
pub use provider::{LlmBackend, LlmProvider};

/// One multimodal reasoning call: instructions, text context and the ordered
/// image set (query frames first, then similar-case frames).
#[derive(Debug, Clone, Default)]
pub struct ReasoningRequest {
    pub system: String,
    pub text: String,
    pub images: Vec<String>,
    pub max_output_tokens: u32,
}

/// A vision-and-text model reached through some transport.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String>;

    fn is_available(&self) -> bool {
        true
    }
}

/// Encodes a local image file as a `data:` url.
pub fn image_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => {
            return Err(CaseLensError::Validation(format!(
                "Unsupported image type: {}",
                path.display()
            )))
        }
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}
