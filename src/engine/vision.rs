//! OCR backend that asks a vision LLM to transcribe each page.
//!
//! Useful for drawings where tesseract struggles (handwritten redlines,
//! stamped revision clouds). The model replies with one text line per output
//! line; every non-empty line becomes a [`TextRegion`] without bounds or
//! confidence.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) with 500 ms base and 3 retries waits
//! 500 ms → 1 s → 2 s before giving up on the page.

use super::postprocess::transcript_lines;
use super::{OcrEngine, TextRegion};
use crate::error::EngineError;
use crate::pipeline::encode::encode_image_data;
use crate::prompts;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::RgbImage;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Settings for [`VisionEngine`].
#[derive(Clone)]
pub struct VisionConfig {
    /// LLM provider name (e.g. `"openai"`, `"anthropic"`, `"gemini"`).
    /// `None` auto-detects from environment variables.
    pub provider_name: Option<String>,

    /// Model identifier. Default: `gpt-4.1-nano` when `provider_name` is set.
    pub model: Option<String>,

    /// Pre-built provider; takes priority over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0, transcription should not be creative.
    pub temperature: f32,

    /// Maximum output tokens per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page after the first attempt. Default: 3.
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds. Default: 500.
    pub retry_backoff_ms: u64,

    /// Replaces [`prompts::DEFAULT_OCR_PROMPT`] when set.
    pub system_prompt: Option<String>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            provider_name: None,
            model: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

/// OCR engine backed by a vision-capable LLM.
pub struct VisionEngine {
    provider: Arc<dyn LLMProvider>,
    runtime: Handle,
    config: VisionConfig,
}

impl VisionEngine {
    /// Resolve the provider and capture the current Tokio runtime.
    ///
    /// Must be called from within a Tokio runtime: [`OcrEngine::recognize`]
    /// is synchronous and drives the provider's async client on this handle
    /// from the blocking pool.
    pub fn new(config: VisionConfig) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|e| EngineError::Unavailable {
            engine: "vision".to_string(),
            hint: format!("no Tokio runtime available: {e}"),
        })?;
        let provider = resolve_provider(&config)?;
        debug!(
            provider = config.provider_name.as_deref().unwrap_or("auto"),
            "vision OCR provider resolved"
        );
        Ok(Self {
            provider,
            runtime,
            config,
        })
    }
}

impl OcrEngine for VisionEngine {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn recognize(&self, image: &RgbImage) -> Result<Vec<TextRegion>, EngineError> {
        let start = Instant::now();
        let image_data = encode_image_data(image)?;

        let messages = vec![
            ChatMessage::system(prompts::system_prompt(self.config.system_prompt.as_deref())),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let options = build_options(&self.config);

        let mut last_err: Option<String> = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.config.retry_backoff_ms, attempt);
                warn!(
                    "retry {}/{} after {}ms",
                    attempt, self.config.max_retries, backoff
                );
                std::thread::sleep(Duration::from_millis(backoff));
            }

            match self
                .runtime
                .block_on(self.provider.chat(&messages, Some(&options)))
            {
                Ok(response) => {
                    debug!(
                        "{} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(transcript_to_regions(&response.content));
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    warn!("attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(EngineError::Failed(format!(
            "vision provider failed after {} retries: {}",
            self.config.max_retries,
            last_err.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

/// Wait before retry `attempt` (1-based).
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn build_options(config: &VisionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// One region per cleaned transcript line, in reply order.
pub fn transcript_to_regions(reply: &str) -> Vec<TextRegion> {
    transcript_lines(reply)
        .into_iter()
        .map(TextRegion::with_text)
        .collect()
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. pre-built `config.provider`
/// 2. `config.provider_name` + `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 4. `OPENAI_API_KEY` present → OpenAI
/// 5. whatever [`ProviderFactory::from_env`] detects
fn resolve_provider(config: &VisionConfig) -> Result<Arc<dyn LLMProvider>, EngineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| EngineError::Unavailable {
            engine: "vision".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;
    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, EngineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        EngineError::Unavailable {
            engine: format!("vision/{provider_name}"),
            hint: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&VisionConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(u64::MAX, 5), u64::MAX);
    }

    #[test]
    fn transcript_lines_become_regions() {
        let regions = transcript_to_regions("```\nROOF PLAN\nSCALE 1:100\n```");
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text.as_deref(), Some("ROOF PLAN"));
        assert_eq!(regions[1].text.as_deref(), Some("SCALE 1:100"));
        assert!(regions.iter().all(|r| r.bounds.is_none() && r.confidence.is_none()));
    }

    #[test]
    fn no_text_reply_yields_no_regions() {
        assert!(transcript_to_regions("NO_TEXT").is_empty());
    }

    #[test]
    fn new_outside_runtime_is_unavailable() {
        let err = VisionEngine::new(VisionConfig::default())
            .err()
            .expect("no runtime in a plain #[test]");
        assert!(matches!(err, EngineError::Unavailable { .. }));
    }

    #[test]
    fn debug_hides_prompt_body() {
        let config = VisionConfig {
            system_prompt: Some("secret instructions".into()),
            ..Default::default()
        };
        let dbg = format!("{config:?}");
        assert!(dbg.contains("<custom>"));
        assert!(!dbg.contains("secret instructions"));
    }
}
