// gemini.rs - Vision-model depth estimation
//
// Sends the image with a fixed instruction prompt and validates the
// near-JSON reply into a DepthGrid. Rate limits fail fast at the
// adapter; the estimate entry point degrades them to the deterministic
// fallback so the user gets a surface instead of an error.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{http_client, upstream_error};
use crate::config::{GridSpec, ProviderConfig, ENV_GEMINI_KEY};
use crate::depth::{resolve_depth, DepthGrid, DepthOutcome, FallbackReason};
use crate::error::{ReliefError, Result};

pub const PROVIDER: &str = "gemini";

const DEFAULT_MIME: &str = "image/jpeg";

/// Adapter tunables. Low temperature keeps the reply structured; the
/// token budget must fit a 64x64 integer array.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-2.0-flash-exp".into(),
            temperature: 0.1,
            max_output_tokens: 16_000,
            timeout: Duration::from_secs(300),
        }
    }
}

pub struct GeminiClient {
    http: Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(providers: &ProviderConfig, config: GeminiConfig) -> Result<Self> {
        let api_key =
            ProviderConfig::credential(&providers.gemini_api_key, PROVIDER, ENV_GEMINI_KEY)?;
        Ok(Self {
            http: http_client(config.timeout)?,
            api_key,
            config,
        })
    }

    /// Raw adapter contract: image bytes + MIME type in, model text out.
    pub fn describe_depth(
        &self,
        image: &[u8],
        mime: Option<&str>,
        spec: &GridSpec,
    ) -> Result<String> {
        if image.is_empty() {
            return Err(ReliefError::input("empty image payload"));
        }
        let mime = mime.unwrap_or(DEFAULT_MIME);

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::text(depth_prompt(spec)),
                    Part::inline(mime, BASE64.encode(image)),
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint, self.config.model
        );
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()?;
        if !response.status().is_success() {
            return Err(upstream_error(PROVIDER, response));
        }
        let reply: GenerateResponse = response.json()?;
        Ok(reply.text())
    }

    /// Depth-estimation pipeline: adapter plus validator. Rate limiting
    /// resolves to the fallback dome; other failures propagate.
    pub fn estimate_depth(
        &self,
        image: &[u8],
        mime: Option<&str>,
        spec: &GridSpec,
    ) -> Result<DepthOutcome> {
        match self.describe_depth(image, mime, spec) {
            Ok(text) => Ok(resolve_depth(&text, spec)),
            Err(err) => throttle_to_fallback(err, spec),
        }
    }
}

/// 429 becomes a successful fallback outcome; everything else stays an
/// error for the caller to surface.
fn throttle_to_fallback(err: ReliefError, spec: &GridSpec) -> Result<DepthOutcome> {
    match err {
        ReliefError::RateLimited {
            retry_after_secs, ..
        } => {
            log::warn!("{PROVIDER} throttled, serving fallback (retry in {retry_after_secs}s)");
            Ok(DepthOutcome::Fallback {
                grid: DepthGrid::fallback(spec.width, spec.height),
                reason: FallbackReason::RateLimited,
            })
        }
        other => Err(other),
    }
}

/// Instruction contract: a single JSON object, one array field of
/// exactly width*height numbers, the stated range, and no markdown -
/// extraction depends on the reply being near-pure JSON.
pub fn depth_prompt(spec: &GridSpec) -> String {
    let count = spec.cell_count();
    let (w, h) = (spec.width, spec.height);
    let (lo, hi) = (spec.source_range.lo, spec.source_range.hi);
    format!(
        "Analyze this image and estimate the depth of the objects.\n\
         Return a single JSON object with a \"depthMap\" field.\n\
         The \"depthMap\" must be a flat array of exactly {count} numbers ({w}x{h} grid, row-major).\n\
         Each number must be between {lo} and {hi}, where {lo} is the farthest background and {hi} is the nearest foreground.\n\
         Focus on the main subject.\n\
         Output ONLY the JSON object. No markdown, no prose."
    )
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn inline(mime: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime.into(),
                data,
            }),
        }
    }
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, trimmed.
    fn text(&self) -> String {
        let mut out = String::new();
        if let Some(content) = self.candidates.first().and_then(|c| c.content.as_ref()) {
            for part in &content.parts {
                if let Some(text) = &part.text {
                    out.push_str(text);
                }
            }
        }
        out.trim().to_string()
    }
}
