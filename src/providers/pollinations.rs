// pollinations.rs - Prompt-to-image generation
//
// The provider is a plain GET: prompt in the path, random seed in the
// query to defeat caching. The generated URL must itself be fetched to
// materialize bytes.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::blocking::Client;
use reqwest::Url;

use super::{fetch_bytes, http_client};
use crate::config::ProviderConfig;
use crate::error::{ReliefError, Result};

pub const PROVIDER: &str = "pollinations";

const DEFAULT_ENDPOINT: &str = "https://image.pollinations.ai";
const IMAGE_SIZE: u32 = 512;
const SEED_SPAN: u32 = 1_000_000;

pub struct PollinationsClient {
    http: Client,
    endpoint: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub url: String,
    pub bytes: Vec<u8>,
}

impl PollinationsClient {
    /// No credential needed; the endpoint is public.
    pub fn new(providers: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(providers.timeout)?,
            endpoint: DEFAULT_ENDPOINT.into(),
        })
    }

    /// Build the fetchable image URL for a prompt and seed.
    pub fn image_url(&self, prompt: &str, seed: u32) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(ReliefError::input("prompt is required"));
        }
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| ReliefError::input(format!("bad endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ReliefError::input("endpoint cannot be a base URL"))?
            .push("prompt")
            .push(prompt);
        url.query_pairs_mut()
            .append_pair("seed", &seed.to_string())
            .append_pair("width", &IMAGE_SIZE.to_string())
            .append_pair("height", &IMAGE_SIZE.to_string())
            .append_pair("nologo", "true");
        Ok(url.into())
    }

    /// Generate an image and fetch its bytes.
    pub fn generate(&self, prompt: &str) -> Result<GeneratedImage> {
        let url = self.image_url(prompt, cache_seed())?;
        log::info!("{PROVIDER}: generating image for prompt ({} chars)", prompt.len());
        let bytes = fetch_bytes(&self.http, &url, PROVIDER)?;
        Ok(GeneratedImage { url, bytes })
    }
}

/// Cache-busting seed: clock-seeded xorshift32.
fn cache_seed() -> u32 {
    let mut s = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(0xDEAD_BEEF)
        .max(1);
    s ^= s << 13;
    s ^= s >> 17;
    s ^= s << 5;
    s % SEED_SPAN
}
