// stability.rs - Synchronous image-to-3D
//
// Single multipart upload; the success body is the binary glTF itself,
// forwarded untouched as a GeneratedAsset.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header;

use super::{http_client, upstream_error};
use crate::config::{ProviderConfig, ENV_STABILITY_KEY};
use crate::error::{ReliefError, Result};
use crate::viewer::GeneratedAsset;

pub const PROVIDER: &str = "stability";

const DEFAULT_ENDPOINT: &str = "https://api.stability.ai";
const GLB_CONTENT_TYPE: &str = "model/gltf-binary";
const DEFAULT_MIME: &str = "image/jpeg";

pub struct StabilityClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl StabilityClient {
    pub fn new(providers: &ProviderConfig) -> Result<Self> {
        let api_key =
            ProviderConfig::credential(&providers.stability_api_key, PROVIDER, ENV_STABILITY_KEY)?;
        Ok(Self {
            http: http_client(providers.timeout)?,
            api_key,
            endpoint: DEFAULT_ENDPOINT.into(),
        })
    }

    /// Upload image bytes, receive the model synchronously.
    pub fn image_to_model(&self, image: &[u8], mime: Option<&str>) -> Result<GeneratedAsset> {
        if image.is_empty() {
            return Err(ReliefError::input("empty image payload"));
        }
        let mime = mime.unwrap_or(DEFAULT_MIME);

        let part = Part::bytes(image.to_vec())
            .file_name("image")
            .mime_str(mime)?;
        let form = Form::new()
            .part("image", part)
            .text("texture_resolution", "1024")
            .text("foreground_ratio", "0.85");

        log::info!("{PROVIDER}: requesting model ({} byte image)", image.len());
        let response = self
            .http
            .post(format!("{}/v2beta/3d/stable-fast-3d", self.endpoint))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()?;
        if !response.status().is_success() {
            return Err(upstream_error(PROVIDER, response));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(GLB_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes()?.to_vec();
        log::info!("{PROVIDER}: received {} byte model", bytes.len());
        Ok(GeneratedAsset {
            bytes,
            content_type,
        })
    }
}
