// meshy.rs - Task-based image-to-3D
//
// The upstream is asynchronous: starting a conversion returns an opaque
// task id which is polled until a terminal state. The poll deadline
// stands in for the platform execution ceiling.

use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use super::{fetch_bytes, http_client, upstream_error};
use crate::config::{ProviderConfig, ENV_MESHY_KEY};
use crate::error::{ReliefError, Result};
use crate::viewer::GeneratedAsset;

pub const PROVIDER: &str = "meshy";

const DEFAULT_ENDPOINT: &str = "https://api.meshy.ai";

pub struct MeshyClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Expired,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Expired
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    pub status: TaskState,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub model_urls: ModelUrls,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelUrls {
    #[serde(default)]
    pub glb: Option<String>,
}

#[derive(Deserialize)]
struct StartReply {
    result: String,
}

impl MeshyClient {
    pub fn new(providers: &ProviderConfig) -> Result<Self> {
        let api_key =
            ProviderConfig::credential(&providers.meshy_api_key, PROVIDER, ENV_MESHY_KEY)?;
        Ok(Self {
            http: http_client(providers.timeout)?,
            api_key,
            endpoint: DEFAULT_ENDPOINT.into(),
        })
    }

    /// Submit an image URL for conversion; returns the opaque task id.
    pub fn start_task(&self, image_url: &str) -> Result<String> {
        if image_url.trim().is_empty() {
            return Err(ReliefError::input("image URL is required"));
        }
        log::info!("{PROVIDER}: starting image-to-3d task");
        let response = self
            .http
            .post(format!("{}/openapi/v1/image-to-3d", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({ "image_url": image_url, "enable_pbr": true }))
            .send()?;
        if !response.status().is_success() {
            return Err(upstream_error(PROVIDER, response));
        }
        let reply: StartReply = response.json()?;
        log::info!("{PROVIDER}: task {} started", reply.result);
        Ok(reply.result)
    }

    pub fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let response = self
            .http
            .get(format!("{}/openapi/v1/image-to-3d/{task_id}", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()?;
        if !response.status().is_success() {
            return Err(upstream_error(PROVIDER, response));
        }
        Ok(response.json()?)
    }

    /// Poll until a terminal state or the deadline passes.
    pub fn poll(&self, task_id: &str, interval: Duration, deadline: Duration) -> Result<TaskStatus> {
        let started = Instant::now();
        loop {
            let status = self.task_status(task_id)?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            if started.elapsed() >= deadline {
                return Err(ReliefError::Upstream {
                    provider: PROVIDER,
                    status: None,
                    message: format!(
                        "task {task_id} not finished after {}s (at {}%)",
                        deadline.as_secs(),
                        status.progress
                    ),
                });
            }
            log::debug!("{PROVIDER}: task {task_id} at {}%", status.progress);
            thread::sleep(interval);
        }
    }

    /// Download the finished model from its URL.
    pub fn download(&self, url: &str) -> Result<GeneratedAsset> {
        Ok(GeneratedAsset::glb(fetch_bytes(&self.http, url, PROVIDER)?))
    }
}
