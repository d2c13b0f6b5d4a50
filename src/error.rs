// error.rs - Error taxonomy
//
// Configuration and input errors surface immediately; upstream errors
// carry the provider status where available. Parse and Shape never
// reach a caller: the depth validator absorbs them into the fallback
// surface.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReliefError>;

#[derive(Debug, Error)]
pub enum ReliefError {
    /// A required credential is absent from the environment.
    #[error("{provider}: missing credential {var}")]
    Configuration {
        provider: &'static str,
        var: &'static str,
    },

    /// The caller supplied missing or malformed input.
    #[error("invalid input: {0}")]
    Input(String),

    /// An upstream provider answered with a non-success response.
    #[error("{provider} upstream error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Upstream {
        provider: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// The upstream signalled throttling. No blind retry: the caller
    /// decides whether to wait or fall back.
    #[error("{provider} rate limited, retry in {retry_after_secs}s")]
    RateLimited {
        provider: &'static str,
        retry_after_secs: u64,
    },

    /// The model reply could not be read as JSON.
    #[error("depth response parse failed: {0}")]
    Parse(String),

    /// The depth array exists but has the wrong number of cells.
    #[error("depth array has {actual} elements, expected {expected}")]
    Shape { expected: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(not(target_arch = "wasm32"))]
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[cfg(not(target_arch = "wasm32"))]
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl ReliefError {
    pub fn input(message: impl Into<String>) -> Self {
        ReliefError::Input(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        ReliefError::Parse(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_display_with_status() {
        let err = ReliefError::Upstream {
            provider: "meshy",
            status: Some(500),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "meshy upstream error (HTTP 500): boom");
    }

    #[test]
    fn upstream_display_without_status() {
        let err = ReliefError::Upstream {
            provider: "meshy",
            status: None,
            message: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "meshy upstream error: connection reset");
    }

    #[test]
    fn configuration_names_the_variable() {
        let err = ReliefError::Configuration {
            provider: "gemini",
            var: "GOOGLE_GEMINI_API_KEY",
        };
        assert!(err.to_string().contains("GOOGLE_GEMINI_API_KEY"));
    }
}
