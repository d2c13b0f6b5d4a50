// config.rs - Explicit configuration for the pipeline
//
// Everything tunable is a plain struct threaded through constructors.
// No module-level mutable state: the grid contract and the provider
// credentials travel with the call.

use std::env;
use std::time::Duration;

use crate::error::{ReliefError, Result};

pub const ENV_GEMINI_KEY: &str = "GOOGLE_GEMINI_API_KEY";
pub const ENV_MESHY_KEY: &str = "MESHY_API_KEY";
pub const ENV_STABILITY_KEY: &str = "STABILITY_API_KEY";

/// Smallest grid that still produces cells.
pub const MIN_RESOLUTION: usize = 2;

/// Legacy plausibility floor: lenient mode accepts any array at least
/// this long and conforms it to the declared resolution.
pub const MIN_PLAUSIBLE_LEN: usize = 100;

/// Declared numeric range of raw depth values.
/// Normalization clamps into [lo, hi] and divides by hi.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRange {
    pub lo: f32,
    pub hi: f32,
}

impl SourceRange {
    /// Float depth in [0.0, 1.0], already canonical.
    pub const UNIT: SourceRange = SourceRange { lo: 0.0, hi: 1.0 };

    /// Integer depth in [0, 10], the coarse legacy contract.
    pub const TEN: SourceRange = SourceRange { lo: 0.0, hi: 10.0 };

    #[inline]
    pub fn normalize(&self, v: f32) -> f32 {
        v.clamp(self.lo, self.hi) / self.hi
    }

    fn valid(&self) -> bool {
        self.hi > 0.0 && self.hi > self.lo
    }
}

/// The resolved depth-grid contract: resolution, declared input range,
/// and how strictly the array length is checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub source_range: SourceRange,
    /// Strict requires exactly width*height elements. Lenient accepts
    /// any array of at least MIN_PLAUSIBLE_LEN and conforms it.
    pub strict: bool,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            source_range: SourceRange::UNIT,
            strict: true,
        }
    }
}

impl GridSpec {
    pub fn new(width: usize, height: usize, source_range: SourceRange) -> Result<Self> {
        if width < MIN_RESOLUTION || height < MIN_RESOLUTION {
            return Err(ReliefError::input(format!(
                "grid resolution {width}x{height} below minimum {MIN_RESOLUTION}"
            )));
        }
        if !source_range.valid() {
            return Err(ReliefError::input(format!(
                "invalid source range [{}, {}]",
                source_range.lo, source_range.hi
            )));
        }
        Ok(Self {
            width,
            height,
            source_range,
            strict: true,
        })
    }

    /// The 64x64 / 0-10 adapter variant observed in the wild.
    pub fn legacy() -> Self {
        Self {
            width: 64,
            height: 64,
            source_range: SourceRange::TEN,
            strict: false,
        }
    }

    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

/// Which upstream credentials this process holds. A provider whose key
/// is absent is unavailable; asking for it is a Configuration error,
/// never a silent failure.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    pub meshy_api_key: Option<String>,
    pub stability_api_key: Option<String>,
    /// Per-request ceiling for the fast providers. The depth adapter
    /// carries its own, longer ceiling.
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            meshy_api_key: None,
            stability_api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env::var(ENV_GEMINI_KEY).ok().filter(|v| !v.is_empty()),
            meshy_api_key: env::var(ENV_MESHY_KEY).ok().filter(|v| !v.is_empty()),
            stability_api_key: env::var(ENV_STABILITY_KEY).ok().filter(|v| !v.is_empty()),
            ..Self::default()
        }
    }

    pub(crate) fn credential(
        key: &Option<String>,
        provider: &'static str,
        var: &'static str,
    ) -> Result<String> {
        key.clone()
            .ok_or(ReliefError::Configuration { provider, var })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_contract_is_32_unit_strict() {
        let spec = GridSpec::default();
        assert_eq!((spec.width, spec.height), (32, 32));
        assert_eq!(spec.source_range, SourceRange::UNIT);
        assert!(spec.strict);
        assert_eq!(spec.cell_count(), 1024);
    }

    #[test]
    fn legacy_contract_is_64_ten_lenient() {
        let spec = GridSpec::legacy();
        assert_eq!((spec.width, spec.height), (64, 64));
        assert_eq!(spec.source_range, SourceRange::TEN);
        assert!(!spec.strict);
    }

    #[test]
    fn rejects_degenerate_resolution() {
        assert!(GridSpec::new(1, 32, SourceRange::UNIT).is_err());
        assert!(GridSpec::new(32, 0, SourceRange::UNIT).is_err());
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(GridSpec::new(32, 32, SourceRange { lo: 5.0, hi: 1.0 }).is_err());
        assert!(GridSpec::new(32, 32, SourceRange { lo: -1.0, hi: 0.0 }).is_err());
    }

    #[test]
    fn normalize_clamps_then_divides() {
        let r = SourceRange::TEN;
        assert_eq!(r.normalize(-3.0), 0.0);
        assert_eq!(r.normalize(5.0), 0.5);
        assert_eq!(r.normalize(25.0), 1.0);
    }

    #[test]
    fn missing_credential_is_configuration_error() {
        let err = ProviderConfig::credential(&None, "gemini", ENV_GEMINI_KEY).unwrap_err();
        assert!(matches!(err, ReliefError::Configuration { .. }));
    }
}
