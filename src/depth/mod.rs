// depth/ - Canonical depth grids
//
// A DepthGrid is the validated product of a depth source: row-major,
// exactly width*height cells, every value in [0, 1] (0 = far, 1 = near).
// Built once per request, consumed once by the mesh builder.

mod extract;

use crate::config::{GridSpec, MIN_PLAUSIBLE_LEN};
use crate::error::{ReliefError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DepthGrid {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl DepthGrid {
    /// Build a grid from raw source-range values: length policy first,
    /// then clamp-and-rescale into [0, 1].
    pub fn from_raw(raw: &[f64], spec: &GridSpec) -> Result<Self> {
        let expected = spec.cell_count();
        if spec.strict {
            if raw.len() != expected {
                return Err(ReliefError::Shape {
                    expected,
                    actual: raw.len(),
                });
            }
        } else if raw.len() < MIN_PLAUSIBLE_LEN {
            return Err(ReliefError::Shape {
                expected: MIN_PLAUSIBLE_LEN,
                actual: raw.len(),
            });
        }

        let mut values: Vec<f32> = raw
            .iter()
            .take(expected)
            .map(|&v| spec.source_range.normalize(v as f32))
            .collect();
        // Lenient mode conforms short arrays to the declared resolution.
        values.resize(expected, 0.0);

        Ok(Self {
            width: spec.width,
            height: spec.height,
            values,
        })
    }

    /// Wrap values that are already canonical. Out-of-range cells are
    /// clamped so the [0, 1] invariant holds unconditionally.
    pub fn from_normalized(width: usize, height: usize, mut values: Vec<f32>) -> Result<Self> {
        if values.len() != width * height {
            return Err(ReliefError::Shape {
                expected: width * height,
                actual: values.len(),
            });
        }
        for v in &mut values {
            *v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Deterministic fallback surface: a radial dome, nearest at the
    /// grid center, fading to 0 at the inscribed radius. Reproducible
    /// bit-for-bit from width and height alone.
    pub fn fallback(width: usize, height: usize) -> Self {
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        let radius = width as f32 / 2.0;
        let mut values = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                let dx = c as f32 - cx;
                let dy = r as f32 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                values.push((1.0 - d / radius).max(0.0));
            }
        }
        Self {
            width,
            height,
            values,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Depth at cell (0.0 = far, 1.0 = near). Out of range reads as far.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.values[y * self.width + x]
    }

    /// Height at cell (0.0 = low, 1.0 = high) - the inverse of depth.
    #[inline]
    pub fn elevation(&self, x: usize, y: usize) -> f32 {
        1.0 - self.get(x, y)
    }
}

/// Why a fallback grid was served instead of measured data.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    RateLimited,
    EmptyResponse,
    Parse(String),
    Shape { expected: usize, actual: usize },
    ModelUnavailable,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::RateLimited => write!(f, "upstream rate limited"),
            FallbackReason::EmptyResponse => write!(f, "empty model response"),
            FallbackReason::Parse(msg) => write!(f, "unparseable response: {msg}"),
            FallbackReason::Shape { expected, actual } => {
                write!(f, "wrong array length: {actual} (expected {expected})")
            }
            FallbackReason::ModelUnavailable => write!(f, "model unavailable"),
        }
    }
}

impl FallbackReason {
    fn from_error(err: ReliefError) -> Self {
        match err {
            ReliefError::RateLimited { .. } => FallbackReason::RateLimited,
            ReliefError::Shape { expected, actual } => FallbackReason::Shape { expected, actual },
            ReliefError::Parse(msg) => FallbackReason::Parse(msg),
            other => FallbackReason::Parse(other.to_string()),
        }
    }
}

/// Result of depth resolution. Callers can tell measured data from the
/// synthetic dome without intercepting errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DepthOutcome {
    Measured(DepthGrid),
    Fallback {
        grid: DepthGrid,
        reason: FallbackReason,
    },
}

impl DepthOutcome {
    pub fn grid(&self) -> &DepthGrid {
        match self {
            DepthOutcome::Measured(grid) => grid,
            DepthOutcome::Fallback { grid, .. } => grid,
        }
    }

    pub fn into_grid(self) -> DepthGrid {
        match self {
            DepthOutcome::Measured(grid) => grid,
            DepthOutcome::Fallback { grid, .. } => grid,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, DepthOutcome::Fallback { .. })
    }
}

/// Validate raw model text into a DepthGrid, or the fallback dome.
/// Parse and shape failures are absorbed here; they never propagate.
pub fn resolve_depth(text: &str, spec: &GridSpec) -> DepthOutcome {
    let fallback = |reason: FallbackReason| DepthOutcome::Fallback {
        grid: DepthGrid::fallback(spec.width, spec.height),
        reason,
    };

    if text.trim().is_empty() {
        log::warn!("depth source returned an empty response, serving fallback");
        return fallback(FallbackReason::EmptyResponse);
    }

    let raw = match extract::depth_array(text) {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("depth extraction failed ({err}), serving fallback");
            log::debug!("raw depth response: {text}");
            return fallback(FallbackReason::from_error(err));
        }
    };

    match DepthGrid::from_raw(&raw, spec) {
        Ok(grid) => DepthOutcome::Measured(grid),
        Err(err) => {
            log::warn!("depth validation failed ({err}), serving fallback");
            log::debug!("raw depth response: {text}");
            fallback(FallbackReason::from_error(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceRange;

    fn spec32() -> GridSpec {
        GridSpec::default()
    }

    #[test]
    fn normalization_stays_in_unit_interval() {
        let spec = GridSpec {
            source_range: SourceRange::TEN,
            ..GridSpec::default()
        };
        let raw: Vec<f64> = (0..1024).map(|i| (i % 23) as f64 - 4.0).collect();
        let grid = DepthGrid::from_raw(&raw, &spec).unwrap();
        assert!(grid.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn normalization_is_monotonic() {
        let r = SourceRange::TEN;
        let mut prev = f32::MIN;
        for v in [-5.0, 0.0, 0.5, 3.0, 7.0, 10.0, 40.0] {
            let n = r.normalize(v);
            assert!(n >= prev, "normalize({v}) went backwards");
            prev = n;
        }
    }

    #[test]
    fn round_trip_matches_naive_rescale() {
        let raw: Vec<f64> = (0..1024).map(|i| (i % 11) as f64).collect();
        let spec = GridSpec {
            source_range: SourceRange::TEN,
            ..GridSpec::default()
        };
        let json = format!("{{\"depthMap\": {}}}", serde_json::to_string(&raw).unwrap());
        let outcome = resolve_depth(&json, &spec);
        let DepthOutcome::Measured(grid) = outcome else {
            panic!("expected measured grid");
        };
        let expected: Vec<f32> = raw
            .iter()
            .map(|&v| (v as f32).clamp(0.0, 10.0) / 10.0)
            .collect();
        assert_eq!(grid.values(), &expected[..]);
    }

    #[test]
    fn strict_mode_rejects_wrong_length() {
        let raw = vec![0.5f64; 1000];
        let err = DepthGrid::from_raw(&raw, &spec32()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReliefError::Shape {
                expected: 1024,
                actual: 1000
            }
        ));
    }

    #[test]
    fn lenient_mode_conforms_length() {
        let spec = spec32().lenient();
        let grid = DepthGrid::from_raw(&vec![1.0f64; 500], &spec).unwrap();
        assert_eq!(grid.len(), 1024);
        assert_eq!(grid.get(0, 0), 1.0);
        // Padded tail reads as far.
        assert_eq!(grid.get(31, 31), 0.0);

        let long = DepthGrid::from_raw(&vec![1.0f64; 2000], &spec).unwrap();
        assert_eq!(long.len(), 1024);
    }

    #[test]
    fn lenient_mode_still_wants_plausible_arrays() {
        let spec = spec32().lenient();
        assert!(DepthGrid::from_raw(&vec![1.0f64; 99], &spec).is_err());
    }

    #[test]
    fn malformed_text_yields_fallback_not_error() {
        let spec = spec32();
        for text in [
            "",
            "not json at all",
            "{\"depthMap\": [0.1, 0.2",
            "{\"something\": 42}",
            "{\"depthMap\": \"nope\"}",
        ] {
            let outcome = resolve_depth(text, &spec);
            assert!(outcome.is_fallback(), "expected fallback for {text:?}");
            assert_eq!(outcome.grid().len(), 1024);
        }
    }

    #[test]
    fn strict_length_mismatch_yields_fallback() {
        let outcome = resolve_depth("{\"depthMap\": [0.5, 0.5, 0.5]}", &spec32());
        assert!(matches!(
            outcome,
            DepthOutcome::Fallback {
                reason: FallbackReason::Shape { .. },
                ..
            }
        ));
    }

    #[test]
    fn fenced_canonical_grid_passes_through() {
        // 1024 floats already in [0, 1] on the default 32x32 contract:
        // the values come back unchanged and mesh sizing follows.
        let raw: Vec<f64> = (0..1024).map(|i| (i % 100) as f64 / 100.0).collect();
        let text = format!(
            "```json\n{{\"depthMap\": {}}}\n```",
            serde_json::to_string(&raw).unwrap()
        );
        let outcome = resolve_depth(&text, &spec32());
        let DepthOutcome::Measured(grid) = outcome else {
            panic!("expected measured grid");
        };
        let expected: Vec<f32> = raw.iter().map(|&v| v as f32).collect();
        assert_eq!(grid.values(), &expected[..]);

        let mesh = crate::mesh::MeshGeometry::displaced(grid.values(), 32, 32, 2.0);
        assert_eq!(mesh.vertex_count(), 1024);
        assert_eq!(mesh.triangle_count(), 2 * 31 * 31);
    }

    #[test]
    fn legacy_integer_grid_rescales() {
        // 4096 integers in [0, 10] under the 64x64 legacy contract.
        let raw: Vec<f64> = (0..4096).map(|i| (i % 13) as f64).collect();
        let text = format!(
            "{{\"depth\": {}}}",
            serde_json::to_string(&raw).unwrap()
        );
        let outcome = resolve_depth(&text, &GridSpec::legacy());
        let DepthOutcome::Measured(grid) = outcome else {
            panic!("expected measured grid");
        };
        for (out, src) in grid.values().iter().zip(&raw) {
            let expected = (*src as f32).clamp(0.0, 10.0) / 10.0;
            assert_eq!(*out, expected);
        }
    }

    #[test]
    fn fallback_is_deterministic() {
        let a = DepthGrid::fallback(32, 32);
        let b = DepthGrid::fallback(32, 32);
        assert_eq!(a, b);
        assert_eq!(a.values().iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
                   b.values().iter().map(|v| v.to_bits()).collect::<Vec<_>>());
    }

    #[test]
    fn fallback_dome_shape() {
        let grid = DepthGrid::fallback(32, 32);
        assert!((grid.get(16, 16) - 1.0).abs() < 1e-6);
        assert!(grid.get(0, 0).abs() < 1e-6);
        assert!(grid.get(31, 31).abs() < 1e-6);
        assert!(grid.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn grid_queries() {
        let grid = DepthGrid::fallback(32, 32);
        assert_eq!(grid.get(99, 0), 0.0);
        assert_eq!(grid.elevation(16, 16), 1.0 - grid.get(16, 16));
    }

    #[test]
    fn from_normalized_clamps_and_checks_length() {
        let grid = DepthGrid::from_normalized(2, 2, vec![-0.5, 0.5, 1.5, f32::NAN]).unwrap();
        assert_eq!(grid.values(), &[0.0, 0.5, 1.0, 0.0]);
        assert!(DepthGrid::from_normalized(2, 2, vec![0.0; 3]).is_err());
    }
}
