// midas.rs - Local ONNX depth estimation
//
// Offline alternative to the vision-model adapter. Any failure here
// degrades to the fallback dome; a missing model file is a normal
// condition, not an error.

use std::path::PathBuf;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::config::GridSpec;
use crate::depth::{DepthGrid, DepthOutcome, FallbackReason};

pub const PROVIDER: &str = "midas";

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone)]
pub struct MidasConfig {
    pub model_path: PathBuf,
    pub input_size: u32,
}

impl Default for MidasConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/midas_small.onnx"),
            input_size: 256,
        }
    }
}

/// Estimate depth locally. Returns Measured on success, the fallback
/// dome otherwise - the caller never sees an error from this path.
pub fn estimate_depth(img: &DynamicImage, spec: &GridSpec, config: &MidasConfig) -> DepthOutcome {
    let fallback = |reason: FallbackReason| DepthOutcome::Fallback {
        grid: DepthGrid::fallback(spec.width, spec.height),
        reason,
    };

    if !config.model_path.exists() {
        log::warn!(
            "{PROVIDER}: model {} not found, serving fallback",
            config.model_path.display()
        );
        return fallback(FallbackReason::ModelUnavailable);
    }

    let Ok(builder) = Session::builder() else {
        return fallback(FallbackReason::ModelUnavailable);
    };
    let Ok(mut session) = builder.commit_from_file(&config.model_path) else {
        return fallback(FallbackReason::ModelUnavailable);
    };

    let size = config.input_size;
    log::info!("{PROVIDER}: running inference on {size}x{size} input");
    let resized = img.resize_exact(size, size, FilterType::Lanczos3);

    // NCHW input tensor, ImageNet-normalized
    let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for y in 0..size {
        for x in 0..size {
            let p = resized.get_pixel(x, y);
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = (p[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
    }

    let Ok(input_val) = Value::from_array(input) else {
        return fallback(FallbackReason::ModelUnavailable);
    };
    let input_name = session
        .inputs
        .first()
        .map(|i| i.name.clone())
        .unwrap_or_else(|| "image".into());
    let Ok(outputs) = session.run(ort::inputs![input_name => input_val]) else {
        return fallback(FallbackReason::ModelUnavailable);
    };
    let Ok(arr) = outputs[0].try_extract_array::<f32>() else {
        return fallback(FallbackReason::ModelUnavailable);
    };

    let shape = arr.shape();
    let (oh, ow) = match shape.len() {
        4 => (shape[2], shape[3]),
        3 => (shape[1], shape[2]),
        2 => (shape[0], shape[1]),
        _ => {
            return fallback(FallbackReason::Parse(format!(
                "unexpected output rank {}",
                shape.len()
            )));
        }
    };

    // Min-max normalize, then resample to the grid resolution
    let flat: Vec<f32> = arr.iter().copied().collect();
    let (min_d, max_d) = flat
        .iter()
        .fold((f32::MAX, f32::MIN), |(mn, mx), &v| (mn.min(v), mx.max(v)));
    let range = (max_d - min_d).max(1e-6);

    let values = bilinear_resample(&flat, ow, oh, spec.width, spec.height, min_d, range);
    match DepthGrid::from_normalized(spec.width, spec.height, values) {
        Ok(grid) => DepthOutcome::Measured(grid),
        Err(err) => fallback(FallbackReason::Parse(err.to_string())),
    }
}

/// Bilinear resample with on-the-fly min-max normalization, row-major
/// output of tw*th cells.
fn bilinear_resample(
    src: &[f32],
    sw: usize,
    sh: usize,
    tw: usize,
    th: usize,
    min_d: f32,
    range: f32,
) -> Vec<f32> {
    let (sx, sy) = (sw as f32 / tw as f32, sh as f32 / th as f32);
    let mut out = Vec::with_capacity(tw * th);

    for y in 0..th {
        for x in 0..tw {
            let (fx, fy) = (x as f32 * sx, y as f32 * sy);
            let (x0, y0) = (fx as usize, fy as usize);
            let (x1, y1) = ((x0 + 1).min(sw - 1), (y0 + 1).min(sh - 1));
            let (tx, ty) = (fx.fract(), fy.fract());

            let sample = |sx_: usize, sy_: usize| {
                let v = src.get(sy_ * sw + sx_).copied().unwrap_or(0.0);
                (v - min_d) / range
            };

            let v = sample(x0, y0) * (1.0 - tx) * (1.0 - ty)
                + sample(x1, y0) * tx * (1.0 - ty)
                + sample(x0, y1) * (1.0 - tx) * ty
                + sample(x1, y1) * tx * ty;
            out.push(v);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_serves_fallback() {
        let config = MidasConfig {
            model_path: PathBuf::from("/nonexistent/midas.onnx"),
            ..MidasConfig::default()
        };
        let img = DynamicImage::new_rgb8(8, 8);
        let outcome = estimate_depth(&img, &GridSpec::default(), &config);
        assert!(matches!(
            outcome,
            DepthOutcome::Fallback {
                reason: FallbackReason::ModelUnavailable,
                ..
            }
        ));
        assert_eq!(outcome.grid().len(), 1024);
    }

    #[test]
    fn resample_identity_on_constant_field() {
        let src = vec![3.0f32; 16];
        let out = bilinear_resample(&src, 4, 4, 8, 8, 0.0, 3.0);
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn resample_normalizes_range() {
        // Vertical gradient 0..3 over 4 rows.
        let src: Vec<f32> = (0..16).map(|i| (i / 4) as f32).collect();
        let out = bilinear_resample(&src, 4, 4, 4, 4, 0.0, 3.0);
        assert!(out.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(out[0], 0.0);
        assert_eq!(out[15], 1.0);
    }
}
