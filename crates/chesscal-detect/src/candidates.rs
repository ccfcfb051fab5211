use crate::params::DetectorParams;
use chess_corners::{find_chess_corners_image, ChessConfig, ThresholdMode};
use chesscal_core::{sample_bilinear, GrayImageView};
use image::GrayImage;
use log::debug;
use nalgebra::Point2;

const RING_SAMPLES: usize = 32;
const MIN_RING_CONTRAST: f32 = 24.0;

/// A saddle-point candidate produced by the ChESS detector.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Candidate {
    pub position: Point2<f32>,
    pub response: f32,
}

pub(crate) fn chess_config(params: &DetectorParams) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.threshold_mode = ThresholdMode::Relative;
    cfg.threshold_value = params.chess_threshold_rel;
    cfg.nms_radius = params.chess_nms_radius;
    cfg
}

/// Linear contrast stretch between the 1st and 99th intensity percentiles.
///
/// Images with (almost) no intensity spread are returned unchanged.
pub(crate) fn normalize_contrast(img: &GrayImage) -> GrayImage {
    let mut hist = [0usize; 256];
    for p in img.as_raw() {
        hist[*p as usize] += 1;
    }
    let total = img.as_raw().len();
    if total == 0 {
        return img.clone();
    }

    let percentile = |frac: f64| {
        let target = (total as f64 * frac).ceil() as usize;
        let mut acc = 0usize;
        for (v, count) in hist.iter().enumerate() {
            acc += count;
            if acc >= target.max(1) {
                return v as u8;
            }
        }
        255
    };
    let lo = percentile(0.01) as f32;
    let hi = percentile(0.99) as f32;
    if hi - lo < 1.0 {
        return img.clone();
    }

    let scale = 255.0 / (hi - lo);
    let mut out = img.clone();
    for p in out.iter_mut() {
        *p = ((*p as f32 - lo) * scale).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Run the ChESS detector and keep position + response of every corner.
///
/// A detector error yields no candidates, so the image is simply rejected.
pub(crate) fn extract_candidates(img: &GrayImage, params: &DetectorParams) -> Vec<Candidate> {
    let cfg = chess_config(params);
    let corners = match find_chess_corners_image(img, &cfg) {
        Ok(corners) => corners,
        Err(err) => {
            debug!("ChESS detection failed: {err}");
            return Vec::new();
        }
    };
    corners
        .iter()
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .map(|c| Candidate {
            position: Point2::new(c.x, c.y),
            response: c.response,
        })
        .collect()
}

/// `true` if the ring of radius `radius` around `p` alternates
/// dark/bright exactly four times, as around an X-junction.
///
/// Rejects L-shaped corners where the board meets its border, which also
/// produce a ChESS response but only two transitions.
pub(crate) fn is_saddle(img: &GrayImageView<'_>, p: Point2<f32>, radius: f32) -> bool {
    let ring: Vec<f32> = (0..RING_SAMPLES)
        .map(|i| {
            let a = i as f32 * std::f32::consts::TAU / RING_SAMPLES as f32;
            sample_bilinear(img, p.x + radius * a.cos(), p.y + radius * a.sin())
        })
        .collect();
    let lo = ring.iter().copied().fold(f32::INFINITY, f32::min);
    let hi = ring.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if hi - lo < MIN_RING_CONTRAST {
        return false;
    }

    let mid = 0.5 * (lo + hi);
    let bright: Vec<bool> = ring.iter().map(|v| *v > mid).collect();
    let transitions = (0..RING_SAMPLES)
        .filter(|&i| bright[i] != bright[(i + 1) % RING_SAMPLES])
        .count();
    transitions == 4
}
