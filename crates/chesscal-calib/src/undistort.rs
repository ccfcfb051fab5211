use crate::intrinsics::Intrinsics;
use crate::result::CalibrationResult;
use chesscal_core::CornerSet;
use image::{DynamicImage, ImageBuffer, Pixel};
use log::{debug, warn};
use nalgebra::Point2;
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Per-pixel lookup from the undistorted output image into the distorted
/// source image. The output keeps the calibrated camera matrix.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    width: u32,
    height: u32,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl UndistortMap {
    pub fn new(intrinsics: &Intrinsics, width: u32, height: u32) -> Self {
        let (fx, fy) = (intrinsics.fx(), intrinsics.fy());
        let (cx, cy) = (intrinsics.cx(), intrinsics.cy());
        let n = width as usize * height as usize;
        let mut map_x = Vec::with_capacity(n);
        let mut map_y = Vec::with_capacity(n);
        for v in 0..height {
            for u in 0..width {
                let x = (u as f64 - cx) / fx;
                let y = (v as f64 - cy) / fy;
                let p = intrinsics.normalized_to_pixel(x, y);
                map_x.push(p.x as f32);
                map_y.push(p.y as f32);
            }
        }
        Self {
            width,
            height,
            map_x,
            map_y,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Source position sampled for output pixel (`x`, `y`).
    pub fn source(&self, x: u32, y: u32) -> Option<Point2<f32>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.width as usize + x as usize;
        Some(Point2::new(self.map_x[i], self.map_y[i]))
    }

    /// Bilinear remap of `src`. Samples outside the source are black.
    ///
    /// Works on any channel layout and on 8-bit, 16-bit and float
    /// subpixels; the output has the type of `src`. `src` must have the
    /// dimensions the map was built for; otherwise a copy is returned.
    pub fn remap<P>(&self, src: &ImageBuffer<P, Vec<P::Subpixel>>) -> ImageBuffer<P, Vec<P::Subpixel>>
    where
        P: Pixel + Send + Sync,
        P::Subpixel: Sample + Send + Sync,
    {
        if src.dimensions() != (self.width, self.height) || self.width == 0 || self.height == 0 {
            return src.clone();
        }
        let channels = P::CHANNEL_COUNT as usize;
        let (w, h) = (self.width as usize, self.height as usize);
        let raw: &[P::Subpixel] = src.as_raw();
        let tap = |x: i64, y: i64, c: usize| -> f32 {
            if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
                0.0
            } else {
                raw[(y as usize * w + x as usize) * channels + c].to_f32()
            }
        };

        let mut out = vec![P::Subpixel::from_f32(0.0); w * h * channels];
        out.par_chunks_mut(w * channels)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..w {
                    let i = y * w + x;
                    let (sx, sy) = (self.map_x[i], self.map_y[i]);
                    if !sx.is_finite() || !sy.is_finite() {
                        continue;
                    }
                    let (x0, y0) = (sx.floor(), sy.floor());
                    let (fx, fy) = (sx - x0, sy - y0);
                    let (x0, y0) = (x0 as i64, y0 as i64);
                    for c in 0..channels {
                        let a = tap(x0, y0, c) + fx * (tap(x0 + 1, y0, c) - tap(x0, y0, c));
                        let b = tap(x0, y0 + 1, c) + fx * (tap(x0 + 1, y0 + 1, c) - tap(x0, y0 + 1, c));
                        row[x * channels + c] = P::Subpixel::from_f32(a + fy * (b - a));
                    }
                }
            });

        ImageBuffer::from_raw(self.width, self.height, out).unwrap_or_else(|| src.clone())
    }
}

/// Subpixel types the undistortion remap can interpolate.
pub trait Sample: Copy {
    fn to_f32(self) -> f32;
    /// Rounds and saturates for integer types.
    fn from_f32(v: f32) -> Self;
}

impl Sample for u8 {
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(v: f32) -> Self {
        v.round().clamp(0.0, u8::MAX as f32) as u8
    }
}

impl Sample for u16 {
    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(v: f32) -> Self {
        v.round().clamp(0.0, u16::MAX as f32) as u16
    }
}

impl Sample for f32 {
    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(v: f32) -> Self {
        v
    }
}

/// Remove lens distortion from `image` using a fitted calibration.
///
/// The map is built for the image's own size, so frames at another
/// resolution than the calibration views are still handled. A failed
/// calibration returns the image unchanged.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip(image, calibration), fields(width = image.width(), height = image.height())))]
pub fn undistort(image: &DynamicImage, calibration: &CalibrationResult) -> DynamicImage {
    if !calibration.success {
        return image.clone();
    }
    let map = UndistortMap::new(&calibration.intrinsics, image.width(), image.height());
    debug!("undistorting {}x{} image", image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(img) => DynamicImage::ImageLuma8(map.remap(img)),
        DynamicImage::ImageLumaA8(img) => DynamicImage::ImageLumaA8(map.remap(img)),
        DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(map.remap(img)),
        DynamicImage::ImageRgba8(img) => DynamicImage::ImageRgba8(map.remap(img)),
        DynamicImage::ImageLuma16(img) => DynamicImage::ImageLuma16(map.remap(img)),
        DynamicImage::ImageLumaA16(img) => DynamicImage::ImageLumaA16(map.remap(img)),
        DynamicImage::ImageRgb16(img) => DynamicImage::ImageRgb16(map.remap(img)),
        DynamicImage::ImageRgba16(img) => DynamicImage::ImageRgba16(map.remap(img)),
        DynamicImage::ImageRgb32F(img) => DynamicImage::ImageRgb32F(map.remap(img)),
        DynamicImage::ImageRgba32F(img) => DynamicImage::ImageRgba32F(map.remap(img)),
        other => {
            warn!("unsupported pixel layout {:?}, undistorting as RGBA float", other.color());
            DynamicImage::ImageRgba32F(map.remap(&other.to_rgba32f()))
        }
    }
}

/// Copy of `corner_set` with radial distortion removed from its image points.
///
/// Invalid sets are returned unchanged.
pub fn undistort_corner_set(corner_set: &CornerSet, intrinsics: &Intrinsics) -> CornerSet {
    if !corner_set.is_valid() {
        return corner_set.clone();
    }
    corner_set.map_image_corners(|p| {
        let u = intrinsics.undistort_pixel(Point2::new(p.x as f64, p.y as f64));
        Point2::new(u.x as f32, u.y as f32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::RadialDistortion;
    use chesscal_core::{BoardSize, ImageSize};
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage, Rgba};

    fn gradient() -> GrayImage {
        GrayImage::from_fn(64, 48, |x, y| Luma([(x * 3 + y) as u8]))
    }

    fn solved(distortion: RadialDistortion) -> CalibrationResult {
        CalibrationResult {
            intrinsics: Intrinsics::new(60.0, 60.0, 32.0, 24.0, distortion),
            reprojection_error: 0.1,
            source_image_size: ImageSize::new(64, 48),
            success: true,
            ..Default::default()
        }
    }

    #[test]
    fn failed_calibration_is_identity() {
        let img = DynamicImage::ImageLuma8(gradient());
        let mut cal = solved(RadialDistortion::new(-0.3, 0.0, 0.0));
        cal.success = false;
        assert_eq!(undistort(&img, &cal), img);
    }

    #[test]
    fn zero_distortion_is_identity() {
        let img = DynamicImage::ImageLuma8(gradient());
        let out = undistort(&img, &solved(RadialDistortion::default()));
        assert_eq!(out, img);
    }

    #[test]
    fn deep_and_float_frames_keep_their_color_type() {
        let cal = solved(RadialDistortion::default());

        let rgb16: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_fn(32, 20, |x, y| Rgb([x as u16 * 1000, y as u16 * 3000, 65535]));
        let img = DynamicImage::ImageRgb16(rgb16);
        let out = undistort(&img, &cal);
        assert_eq!(out.color(), img.color());
        assert_eq!(out, img);

        let luma16 = DynamicImage::ImageLuma16(ImageBuffer::from_fn(32, 20, |x, _| Luma([x as u16 * 2000])));
        assert_eq!(undistort(&luma16, &cal), luma16);

        let rgba32f: ImageBuffer<Rgba<f32>, Vec<f32>> =
            ImageBuffer::from_fn(32, 20, |x, y| Rgba([x as f32 / 32.0, y as f32 / 20.0, 0.25, 1.0]));
        let img = DynamicImage::ImageRgba32F(rgba32f);
        let out = undistort(&img, &cal);
        assert_eq!(out.color(), img.color());
        let (a, b) = (out.to_rgba32f(), img.to_rgba32f());
        for (p, q) in a.as_raw().iter().zip(b.as_raw()) {
            assert!((p - q).abs() < 1e-5);
        }
    }

    #[test]
    fn distorted_rgb16_stays_sixteen_bit() {
        let img = DynamicImage::ImageRgb16(ImageBuffer::from_pixel(32, 20, Rgb([40000u16, 1, 2])));
        let out = undistort(&img, &solved(RadialDistortion::new(-0.1, 0.0, 0.0)));
        assert!(matches!(out, DynamicImage::ImageRgb16(_)));
        // The centre samples the interior, so the 16-bit value survives.
        assert_eq!(out.as_rgb16().map(|b| b.get_pixel(16, 10)[0]), Some(40000));
    }

    #[test]
    fn barrel_map_pulls_samples_towards_the_centre() {
        let cal = solved(RadialDistortion::new(-0.2, 0.0, 0.0));
        let map = UndistortMap::new(&cal.intrinsics, 64, 48);
        let centre = map.source(32, 24).expect("inside");
        assert!((centre.x - 32.0).abs() < 1e-4 && (centre.y - 24.0).abs() < 1e-4);
        let corner = map.source(0, 0).expect("inside");
        assert!(corner.x > 0.0 && corner.y > 0.0);
        assert!(map.source(64, 0).is_none());
    }

    #[test]
    fn map_follows_the_frame_size_not_the_calibration_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 20, image::Rgb([10, 20, 30])));
        let out = undistort(&img, &solved(RadialDistortion::new(-0.1, 0.0, 0.0)));
        assert_eq!((out.width(), out.height()), (32, 20));
    }

    #[test]
    fn corner_points_are_undistorted() {
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0, RadialDistortion::new(-0.2, 0.05, 0.0));
        let ideal = [Point2::new(100.0f64, 80.0), Point2::new(500.0, 400.0), Point2::new(320.0, 240.0), Point2::new(600.0, 50.0)];
        let distorted: Vec<Point2<f32>> = ideal
            .iter()
            .map(|p| {
                let d = k.normalized_to_pixel((p.x - 320.0) / 500.0, (p.y - 240.0) / 500.0);
                Point2::new(d.x as f32, d.y as f32)
            })
            .collect();
        let set = CornerSet::from_detection(BoardSize::new(2, 2), distorted, ImageSize::new(640, 480));

        let fixed = undistort_corner_set(&set, &k);
        assert!(fixed.is_valid());
        for (got, want) in fixed.image_corners().iter().zip(&ideal) {
            assert!((got.x as f64 - want.x).abs() < 1e-2);
            assert!((got.y as f64 - want.y).abs() < 1e-2);
        }

        let invalid = CornerSet::invalid(BoardSize::new(2, 2));
        assert_eq!(undistort_corner_set(&invalid, &k), invalid);
    }
}
