/// Borrowed 8-bit grayscale image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Fetch with edge replication, so gradients near the border stay finite.
#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> f32 {
    let x = x.clamp(0, src.width as i32 - 1) as usize;
    let y = y.clamp(0, src.height as i32 - 1) as usize;
    src.data[y * src.width + x] as f32
}

#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if src.is_empty() {
        return 0.0;
    }
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0);
    let p10 = get_gray(src, x0 + 1, y0);
    let p01 = get_gray(src, x0, y0 + 1);
    let p11 = get_gray(src, x0 + 1, y0 + 1);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let data = [0u8, 100, 200, 255];
        let img = GrayImageView {
            width: 2,
            height: 2,
            data: &data,
        };
        assert_eq!(sample_bilinear(&img, 0.0, 0.0), 0.0);
        assert_eq!(sample_bilinear(&img, 0.5, 0.0), 50.0);
        assert_eq!(sample_bilinear(&img, 0.0, 0.5), 100.0);
        assert_relative_eq!(sample_bilinear(&img, 0.5, 0.5), 138.75, epsilon = 1e-4);
    }

    #[test]
    fn out_of_range_samples_replicate_the_border() {
        let data = [10u8, 20, 30, 40];
        let img = GrayImageView {
            width: 2,
            height: 2,
            data: &data,
        };
        assert_eq!(sample_bilinear(&img, -5.0, 0.0), 10.0);
        assert_eq!(sample_bilinear(&img, 7.0, 1.0), 40.0);
    }
}
