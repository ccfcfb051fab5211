use image::{GrayImage, Luma};

/// Reference board preview for a board with `width x height` inner corners.
///
/// One pixel per square: `(width + 1) x (height + 1)` squares, black where
/// `row + col` is even. Dimensions are taken by absolute value and anything
/// below 2 falls back to 3 squares.
pub fn generate_board_image(width: i32, height: i32) -> GrayImage {
    let squares = |n: i32| {
        let n = n.unsigned_abs();
        if n >= 2 {
            n + 1
        } else {
            3
        }
    };
    GrayImage::from_fn(squares(width), squares(height), |c, r| {
        if (r + c) % 2 == 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_image_has_one_pixel_per_square() {
        let img = generate_board_image(7, 6);
        assert_eq!(img.dimensions(), (8, 7));
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn degenerate_sizes_fall_back_to_three_squares() {
        assert_eq!(generate_board_image(1, 0).dimensions(), (3, 3));
        assert_eq!(generate_board_image(-4, 1).dimensions(), (5, 3));
    }
}
