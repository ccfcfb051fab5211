use chesscal_core::{BoardSize, CornerSet, ImageSize};
use chesscal_coverage::{coverage_area, coverage_percent, select};
use nalgebra::Point2;

/// Slightly skewed 7x6 board, as seen by a camera.
fn view(x0: f32, y0: f32, step: f32, shear: f32) -> CornerSet {
    let pts = (0..6)
        .flat_map(|r| {
            (0..7).map(move |c| {
                Point2::new(
                    x0 + step * c as f32 + shear * r as f32,
                    y0 + step * r as f32,
                )
            })
        })
        .collect();
    CornerSet::from_detection(BoardSize::new(7, 6), pts, ImageSize::new(640, 480))
}

#[test]
fn selected_views_cover_the_frame_corners() {
    // A cluster of near-duplicate central views plus one view per quadrant.
    let mut pool: Vec<CornerSet> = (0..6)
        .map(|i| view(250.0 + i as f32, 180.0 + i as f32, 20.0, 1.0))
        .collect();
    pool.push(view(10.0, 10.0, 25.0, 2.0));
    pool.push(view(440.0, 10.0, 25.0, -2.0));
    pool.push(view(10.0, 320.0, 25.0, 2.0));
    pool.push(view(440.0, 320.0, 25.0, -2.0));

    let chosen = select(&pool, 4);
    assert_eq!(chosen.len(), 4);
    for quadrant in &pool[6..] {
        assert!(chosen.contains(quadrant));
    }

    let all = coverage_area(&pool);
    let picked = coverage_area(&chosen);
    assert!(picked <= all + 1e-6);
    assert!(coverage_percent(&chosen, ImageSize::new(640, 480)) > 20.0);
}
