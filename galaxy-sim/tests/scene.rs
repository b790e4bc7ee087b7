//! Scene descriptions and postage stamps.

use approx::assert_relative_eq;
use galaxy_sim::{
    draw, Bounds, Image, ImageSize, Kolmogorov, Profile, RenderGrid, RenderOptions, SceneConfig,
    SurfaceBrightness,
};
use test_helpers::read_data;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fixture() -> SceneConfig {
    SceneConfig::from_json_str(&read_data("scene.json")).expect("fixture parses")
}

#[test]
fn test_fixture_builds() {
    init_logging();
    let setup = fixture().build().unwrap();
    assert_eq!(setup.grid.size(), ImageSize::square(64));
    assert_eq!(setup.grid.offset(), (0.3, -0.2));
    assert_eq!(setup.seed, 8241573);
    assert!(setup.noise.is_some());
    assert_relative_eq!(setup.scene.galaxy().flux(), 5000.0, max_relative = 1e-12);
    assert_relative_eq!(setup.scene.psf().flux(), 1.0, max_relative = 1e-12);
}

#[test]
fn test_fixture_renders_reproducibly() {
    init_logging();
    let setup = fixture().build().unwrap();
    let first = setup.render().unwrap();
    let second = setup.render().unwrap();
    assert_eq!(first, second);

    let size = ImageSize::square(64);
    assert_eq!(first.galaxy.image.size(), size);
    assert_eq!(first.psf.image.size(), size);
    assert_relative_eq!(first.galaxy.expected_flux, 5000.0, max_relative = 1e-12);
    assert_relative_eq!(first.psf.image.sum(), 1.0, max_relative = 0.03);

    // The noisy image keeps its sky pedestal.
    let sky_per_pixel = (first.galaxy.image.sum() - 5000.0) / size.pixel_count() as f64;
    assert_relative_eq!(sky_per_pixel, 120.0, max_relative = 0.01);
}

#[test]
fn test_seed_changes_noise_only() {
    let mut config = fixture();
    let a = config.build().unwrap().render().unwrap();
    config.image.random_seed += 1;
    let b = config.build().unwrap().render().unwrap();
    assert_ne!(a.galaxy.image, b.galaxy.image);
    assert_eq!(a.psf.image, b.psf.image);
}

#[test]
fn test_noiseless_description() {
    let mut config = fixture();
    config.image.noise = None;
    let setup = config.build().unwrap();
    let images = setup.render().unwrap();
    assert!(images.galaxy.image.array().iter().all(|&v| v >= -1e-6));
    assert!(images.galaxy.image.sum() < 5000.0 * (1.0 + 1e-3));
}

/// Stamp centers on a frame, including one hanging off the edge.
const POSITIONS: [(f64, f64); 4] = [(30.3, 40.7), (85.5, 20.1), (60.0, 90.45), (118.2, 5.6)];

#[test]
fn test_psf_stamps_accumulate_at_subpixel_positions() {
    init_logging();
    let pixel_scale = 0.3;
    let stamp_size = 25;
    let psf: Profile = Kolmogorov::new(0.9, 1000.0).unwrap().into();
    let frame_bounds = Bounds::from_size(ImageSize::square(120)).unwrap();
    let mut frame = Image::new(ImageSize::square(120)).unwrap();
    let mut expected_total = 0.0;

    for &(x, y) in POSITIONS.iter() {
        let ix = (x + 0.5).floor() as i64;
        let iy = (y + 0.5).floor() as i64;
        let grid = RenderGrid::square(stamp_size, pixel_scale)
            .unwrap()
            .with_offset(x - ix as f64, y - iy as f64)
            .unwrap();
        let mut stamp = draw(&psf, &grid, &RenderOptions::default()).unwrap().image;
        stamp.set_center(ix, iy);
        assert_eq!(stamp.true_center(), (ix as f64, iy as f64));

        let overlap = frame.add_stamp(&stamp).expect("stamp overlaps the frame");
        let fully_inside = frame_bounds.intersection(stamp.bounds()) == Some(*stamp.bounds());
        if fully_inside {
            assert_eq!(overlap, *stamp.bounds());
        } else {
            assert!(overlap.width() < stamp_size || overlap.height() < stamp_size);
        }

        let b = *stamp.bounds();
        let (mut sx, mut sy, mut total) = (0.0, 0.0, 0.0);
        for py in b.ymin..=b.ymax {
            for px in b.xmin..=b.xmax {
                let v = stamp.get(px, py).unwrap();
                sx += px as f64 * v;
                sy += py as f64 * v;
                total += v;
                if overlap.contains(px, py) {
                    expected_total += v;
                }
            }
        }
        assert_relative_eq!(sx / total, x, epsilon = 0.05);
        assert_relative_eq!(sy / total, y, epsilon = 0.05);
    }

    assert_relative_eq!(frame.sum(), expected_total, max_relative = 1e-12);
    assert!(frame.get(30, 41).unwrap() > frame.get(30, 60).unwrap());
}
