//! Screenshot comparison for visual state verification.
//!
//! Two strategies: exact pixel diffing for static pages, and a grayscale
//! SSIM (structural similarity) for pages whose content varies but whose
//! layout should not. Comparison results are data; only undecodable input
//! shows up in the error field.

use std::path::Path;

use image::{imageops, DynamicImage, GrayImage, RgbaImage};
use serde::Serialize;
use tracing::debug;

/// How to compare two screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMethod {
    /// Pick per state: SSIM for form-heavy states, pixel diff otherwise.
    Auto,
    PixelDiff,
    Ssim,
}

/// Structured comparison outcome.
#[derive(Debug, Clone, Serialize)]
pub struct VisualComparison {
    pub matched: bool,
    pub similarity: f64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image_path: Option<String>,
}

impl VisualComparison {
    pub fn failed(error: String) -> Self {
        Self {
            matched: false,
            similarity: 0.0,
            method: "none".to_string(),
            error: Some(error),
            diff_image_path: None,
        }
    }
}

/// Compare two PNG byte buffers. Differing dimensions are resized to the
/// reference before comparison. A diff image is written only when the
/// comparison ran and did not match.
pub fn compare_png(
    reference: &[u8],
    actual: &[u8],
    method: CompareMethod,
    threshold: f64,
    diff_out: Option<&Path>,
) -> VisualComparison {
    let reference = match image::load_from_memory(reference) {
        Ok(img) => img,
        Err(err) => return VisualComparison::failed(format!("cannot decode reference: {err}")),
    };
    let actual = match image::load_from_memory(actual) {
        Ok(img) => img,
        Err(err) => return VisualComparison::failed(format!("cannot decode screenshot: {err}")),
    };

    let (width, height) = (reference.width(), reference.height());
    let actual = if actual.width() != width || actual.height() != height {
        debug!(
            reference = format!("{width}x{height}"),
            actual = format!("{}x{}", actual.width(), actual.height()),
            "resizing screenshot to reference dimensions"
        );
        actual.resize_exact(width, height, imageops::FilterType::Triangle)
    } else {
        actual
    };

    let method = match method {
        // Auto resolution happens in the caller; default to pixels here.
        CompareMethod::Auto => CompareMethod::PixelDiff,
        chosen => chosen,
    };

    let (similarity, method_name) = match method {
        CompareMethod::Ssim => (ssim(&reference.to_luma8(), &actual.to_luma8()), "ssim"),
        _ => (pixel_similarity(&reference.to_rgba8(), &actual.to_rgba8()), "pixel_diff"),
    };

    let matched = similarity >= threshold;
    let mut diff_image_path = None;
    if !matched {
        if let Some(path) = diff_out {
            if write_diff_image(&reference, &actual, path).is_ok() {
                diff_image_path = Some(path.display().to_string());
            }
        }
    }

    VisualComparison {
        matched,
        similarity,
        method: method_name.to_string(),
        error: None,
        diff_image_path,
    }
}

/// Fraction of pixels that are (nearly) identical.
fn pixel_similarity(reference: &RgbaImage, actual: &RgbaImage) -> f64 {
    let total = (reference.width() * reference.height()) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let mut same = 0u64;
    for (a, b) in reference.pixels().zip(actual.pixels()) {
        let close = a
            .0
            .iter()
            .zip(b.0.iter())
            .all(|(x, y)| x.abs_diff(*y) <= 2);
        if close {
            same += 1;
        }
    }
    same as f64 / total
}

/// Mean SSIM over 8x8 windows of the grayscale images.
fn ssim(reference: &GrayImage, actual: &GrayImage) -> f64 {
    const WINDOW: u32 = 8;
    const C1: f64 = 6.5025; // (0.01 * 255)^2
    const C2: f64 = 58.5225; // (0.03 * 255)^2

    let width = reference.width();
    let height = reference.height();
    if width < WINDOW || height < WINDOW {
        return pixel_similarity_gray(reference, actual);
    }

    let mut total = 0.0;
    let mut windows = 0u64;
    let mut y = 0;
    while y + WINDOW <= height {
        let mut x = 0;
        while x + WINDOW <= width {
            total += window_ssim(reference, actual, x, y, WINDOW, C1, C2);
            windows += 1;
            x += WINDOW;
        }
        y += WINDOW;
    }
    if windows == 0 {
        0.0
    } else {
        total / windows as f64
    }
}

fn window_ssim(
    reference: &GrayImage,
    actual: &GrayImage,
    x0: u32,
    y0: u32,
    window: u32,
    c1: f64,
    c2: f64,
) -> f64 {
    let n = (window * window) as f64;
    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for dy in 0..window {
        for dx in 0..window {
            sum_a += reference.get_pixel(x0 + dx, y0 + dy).0[0] as f64;
            sum_b += actual.get_pixel(x0 + dx, y0 + dy).0[0] as f64;
        }
    }
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut covariance = 0.0;
    for dy in 0..window {
        for dx in 0..window {
            let a = reference.get_pixel(x0 + dx, y0 + dy).0[0] as f64 - mean_a;
            let b = actual.get_pixel(x0 + dx, y0 + dy).0[0] as f64 - mean_b;
            var_a += a * a;
            var_b += b * b;
            covariance += a * b;
        }
    }
    var_a /= n - 1.0;
    var_b /= n - 1.0;
    covariance /= n - 1.0;

    ((2.0 * mean_a * mean_b + c1) * (2.0 * covariance + c2))
        / ((mean_a * mean_a + mean_b * mean_b + c1) * (var_a + var_b + c2))
}

fn pixel_similarity_gray(reference: &GrayImage, actual: &GrayImage) -> f64 {
    let total = (reference.width() * reference.height()) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let same = reference
        .pixels()
        .zip(actual.pixels())
        .filter(|(a, b)| a.0[0].abs_diff(b.0[0]) <= 2)
        .count();
    same as f64 / total
}

/// Highlight differing pixels in red over a dimmed reference.
fn write_diff_image(
    reference: &DynamicImage,
    actual: &DynamicImage,
    path: &Path,
) -> image::ImageResult<()> {
    let reference = reference.to_rgba8();
    let actual = actual.to_rgba8();
    let mut diff = RgbaImage::new(reference.width(), reference.height());
    for (x, y, pixel) in diff.enumerate_pixels_mut() {
        let a = reference.get_pixel(x, y);
        let b = actual.get_pixel(x, y);
        let differs = a.0.iter().zip(b.0.iter()).any(|(x, y)| x.abs_diff(*y) > 2);
        *pixel = if differs {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([a.0[0] / 3, a.0[1] / 3, a.0[2] / 3, 255])
        };
    }
    diff.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image.clone())
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn identical_images_match() {
        let img = png_bytes(&solid(16, 16, [120, 130, 140]));
        let result = compare_png(&img, &img, CompareMethod::PixelDiff, 0.99, None);
        assert!(result.matched);
        assert_eq!(result.similarity, 1.0);
        assert_eq!(result.method, "pixel_diff");
        assert!(result.diff_image_path.is_none());
    }

    #[test]
    fn different_images_mismatch_with_diff_file() {
        let dir = tempfile::tempdir().unwrap();
        let diff_path = dir.path().join("diff.png");
        let a = png_bytes(&solid(16, 16, [0, 0, 0]));
        let b = png_bytes(&solid(16, 16, [255, 255, 255]));
        let result = compare_png(&a, &b, CompareMethod::PixelDiff, 0.99, Some(&diff_path));
        assert!(!result.matched);
        assert!(result.error.is_none());
        assert!(diff_path.exists());
        assert_eq!(result.diff_image_path.as_deref(), Some(diff_path.to_str().unwrap()));
    }

    #[test]
    fn ssim_identical_is_one() {
        let img = png_bytes(&solid(32, 32, [90, 90, 90]));
        let result = compare_png(&img, &img, CompareMethod::Ssim, 0.95, None);
        assert!(result.matched);
        assert!((result.similarity - 1.0).abs() < 1e-6);
        assert_eq!(result.method, "ssim");
    }

    #[test]
    fn ssim_tolerates_small_shifts_better_than_pixels() {
        let mut base = solid(32, 32, [40, 40, 40]);
        for y in 8..24 {
            for x in 8..24 {
                base.put_pixel(x, y, image::Rgba([200, 200, 200, 255]));
            }
        }
        let mut brighter = base.clone();
        for pixel in brighter.pixels_mut() {
            pixel.0[0] = pixel.0[0].saturating_add(10);
            pixel.0[1] = pixel.0[1].saturating_add(10);
            pixel.0[2] = pixel.0[2].saturating_add(10);
        }
        let a = png_bytes(&base);
        let b = png_bytes(&brighter);
        let pixels = compare_png(&a, &b, CompareMethod::PixelDiff, 0.5, None);
        let structural = compare_png(&a, &b, CompareMethod::Ssim, 0.5, None);
        assert!(structural.similarity > pixels.similarity);
    }

    #[test]
    fn mismatched_dimensions_are_resized() {
        let a = png_bytes(&solid(16, 16, [10, 10, 10]));
        let b = png_bytes(&solid(32, 32, [10, 10, 10]));
        let result = compare_png(&a, &b, CompareMethod::PixelDiff, 0.9, None);
        assert!(result.matched);
    }

    #[test]
    fn undecodable_input_reports_error() {
        let result = compare_png(b"not a png", b"also not", CompareMethod::PixelDiff, 0.9, None);
        assert!(!result.matched);
        assert!(result.error.is_some());
    }
}
