//! Challenge resolution pipeline - capability layer
//!
//! Turns one challenge image into best-effort recognized text: persist the
//! raw bytes to a job-namespaced temp artifact, apply a fixed deterministic
//! transform, recognize with an alphanumeric single-line configuration,
//! strip whitespace. No confidence score is surfaced; the caller judges
//! success from downstream page state only.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult, CaptchaError};

/// Characters the recognizer is constrained to
const CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Tesseract page segmentation mode: treat the image as a single text line
const PSM_SINGLE_LINE: i32 = 7;

/// Turns a challenge image into recognized text
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// `namespace` keys the temp artifacts; it must be unique per job and
    /// attempt so concurrent jobs never collide
    async fn solve(&self, image_bytes: &[u8], namespace: &str) -> AppResult<String>;
}

/// Tesseract-backed solver with the deterministic image transform
pub struct TesseractSolver {
    temp_dir: PathBuf,
    threshold: u8,
    enhanced: bool,
}

impl TesseractSolver {
    pub fn new(config: &Config) -> Self {
        Self {
            temp_dir: PathBuf::from(&config.captcha_temp_dir),
            threshold: config.captcha_threshold,
            enhanced: config.enhanced_captcha,
        }
    }

    /// Raw and processed artifact paths for one namespace
    fn artifact_paths(&self, namespace: &str) -> (PathBuf, PathBuf) {
        (
            self.temp_dir.join(format!("captcha-{}.png", namespace)),
            self.temp_dir
                .join(format!("captcha-{}-processed.png", namespace)),
        )
    }

    async fn recognize(
        &self,
        image_bytes: &[u8],
        raw_path: &Path,
        processed_path: &Path,
    ) -> AppResult<String> {
        fs::write(raw_path, image_bytes)
            .map_err(|e| AppError::artifact_io(raw_path.display().to_string(), e))?;

        let decoded = image::load_from_memory(image_bytes).map_err(|e| {
            AppError::Captcha(CaptchaError::ImageDecodeFailed {
                source: Box::new(e),
            })
        })?;
        let processed = preprocess(decoded, self.threshold, self.enhanced);
        processed
            .save(processed_path)
            .map_err(|e| AppError::artifact_io(processed_path.display().to_string(), e))?;

        let path = processed_path.to_string_lossy().into_owned();
        let recognized = tokio::task::spawn_blocking(move || {
            let image = rusty_tesseract::Image::from_path(&path)?;
            rusty_tesseract::image_to_string(&image, &ocr_args())
        })
        .await
        .map_err(AppError::recognition_failed)?
        .map_err(AppError::recognition_failed)?;

        let text: String = recognized.split_whitespace().collect();
        debug!("recognized challenge text: {}", text);
        Ok(text)
    }
}

#[async_trait]
impl ChallengeSolver for TesseractSolver {
    async fn solve(&self, image_bytes: &[u8], namespace: &str) -> AppResult<String> {
        fs::create_dir_all(&self.temp_dir)
            .map_err(|e| AppError::artifact_io(self.temp_dir.display().to_string(), e))?;
        let (raw_path, processed_path) = self.artifact_paths(namespace);

        let result = self.recognize(image_bytes, &raw_path, &processed_path).await;

        // Artifacts are removed on success and failure alike
        let _ = fs::remove_file(&raw_path);
        let _ = fs::remove_file(&processed_path);

        result
    }
}

fn ocr_args() -> rusty_tesseract::Args {
    rusty_tesseract::Args {
        lang: "eng".to_string(),
        config_variables: HashMap::from([(
            "tessedit_char_whitelist".to_string(),
            CHAR_WHITELIST.to_string(),
        )]),
        dpi: Some(150),
        psm: Some(PSM_SINGLE_LINE),
        oem: Some(3),
    }
}

/// Fixed deterministic transform: grayscale, then binarize at the luminance
/// threshold. The enhanced variant upscales, denoises and normalizes
/// contrast first.
fn preprocess(image: DynamicImage, threshold: u8, enhanced: bool) -> GrayImage {
    let image = if enhanced {
        image
            .resize_exact(image.width() * 3, image.height() * 3, FilterType::Lanczos3)
            .blur(0.7)
            .adjust_contrast(40.0)
    } else {
        image
    };
    let mut gray = image.into_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] >= threshold { 255 } else { 0 };
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let gray = GrayImage::from_fn(width, height, |x, y| {
            Luma([((x + y * width) * 255 / (width * height)) as u8])
        });
        DynamicImage::ImageLuma8(gray)
    }

    #[test]
    fn preprocess_binarizes_every_pixel() {
        let binary = preprocess(gradient_image(8, 8), 130, false);
        assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn preprocess_respects_the_threshold() {
        let gray = GrayImage::from_fn(2, 1, |x, _| if x == 0 { Luma([129]) } else { Luma([130]) });
        let binary = preprocess(DynamicImage::ImageLuma8(gray), 130, false);
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn enhanced_transform_upscales_three_times() {
        let binary = preprocess(gradient_image(10, 6), 130, true);
        assert_eq!((binary.width(), binary.height()), (30, 18));
    }

    #[test]
    fn artifact_paths_are_namespaced_and_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            captcha_temp_dir: dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        let solver = TesseractSolver::new(&config);

        let (raw_a, processed_a) = solver.artifact_paths("1-12345-678901-2024-00-a0");
        let (raw_b, processed_b) = solver.artifact_paths("2-00000-000000-2024-00-a0");
        assert_ne!(raw_a, raw_b);
        assert_ne!(processed_a, processed_b);
        assert!(raw_a.starts_with(dir.path()));
    }

    #[tokio::test]
    async fn artifacts_are_removed_when_decoding_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            captcha_temp_dir: dir.path().to_string_lossy().into_owned(),
            ..Config::default()
        };
        let solver = TesseractSolver::new(&config);

        let result = solver.solve(b"definitely not a png", "job-1-a0").await;
        assert!(result.is_err());

        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "temp artifacts must be cleaned up");
    }
}
