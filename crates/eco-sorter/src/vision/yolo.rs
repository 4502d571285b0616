//! YOLO detector exported to ONNX, used as a whole-image classifier

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::ArrayView3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::VisionConfig;
use crate::error::{Error, Result};

use super::category::{Prediction, WasteCategory};
use super::WasteClassifier;

/// Letterbox padding value
const PAD_VALUE: u8 = 114;

/// Number of box coordinates preceding the class scores in each output row
const BOX_ROWS: usize = 4;

/// Waste detector backed by ONNX Runtime
pub struct YoloClassifier {
    session: Arc<Mutex<Session>>,
    input_name: String,
    input_size: u32,
    conf_threshold: f32,
}

impl YoloClassifier {
    /// Load the exported weights at `config.model_path`
    pub fn load(config: &VisionConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(Error::ModelNotFound(config.model_path.display().to_string()));
        }

        tracing::info!("Loading waste detector from {}", config.model_path.display());

        let session = Session::builder()
            .map_err(|e| Error::vision(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::vision(format!("Failed to set optimization level: {}", e)))?
            .commit_from_file(&config.model_path)
            .map_err(|e| Error::vision(format!("Failed to load model: {}", e)))?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .unwrap_or_else(|| "images".to_string());

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            input_size: config.input_size.max(32),
            conf_threshold: config.conf_threshold,
        })
    }

    fn run(
        session: &Mutex<Session>,
        input_name: &str,
        input: Vec<f32>,
        input_size: u32,
        conf_threshold: f32,
    ) -> Result<Prediction> {
        let side = input_size as usize;
        let tensor = Tensor::from_array((vec![1, 3, side, side], input.into_boxed_slice()))
            .map_err(|e| Error::vision(format!("Input tensor creation failed: {}", e)))?;

        let mut session = session.lock();
        let outputs = session
            .run(vec![(input_name, tensor.into_dyn())])
            .map_err(|e| Error::vision(format!("Inference failed: {}", e)))?;

        let output = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| Error::vision("No output tensor"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::vision(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        decode_output(&dims, data, conf_threshold)
    }
}

#[async_trait]
impl WasteClassifier for YoloClassifier {
    async fn classify(&self, image_bytes: &[u8]) -> Result<Prediction> {
        if !is_supported_image(image_bytes) {
            return Err(Error::UnsupportedFileType(
                "only JPEG and PNG images are accepted".to_string(),
            ));
        }

        let session = self.session.clone();
        let input_name = self.input_name.clone();
        let input_size = self.input_size;
        let conf_threshold = self.conf_threshold;
        let bytes = image_bytes.to_vec();

        let prediction = tokio::task::spawn_blocking(move || {
            let input = preprocess(&bytes, input_size)?;
            Self::run(&session, &input_name, input, input_size, conf_threshold)
        })
        .await??;

        tracing::info!("Classified image: {}", prediction.describe());
        Ok(prediction)
    }

    fn name(&self) -> &str {
        "yolo-onnx"
    }
}

/// JPEG or PNG, judged from the magic bytes
pub fn is_supported_image(bytes: &[u8]) -> bool {
    matches!(
        image::guess_format(bytes),
        Ok(ImageFormat::Jpeg) | Ok(ImageFormat::Png)
    )
}

/// Decode, letterbox and lay out as normalised CHW floats
pub fn preprocess(bytes: &[u8], input_size: u32) -> Result<Vec<f32>> {
    let rgb = image::load_from_memory(bytes)
        .map_err(|e| Error::vision(format!("Failed to decode image: {}", e)))?
        .to_rgb8();
    Ok(to_chw(&letterbox(&rgb, input_size)))
}

/// Resize keeping the aspect ratio and centre on a grey square canvas
pub fn letterbox(image: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let scale = (size as f32 / w.max(1) as f32).min(size as f32 / h.max(1) as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    let x = (size - new_w) / 2;
    let y = (size - new_h) / 2;
    imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
    canvas
}

/// `[3, H, W]` planes scaled to `[0, 1]`
pub fn to_chw(image: &RgbImage) -> Vec<f32> {
    let (w, h) = image.dimensions();
    let plane = (w * h) as usize;
    let mut out = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in image.enumerate_pixels() {
        let idx = (y * w + x) as usize;
        for c in 0..3 {
            out[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
    }
    out
}

/// Pick the best-scoring class over all anchors of a `[1, 4 + classes, anchors]`
/// output
pub fn decode_output(shape: &[usize], data: &[f32], conf_threshold: f32) -> Result<Prediction> {
    let &[batch, rows, anchors] = shape else {
        return Err(Error::vision(format!("Unexpected output shape {:?}", shape)));
    };

    let classes = rows.saturating_sub(BOX_ROWS);
    if batch != 1 || classes == 0 || classes > WasteCategory::ALL.len() {
        return Err(Error::vision(format!("Unexpected output shape {:?}", shape)));
    }

    let view = ArrayView3::from_shape((batch, rows, anchors), data)
        .map_err(|e| Error::vision(format!("Output size mismatch: {}", e)))?;

    let mut best: Option<(usize, f32)> = None;
    for anchor in 0..anchors {
        for class in 0..classes {
            let score = view[[0, BOX_ROWS + class, anchor]];
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((class, score));
            }
        }
    }

    match best {
        Some((class, score)) if score >= conf_threshold => WasteCategory::from_index(class)
            .map(|category| Prediction::new(category, score))
            .ok_or_else(|| Error::vision(format!("Unknown class index {}", class))),
        _ => Ok(Prediction::none()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    /// `[1, 11, anchors]` output with one class score set per anchor
    fn output(anchors: usize, scores: &[(usize, usize, f32)]) -> Vec<f32> {
        let mut data = vec![0.0f32; 11 * anchors];
        for &(anchor, class, score) in scores {
            data[(BOX_ROWS + class) * anchors + anchor] = score;
        }
        data
    }

    #[test]
    fn test_decode_picks_highest_score() {
        let data = output(3, &[(0, 5, 0.6), (2, 2, 0.91), (1, 0, 0.4)]);
        let prediction = decode_output(&[1, 11, 3], &data, 0.5).unwrap();
        assert_eq!(prediction.category, Some(WasteCategory::Glass));
        assert!((prediction.confidence - 0.91).abs() < 1e-6);
        assert!(prediction.detected);
    }

    #[test]
    fn test_decode_below_threshold_is_none() {
        let data = output(2, &[(0, 1, 0.3), (1, 3, 0.49)]);
        let prediction = decode_output(&[1, 11, 2], &data, 0.5).unwrap();
        assert_eq!(prediction, Prediction::none());

        // Threshold is inclusive
        let data = output(1, &[(0, 4, 0.5)]);
        let prediction = decode_output(&[1, 11, 1], &data, 0.5).unwrap();
        assert_eq!(prediction.category, Some(WasteCategory::Paper));
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(decode_output(&[1, 11], &[], 0.5).is_err());
        assert!(decode_output(&[1, 4, 2], &[0.0; 8], 0.5).is_err());
        assert!(decode_output(&[1, 11, 2], &[0.0; 5], 0.5).is_err());
    }

    #[test]
    fn test_letterbox_pads_with_grey() {
        let image = RgbImage::from_pixel(200, 100, Rgb([255, 0, 0]));
        let boxed = letterbox(&image, 64);
        assert_eq!(boxed.dimensions(), (64, 64));
        assert_eq!(boxed.get_pixel(32, 2), &Rgb([PAD_VALUE; 3]));
        assert_eq!(boxed.get_pixel(32, 32), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_chw_layout() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, Rgb([255, 51, 0]));
        let chw = to_chw(&image);
        assert_eq!(chw.len(), 6);
        assert_eq!(chw[1], 1.0);
        assert!((chw[3] - 0.2).abs() < 1e-6);
        assert_eq!(chw[5], 0.0);
    }

    #[test]
    fn test_supported_image_types() {
        let mut png = Vec::new();
        RgbImage::new(4, 4)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        assert!(is_supported_image(&png));
        assert!(!is_supported_image(b"GIF89a..."));
        assert_eq!(preprocess(&png, 32).unwrap().len(), 3 * 32 * 32);
    }

    #[test]
    fn test_missing_model() {
        let config = VisionConfig {
            model_path: PathBuf::from("/nonexistent/best.onnx"),
            ..VisionConfig::default()
        };
        assert!(matches!(YoloClassifier::load(&config), Err(Error::ModelNotFound(_))));
    }
}
