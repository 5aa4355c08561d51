/// Face embedder backed by two ONNX Runtime sessions: a BlazeFace-style
/// detector that locates the most prominent face, and an ArcFace-style
/// encoder that turns the crop into an L2-normalized embedding.
///
/// Both sessions are explicitly constructed from resolved model paths;
/// there is no global model state, so tests and callers control the
/// lifecycle.
use std::path::Path;

use crate::embedder::domain::face_embedder::FaceEmbedder;
use crate::shared::embedding::Embedding;
use crate::shared::frame::Frame;

/// Detector input resolution.
const DETECTOR_INPUT_SIZE: usize = 128;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Encoder input resolution.
const ENCODER_INPUT_SIZE: usize = 112;

/// Encoder pixel normalization: `(value - 127.5) / 127.5`.
const ENCODER_NORM_MEAN: f32 = 127.5;
const ENCODER_NORM_STD: f32 = 127.5;

/// Default detection confidence below which a frame counts as faceless.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Margin added around the detected box before encoding; recognition
/// models expect some forehead/chin context the tight box cuts off.
const CROP_MARGIN: f64 = 0.2;

pub struct OnnxFaceEmbedder {
    detector: ort::session::Session,
    encoder: ort::session::Session,
    anchors: Vec<[f32; 2]>,
    confidence: f64,
    dimension: usize,
}

impl OnnxFaceEmbedder {
    pub fn new(
        detector_path: &Path,
        encoder_path: &Path,
        confidence: f64,
        dimension: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let detector = ort::session::Session::builder()?.commit_from_file(detector_path)?;
        let encoder = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(encoder_path)?;
        Ok(Self {
            detector,
            encoder,
            anchors: generate_anchors(),
            confidence,
            dimension,
        })
    }

    /// Highest-confidence face box in frame coordinates, or `None`.
    fn detect_best(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<FaceBox>, Box<dyn std::error::Error>> {
        let input = detector_preprocess(frame, DETECTOR_INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.detector.run(ort::inputs![input_value])?;

        // BlazeFace emits regressors [1, 896, 16] and scores [1, 896, 1].
        if outputs.len() < 2 {
            return Err(format!(
                "detector model expected 2 outputs, got {}",
                outputs.len()
            )
            .into());
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        let mut best: Option<FaceBox> = None;

        let num_anchors = self.anchors.len().min(NUM_ANCHORS);
        for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
            let score = sigmoid(raw_score) as f64;
            if score < self.confidence {
                continue;
            }
            if best.as_ref().is_some_and(|b| b.score >= score) {
                continue;
            }

            let reg_offset = i * 16;
            if reg_offset + 4 > reg_data.len() {
                break;
            }

            // Box center + size relative to the anchor, in unit coordinates.
            let anchor = &self.anchors[i];
            let cx = anchor[0] + reg_data[reg_offset] / DETECTOR_INPUT_SIZE as f32;
            let cy = anchor[1] + reg_data[reg_offset + 1] / DETECTOR_INPUT_SIZE as f32;
            let w = reg_data[reg_offset + 2] / DETECTOR_INPUT_SIZE as f32;
            let h = reg_data[reg_offset + 3] / DETECTOR_INPUT_SIZE as f32;

            let x1 = ((cx - w / 2.0) * fw).max(0.0);
            let y1 = ((cy - h / 2.0) * fh).max(0.0);
            let x2 = ((cx + w / 2.0) * fw).min(fw);
            let y2 = ((cy + h / 2.0) * fh).min(fh);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            best = Some(FaceBox {
                x: x1 as u32,
                y: y1 as u32,
                width: (x2 - x1) as u32,
                height: (y2 - y1) as u32,
                score,
            });
        }

        Ok(best)
    }

    fn encode(&mut self, crop: CropView<'_>) -> Result<Embedding, Box<dyn std::error::Error>> {
        let input = encoder_preprocess(&crop, ENCODER_INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.encoder.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let components = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = Embedding::new(components.to_vec());
        embedding.l2_normalize();
        Ok(embedding)
    }
}

impl FaceEmbedder for OnnxFaceEmbedder {
    fn embed(&mut self, frame: &Frame) -> Result<Option<Embedding>, Box<dyn std::error::Error>> {
        let Some(face) = self.detect_best(frame)? else {
            return Ok(None);
        };
        let crop = expand_and_clamp(&face, frame.width(), frame.height(), CROP_MARGIN);
        let embedding = self.encode(CropView {
            frame,
            x: crop.0,
            y: crop.1,
            width: crop.2,
            height: crop.3,
        })?;
        Ok(Some(embedding))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Clone, Debug)]
struct FaceBox {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    score: f64,
}

/// A rectangular window into a frame; avoids copying the crop.
struct CropView<'a> {
    frame: &'a Frame,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Grow the box by `margin` on each side, clamped to the frame.
fn expand_and_clamp(face: &FaceBox, fw: u32, fh: u32, margin: f64) -> (u32, u32, u32, u32) {
    let dx = (face.width as f64 * margin) as i64;
    let dy = (face.height as f64 * margin) as i64;
    let x1 = (face.x as i64 - dx).max(0) as u32;
    let y1 = (face.y as i64 - dy).max(0) as u32;
    let x2 = ((face.x + face.width) as i64 + dx).min(fw as i64) as u32;
    let y2 = ((face.y + face.height) as i64 + dy).min(fh as i64) as u32;
    (x1, y1, (x2 - x1).max(1), (y2 - y1).max(1))
}

/// Resize frame to `size × size`, normalize to [0,1], NCHW float32.
fn detector_preprocess(frame: &Frame, size: usize) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Resize the crop to `size × size`, normalize to [-1,1], NCHW float32.
fn encoder_preprocess(crop: &CropView<'_>, size: usize) -> ndarray::Array4<f32> {
    let src = crop.frame.as_ndarray();
    let crop_h = crop.height as usize;
    let crop_w = crop.width as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        let src_y = crop.y as usize
            + (((y as f64 + 0.5) * crop_h as f64 / size as f64) as usize).min(crop_h - 1);
        for x in 0..size {
            let src_x = crop.x as usize
                + (((x as f64 + 0.5) * crop_w as f64 / size as f64) as usize).min(crop_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] =
                    (src[[src_y, src_x, c]] as f32 - ENCODER_NORM_MEAN) / ENCODER_NORM_STD;
            }
        }
    }
    tensor
}

/// Generate BlazeFace anchors for the short-range model: 16×16 and 8×8
/// feature maps with 2 and 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8usize, 2usize), (16, 6)];
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for &(stride, per_cell) in &strides {
        let grid = DETECTOR_INPUT_SIZE / stride;
        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + 0.5) / grid as f32;
                let cy = (y as f32 + 0.5) / grid as f32;
                for _ in 0..per_cell {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
