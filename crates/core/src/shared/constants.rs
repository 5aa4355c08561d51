pub const DETECTOR_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/faceverify/faceverify/releases/download/v0.1.0/blazeface_short_range.onnx";

pub const ENCODER_MODEL_NAME: &str = "w600k_r50.onnx";
pub const ENCODER_MODEL_URL: &str =
    "https://github.com/faceverify/faceverify/releases/download/v0.1.0/w600k_r50.onnx";

/// Embedding length produced by the bundled recognition model.
pub const EMBEDDING_DIMENSION: usize = 512;

/// Cosine acceptance threshold for L2-normalized recognition embeddings.
pub const DEFAULT_COSINE_THRESHOLD: f64 = 0.4;

/// Euclidean distance tolerance for dlib-style 128-d encodings.
pub const DEFAULT_EUCLIDEAN_TOLERANCE: f64 = 0.6;

/// Frames captured per verification attempt.
pub const DEFAULT_FRAME_COUNT: usize = 3;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
