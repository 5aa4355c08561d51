pub mod image_frame_source;
pub mod onnx_face_embedder;
