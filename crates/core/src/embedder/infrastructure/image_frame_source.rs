use std::path::PathBuf;

use crate::embedder::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;

/// Adapts a list of image files to the [`FrameSource`] interface.
///
/// Each `capture` decodes the next file in order, so a directory of stills
/// drives multi-frame verification exactly like a camera burst would. A
/// file that fails to decode yields `None` for that capture (a capture
/// failure), and the source moves on to the next file.
pub struct ImageFileFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageFileFrameSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, next: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len().saturating_sub(self.next)
    }
}

impl FrameSource for ImageFileFrameSource {
    fn capture(&mut self) -> Option<Frame> {
        let path = self.paths.get(self.next)?;
        let sequence = self.next;
        self.next += 1;

        match image::open(path) {
            Ok(decoded) => {
                let rgb = decoded.to_rgb8();
                let (width, height) = rgb.dimensions();
                Some(Frame::new(rgb.into_raw(), width, height, sequence))
            }
            Err(err) => {
                log::warn!("failed to decode {}: {err}", path.display());
                None
            }
        }
    }
}
