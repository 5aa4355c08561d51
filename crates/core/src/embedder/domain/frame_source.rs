use crate::shared::frame::Frame;

/// Supplies candidate frames to a verification attempt.
///
/// `None` signals a capture failure (device busy, decode error), which is
/// not the same thing as a frame without a face: the verification loop
/// records the two separately in its diagnostics.
///
/// A source wrapping a shared capture device must be handed to one attempt
/// at a time; the core never issues two concurrent captures against the
/// same source.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Option<Frame>;
}
