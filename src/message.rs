//! Multi-frame message value.

use bytes::Bytes;

/// An ordered sequence of byte frames, sent and received as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Msg {
  frames: Vec<Bytes>,
}

impl Msg {
  /// An empty message with no frames.
  pub fn new() -> Self {
    Self { frames: Vec::new() }
  }

  pub fn from_frames(frames: Vec<Bytes>) -> Self {
    Self { frames }
  }

  /// A single-frame message borrowing static data.
  pub fn from_static(data: &'static [u8]) -> Self {
    Self {
      frames: vec![Bytes::from_static(data)],
    }
  }

  /// A single-frame message taking ownership of `data`.
  pub fn from_vec(data: Vec<u8>) -> Self {
    Self {
      frames: vec![Bytes::from(data)],
    }
  }

  pub fn push_frame(&mut self, frame: Bytes) {
    self.frames.push(frame);
  }

  pub fn frames(&self) -> &[Bytes] {
    &self.frames
  }

  pub fn into_frames(self) -> Vec<Bytes> {
    self.frames
  }

  /// The first frame, if any. Convenience for single-frame messages.
  pub fn data(&self) -> Option<&[u8]> {
    self.frames.first().map(|frame| frame.as_ref())
  }

  /// Number of frames.
  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }
}
