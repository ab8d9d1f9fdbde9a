//! Frame: one camera capture in YUV layout

use crate::error::{PpgError, PpgResult};

/// Chrominance plane of a frame with its memory layout
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaPlane {
    /// Raw plane bytes, possibly shared with padding or interleaved samples
    pub data: Vec<u8>,
    /// Bytes between the starts of consecutive rows
    pub row_stride: usize,
    /// Bytes between consecutive pixels in a row
    pub pixel_stride: usize,
}

/// One camera capture
///
/// The chrominance plane is subsampled by two in each direction, so its
/// logical size is `width / 2 x height / 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Frame counter assigned by the capture source
    pub sequence: u64,
    /// Full-resolution width in pixels
    pub width: usize,
    /// Full-resolution height in pixels
    pub height: usize,
    /// Luminance plane bytes
    pub luma: Vec<u8>,
    /// Chrominance plane used for sampling
    pub chroma: ChromaPlane,
}

impl Frame {
    /// Create a new frame, validating its geometry
    pub fn new(
        sequence: u64,
        width: usize,
        height: usize,
        luma: Vec<u8>,
        chroma: ChromaPlane,
    ) -> PpgResult<Self> {
        if width < 2 || height < 2 {
            return Err(PpgError::InvalidFrame {
                reason: format!("frame {}x{} is smaller than one chroma pixel", width, height),
            });
        }
        if chroma.pixel_stride == 0 || chroma.row_stride == 0 {
            return Err(PpgError::InvalidFrame {
                reason: "chroma strides must be non-zero".to_string(),
            });
        }

        Ok(Frame {
            sequence,
            width,
            height,
            luma,
            chroma,
        })
    }

    /// Logical width of the chrominance plane
    pub fn chroma_width(&self) -> usize {
        self.width / 2
    }

    /// Logical height of the chrominance plane
    pub fn chroma_height(&self) -> usize {
        self.height / 2
    }

    /// Byte at `(row, col)` of the chroma plane, or `None` past the buffer end
    pub fn chroma_at(&self, row: usize, col: usize) -> Option<u8> {
        let pos = row * self.chroma.row_stride + col * self.chroma.pixel_stride;
        self.chroma.data.get(pos).copied()
    }
}
