//! Frame sampler: reduces a frame's chrominance plane to region averages
//!
//! Averages are negated so that the extracted signal rises with blood volume:
//! more blood absorbs more light and lowers the chroma byte values.

use ppg_core::{Frame, PpgError, PpgResult, ZONE_COUNT};
use serde::{Deserialize, Serialize};

/// Geometry of the sampled regions, as fractions of the chroma plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Four-zone crop margin on each side, fraction of plane width
    pub margin_x_ratio: f64,
    /// Four-zone crop margin top and bottom, fraction of plane height
    pub margin_y_ratio: f64,
    /// Cropped heights below this skip the frame
    pub min_crop_height: usize,
    /// Center box side length, fraction of plane width and height
    pub center_box_ratio: f64,
}

impl RegionConfig {
    pub fn is_valid(&self) -> bool {
        let margin = |r: f64| (0.0..0.5).contains(&r);
        margin(self.margin_x_ratio)
            && margin(self.margin_y_ratio)
            && self.center_box_ratio > 0.0
            && self.center_box_ratio <= 1.0
            && self.min_crop_height >= ZONE_COUNT
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            margin_x_ratio: 0.10,
            margin_y_ratio: 0.20,
            min_crop_height: ZONE_COUNT,
            center_box_ratio: 0.40,
        }
    }
}

/// Whole-plane averages used for finger detection
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaneAverages {
    pub luma: f32,
    pub chroma: f32,
}

/// Half-open pixel rectangle on the chroma plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start_x: usize,
    pub end_x: usize,
    pub start_y: usize,
    pub end_y: usize,
}

impl Region {
    pub fn height(&self) -> usize {
        self.end_y.saturating_sub(self.start_y)
    }

    pub fn width(&self) -> usize {
        self.end_x.saturating_sub(self.start_x)
    }
}

/// Extracts intensity values from raw frames
#[derive(Debug, Clone)]
pub struct FrameSampler {
    region: RegionConfig,
}

impl FrameSampler {
    /// Create a sampler; the minimum crop height must leave every zone at least one row
    pub fn new(region: RegionConfig) -> PpgResult<Self> {
        if !region.is_valid() {
            return Err(PpgError::config(format!("invalid sampling region: {:?}", region)));
        }
        Ok(FrameSampler { region })
    }

    /// Average of every byte of the luma and chroma buffers
    pub fn plane_averages(&self, frame: &Frame) -> PlaneAverages {
        PlaneAverages {
            luma: byte_average(&frame.luma),
            chroma: byte_average(&frame.chroma.data),
        }
    }

    /// Central crop used by the four-zone strategy
    pub fn four_zone_region(&self, frame: &Frame) -> Region {
        let width = frame.chroma_width();
        let height = frame.chroma_height();
        let margin_x = (width as f64 * self.region.margin_x_ratio) as usize;
        let margin_y = (height as f64 * self.region.margin_y_ratio) as usize;

        Region {
            start_x: margin_x,
            end_x: width.saturating_sub(margin_x),
            start_y: margin_y,
            end_y: height.saturating_sub(margin_y),
        }
    }

    /// Centered box used by the raw strategy
    pub fn center_box_region(&self, frame: &Frame) -> Region {
        let width = frame.chroma_width();
        let height = frame.chroma_height();
        let box_width = (width as f64 * self.region.center_box_ratio) as usize;
        let box_height = (height as f64 * self.region.center_box_ratio) as usize;
        let start_x = (width - box_width) / 2;
        let start_y = (height - box_height) / 2;

        Region {
            start_x,
            end_x: start_x + box_width,
            start_y,
            end_y: start_y + box_height,
        }
    }

    /// Negated average of each of the four horizontal slices of the crop
    ///
    /// Index 0 is the bottom slice and index 3 the top one. Rows left over by
    /// the integer slice height fall into slice 0.
    pub fn four_zone_averages(&self, frame: &Frame) -> PpgResult<[f32; ZONE_COUNT]> {
        let region = self.four_zone_region(frame);
        let crop_height = region.height();
        if crop_height < self.region.min_crop_height {
            return Err(PpgError::DegenerateRegion {
                height: crop_height,
                min_height: self.region.min_crop_height,
            });
        }

        let slice_height = crop_height / ZONE_COUNT;
        let mut sums = [0u64; ZONE_COUNT];
        let mut counts = [0u32; ZONE_COUNT];

        for y in region.start_y..region.end_y {
            let from_top = (y - region.start_y) / slice_height;
            let slice = (ZONE_COUNT - 1).saturating_sub(from_top);
            for x in region.start_x..region.end_x {
                if let Some(value) = frame.chroma_at(y, x) {
                    sums[slice] += u64::from(value);
                    counts[slice] += 1;
                }
            }
        }

        let mut averages = [0.0f32; ZONE_COUNT];
        for (avg, (&sum, &count)) in averages.iter_mut().zip(sums.iter().zip(&counts)) {
            *avg = negated_mean(sum, count);
        }
        Ok(averages)
    }

    /// Negated average of the center box
    pub fn center_box_average(&self, frame: &Frame) -> f32 {
        let region = self.center_box_region(frame);
        let mut sum = 0u64;
        let mut count = 0u32;

        for y in region.start_y..region.end_y {
            for x in region.start_x..region.end_x {
                if let Some(value) = frame.chroma_at(y, x) {
                    sum += u64::from(value);
                    count += 1;
                }
            }
        }

        negated_mean(sum, count)
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        FrameSampler {
            region: RegionConfig::default(),
        }
    }
}

fn negated_mean(sum: u64, count: u32) -> f32 {
    if count > 0 {
        -(sum as f32) / count as f32
    } else {
        0.0
    }
}

fn byte_average(buffer: &[u8]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum: u64 = buffer.iter().map(|&b| u64::from(b)).sum();
    sum as f32 / buffer.len() as f32
}
