//! Decoded video frames

use crate::{CvError, CvResult};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Fixed size of decoded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    /// Camera resolution (960x720) scaled down by three
    pub const TELLO_PREVIEW: Self = Self::new(960 / 3, 720 / 3);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center_x(&self) -> i32 {
        (self.width / 2) as i32
    }

    pub fn center_y(&self) -> i32 {
        (self.height / 2) as i32
    }

    /// Pixel count
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Bytes per BGR24 frame
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// One decoded BGR24 frame
#[derive(Debug, Clone)]
pub struct Frame {
    geometry: FrameGeometry,
    data: Vec<u8>,
}

impl Frame {
    pub fn from_bgr(geometry: FrameGeometry, data: Vec<u8>) -> CvResult<Self> {
        if data.len() != geometry.frame_size() {
            return Err(CvError::FrameSize {
                expected: geometry.frame_size(),
                actual: data.len(),
            });
        }
        Ok(Self { geometry, data })
    }

    /// All-black frame
    pub fn blank(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            data: vec![0; geometry.frame_size()],
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn as_bgr(&self) -> &[u8] {
        &self.data
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        let rgb: Vec<u8> = self
            .data
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect();
        RgbImage::from_raw(self.geometry.width, self.geometry.height, rgb)
            .unwrap_or_else(|| RgbImage::new(self.geometry.width, self.geometry.height))
    }

    /// Luma using the BT.601 weights
    pub fn to_gray_image(&self) -> GrayImage {
        let luma: Vec<u8> = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let (b, g, r) = (px[0] as u32, px[1] as u32, px[2] as u32);
                ((r * 299 + g * 587 + b * 114) / 1000) as u8
            })
            .collect();
        GrayImage::from_raw(self.geometry.width, self.geometry.height, luma)
            .unwrap_or_else(|| GrayImage::new(self.geometry.width, self.geometry.height))
    }
}
