//! Face overlay rendering
//!
//! Draws a box around every detected face and a label just above the box's
//! top-right corner. DejaVu Sans is built in; a TTF can replace it.

use crate::{CvError, CvResult, Frame, RenderingConfig};
use ab_glyph::{FontArc, PxScale};
use drone_core::FaceBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, trace};

/// Gap between the label baseline and the box
const LABEL_GAP: i32 = 5;

/// Label font used when none is configured
static DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Renders detection overlays on frames
pub struct OverlayRenderer {
    color: Rgb<u8>,
    thickness: u32,
    label: String,
    scale: PxScale,
    font: FontArc,
}

impl OverlayRenderer {
    /// Create a renderer with the configured label font, or the built-in one
    pub fn new(config: &RenderingConfig) -> CvResult<Self> {
        let font = match &config.font_path {
            Some(path) => {
                let data = std::fs::read(path)?;
                let font = FontArc::try_from_vec(data)
                    .map_err(|e| CvError::rendering(format!("{}: {}", path.display(), e)))?;
                debug!("Loaded label font from {}", path.display());
                font
            }
            None => FontArc::try_from_slice(DEFAULT_FONT)
                .map_err(|e| CvError::rendering(format!("built-in font: {}", e)))?,
        };

        Ok(Self {
            color: Rgb(config.color),
            thickness: config.thickness.max(1),
            label: config.label.clone(),
            scale: PxScale::from(config.font_scale),
            font,
        })
    }

    /// Convert the frame to RGB and draw every face on it
    pub fn annotate(&self, frame: &Frame, faces: &[FaceBox]) -> RgbImage {
        let mut image = frame.to_rgb_image();
        for face in faces {
            self.draw_face(&mut image, face);
        }
        trace!("Annotated {} faces", faces.len());
        image
    }

    fn draw_face(&self, image: &mut RgbImage, face: &FaceBox) {
        // Thick outlines are nested one-pixel rectangles, shrinking inwards
        for inset in 0..self.thickness as i32 {
            let width = face.width() - 2 * inset;
            let height = face.height() - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(face.min_x + inset, face.min_y + inset)
                .of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, self.color);
        }

        let top = face.min_y - LABEL_GAP - self.scale.y.round() as i32;
        draw_text_mut(image, self.color, face.max_x, top, self.scale, &self.font, &self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameGeometry;

    fn renderer(thickness: u32) -> OverlayRenderer {
        OverlayRenderer::new(&RenderingConfig {
            thickness,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_no_faces_leaves_frame_unchanged() {
        let frame = Frame::blank(FrameGeometry::new(16, 16));
        let image = renderer(3).annotate(&frame, &[]);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_box_drawn_with_thickness() {
        let frame = Frame::blank(FrameGeometry::new(32, 32));
        let image = renderer(2).annotate(&frame, &[FaceBox::new(4, 4, 20, 20)]);

        let blue = [0, 0, 255];
        // Outer and inner outline
        assert_eq!(image.get_pixel(4, 10).0, blue);
        assert_eq!(image.get_pixel(5, 10).0, blue);
        // Inside the outline
        assert_eq!(image.get_pixel(6, 10).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(12, 12).0, [0, 0, 0]);
        // Outside the box
        assert_eq!(image.get_pixel(2, 2).0, [0, 0, 0]);
    }

    #[test]
    fn test_box_partly_outside_frame_is_clipped() {
        let frame = Frame::blank(FrameGeometry::new(16, 16));
        let image = renderer(3).annotate(&frame, &[FaceBox::new(-8, -8, 40, 40)]);
        assert_eq!(image.dimensions(), (16, 16));
    }

    #[test]
    fn test_label_drawn_above_box_by_default() {
        let frame = Frame::blank(FrameGeometry::new(96, 64));
        let image = renderer(1).annotate(&frame, &[FaceBox::new(4, 40, 24, 60)]);

        // Label spans from the box's right edge, ending LABEL_GAP above its top
        let label_pixels = (24..96)
            .flat_map(|x| (19..35).map(move |y| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y).0[2] > 0)
            .count();
        assert!(label_pixels > 0);

        // Nothing left of the box edge at label height
        assert!((0..4).all(|x| (19..35).all(|y| image.get_pixel(x, y).0 == [0, 0, 0])));
    }

    #[test]
    fn test_bad_font_is_rendering_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let result = OverlayRenderer::new(&RenderingConfig {
            font_path: Some(path),
            ..Default::default()
        });
        assert!(matches!(result, Err(CvError::Rendering(_))));
    }
}
