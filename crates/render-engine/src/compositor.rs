//! Frame composition.
//!
//! Draws one output frame for a panel: dark background, the panel's artwork
//! fitted without distortion (or a placeholder), an optional dialogue
//! overlay, and the page counter badge. Composition never fails; every
//! missing input degrades to the placeholder path.

use std::sync::Arc;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_storyboard::{DialogueStyle, StoryboardPanel};
use tiny_skia::{Color, ColorU8, FilterQuality, Pixmap, PixmapPaint, Rect, Transform};

use crate::dialogue::{draw_dialogue, solid};
use crate::image_loader::LoadedImage;
use crate::text::{fill_text_aligned, GlyphPainter, TextAlign};

/// Frame background `#0f0f23`.
pub const BACKGROUND: ColorU8 = ColorU8::from_rgba(0x0f, 0x0f, 0x23, 0xff);

/// Placeholder backdrop `#1a1a2e`.
pub const PLACEHOLDER_BACKDROP: ColorU8 = ColorU8::from_rgba(0x1a, 0x1a, 0x2e, 0xff);

/// Placeholder label `#666`.
pub const PLACEHOLDER_TEXT: ColorU8 = ColorU8::from_rgba(0x66, 0x66, 0x66, 0xff);

const PLACEHOLDER_FONT_PX: f32 = 32.0;
const BADGE_FONT_PX: f32 = 12.0;

/// One rendered raster.
#[derive(Clone)]
pub struct Frame {
    pixmap: Pixmap,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// RGBA8 bytes, row-major.
    ///
    /// Every frame is painted over an opaque background, so the premultiplied
    /// storage is already straight alpha.
    pub fn rgba(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// RGBA of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap
            .pixel(x, y)
            .map(|p| [p.red(), p.green(), p.blue(), p.alpha()])
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Encode as PNG.
    pub fn encode_png(&self) -> StoryreelResult<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| StoryreelError::render(format!("failed to encode frame: {e}")))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Placement of a fitted image inside the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Aspect-preserving fit.
///
/// An image wider than the frame fills the width and is centered vertically
/// (letterbox); otherwise it fills the height and is centered horizontally
/// (pillarbox).
pub fn fit_rect(image_width: u32, image_height: u32, frame_width: u32, frame_height: u32) -> FitRect {
    let frame_w = frame_width as f32;
    let frame_h = frame_height as f32;
    let image_ratio = image_width as f32 / image_height.max(1) as f32;
    let frame_ratio = frame_w / frame_h.max(1.0);

    if image_ratio > frame_ratio {
        let height = frame_w / image_ratio;
        FitRect {
            x: 0.0,
            y: (frame_h - height) / 2.0,
            width: frame_w,
            height,
        }
    } else {
        let width = frame_h * image_ratio;
        FitRect {
            x: (frame_w - width) / 2.0,
            y: 0.0,
            width,
            height: frame_h,
        }
    }
}

/// Inputs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest<'a> {
    pub panel: &'a StoryboardPanel,

    /// Decoded artwork, if it loaded.
    pub image: Option<&'a LoadedImage>,

    /// Zero-based position in the exported sequence.
    pub index: usize,

    /// Length of the exported sequence.
    pub total: usize,

    /// Dialogue style, or `None` to hide dialogue.
    pub dialogue: Option<DialogueStyle>,
}

/// Draws frames at a fixed resolution.
pub struct Compositor {
    blank: Pixmap,
    painter: Arc<dyn GlyphPainter>,
}

impl Compositor {
    /// Allocate the drawing surface.
    pub fn new(width: u32, height: u32, painter: Arc<dyn GlyphPainter>) -> StoryreelResult<Self> {
        let mut blank = Pixmap::new(width, height).ok_or_else(|| {
            StoryreelError::render(format!("cannot allocate a {width}x{height} drawing surface"))
        })?;
        blank.fill(to_color(BACKGROUND));
        Ok(Self { blank, painter })
    }

    pub fn width(&self) -> u32 {
        self.blank.width()
    }

    pub fn height(&self) -> u32 {
        self.blank.height()
    }

    pub fn compose(&self, request: &FrameRequest<'_>) -> Frame {
        let mut pixmap = self.blank.clone();
        let (width, height) = (pixmap.width(), pixmap.height());

        match request.image {
            Some(image) => {
                let fit = fit_rect(image.width(), image.height(), width, height);
                let transform = Transform::from_row(
                    fit.width / image.width() as f32,
                    0.0,
                    0.0,
                    fit.height / image.height() as f32,
                    fit.x,
                    fit.y,
                );
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..PixmapPaint::default()
                };
                pixmap.draw_pixmap(0, 0, image.pixmap().as_ref(), &paint, transform, None);
            }
            None => {
                pixmap.fill(to_color(PLACEHOLDER_BACKDROP));
                fill_text_aligned(
                    self.painter.as_ref(),
                    &mut pixmap,
                    &format!("Panel {}", request.index + 1),
                    width as f32 / 2.0,
                    height as f32 / 2.0,
                    PLACEHOLDER_FONT_PX,
                    PLACEHOLDER_TEXT,
                    TextAlign::Center,
                );
            }
        }

        if let (Some(style), Some(text)) = (request.dialogue, request.panel.dialogue_text()) {
            draw_dialogue(&mut pixmap, self.painter.as_ref(), text, style);
        }

        self.draw_badge(&mut pixmap, request.index, request.total);
        Frame { pixmap }
    }

    /// `current / total` counter in the bottom-right corner.
    fn draw_badge(&self, pixmap: &mut Pixmap, index: usize, total: usize) {
        let (width, height) = (pixmap.width() as f32, pixmap.height() as f32);
        if let Some(rect) = Rect::from_xywh(width - 80.0, height - 28.0, 70.0, 22.0) {
            pixmap.fill_rect(rect, &solid(0, 0, 0, 153), Transform::identity(), None);
        }
        fill_text_aligned(
            self.painter.as_ref(),
            pixmap,
            &format!("{} / {}", index + 1, total),
            width - 15.0,
            height - 12.0,
            BADGE_FONT_PX,
            ColorU8::from_rgba(255, 255, 255, 255),
            TextAlign::Right,
        );
    }
}

fn to_color(c: ColorU8) -> Color {
    Color::from_rgba8(c.red(), c.green(), c.blue(), c.alpha())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::MonospaceMetrics;
    use storyreel_storyboard::{PanelDraft, StoryboardPanel};

    fn compositor(width: u32, height: u32) -> Compositor {
        Compositor::new(width, height, Arc::new(MonospaceMetrics::default())).unwrap()
    }

    fn panel(dialogue: Option<&str>) -> StoryboardPanel {
        StoryboardPanel::from_draft(
            PanelDraft {
                description: "A quiet street".to_string(),
                dialogue: dialogue.map(str::to_string),
                ..PanelDraft::default()
            },
            0,
        )
    }

    fn solid_image(width: u32, height: u32, rgba: [u8; 4]) -> LoadedImage {
        let data = rgba.repeat((width * height) as usize);
        LoadedImage::from_rgba(width, height, data).unwrap()
    }

    #[test]
    fn test_fit_wide_image_letterboxes() {
        let fit = fit_rect(2000, 500, 1280, 720);
        assert_eq!(fit.width, 1280.0);
        assert_eq!(fit.height, 320.0);
        assert_eq!(fit.x, 0.0);
        assert_eq!(fit.y, 200.0);
    }

    #[test]
    fn test_fit_tall_image_pillarboxes() {
        let fit = fit_rect(500, 1000, 1280, 720);
        assert_eq!(fit.height, 720.0);
        assert_eq!(fit.width, 360.0);
        assert_eq!(fit.x, 460.0);
        assert_eq!(fit.y, 0.0);
    }

    #[test]
    fn test_fit_same_ratio_fills_frame() {
        let fit = fit_rect(640, 360, 1280, 720);
        assert_eq!((fit.x, fit.y, fit.width, fit.height), (0.0, 0.0, 1280.0, 720.0));
    }

    #[test]
    fn test_letterbox_bands_keep_background() {
        let compositor = compositor(160, 90);
        let image = solid_image(40, 10, [255, 0, 0, 255]);
        let panel = panel(None);
        let frame = compositor.compose(&FrameRequest {
            panel: &panel,
            image: Some(&image),
            index: 0,
            total: 1,
            dialogue: None,
        });

        // Image spans y in [25, 65).
        assert_eq!(frame.pixel(10, 5), Some([0x0f, 0x0f, 0x23, 0xff]));
        assert_eq!(frame.pixel(10, 45), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_missing_image_draws_placeholder() {
        let compositor = compositor(320, 180);
        let panel = panel(None);
        let frame = compositor.compose(&FrameRequest {
            panel: &panel,
            image: None,
            index: 2,
            total: 5,
            dialogue: Some(DialogueStyle::Bubble),
        });

        assert_eq!(frame.pixel(5, 5), Some([0x1a, 0x1a, 0x2e, 0xff]));
        // Label boxes sit just above the vertical center.
        let row = 90 - 5;
        let label_pixels = (0..320)
            .filter(|&x| frame.pixel(x, row) == Some([0x66, 0x66, 0x66, 0xff]))
            .count();
        assert!(label_pixels > 0);
    }

    #[test]
    fn test_badge_is_drawn_bottom_right() {
        let compositor = compositor(320, 180);
        let image = solid_image(16, 9, [255, 255, 255, 255]);
        let panel = panel(None);
        let frame = compositor.compose(&FrameRequest {
            panel: &panel,
            image: Some(&image),
            index: 0,
            total: 3,
            dialogue: None,
        });

        // Badge backing is 60% black over white.
        let [r, g, b, a] = frame.pixel(320 - 78, 180 - 26).unwrap();
        assert_eq!(a, 255);
        assert!(r < 120 && r == g && g == b);
        // Outside the badge the image is untouched.
        assert_eq!(frame.pixel(100, 100), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_dialogue_hidden_when_style_absent() {
        let compositor = compositor(320, 240);
        let image = solid_image(4, 3, [0, 0, 255, 255]);
        let panel = panel(Some("Hello there"));

        let without = compositor.compose(&FrameRequest {
            panel: &panel,
            image: Some(&image),
            index: 0,
            total: 1,
            dialogue: None,
        });
        let with = compositor.compose(&FrameRequest {
            panel: &panel,
            image: Some(&image),
            index: 0,
            total: 1,
            dialogue: Some(DialogueStyle::Bubble),
        });

        assert_eq!(without.pixel(200, 100), Some([0, 0, 255, 255]));
        assert_ne!(with.pixel(200, 100), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_zero_size_surface_is_rejected() {
        let result = Compositor::new(0, 720, Arc::new(MonospaceMetrics::default()));
        assert!(matches!(result, Err(StoryreelError::Render { .. })));
    }

    #[test]
    fn test_frame_bytes_are_opaque() {
        let compositor = compositor(64, 36);
        let panel = panel(Some("字幕"));
        let frame = compositor.compose(&FrameRequest {
            panel: &panel,
            image: None,
            index: 0,
            total: 1,
            dialogue: Some(DialogueStyle::Subtitle),
        });
        assert_eq!(frame.rgba().len(), 64 * 36 * 4);
        assert!(frame.rgba().chunks_exact(4).all(|px| px[3] == 255));
    }
}
