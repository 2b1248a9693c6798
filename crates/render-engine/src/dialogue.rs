//! Dialogue overlays: speech bubble and subtitle bar.
//!
//! Layout is computed separately from drawing so the geometry can be checked
//! without rasterizing. Both styles depend only on the text and the frame
//! size.

use storyreel_storyboard::DialogueStyle;
use tiny_skia::{ColorU8, FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::text::{wrap_text, GlyphPainter, TextMeasurer};

pub const BUBBLE_FONT_PX: f32 = 16.0;
pub const BUBBLE_PADDING: f32 = 15.0;
pub const BUBBLE_LINE_HEIGHT: f32 = 24.0;
pub const BUBBLE_RADIUS: f32 = 8.0;

pub const SUBTITLE_FONT_PX: f32 = 18.0;
pub const SUBTITLE_LINE_HEIGHT: f32 = 26.0;

/// Axis-aligned box in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    fn to_rect(self) -> Option<Rect> {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

/// One line of text placed on the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
}

/// Speech bubble geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleLayout {
    pub body: Bounds,
    /// Downward tail below the body's bottom edge.
    pub tail: [(f32, f32); 3],
    pub lines: Vec<PlacedLine>,
}

/// One subtitle line with its backing bar.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLine {
    pub backing: Bounds,
    pub line: PlacedLine,
}

/// Lay out a bubble anchored 40px from the left and 120px above the bottom.
pub fn bubble_layout(
    measurer: &(impl TextMeasurer + ?Sized),
    text: &str,
    width: u32,
    height: u32,
) -> BubbleLayout {
    let max_width = width as f32 - 80.0;
    let x = 40.0;
    let y = height as f32 - 120.0;

    let lines = wrap_text(measurer, text, max_width - BUBBLE_PADDING * 2.0, BUBBLE_FONT_PX);
    let bubble_height = lines.len() as f32 * BUBBLE_LINE_HEIGHT + BUBBLE_PADDING * 2.0;
    let top = y - bubble_height;

    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| PlacedLine {
            text,
            x: x + BUBBLE_PADDING,
            baseline: top + BUBBLE_PADDING + 18.0 + i as f32 * BUBBLE_LINE_HEIGHT,
        })
        .collect();

    BubbleLayout {
        body: Bounds {
            x,
            y: top,
            width: max_width,
            height: bubble_height,
        },
        tail: [(x + 20.0, y), (x + 35.0, y + 12.0), (x + 50.0, y)],
        lines,
    }
}

/// Lay out centered subtitle lines starting 50px above the bottom.
pub fn subtitle_layout(
    measurer: &(impl TextMeasurer + ?Sized),
    text: &str,
    width: u32,
    height: u32,
) -> Vec<SubtitleLine> {
    let max_width = width as f32 - 80.0;
    let y = height as f32 - 50.0;

    wrap_text(measurer, text, max_width, SUBTITLE_FONT_PX)
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let line_width = measurer.text_width(&text, SUBTITLE_FONT_PX);
            let x = (width as f32 - line_width) / 2.0;
            let baseline = y + i as f32 * SUBTITLE_LINE_HEIGHT;
            SubtitleLine {
                backing: Bounds {
                    x: x - 8.0,
                    y: baseline - 18.0,
                    width: line_width + 16.0,
                    height: 24.0,
                },
                line: PlacedLine { text, x, baseline },
            }
        })
        .collect()
}

/// Draw dialogue in the chosen style.
pub fn draw_dialogue(pixmap: &mut Pixmap, painter: &dyn GlyphPainter, text: &str, style: DialogueStyle) {
    match style {
        DialogueStyle::Bubble => draw_bubble(pixmap, painter, text),
        DialogueStyle::Subtitle => draw_subtitle(pixmap, painter, text),
    }
}

pub fn draw_bubble(pixmap: &mut Pixmap, painter: &dyn GlyphPainter, text: &str) {
    let layout = bubble_layout(painter, text, pixmap.width(), pixmap.height());

    let fill = solid(255, 255, 255, 242);
    let outline = solid(0x33, 0x33, 0x33, 255);

    if let Some(body) = rounded_rect(layout.body, BUBBLE_RADIUS) {
        pixmap.fill_path(&body, &fill, FillRule::Winding, Transform::identity(), None);
        let stroke = Stroke {
            width: 2.0,
            ..Stroke::default()
        };
        pixmap.stroke_path(&body, &outline, &stroke, Transform::identity(), None);
    }

    if let Some(tail) = triangle(layout.tail) {
        pixmap.fill_path(&tail, &fill, FillRule::Winding, Transform::identity(), None);
    }

    let ink = ColorU8::from_rgba(0, 0, 0, 255);
    for line in &layout.lines {
        painter.fill_text(pixmap, &line.text, line.x, line.baseline, BUBBLE_FONT_PX, ink);
    }
}

pub fn draw_subtitle(pixmap: &mut Pixmap, painter: &dyn GlyphPainter, text: &str) {
    let backing = solid(0, 0, 0, 204);
    let white = ColorU8::from_rgba(255, 255, 255, 255);

    for entry in subtitle_layout(painter, text, pixmap.width(), pixmap.height()) {
        if let Some(rect) = entry.backing.to_rect() {
            pixmap.fill_rect(rect, &backing, Transform::identity(), None);
        }
        painter.fill_text(
            pixmap,
            &entry.line.text,
            entry.line.x,
            entry.line.baseline,
            SUBTITLE_FONT_PX,
            white,
        );
    }
}

pub(crate) fn solid(r: u8, g: u8, b: u8, a: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

/// Rounded rectangle path; the radius shrinks to fit small boxes.
fn rounded_rect(bounds: Bounds, radius: f32) -> Option<Path> {
    if !(bounds.width > 0.0 && bounds.height > 0.0) {
        return None;
    }
    let r = radius.min(bounds.width / 2.0).min(bounds.height / 2.0);
    let (x, y, w, h) = (bounds.x, bounds.y, bounds.width, bounds.height);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

fn triangle(points: [(f32, f32); 3]) -> Option<Path> {
    let mut pb = PathBuilder::new();
    pb.move_to(points[0].0, points[0].1);
    pb.line_to(points[1].0, points[1].1);
    pb.line_to(points[2].0, points[2].1);
    pb.close();
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::MonospaceMetrics;

    #[test]
    fn test_bubble_geometry_single_line() {
        let metrics = MonospaceMetrics::default();
        let layout = bubble_layout(&metrics, "Hello", 1280, 720);

        assert_eq!(
            layout.body,
            Bounds {
                x: 40.0,
                y: 600.0 - 54.0,
                width: 1200.0,
                height: 54.0,
            }
        );
        assert_eq!(layout.tail, [(60.0, 600.0), (75.0, 612.0), (90.0, 600.0)]);
        assert_eq!(
            layout.lines,
            vec![PlacedLine {
                text: "Hello".to_string(),
                x: 55.0,
                baseline: 546.0 + 15.0 + 18.0,
            }]
        );
    }

    #[test]
    fn test_bubble_grows_with_line_count() {
        let metrics = MonospaceMetrics::default();
        // 1170px of text room at 16px per wide char: 73 chars per line.
        let text = "字".repeat(150);
        let layout = bubble_layout(&metrics, &text, 1280, 720);

        assert_eq!(layout.lines.len(), 3);
        assert_eq!(layout.body.height, 3.0 * 24.0 + 30.0);
        assert_eq!(layout.lines[2].baseline - layout.lines[1].baseline, 24.0);
        assert_eq!(layout.lines[0].text.chars().count(), 73);
    }

    #[test]
    fn test_subtitle_lines_are_centered_with_backing() {
        let metrics = MonospaceMetrics::default();
        let lines = subtitle_layout(&metrics, "字字", 1280, 720);

        assert_eq!(lines.len(), 1);
        let entry = &lines[0];
        assert_eq!(entry.line.x, (1280.0 - 36.0) / 2.0);
        assert_eq!(entry.line.baseline, 670.0);
        assert_eq!(
            entry.backing,
            Bounds {
                x: entry.line.x - 8.0,
                y: 652.0,
                width: 52.0,
                height: 24.0,
            }
        );
    }

    #[test]
    fn test_subtitle_second_line_steps_down() {
        let metrics = MonospaceMetrics::default();
        let text = "字".repeat(80);
        let lines = subtitle_layout(&metrics, &text, 1280, 720);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].line.baseline, 696.0);
    }

    #[test]
    fn test_draw_bubble_paints_near_white_body() {
        let metrics = MonospaceMetrics::default();
        let mut pixmap = Pixmap::new(320, 240).unwrap();
        draw_dialogue(&mut pixmap, &metrics, "Hi", DialogueStyle::Bubble);

        // Inside the body, away from text and outline.
        let px = pixmap.pixel(200, 100).unwrap();
        assert!(px.red() > 230 && px.alpha() > 230);
    }

    #[test]
    fn test_draw_on_tiny_frame_does_not_panic() {
        let metrics = MonospaceMetrics::default();
        let mut pixmap = Pixmap::new(10, 10).unwrap();
        draw_dialogue(&mut pixmap, &metrics, "Too small", DialogueStyle::Bubble);
        draw_dialogue(&mut pixmap, &metrics, "Too small", DialogueStyle::Subtitle);
    }
}
