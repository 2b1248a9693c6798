//! Text measurement, glyph painting, and character-granular wrapping.
//!
//! Dialogue and labels are drawn through a [`GlyphPainter`]. The production
//! painter rasterizes a system font found with `fontdb` using `fontdue`.
//! When no usable font exists, [`MonospaceMetrics`] measures every glyph
//! with fixed advances and paints solid glyph boxes, so frames still render
//! and layout stays deterministic.

use std::sync::Arc;

use fontdb::{Database, Family, Query};
use fontdue::{Font, FontSettings};
use storyreel_common::error::{StoryreelError, StoryreelResult};
use tiny_skia::{ColorU8, Mask, Paint, Pixmap, Rect, Transform};

/// Measures rendered text width at a pixel size.
pub trait TextMeasurer: Send + Sync {
    /// Advance width of `text` in pixels.
    fn text_width(&self, text: &str, size_px: f32) -> f32;
}

/// A measurer that can also draw.
pub trait GlyphPainter: TextMeasurer {
    /// Draw `text` with its left edge at `x` and its baseline at `baseline`.
    fn fill_text(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        baseline: f32,
        size_px: f32,
        color: ColorU8,
    );

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Horizontal anchor for [`fill_text_aligned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Draw text anchored at `x` according to `align`.
#[allow(clippy::too_many_arguments)]
pub fn fill_text_aligned(
    painter: &dyn GlyphPainter,
    pixmap: &mut Pixmap,
    text: &str,
    x: f32,
    baseline: f32,
    size_px: f32,
    color: ColorU8,
    align: TextAlign,
) {
    let left = match align {
        TextAlign::Left => x,
        TextAlign::Center => x - painter.text_width(text, size_px) / 2.0,
        TextAlign::Right => x - painter.text_width(text, size_px),
    };
    painter.fill_text(pixmap, text, left, baseline, size_px, color);
}

/// Greedy character wrap.
///
/// A character that would push the current line past `max_width` starts a
/// new line, unless the current line is empty. The result always holds at
/// least one line; when nothing was produced it is the input itself.
pub fn wrap_text(
    measurer: &(impl TextMeasurer + ?Sized),
    text: &str,
    max_width: f32,
    size_px: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if measurer.text_width(&candidate, size_px) > max_width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(text.to_string());
    }
    lines
}

/// A rasterizing font face.
pub struct FontFace {
    font: Font,
    family: String,
}

impl FontFace {
    /// Parse a face from font file bytes; `index` selects a face in a collection.
    pub fn from_bytes(bytes: &[u8], index: u32, family: impl Into<String>) -> StoryreelResult<Self> {
        let settings = FontSettings {
            collection_index: index,
            ..FontSettings::default()
        };
        let font = Font::from_bytes(bytes, settings)
            .map_err(|e| StoryreelError::render(format!("failed to parse font: {e}")))?;
        Ok(Self {
            font,
            family: family.into(),
        })
    }

    /// Find a sans-serif system face, preferring families with CJK coverage.
    pub fn from_system() -> Option<Self> {
        let mut db = Database::new();
        db.load_system_fonts();

        let families = [
            Family::Name("Noto Sans CJK SC"),
            Family::Name("Source Han Sans SC"),
            Family::Name("PingFang SC"),
            Family::Name("Microsoft YaHei"),
            Family::Name("Arial"),
            Family::SansSerif,
        ];
        let id = db.query(&Query {
            families: &families,
            ..Query::default()
        })?;
        let family = db
            .face(id)
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_default();

        db.with_face_data(id, |data, index| {
            FontFace::from_bytes(data, index, family.clone())
        })
        .and_then(|parsed| match parsed {
            Ok(face) => Some(face),
            Err(err) => {
                tracing::warn!(error = %err, family = %family, "System font could not be parsed");
                None
            }
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }
}

impl TextMeasurer for FontFace {
    fn text_width(&self, text: &str, size_px: f32) -> f32 {
        text.chars()
            .map(|c| self.font.metrics(c, size_px).advance_width)
            .sum()
    }
}

impl GlyphPainter for FontFace {
    fn fill_text(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        baseline: f32,
        size_px: f32,
        color: ColorU8,
    ) {
        let Some(mut mask) = Mask::new(pixmap.width(), pixmap.height()) else {
            return;
        };
        let mut pen_x = x;
        for c in text.chars() {
            let (metrics, coverage) = self.font.rasterize(c, size_px);
            if metrics.width > 0 && metrics.height > 0 {
                let left = pen_x.round() as i32 + metrics.xmin;
                let top = baseline.round() as i32 - (metrics.height as i32 + metrics.ymin);
                stamp_coverage(&mut mask, left, top, metrics.width, &coverage);
            }
            pen_x += metrics.advance_width;
        }
        fill_through_mask(pixmap, &mask, color);
    }

    fn name(&self) -> &str {
        &self.family
    }
}

/// Fixed-advance metrics that paint glyph boxes.
///
/// Wide (CJK and full-width) characters advance one em, everything else
/// `narrow_ratio` of an em.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceMetrics {
    pub narrow_ratio: f32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self { narrow_ratio: 0.6 }
    }
}

impl MonospaceMetrics {
    fn advance(&self, c: char, size_px: f32) -> f32 {
        if is_wide(c) {
            size_px
        } else {
            size_px * self.narrow_ratio
        }
    }
}

impl TextMeasurer for MonospaceMetrics {
    fn text_width(&self, text: &str, size_px: f32) -> f32 {
        text.chars().map(|c| self.advance(c, size_px)).sum()
    }
}

impl GlyphPainter for MonospaceMetrics {
    fn fill_text(
        &self,
        pixmap: &mut Pixmap,
        text: &str,
        x: f32,
        baseline: f32,
        size_px: f32,
        color: ColorU8,
    ) {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.red(), color.green(), color.blue(), color.alpha());

        let mut pen_x = x;
        for c in text.chars() {
            let advance = self.advance(c, size_px);
            if !c.is_whitespace() {
                let height = size_px * 0.7;
                if let Some(rect) = Rect::from_xywh(
                    pen_x + advance * 0.15,
                    baseline - height,
                    advance * 0.7,
                    height,
                ) {
                    pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                }
            }
            pen_x += advance;
        }
    }

    fn name(&self) -> &str {
        "monospace-boxes"
    }
}

/// CJK ideographs, kana, hangul, and full-width forms.
fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x20000..=0x3FFFD
    )
}

/// The system font if one loads, otherwise [`MonospaceMetrics`].
pub fn default_painter() -> Arc<dyn GlyphPainter> {
    match FontFace::from_system() {
        Some(face) => {
            tracing::debug!(family = face.family(), "Using system font");
            Arc::new(face)
        }
        None => {
            tracing::warn!("No system font found, dialogue is drawn with glyph boxes");
            Arc::new(MonospaceMetrics::default())
        }
    }
}

/// Copy glyph coverage into `mask` at (`left`, `top`), clipped to its bounds.
///
/// Overlapping glyphs keep the stronger coverage.
fn stamp_coverage(mask: &mut Mask, left: i32, top: i32, glyph_width: usize, coverage: &[u8]) {
    let width = mask.width() as i32;
    let height = mask.height() as i32;
    let data = mask.data_mut();

    for (row, line) in coverage.chunks_exact(glyph_width).enumerate() {
        let y = top + row as i32;
        if y < 0 || y >= height {
            continue;
        }
        for (col, &value) in line.iter().enumerate() {
            let x = left + col as i32;
            if x < 0 || x >= width {
                continue;
            }
            let cell = &mut data[(y * width + x) as usize];
            *cell = (*cell).max(value);
        }
    }
}

/// Paint `color` over the whole pixmap wherever `mask` has coverage.
fn fill_through_mask(pixmap: &mut Pixmap, mask: &Mask, color: ColorU8) {
    let Some(rect) = Rect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.red(), color.green(), color.blue(), color.alpha());
    paint.anti_alias = false;
    pixmap.fill_rect(rect, &paint, Transform::identity(), Some(mask));
}
