//! Static exports that bypass the recording pipeline: a numbered PNG
//! sequence and a single self-contained HTML page.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use storyreel_common::clock::Pacer;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_storyboard::{
    html_file_name, image_file_name, ImageSource, Storyboard, StoryboardPanel, DEFAULT_TITLE,
};

use crate::export::{ExportProgress, ExportStage, ProgressCallback};
use crate::image_loader::ImageLoader;

/// Pause between sequential image writes.
pub const IMAGE_WRITE_DELAY: Duration = Duration::from_millis(300);

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Outcome of an image-sequence export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageExportReport {
    /// Files written, in panel order.
    pub written: Vec<PathBuf>,

    /// Panels whose artwork could not be fetched or decoded, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Write each image-bearing panel to `<title>_<NNN>.png`.
///
/// Numbering follows the position among image-bearing panels, starting at
/// 001. Panels without artwork are skipped; a panel whose artwork cannot be
/// fetched is logged and skipped without affecting the others.
pub async fn export_images(
    storyboard: &Storyboard,
    title: &str,
    output_dir: &Path,
    loader: &dyn ImageLoader,
    pacer: &dyn Pacer,
    delay: Duration,
    progress: Option<&ProgressCallback>,
) -> StoryreelResult<ImageExportReport> {
    let mut panels = storyboard.panels_with_images();
    panels.sort_by_key(|p| p.order);
    if panels.is_empty() {
        return Err(StoryreelError::export(
            "No panels with artwork to export; generate or attach images first",
        ));
    }

    tokio::fs::create_dir_all(output_dir).await?;
    let total = panels.len() as u64;
    let mut report = ImageExportReport::default();

    for (index, panel) in panels.iter().enumerate() {
        if index > 0 {
            pacer.pause(delay).await;
        }
        if let Some(cb) = progress {
            cb(ExportProgress {
                percent: ((index as f64 / total as f64) * 100.0).round() as u8,
                frames_rendered: index as u64,
                total_frames: total,
                eta_secs: 0.0,
                stage: ExportStage::Rendering,
            });
        }

        let reference = panel.image_url.as_deref().unwrap_or_default();
        let path = output_dir.join(image_file_name(title, index));
        match write_panel_image(loader, reference, &path).await {
            Ok(()) => {
                tracing::debug!(panel = %panel.id, path = %path.display(), "Panel image written");
                report.written.push(path);
            }
            Err(err) => {
                tracing::warn!(panel = %panel.id, error = %err, "Skipping panel image");
                report.failed.push((panel.id.clone(), err.to_string()));
            }
        }
    }

    if let Some(cb) = progress {
        cb(ExportProgress {
            percent: 100,
            frames_rendered: total,
            total_frames: total,
            eta_secs: 0.0,
            stage: ExportStage::Complete,
        });
    }
    tracing::info!(
        written = report.written.len(),
        failed = report.failed.len(),
        dir = %output_dir.display(),
        "Image export finished"
    );
    Ok(report)
}

/// Fetch artwork and store it as PNG, transcoding other formats.
async fn write_panel_image(loader: &dyn ImageLoader, reference: &str, path: &Path) -> StoryreelResult<()> {
    let bytes = loader.fetch(reference).await?;
    let png = if bytes.starts_with(PNG_SIGNATURE) {
        bytes
    } else {
        tokio::task::spawn_blocking(move || transcode_to_png(&bytes))
            .await
            .map_err(|e| StoryreelError::render(format!("image transcode task failed: {e}")))??
    };
    tokio::fs::write(path, png).await?;
    Ok(())
}

fn transcode_to_png(bytes: &[u8]) -> StoryreelResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| StoryreelError::render(format!("failed to decode image: {e}")))?;
    let mut out = std::io::Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| StoryreelError::render(format!("failed to encode PNG: {e}")))?;
    Ok(out.into_inner())
}

/// Render every panel into one HTML document.
///
/// Panels without artwork appear as a numbered placeholder. Text is
/// escaped. Local image files are inlined as data URIs so the page has no
/// external file references; remote URLs are kept as links and never
/// fetched.
pub fn render_html(storyboard: &Storyboard, title: &str) -> StoryreelResult<String> {
    if storyboard.is_empty() {
        return Err(StoryreelError::export("No panels to export"));
    }

    let title = match title.trim() {
        "" => DEFAULT_TITLE,
        trimmed => trimmed,
    };
    let title = escape_html(title);

    let mut panels: Vec<&StoryboardPanel> = storyboard.panels.iter().collect();
    panels.sort_by_key(|p| p.order);

    let mut body = String::new();
    for (index, panel) in panels.iter().enumerate() {
        body.push_str(&panel_html(panel, index + 1));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <style>
    * {{ margin: 0; padding: 0; box-sizing: border-box; }}
    body {{ font-family: sans-serif; background: #1a1a2e; color: #fff; padding: 20px; }}
    .container {{ max-width: 900px; margin: 0 auto; }}
    h1 {{ text-align: center; margin-bottom: 10px; }}
    .panel {{ background: #16213e; border-radius: 8px; margin-bottom: 15px; overflow: hidden; }}
    .panel-image {{ width: 100%; display: flex; align-items: center; justify-content: center; background: #0f0f23; }}
    .panel-image img {{ max-width: 100%; max-height: 70vh; }}
    .placeholder {{ padding: 40px; color: #444; }}
    .panel-info {{ padding: 10px; }}
    .dialogue {{ background: #fff; color: #000; padding: 8px 12px; margin: 10px; border-radius: 8px; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>{title}</h1>
{body}  </div>
</body>
</html>
"#
    ))
}

fn panel_html(panel: &StoryboardPanel, position: usize) -> String {
    let image = match panel.image_source() {
        Some(source) => format!(
            r#"<img src="{}" alt="Panel {position}">"#,
            escape_html(&embeddable_src(source))
        ),
        None => format!(r#"<p class="placeholder">Panel {position}</p>"#),
    };
    let dialogue = panel
        .dialogue_text()
        .map(|text| format!("\n      <div class=\"dialogue\">{}</div>", escape_html(text)))
        .unwrap_or_default();

    format!(
        r#"    <div class="panel">
      <div class="panel-image">{image}</div>{dialogue}
      <div class="panel-info"><small>Panel {position} · {angle}</small><br>{description}</div>
    </div>
"#,
        angle = panel.camera_angle.label(),
        description = escape_html(&panel.description),
    )
}

/// Inline readable local files; other references pass through unchanged.
fn embeddable_src(source: ImageSource<'_>) -> String {
    match source {
        ImageSource::LocalPath(path) => match std::fs::read(path) {
            Ok(bytes) => format!(
                "data:{};base64,{}",
                mime_for_path(Path::new(path)),
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
            Err(err) => {
                tracing::warn!(path, error = %err, "Local artwork unreadable, linking by path");
                path.to_string()
            }
        },
        other => other.as_str().to_string(),
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Write the HTML page to `<output_dir>/<title>.html`.
pub fn export_html(storyboard: &Storyboard, title: &str, output_dir: &Path) -> StoryreelResult<PathBuf> {
    let html = render_html(storyboard, title)?;
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(html_file_name(title));
    std::fs::write(&path, html)?;
    tracing::info!(path = %path.display(), panels = storyboard.len(), "HTML export written");
    Ok(path)
}
