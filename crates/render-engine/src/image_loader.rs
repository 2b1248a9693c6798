//! Loading panel artwork into raster images.
//!
//! A panel's image reference is a data URI, an http(s) URL, or a local
//! path. Preloading for a recording run fetches every reference
//! concurrently and waits for all of them; a failed load leaves that slot
//! empty and the compositor draws a placeholder instead.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_storyboard::ImageSource;
use tiny_skia::{IntSize, Pixmap};
use tokio::task::JoinSet;

/// Timeout for remote artwork downloads.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// A decoded image ready to draw.
#[derive(Clone)]
pub struct LoadedImage {
    pixmap: Pixmap,
}

impl std::fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl LoadedImage {
    /// Decode PNG, JPEG, WebP or GIF bytes.
    pub fn decode(bytes: &[u8]) -> StoryreelResult<Self> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|e| StoryreelError::render(format!("failed to decode image: {e}")))?
            .to_rgba8();
        Self::from_rgba(rgba.width(), rgba.height(), rgba.into_raw())
    }

    /// Wrap straight-alpha RGBA8 pixels.
    pub fn from_rgba(width: u32, height: u32, mut data: Vec<u8>) -> StoryreelResult<Self> {
        let size = IntSize::from_wh(width, height)
            .ok_or_else(|| StoryreelError::render("image has zero width or height"))?;
        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a < 255 {
                px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
                px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
                px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
            }
        }
        let pixmap = Pixmap::from_vec(data, size)
            .ok_or_else(|| StoryreelError::render("image buffer does not match its size"))?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

/// Fetches the encoded bytes behind an image reference.
#[async_trait::async_trait]
pub trait ImageLoader: Send + Sync {
    async fn fetch(&self, reference: &str) -> StoryreelResult<Vec<u8>>;
}

/// Fetch and decode one reference.
pub async fn load_image(loader: &dyn ImageLoader, reference: &str) -> StoryreelResult<LoadedImage> {
    let bytes = loader.fetch(reference).await?;
    tokio::task::spawn_blocking(move || LoadedImage::decode(&bytes))
        .await
        .map_err(|e| StoryreelError::render(format!("image decode task failed: {e}")))?
}

/// Fetch `reference` and return it as a base64 data URI.
///
/// Data URIs pass through unchanged. The MIME type of fetched bytes is
/// sniffed from their content.
pub async fn load_as_data_uri(loader: &dyn ImageLoader, reference: &str) -> StoryreelResult<String> {
    if let ImageSource::DataUri(uri) = ImageSource::classify(reference) {
        return Ok(uri.to_string());
    }
    let bytes = loader.fetch(reference).await?;
    let format = image::guess_format(&bytes)
        .map_err(|e| StoryreelError::render(format!("unrecognised image data in {reference}: {e}")))?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    ))
}

/// Reads data URIs and files directly and downloads URLs with `reqwest`.
#[derive(Clone)]
pub struct DefaultImageLoader {
    client: reqwest::Client,
}

impl DefaultImageLoader {
    pub fn new() -> StoryreelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| StoryreelError::render(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ImageLoader for DefaultImageLoader {
    async fn fetch(&self, reference: &str) -> StoryreelResult<Vec<u8>> {
        match ImageSource::classify(reference) {
            ImageSource::DataUri(uri) => decode_data_uri(uri),
            ImageSource::Remote(url) => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| StoryreelError::render(format!("failed to fetch {url}: {e}")))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(StoryreelError::render(format!(
                        "failed to fetch {url}: HTTP {status}"
                    )));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| StoryreelError::render(format!("failed to read {url}: {e}")))?;
                Ok(bytes.to_vec())
            }
            ImageSource::LocalPath(path) => read_local(Path::new(path)).await,
        }
    }
}

async fn read_local(path: &Path) -> StoryreelResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoryreelError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Decode the payload of a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> StoryreelResult<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| StoryreelError::render("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StoryreelError::render("data URI has no payload"))?;
    if !header.ends_with(";base64") {
        return Err(StoryreelError::unsupported(
            "only base64 data URIs are supported",
        ));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| StoryreelError::render(format!("invalid base64 in data URI: {e}")))
}

/// Load every reference concurrently and wait for all of them.
///
/// The result is index-aligned with `references`; failures are logged and
/// become `None`. `on_settled` is called with the number of settled loads
/// each time one finishes.
pub async fn preload_all(
    loader: Arc<dyn ImageLoader>,
    references: &[String],
    mut on_settled: impl FnMut(usize),
) -> Vec<Option<LoadedImage>> {
    let mut slots: Vec<Option<LoadedImage>> = vec![None; references.len()];
    let mut tasks = JoinSet::new();

    for (index, reference) in references.iter().enumerate() {
        let loader = loader.clone();
        let reference = reference.clone();
        tasks.spawn(async move {
            let result = load_image(loader.as_ref(), &reference).await;
            (index, result)
        });
    }

    let mut settled = 0;
    while let Some(joined) = tasks.join_next().await {
        settled += 1;
        match joined {
            Ok((index, Ok(image))) => slots[index] = Some(image),
            Ok((index, Err(err))) => {
                tracing::warn!(panel = index, error = %err, "Image failed to load, using placeholder");
            }
            Err(err) => tracing::warn!(error = %err, "Image load task failed"),
        }
        on_settled(settled);
    }

    slots
}
