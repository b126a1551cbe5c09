//! Decode jobs and their CPU-side results.

use std::fmt::Display;
use std::path::PathBuf;

use web_time::Instant;

/// Identifies a decode job for correlation with its waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the encoded image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeSource {
    /// Image file on disk (e.g. a path returned by the data service)
    Path(PathBuf),
    /// Encoded image bytes already in memory
    Bytes(Vec<u8>),
}

impl Display for DecodeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeSource::Path(path) => write!(f, "{}", path.display()),
            DecodeSource::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// Decoded RGBA8 pixels, ready to be uploaded by the frame-loop thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// RGBA pixel data (width * height * 4 bytes)
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// Decode `source` into RGBA8.
    pub fn decode(source: &DecodeSource) -> Result<Self, image::ImageError> {
        let img = match source {
            DecodeSource::Path(path) => image::open(path)?,
            DecodeSource::Bytes(bytes) => image::load_from_memory(bytes)?,
        };
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }
}

/// One unit of work for the decode worker.
///
/// After the worker runs it, `result` holds the image, or `None` if the
/// source could not be decoded.
#[derive(Debug)]
pub struct ImageDecodeJob {
    pub id: JobId,
    pub source: DecodeSource,
    pub result: Option<DecodedImage>,
    pub enqueued_at: Instant,
}

impl ImageDecodeJob {
    /// Create an undecoded job.
    pub fn new(id: JobId, source: DecodeSource) -> Self {
        Self {
            id,
            source,
            result: None,
            enqueued_at: Instant::now(),
        }
    }

    /// Decode the source into `result`. Failures leave `result` empty.
    pub fn run(&mut self) {
        match DecodedImage::decode(&self.source) {
            Ok(image) => {
                log::debug!(
                    "Decoded job {} from {}: {}x{} ({:?} after enqueue)",
                    self.id,
                    self.source,
                    image.width,
                    image.height,
                    self.enqueued_at.elapsed()
                );
                self.result = Some(image);
            }
            Err(e) => {
                log::debug!("Failed to decode job {} from {}: {}", self.id, self.source, e);
                self.result = None;
            }
        }
    }
}
