//! Gallery Bridge
//!
//! Frame-loop side of an asset pipeline that talks to an out-of-thread gallery
//! data service. Requests are correlated by id and resolved once per frame,
//! images are decoded on a background thread, and a small FIFO cache bounds
//! how many objects show a large image at once.

pub mod bridge;
pub mod cache;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod service;

pub use bridge::{ClientHandle, DecoderHandle, GalleryBridge, TickReport};
pub use cache::{HolderId, HolderStore, ImageHolder, LargeImageCache};
pub use config::BridgeConfig;
pub use decode::{DecodeSource, DecodedImage, ImageDecodeWorker};
pub use error::ServiceError;
pub use service::{NativeService, RequestHandler, ThreadedService};
