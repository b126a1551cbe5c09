//! Off-thread image decoding.

mod job;
mod worker;

pub use job::{DecodeSource, DecodedImage, ImageDecodeJob, JobId};
pub use worker::ImageDecodeWorker;

#[cfg(test)]
pub(crate) use job::tests::png_bytes;
