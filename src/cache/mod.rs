//! Holders that can temporarily show a higher-resolution image.
//!
//! Holders are addressed by [`HolderId`] through a [`HolderStore`]; the cache
//! never keeps references to them, so a holder that disappears simply leaves
//! a stale id behind.

mod large_image;

use std::collections::HashMap;
use std::fmt::Display;

pub use large_image::{Eviction, LargeImageCache, Registration};

/// Identity of a visible object that can hold a large image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(pub u64);

impl Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object that can be upgraded to a large image and back.
pub trait ImageHolder {
    /// The upgraded image type (e.g. decoded pixels or a texture handle)
    type Image;

    /// Show `image` instead of the low-resolution fallback.
    fn install_large_image(&mut self, image: Self::Image);

    /// Revert to the low-resolution fallback.
    fn downgrade(&mut self);
}

/// Lookup of live holders by id.
pub trait HolderStore {
    /// The holder type this store hands out
    type Holder: ImageHolder;

    /// Whether `id` still refers to a live holder.
    fn is_active(&self, id: HolderId) -> bool;

    /// The live holder for `id`.
    fn holder_mut(&mut self, id: HolderId) -> Option<&mut Self::Holder>;
}

impl<H: ImageHolder> HolderStore for HashMap<HolderId, H> {
    type Holder = H;

    fn is_active(&self, id: HolderId) -> bool {
        self.contains_key(&id)
    }

    fn holder_mut(&mut self, id: HolderId) -> Option<&mut H> {
        self.get_mut(&id)
    }
}
