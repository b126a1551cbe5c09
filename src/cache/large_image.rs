//! Bounded set of holders currently showing a large image.

use std::collections::VecDeque;

use super::{HolderId, HolderStore, ImageHolder};

/// What happened to the oldest entry when a registration needed its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Holder was still alive and reverted to its fallback image
    Downgraded(HolderId),
    /// Holder no longer existed; the entry was dropped silently
    Stale(HolderId),
}

impl Eviction {
    /// The evicted holder.
    pub fn holder(&self) -> HolderId {
        match self {
            Eviction::Downgraded(id) | Eviction::Stale(id) => *id,
        }
    }
}

/// Outcome of [`LargeImageCache::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Image installed and holder appended to the eviction order
    Installed { evicted: Option<Eviction> },
    /// Holder was already cached; image replaced, position kept
    AlreadyRegistered,
    /// Holder is not in the store; image dropped
    MissingHolder,
}

/// FIFO-evicting pool of upgraded holders.
///
/// Entries are holder ids, not references, and liveness is checked against
/// the [`HolderStore`] before any callback runs. Eviction order is insertion
/// order, regardless of how recently a holder was looked at.
#[derive(Debug, Clone)]
pub struct LargeImageCache {
    capacity: usize,
    order: VecDeque<HolderId>,
}

impl LargeImageCache {
    /// Create an empty cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Install `image` on holder `id`, evicting the oldest entry if full.
    pub fn register<S: HolderStore>(
        &mut self,
        store: &mut S,
        id: HolderId,
        image: <S::Holder as ImageHolder>::Image,
    ) -> Registration {
        if !store.is_active(id) {
            log::debug!("Holder {} is gone, dropping its large image", id);
            return Registration::MissingHolder;
        }

        if self.order.contains(&id) {
            if let Some(holder) = store.holder_mut(id) {
                holder.install_large_image(image);
            }
            return Registration::AlreadyRegistered;
        }

        let evicted = if self.order.len() >= self.capacity {
            self.evict_oldest(store)
        } else {
            None
        };

        let Some(holder) = store.holder_mut(id) else {
            return Registration::MissingHolder;
        };
        holder.install_large_image(image);
        self.order.push_back(id);
        log::trace!("Holder {} upgraded ({}/{})", id, self.order.len(), self.capacity);
        Registration::Installed { evicted }
    }

    fn evict_oldest<S: HolderStore>(&mut self, store: &mut S) -> Option<Eviction> {
        let oldest = self.order.pop_front()?;
        let holder = if store.is_active(oldest) {
            store.holder_mut(oldest)
        } else {
            None
        };
        if let Some(holder) = holder {
            holder.downgrade();
            log::debug!("Evicted holder {} from large image cache", oldest);
            return Some(Eviction::Downgraded(oldest));
        }
        log::trace!("Dropped stale large image entry for holder {}", oldest);
        Some(Eviction::Stale(oldest))
    }

    /// Remove `id` without downgrading it. Returns whether it was cached.
    pub fn forget(&mut self, id: HolderId) -> bool {
        let before = self.order.len();
        self.order.retain(|entry| *entry != id);
        self.order.len() != before
    }

    /// Drop entries whose holders no longer exist. Returns how many.
    pub fn prune<S: HolderStore>(&mut self, store: &S) -> usize {
        let before = self.order.len();
        self.order.retain(|id| store.is_active(*id));
        before - self.order.len()
    }

    /// Whether `id` currently holds a large image.
    pub fn contains(&self, id: HolderId) -> bool {
        self.order.contains(&id)
    }

    /// Cached holders, oldest first.
    pub fn holders(&self) -> impl Iterator<Item = HolderId> + '_ {
        self.order.iter().copied()
    }

    /// Number of holders showing a large image.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no holder shows a large image.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Most large images held at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct Painting {
        large: Option<&'static str>,
        downgrades: usize,
    }

    impl ImageHolder for Painting {
        type Image = &'static str;

        fn install_large_image(&mut self, image: Self::Image) {
            self.large = Some(image);
        }

        fn downgrade(&mut self) {
            self.large = None;
            self.downgrades += 1;
        }
    }

    fn wall(count: u64) -> HashMap<HolderId, Painting> {
        (1..=count).map(|id| (HolderId(id), Painting::default())).collect()
    }

    #[test]
    fn test_sixth_registration_evicts_first() {
        let mut store = wall(6);
        let mut cache = LargeImageCache::new(5);
        for id in 1..=5 {
            assert_eq!(
                cache.register(&mut store, HolderId(id), "hi-res"),
                Registration::Installed { evicted: None }
            );
        }
        assert_eq!(cache.len(), 5);

        let outcome = cache.register(&mut store, HolderId(6), "hi-res");
        assert_eq!(
            outcome,
            Registration::Installed {
                evicted: Some(Eviction::Downgraded(HolderId(1)))
            }
        );
        assert_eq!(store[&HolderId(1)].downgrades, 1);
        assert_eq!(store[&HolderId(1)].large, None);
        assert_eq!(store[&HolderId(6)].large, Some("hi-res"));
        assert_eq!(
            cache.holders().collect::<Vec<_>>(),
            (2..=6).map(HolderId).collect::<Vec<_>>()
        );
        for id in 2..=5 {
            assert_eq!(store[&HolderId(id)].downgrades, 0);
        }
    }

    #[test]
    fn test_stale_oldest_is_skipped_but_frees_slot() {
        let mut store = wall(6);
        let mut cache = LargeImageCache::new(5);
        for id in 1..=5 {
            cache.register(&mut store, HolderId(id), "hi-res");
        }
        store.remove(&HolderId(1));

        let outcome = cache.register(&mut store, HolderId(6), "hi-res");
        assert_eq!(
            outcome,
            Registration::Installed {
                evicted: Some(Eviction::Stale(HolderId(1)))
            }
        );
        assert_eq!(cache.len(), 5);
        for id in 2..=5 {
            assert_eq!(store[&HolderId(id)].downgrades, 0);
            assert!(cache.contains(HolderId(id)));
        }
    }

    #[test]
    fn test_eviction_ignores_recency() {
        let mut store = wall(3);
        let mut cache = LargeImageCache::new(2);
        cache.register(&mut store, HolderId(1), "a");
        cache.register(&mut store, HolderId(2), "b");
        // Refreshing holder 1 does not move it to the back.
        assert_eq!(
            cache.register(&mut store, HolderId(1), "a2"),
            Registration::AlreadyRegistered
        );
        assert_eq!(store[&HolderId(1)].large, Some("a2"));

        let outcome = cache.register(&mut store, HolderId(3), "c");
        assert_eq!(
            outcome,
            Registration::Installed {
                evicted: Some(Eviction::Downgraded(HolderId(1)))
            }
        );
    }

    #[test]
    fn test_missing_holder_is_not_cached() {
        let mut store = wall(1);
        let mut cache = LargeImageCache::new(5);
        assert_eq!(
            cache.register(&mut store, HolderId(9), "x"),
            Registration::MissingHolder
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_forget_and_prune() {
        let mut store = wall(3);
        let mut cache = LargeImageCache::new(5);
        for id in 1..=3 {
            cache.register(&mut store, HolderId(id), "hi-res");
        }
        assert!(cache.forget(HolderId(2)));
        assert!(!cache.forget(HolderId(2)));
        assert_eq!(store[&HolderId(2)].downgrades, 0);

        store.remove(&HolderId(3));
        assert_eq!(cache.prune(&store), 1);
        assert_eq!(cache.holders().collect::<Vec<_>>(), vec![HolderId(1)]);
    }

    #[test]
    fn test_capacity_is_at_least_one() {
        let mut store = wall(2);
        let mut cache = LargeImageCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.register(&mut store, HolderId(1), "a");
        let outcome = cache.register(&mut store, HolderId(2), "b");
        assert_eq!(
            outcome,
            Registration::Installed {
                evicted: Some(Eviction::Downgraded(HolderId(1)))
            }
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(Eviction::Stale(HolderId(4)).holder(), HolderId(4));
    }
}
