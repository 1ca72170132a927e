//! Generation-checked read-through storage shared by the membership and
//! draft caches.

use std::hash::Hash;

use dashmap::DashMap;

#[derive(Debug)]
struct Slot<V> {
  generation: u64,
  value:      Option<V>,
}

impl<V> Default for Slot<V> {
  fn default() -> Self { Self { generation: 0, value: None } }
}

/// A concurrent map whose entries are loaded on demand and removed only by
/// explicit eviction.
///
/// Every key owns a slot carrying a generation counter. Eviction bumps the
/// generation under the shard lock. A loader records the generation before
/// computing (outside any lock) and publishes its value only if the
/// generation is unchanged, so a load that raced an eviction is returned to
/// its own caller but never cached.
#[derive(Debug)]
pub(crate) struct ReadThrough<K: Eq + Hash, V> {
  slots: DashMap<K, Slot<V>>,
}

impl<K, V> ReadThrough<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  pub(crate) fn new() -> Self { Self { slots: DashMap::new() } }

  /// The cached value for `key`, or the result of `load` if there is none.
  /// Errors from `load` are returned as-is and nothing is cached.
  pub(crate) fn get_or_load<E>(
    &self,
    key: &K,
    load: impl FnOnce() -> Result<V, E>,
  ) -> Result<V, E> {
    if let Some(slot) = self.slots.get(key)
      && let Some(value) = &slot.value
    {
      return Ok(value.clone());
    }

    let generation = {
      let slot = self.slots.entry(key.clone()).or_default();
      if let Some(value) = &slot.value {
        return Ok(value.clone());
      }
      slot.generation
    };

    let value = load()?;

    if let Some(mut slot) = self.slots.get_mut(key)
      && slot.generation == generation
    {
      slot.value = Some(value.clone());
    }
    Ok(value)
  }

  /// Drop the cached value for `key` and invalidate any in-flight load.
  /// A key that was never loaded is a no-op.
  pub(crate) fn evict(&self, key: &K) {
    if let Some(mut slot) = self.slots.get_mut(key) {
      slot.generation = slot.generation.wrapping_add(1);
      slot.value = None;
    }
  }

  #[cfg(test)]
  pub(crate) fn is_cached(&self, key: &K) -> bool {
    self.slots.get(key).is_some_and(|s| s.value.is_some())
  }
}
