//! The one cached aggregate: average moves remaining across active games.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, instrument};

/// Shared slot holding the last computed average message.
///
/// Readers get whatever was stored last; freshness is best effort and no
/// operation depends on it.
#[derive(Debug, Clone, Default)]
pub struct AverageMovesCache {
    value: Arc<RwLock<Option<String>>>,
}

impl AverageMovesCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached message, if one was ever computed.
    pub fn get(&self) -> Option<String> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores the message for `average`.
    #[instrument(skip(self))]
    pub fn store(&self, average: f64) {
        let message = format!("The average moves remaining is {:.2}", average);
        debug!(%message, "Average cached");
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_stored() {
        let cache = AverageMovesCache::new();
        assert_eq!(cache.get(), None);
        cache.store(7.5);
        assert_eq!(
            cache.get().as_deref(),
            Some("The average moves remaining is 7.50")
        );
    }

    #[test]
    fn test_clones_share_the_slot() {
        let cache = AverageMovesCache::new();
        let reader = cache.clone();
        cache.store(1.0 / 3.0);
        assert_eq!(
            reader.get().as_deref(),
            Some("The average moves remaining is 0.33")
        );
    }
}
