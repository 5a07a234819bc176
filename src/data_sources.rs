//! Dynamic data sources: contract instances discovered at runtime whose logs
//! must be fetched from their creation block onwards.

use ethers::types::Address;
use indexmap::IndexMap;
use log::{debug, info};
use std::sync::Mutex;

use crate::entities::DynamicDataSource;
use crate::types::conversions::address_to_string;

/// Template name of the reward distribution token deployed per LP pool.
pub const REWARD_DISTRIBUTION_TOKEN_TEMPLATE: &str = "RewardDistributionTokenUpgradeable";

/// Sink for watcher registrations issued by the handlers.
pub trait DataSourceRegistry: Send + Sync {
    /// Starts watching `address` as an instance of `template` from `block` on.
    fn create(&self, template: &'static str, address: Address, block: u64);
}

/// In-process registry. One entry per address; the first registration wins.
#[derive(Default)]
pub struct DataSources {
    inner: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    sources: IndexMap<Address, DynamicDataSource>,
    // Created since the last `take_new`, not yet persisted or fetched.
    fresh: Vec<DynamicDataSource>,
    duplicate_creates: u64,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from persisted sources without marking them fresh.
    pub fn from_persisted(sources: impl IntoIterator<Item = DynamicDataSource>) -> Self {
        let registry = Self::new();
        {
            let mut inner = registry.lock();
            for source in sources {
                inner.sources.entry(source.address).or_insert(source);
            }
        }
        registry
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        // Registry state stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.lock().sources.keys().copied().collect()
    }

    pub fn contains(&self, address: Address) -> bool {
        self.lock().sources.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.lock().sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sources.is_empty()
    }

    /// Number of `create` calls that hit an already watched address.
    pub fn duplicate_creates(&self) -> u64 {
        self.lock().duplicate_creates
    }

    /// Drains the sources registered since the previous call.
    pub fn take_new(&self) -> Vec<DynamicDataSource> {
        std::mem::take(&mut self.lock().fresh)
    }
}

impl DataSourceRegistry for DataSources {
    fn create(&self, template: &'static str, address: Address, block: u64) {
        let mut inner = self.lock();
        if inner.sources.contains_key(&address) {
            inner.duplicate_creates += 1;
            debug!(
                "{} data source for {:?} already registered, ignoring create at block {}",
                template, address, block
            );
            return;
        }

        let source = DynamicDataSource {
            id: address_to_string(address),
            template: template.to_string(),
            address,
            created_at_block: block,
        };
        info!(
            "Registered {} data source {:?} at block {}",
            template, address, block
        );
        inner.sources.insert(address, source.clone());
        inner.fresh.push(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_create_keeps_first_block() {
        let sources = DataSources::new();
        let pool = Address::from_low_u64_be(0xbb);

        sources.create(REWARD_DISTRIBUTION_TOKEN_TEMPLATE, pool, 100);
        sources.create(REWARD_DISTRIBUTION_TOKEN_TEMPLATE, pool, 150);

        assert_eq!(sources.len(), 1);
        assert_eq!(sources.duplicate_creates(), 1);
        let fresh = sources.take_new();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].created_at_block, 100);
        assert!(sources.take_new().is_empty());
    }

    #[test]
    fn test_persisted_sources_are_not_fresh() {
        let pool = Address::from_low_u64_be(0xbb);
        let sources = DataSources::from_persisted(vec![DynamicDataSource {
            id: address_to_string(pool),
            template: REWARD_DISTRIBUTION_TOKEN_TEMPLATE.to_string(),
            address: pool,
            created_at_block: 42,
        }]);

        assert!(sources.contains(pool));
        assert!(sources.take_new().is_empty());

        sources.create(REWARD_DISTRIBUTION_TOKEN_TEMPLATE, pool, 99);
        assert_eq!(sources.duplicate_creates(), 1);
    }

    #[test]
    fn test_addresses_in_registration_order() {
        let sources = DataSources::new();
        for n in [3u64, 1, 2] {
            sources.create(REWARD_DISTRIBUTION_TOKEN_TEMPLATE, Address::from_low_u64_be(n), n);
        }
        let order: Vec<u64> = sources
            .addresses()
            .iter()
            .map(|a| a.to_low_u64_be())
            .collect();
        assert_eq!(order, vec![3, 1, 2]);
    }
}
