//! Last seen market price per item, kept across sessions for display deltas.

use sled::{
    Config,
    Db,
    Tree,
};
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        Mutex,
    },
};
use thiserror::Error;

const PRICES_TREE: &str = "market_prices";

#[derive(Debug, Error)]
pub enum PriceHistoryError {
    #[error("price store unavailable: {0}")]
    Backend(#[from] sled::Error),
    #[error("stored price for item {item_id} is {len} bytes, expected 8")]
    Corrupt { item_id: u64, len: usize },
    #[error("price store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, PriceHistoryError>;

pub trait PriceHistoryStorage {
    /// last recorded price for the item, in atomic units
    fn previous_price(&self, item_id: u64) -> Result<Option<u64>>;

    /// write or overwrite the price for the item
    fn record_price(&mut self, item_id: u64, price: u64) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryPriceHistory {
    prices: Arc<Mutex<HashMap<u64, u64>>>,
}

impl InMemoryPriceHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PriceHistoryStorage for InMemoryPriceHistory {
    fn previous_price(&self, item_id: u64) -> Result<Option<u64>> {
        let guard = self.prices.lock().map_err(|_| PriceHistoryError::Poisoned)?;
        Ok(guard.get(&item_id).copied())
    }

    fn record_price(&mut self, item_id: u64, price: u64) -> Result<()> {
        let mut guard = self.prices.lock().map_err(|_| PriceHistoryError::Poisoned)?;
        guard.insert(item_id, price);
        Ok(())
    }
}

/// Keys and values are big-endian u64.
#[derive(Clone)]
pub struct SledPriceHistory {
    tree: Tree,
}

impl SledPriceHistory {
    pub fn new(db: &Db) -> Result<Self> {
        let tree = db.open_tree(PRICES_TREE)?;
        Ok(Self { tree })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Config::default().path(path).open()?;
        Self::new(&db)
    }
}

impl PriceHistoryStorage for SledPriceHistory {
    fn previous_price(&self, item_id: u64) -> Result<Option<u64>> {
        let Some(bytes) = self.tree.get(item_id.to_be_bytes())? else {
            return Ok(None);
        };
        let arr: [u8; 8] = bytes
            .as_ref()
            .try_into()
            .map_err(|_| PriceHistoryError::Corrupt {
                item_id,
                len: bytes.len(),
            })?;
        Ok(Some(u64::from_be_bytes(arr)))
    }

    fn record_price(&mut self, item_id: u64, price: u64) -> Result<()> {
        self.tree
            .insert(item_id.to_be_bytes(), price.to_be_bytes().to_vec())?;
        self.tree.flush()?;
        Ok(())
    }
}

/// Either persistence backend, chosen at startup.
#[derive(Clone)]
pub enum PriceHistory {
    Memory(InMemoryPriceHistory),
    Sled(SledPriceHistory),
}

impl PriceHistoryStorage for PriceHistory {
    fn previous_price(&self, item_id: u64) -> Result<Option<u64>> {
        match self {
            PriceHistory::Memory(inner) => inner.previous_price(item_id),
            PriceHistory::Sled(inner) => inner.previous_price(item_id),
        }
    }

    fn record_price(&mut self, item_id: u64, price: u64) -> Result<()> {
        match self {
            PriceHistory::Memory(inner) => inner.record_price(item_id, price),
            PriceHistory::Sled(inner) => inner.record_price(item_id, price),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn previous_price__none_until_recorded() {
        // given
        let mut storage = InMemoryPriceHistory::new();
        assert_eq!(storage.previous_price(12).unwrap(), None);

        // when
        storage.record_price(12, 150).unwrap();
        storage.record_price(12, 175).unwrap();

        // then
        assert_eq!(storage.previous_price(12).unwrap(), Some(175));
    }

    #[test]
    fn sled_price_history__survives_reopen() {
        // given
        let temp_dir = TempDir::new("sled_price_history").unwrap();
        {
            let mut storage = SledPriceHistory::open(temp_dir.path()).unwrap();
            storage.record_price(31, 990).unwrap();
        }

        // when
        let reopened = SledPriceHistory::open(temp_dir.path()).unwrap();

        // then
        assert_eq!(reopened.previous_price(31).unwrap(), Some(990));
        assert_eq!(reopened.previous_price(32).unwrap(), None);
    }

    #[test]
    fn sled_price_history__reports_corrupt_values() {
        // given
        let temp_dir = TempDir::new("sled_price_corrupt").unwrap();
        let db = Config::default().path(temp_dir.path()).open().unwrap();
        let storage = SledPriceHistory::new(&db).unwrap();
        db.open_tree(PRICES_TREE)
            .unwrap()
            .insert(7u64.to_be_bytes(), &[1u8, 2][..])
            .unwrap();

        // when
        let result = storage.previous_price(7);

        // then
        assert!(matches!(
            result,
            Err(PriceHistoryError::Corrupt { item_id: 7, len: 2 })
        ));
    }
}
