use crate::constants::{NS_WATCHLIST, WATCHLIST_EXPANDED_SUFFIX};
use crate::error::{AppError, Result};
use crate::models::Candidate;
use crate::services::storage::{get_value, set_value, SharedStore};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub type SharedWatchlist = Arc<Watchlist>;

#[derive(Debug, Default)]
struct WatchlistInner {
    items: Vec<Candidate>,
    expanded: BTreeMap<String, bool>,
}

/// Ordered, symbol-unique list of instruments shared by every view
///
/// The list is persisted as a whole on every change (last writer wins); the
/// per-symbol expanded flags live under a sibling key.
pub struct Watchlist {
    store: SharedStore,
    inner: RwLock<WatchlistInner>,
}

impl Watchlist {
    pub fn load(store: SharedStore) -> Self {
        let stored: Vec<Candidate> = get_value(store.as_ref(), NS_WATCHLIST).unwrap_or_default();
        let items = unique_by_symbol(stored);
        let expanded: BTreeMap<String, bool> =
            get_value(store.as_ref(), &expanded_key()).unwrap_or_default();

        info!(items = items.len(), "Loaded watchlist");
        Self {
            store,
            inner: RwLock::new(WatchlistInner { items, expanded }),
        }
    }

    pub fn items(&self) -> Vec<Candidate> {
        self.inner.read().items.clone()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.inner.read().items.iter().map(|c| c.symbol.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.inner.read().items.iter().any(|c| c.symbol == symbol)
    }

    /// Append unless the symbol is already listed; returns whether it was added
    pub fn add(&self, candidate: Candidate) -> bool {
        if candidate.symbol.trim().is_empty() {
            return false;
        }
        let mut inner = self.inner.write();
        if inner.items.iter().any(|c| c.symbol == candidate.symbol) {
            debug!(symbol = %candidate.symbol, "Already on watchlist");
            return false;
        }
        info!(symbol = %candidate.symbol, "Added to watchlist");
        inner.items.push(candidate);
        self.save_items(&inner);
        true
    }

    pub fn remove(&self, symbol: &str) -> bool {
        let mut inner = self.inner.write();
        let before = inner.items.len();
        inner.items.retain(|c| c.symbol != symbol);
        if inner.items.len() == before {
            return false;
        }
        self.save_items(&inner);
        if inner.expanded.remove(symbol).is_some() {
            self.save_expanded(&inner);
        }
        info!(symbol, "Removed from watchlist");
        true
    }

    /// Take the entry at `from` out and reinsert it at `to`
    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        let mut inner = self.inner.write();
        let len = inner.items.len();
        if from >= len || to >= len {
            return Err(AppError::InvalidInput(format!(
                "Cannot move item {} to {}: watchlist has {} entries",
                from, to, len
            )));
        }
        if from == to {
            return Ok(());
        }
        let moved = inner.items.remove(from);
        inner.items.insert(to, moved);
        self.save_items(&inner);
        Ok(())
    }

    /// Flip the expanded flag of a listed symbol; returns the new flag
    pub fn toggle_expanded(&self, symbol: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        if !inner.items.iter().any(|c| c.symbol == symbol) {
            return Err(AppError::NotFound(format!("{} is not on the watchlist", symbol)));
        }
        let next = !inner.expanded.get(symbol).copied().unwrap_or(false);
        inner.expanded.insert(symbol.to_string(), next);
        self.save_expanded(&inner);
        Ok(next)
    }

    pub fn is_expanded(&self, symbol: &str) -> bool {
        self.inner.read().expanded.get(symbol).copied().unwrap_or(false)
    }

    /// Listed symbols whose card is expanded, in list order
    pub fn expanded_symbols(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .items
            .iter()
            .filter(|c| inner.expanded.get(&c.symbol).copied().unwrap_or(false))
            .map(|c| c.symbol.clone())
            .collect()
    }

    fn save_items(&self, inner: &WatchlistInner) {
        set_value(self.store.as_ref(), NS_WATCHLIST, &inner.items);
    }

    fn save_expanded(&self, inner: &WatchlistInner) {
        set_value(self.store.as_ref(), &expanded_key(), &inner.expanded);
    }
}

fn expanded_key() -> String {
    format!("{}{}", NS_WATCHLIST, WATCHLIST_EXPANDED_SUFFIX)
}

/// First occurrence of each symbol wins, in order; blank symbols are dropped
fn unique_by_symbol(items: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|c| !c.symbol.trim().is_empty() && seen.insert(c.symbol.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{KeyValueStore, MemoryStore};

    fn hk(symbol: &str, name: &str) -> Candidate {
        Candidate::new(symbol, name, "", "HK")
    }

    fn fresh() -> (Arc<MemoryStore>, Watchlist) {
        let store = Arc::new(MemoryStore::new());
        let list = Watchlist::load(store.clone());
        (store, list)
    }

    #[test]
    fn test_add_twice_keeps_original_position() {
        let (_, list) = fresh();
        assert!(list.add(hk("0700.HK", "TENCENT")));
        assert!(list.add(hk("9988.HK", "BABA-SW")));
        assert!(!list.add(hk("0700.HK", "TENCENT AGAIN")));

        assert_eq!(list.symbols(), vec!["0700.HK", "9988.HK"]);
        assert_eq!(list.items()[0].display_name, "TENCENT");
    }

    #[test]
    fn test_blank_symbol_is_rejected() {
        let (_, list) = fresh();
        assert!(!list.add(hk("  ", "NOTHING")));
        assert!(list.is_empty());
    }

    #[test]
    fn test_move_item() {
        let (_, list) = fresh();
        for s in ["A", "B", "C", "D"] {
            list.add(hk(s, s));
        }
        list.move_item(0, 2).unwrap();
        assert_eq!(list.symbols(), vec!["B", "C", "A", "D"]);
        list.move_item(3, 0).unwrap();
        assert_eq!(list.symbols(), vec!["D", "B", "C", "A"]);

        assert!(matches!(list.move_item(0, 4), Err(AppError::InvalidInput(_))));
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_remove_drops_expanded_flag() {
        let (store, list) = fresh();
        list.add(hk("0700.HK", "TENCENT"));
        list.add(hk("9988.HK", "BABA-SW"));
        assert_eq!(list.toggle_expanded("0700.HK"), Ok(true));
        assert_eq!(list.expanded_symbols(), vec!["0700.HK"]);

        assert!(list.remove("0700.HK"));
        assert!(!list.remove("0700.HK"));
        assert!(!list.is_expanded("0700.HK"));

        let reloaded = Watchlist::load(store);
        assert_eq!(reloaded.symbols(), vec!["9988.HK"]);
        assert!(reloaded.expanded_symbols().is_empty());
    }

    #[test]
    fn test_toggle_unknown_symbol() {
        let (_, list) = fresh();
        assert!(matches!(list.toggle_expanded("NOPE"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_persists_order_and_flags() {
        let (store, list) = fresh();
        list.add(hk("A", "A"));
        list.add(hk("B", "B"));
        list.move_item(1, 0).unwrap();
        list.toggle_expanded("A").unwrap();

        let reloaded = Watchlist::load(store);
        assert_eq!(reloaded.symbols(), vec!["B", "A"]);
        assert!(reloaded.is_expanded("A"));
        assert!(!reloaded.is_expanded("B"));
    }

    #[test]
    fn test_load_dedupes_and_tolerates_garbage() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                NS_WATCHLIST,
                r#"[{"symbol":"A","name":"first"},{"symbol":""},{"symbol":"A","name":"second"},{"symbol":"B"}]"#,
            )
            .unwrap();
        store.set(&expanded_key(), "oops").unwrap();

        let list = Watchlist::load(store.clone());
        assert_eq!(list.symbols(), vec!["A", "B"]);
        assert_eq!(list.items()[0].display_name, "first");
        assert!(list.expanded_symbols().is_empty());

        store.set(NS_WATCHLIST, "{}").unwrap();
        assert!(Watchlist::load(store).is_empty());
    }
}
