use near_sdk::near;
use near_sdk::store::IterableMap;

use crate::swap::{SwapId, SwapRecord};

/// Owns every swap record. Each primitive touches exactly one id.
#[near(serializers = [borsh])]
pub struct SwapStore {
    records: IterableMap<SwapId, SwapRecord>,
}

impl SwapStore {
    pub fn new(prefix: &[u8]) -> Self {
        Self {
            records: IterableMap::new(prefix.to_vec()),
        }
    }

    pub fn get(&self, id: &SwapId) -> Option<&SwapRecord> {
        self.records.get(id)
    }

    /// Inserts `record` unless `id` is already taken (tombstones included).
    /// Returns `false` and leaves the store untouched on a collision.
    pub fn insert_if_absent(&mut self, id: SwapId, record: SwapRecord) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        self.records.insert(id, record);
        true
    }

    /// Applies `f` to the record stored under `id`, if any.
    pub fn update_if_present<T>(
        &mut self,
        id: &SwapId,
        f: impl FnOnce(&mut SwapRecord) -> T,
    ) -> Option<T> {
        self.records.get_mut(id).map(f)
    }

    /// Active records in insertion-independent storage order, for paginated views.
    pub fn active(&self, from_index: usize, limit: usize) -> Vec<(SwapId, SwapRecord)> {
        self.records
            .iter()
            .filter(|(_, record)| record.active)
            .skip(from_index)
            .take(limit)
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    /// Every record ever created, tombstones included.
    pub fn count(&self) -> u32 {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::commit;
    use crate::swap::SwapOrder;
    use crate::timelocks::TimelockSchedule;
    use near_sdk::json_types::{U128, U64};
    use near_sdk::test_utils::accounts;

    fn record() -> SwapRecord {
        let order = SwapOrder {
            nonce: U64(1),
            maker: accounts(0),
            taker: accounts(1),
            amount: U128(100),
            safety_deposit: U128(10),
            counterparty_amount: U128(5_000),
            counterparty_asset: [3u8; 32].into(),
        };
        SwapRecord::new(commit(&[1u8; 32]), &order, TimelockSchedule::default(), 0)
    }

    #[test]
    fn insert_if_absent_refuses_duplicates() {
        let mut store = SwapStore::new(b"t");
        assert!(store.insert_if_absent([1u8; 32], record()));

        let mut other = record();
        other.counterparty_object_ref = Some(42);
        assert!(!store.insert_if_absent([1u8; 32], other));
        assert_eq!(store.get(&[1u8; 32]), Some(&record()));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn update_if_present_skips_missing_ids() {
        let mut store = SwapStore::new(b"t");
        assert_eq!(store.update_if_present(&[2u8; 32], |r| r.active = false), None);
        assert!(store.get(&[2u8; 32]).is_none());
    }

    #[test]
    fn update_if_present_mutates_in_place() {
        let mut store = SwapStore::new(b"t");
        store.insert_if_absent([1u8; 32], record());
        store.update_if_present(&[1u8; 32], |r| r.counterparty_object_ref = Some(7));
        assert_eq!(
            store.get(&[1u8; 32]).and_then(|r| r.counterparty_object_ref),
            Some(7)
        );
    }

    #[test]
    fn active_view_hides_tombstones() {
        let mut store = SwapStore::new(b"t");
        store.insert_if_absent([1u8; 32], record());
        store.insert_if_absent([2u8; 32], record());
        store.update_if_present(&[1u8; 32], |r| r.active = false);

        let active = store.active(0, 10);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, [2u8; 32]);
        assert_eq!(store.count(), 2);
    }
}
