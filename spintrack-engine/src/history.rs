use anyhow::{bail, Result};
use std::collections::VecDeque;

use spintrack_db::models::{HistoryEntry, Outcome, MAX_VALUE};

/// Historique borné, plus récent en tête, horodatages strictement décroissants.
pub struct HistoryStore {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl HistoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(1024)),
            cap: cap.max(1),
        }
    }

    /// Reprend des entrées déjà ordonnées (plus récent en tête), tronquées à la capacité.
    pub fn from_entries(entries: Vec<HistoryEntry>, cap: usize) -> Self {
        let mut store = Self::new(cap);
        store.entries.extend(entries.into_iter().take(store.cap));
        store
    }

    /// Ajoute en tête. L'horodatage est forcé au-dessus de celui de la tête actuelle ;
    /// l'entrée la plus ancienne est évincée au-delà de la capacité.
    pub fn prepend(&mut self, value: u8, now_ms: u64) -> Result<HistoryEntry> {
        if value > MAX_VALUE {
            bail!("Numéro {} hors limites (0-36)", value);
        }
        let ts = match self.entries.front().map(|newest| newest.ts.checked_add(1)) {
            Some(Some(next)) => now_ms.max(next),
            Some(None) => {
                self.renumber(now_ms);
                let next = self.entries.front().map_or(0, |newest| newest.ts + 1);
                now_ms.max(next)
            }
            None => now_ms,
        };
        let entry = HistoryEntry::new(value, ts);
        self.entries.push_front(entry.clone());
        while self.entries.len() > self.cap {
            if let Some(evicted) = self.entries.pop_back() {
                log::debug!("Historique plein, {} (ts {}) évincé", evicted.value, evicted.ts);
            }
        }
        Ok(entry)
    }

    /// Réattribue des horodatages consécutifs, du plus ancien au plus récent, juste sous `now_ms`.
    fn renumber(&mut self, now_ms: u64) {
        log::warn!("Horodatages saturés, renumérotation de {} entrée(s)", self.entries.len());
        let start = now_ms.saturating_sub(self.entries.len() as u64);
        for (i, entry) in self.entries.iter_mut().rev().enumerate() {
            entry.ts = start + i as u64;
        }
    }

    pub fn pop_oldest(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_back()
    }

    pub fn pop_newest(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_front()
    }

    /// Étiquette l'entrée d'horodatage `ts`. Retourne `false` si aucune ne correspond.
    pub fn tag_outcome(&mut self, ts: u64, outcome: Outcome) -> bool {
        match self.entries.iter_mut().find(|e| e.ts == ts) {
            Some(entry) => {
                entry.outcome = Some(outcome);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Valeurs, plus récente en tête.
    pub fn values(&self) -> Vec<u8> {
        self.entries.iter().map(|e| e.value).collect()
    }

    pub fn recent(&self, n: usize) -> Vec<u8> {
        self.entries.iter().take(n).map(|e| e.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strictly_decreasing(store: &HistoryStore) -> bool {
        let ts: Vec<u64> = store.entries().map(|e| e.ts).collect();
        ts.windows(2).all(|w| w[0] > w[1])
    }

    #[test]
    fn test_prepend_newest_first() {
        let mut store = HistoryStore::new(500);
        store.prepend(4, 1_000).unwrap();
        store.prepend(21, 2_000).unwrap();
        assert_eq!(store.values(), vec![21, 4]);
        assert_eq!(store.newest().map(|e| e.value), Some(21));
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut store = HistoryStore::new(500);
        for i in 0..500u64 {
            store.prepend((i % 37) as u8, 1_000 + i).unwrap();
        }
        assert_eq!(store.len(), 500);
        let oldest_before = store.entries().last().cloned().unwrap();
        assert_eq!(oldest_before.ts, 1_000);

        let entry = store.prepend(9, 5_000).unwrap();
        assert_eq!(store.len(), 500);
        assert_eq!(store.newest(), Some(&entry));
        assert_eq!(store.entries().last().map(|e| e.ts), Some(1_001));
    }

    #[test]
    fn test_same_millisecond_stays_strictly_decreasing() {
        let mut store = HistoryStore::new(500);
        for v in [1, 2, 3, 4] {
            store.prepend(v, 7_000).unwrap();
        }
        assert!(strictly_decreasing(&store));
        assert_eq!(store.newest().map(|e| e.ts), Some(7_003));
    }

    #[test]
    fn test_clock_going_backwards() {
        let mut store = HistoryStore::new(500);
        store.prepend(1, 10_000).unwrap();
        let e = store.prepend(2, 5_000).unwrap();
        assert_eq!(e.ts, 10_001);
        assert!(strictly_decreasing(&store));
    }

    #[test]
    fn test_saturated_timestamp_is_renumbered() {
        let entries = vec![HistoryEntry::new(5, u64::MAX), HistoryEntry::new(3, 10)];
        let mut store = HistoryStore::from_entries(entries, 500);
        let e = store.prepend(7, 1_000).unwrap();
        assert_eq!(e.ts, 1_000);
        assert_eq!(store.values(), vec![7, 5, 3]);
        let ts: Vec<u64> = store.entries().map(|e| e.ts).collect();
        assert_eq!(ts, vec![1_000, 999, 998]);
        assert!(strictly_decreasing(&store));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut store = HistoryStore::new(500);
        assert!(store.prepend(37, 1).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_pop_on_empty_is_noop() {
        let mut store = HistoryStore::new(500);
        assert!(store.pop_newest().is_none());
        assert!(store.pop_oldest().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_pops() {
        let mut store = HistoryStore::new(500);
        store.prepend(1, 1).unwrap();
        store.prepend(2, 2).unwrap();
        store.prepend(3, 3).unwrap();
        assert_eq!(store.pop_newest().map(|e| e.value), Some(3));
        assert_eq!(store.pop_oldest().map(|e| e.value), Some(1));
        assert_eq!(store.values(), vec![2]);
    }

    #[test]
    fn test_tag_outcome() {
        let mut store = HistoryStore::new(500);
        let e = store.prepend(17, 100).unwrap();
        store.prepend(3, 200).unwrap();
        assert!(store.tag_outcome(e.ts, Outcome::Win));
        assert!(!store.tag_outcome(999, Outcome::Lose));
        let tagged: Vec<Option<Outcome>> = store.entries().map(|e| e.outcome).collect();
        assert_eq!(tagged, vec![None, Some(Outcome::Win)]);
    }

    #[test]
    fn test_from_entries_truncates() {
        let entries: Vec<HistoryEntry> = (0..10u64).rev().map(|i| HistoryEntry::new(i as u8, i + 1)).collect();
        let store = HistoryStore::from_entries(entries, 4);
        assert_eq!(store.values(), vec![9, 8, 7, 6]);
        assert_eq!(store.recent(2), vec![9, 8]);
        assert_eq!(store.cap(), 4);
    }
}
