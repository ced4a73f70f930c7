// ===============================
// src/wallet.rs
// ===============================
//
// Balances keyed by (wallet type, currency). A wallet whose free balance
// the venue has not computed (`available == None`) is unusable; the store
// queues a recalculation request for it, batched to the venue's rate limit
// of 30 keys per calc frame and 8 frames per second.

use ahash::AHashMap as HashMap;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::time::Instant;

use crate::domain::Wallet;

const CALC_KEYS_PER_BATCH: usize = 30;
const CALC_BATCHES_PER_SEC: u32 = 8;

#[derive(Debug)]
pub struct WalletStore {
    wallets: HashMap<(String, String), Wallet>,
    calc_queue: VecDeque<(String, String)>,
    batches_sent: u32,
    window_start: Option<Instant>,
}

impl Default for WalletStore {
    fn default() -> Self {
        Self {
            wallets: HashMap::new(),
            calc_queue: VecDeque::new(),
            batches_sent: 0,
            window_start: None,
        }
    }
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(&mut self, wallets: Vec<Wallet>) {
        self.wallets.clear();
        for w in wallets {
            self.apply_update(w);
        }
    }

    pub fn apply_update(&mut self, w: Wallet) {
        let key = (w.wallet_type.clone(), w.currency.clone());
        if w.available.is_none() && !self.calc_queue.contains(&key) {
            self.calc_queue.push_back(key.clone());
        }
        self.wallets.insert(key, w);
    }

    pub fn get(&self, wallet_type: &str, currency: &str) -> Option<&Wallet> {
        self.wallets
            .get(&(wallet_type.to_string(), currency.to_string()))
    }

    /// Free balance, or `None` while the wallet is stale.
    pub fn available(&self, wallet_type: &str, currency: &str) -> Option<Decimal> {
        self.get(wallet_type, currency).and_then(|w| w.available)
    }

    /// Next batch of wallet keys to recompute, or `None` when the queue is
    /// empty or the per-second budget is spent.
    pub fn next_calc_batch(&mut self, now: Instant) -> Option<Vec<String>> {
        if self.calc_queue.is_empty() {
            return None;
        }
        match self.window_start {
            Some(start) if now.duration_since(start).as_secs() < 1 => {
                if self.batches_sent >= CALC_BATCHES_PER_SEC {
                    return None;
                }
            }
            _ => {
                self.window_start = Some(now);
                self.batches_sent = 0;
            }
        }
        self.batches_sent += 1;
        let n = self.calc_queue.len().min(CALC_KEYS_PER_BATCH);
        let batch = self
            .calc_queue
            .drain(..n)
            .map(|(t, c)| format!("wallet_{}_{}", t, c))
            .collect();
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn wallet(cur: &str, avail: Option<Decimal>) -> Wallet {
        Wallet {
            wallet_type: "exchange".into(),
            currency: cur.into(),
            balance: dec!(100),
            available: avail,
        }
    }

    #[test]
    fn stale_wallet_is_unusable_until_refreshed() {
        let mut store = WalletStore::new();
        store.apply_update(wallet("USD", None));
        assert_eq!(store.available("exchange", "USD"), None);

        store.apply_update(wallet("USD", Some(dec!(99.5))));
        assert_eq!(store.available("exchange", "USD"), Some(dec!(99.5)));
    }

    #[test]
    fn stale_wallets_queue_one_calc_each() {
        let mut store = WalletStore::new();
        store.apply_update(wallet("USD", None));
        store.apply_update(wallet("USD", None));
        store.apply_update(wallet("BTC", None));

        let now = Instant::now();
        let batch = store.next_calc_batch(now).unwrap();
        assert_eq!(batch, vec!["wallet_exchange_USD", "wallet_exchange_BTC"]);
        assert!(store.next_calc_batch(now).is_none());
    }

    #[test]
    fn batches_capped_at_thirty_keys() {
        let mut store = WalletStore::new();
        for i in 0..45 {
            store.apply_update(wallet(&format!("C{i}"), None));
        }
        let now = Instant::now();
        assert_eq!(store.next_calc_batch(now).unwrap().len(), 30);
        assert_eq!(store.next_calc_batch(now).unwrap().len(), 15);
    }

    #[test]
    fn batch_rate_capped_per_second() {
        let mut store = WalletStore::new();
        for i in 0..400 {
            store.apply_update(wallet(&format!("C{i}"), None));
        }
        let now = Instant::now();
        let mut sent = 0;
        while store.next_calc_batch(now).is_some() {
            sent += 1;
        }
        assert_eq!(sent, 8);
    }
}
