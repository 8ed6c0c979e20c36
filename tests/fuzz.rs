//! Fuzz test - compares the engine against a naive reference book.
//!
//! The reference uses BTreeMaps and Vecs: slow but obviously correct.
//! Both implementations consume the same seeded command stream and must
//! agree on best prices, resting counts, and traded volume.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};

use tickmatch::{Consumer, Engine, OrderType, Side, TradeRecord};

/// Naive price-time-priority book for verification
struct ReferenceBook {
    bids: BTreeMap<i64, Vec<(u64, u32)>>, // price -> [(order_id, qty)]
    asks: BTreeMap<i64, Vec<(u64, u32)>>,
    orders: HashMap<u64, (Side, i64)>, // order_id -> (side, price)
}

impl ReferenceBook {
    fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: HashMap::new(),
        }
    }

    fn best_bid(&self) -> Option<i64> {
        self.bids.keys().next_back().copied()
    }

    fn best_ask(&self) -> Option<i64> {
        self.asks.keys().next().copied()
    }

    fn place(&mut self, order_id: u64, side: Side, price: i64, mut qty: u32) -> u32 {
        let mut traded = 0u32;

        match side {
            Side::Buy => {
                let mut emptied = Vec::new();
                for (&ask_price, queue) in self.asks.iter_mut() {
                    if ask_price > price || qty == 0 {
                        break;
                    }
                    while !queue.is_empty() && qty > 0 {
                        let fill = queue[0].1.min(qty);
                        queue[0].1 -= fill;
                        qty -= fill;
                        traded += fill;
                        if queue[0].1 == 0 {
                            let (maker_id, _) = queue.remove(0);
                            self.orders.remove(&maker_id);
                        }
                    }
                    if queue.is_empty() {
                        emptied.push(ask_price);
                    }
                }
                for p in emptied {
                    self.asks.remove(&p);
                }

                if qty > 0 {
                    self.bids.entry(price).or_default().push((order_id, qty));
                    self.orders.insert(order_id, (Side::Buy, price));
                }
            }
            Side::Sell => {
                let mut emptied = Vec::new();
                let prices: Vec<i64> = self.bids.keys().rev().copied().collect();
                for bid_price in prices {
                    if bid_price < price || qty == 0 {
                        break;
                    }
                    let queue = self.bids.get_mut(&bid_price).unwrap();
                    while !queue.is_empty() && qty > 0 {
                        let fill = queue[0].1.min(qty);
                        queue[0].1 -= fill;
                        qty -= fill;
                        traded += fill;
                        if queue[0].1 == 0 {
                            let (maker_id, _) = queue.remove(0);
                            self.orders.remove(&maker_id);
                        }
                    }
                    if queue.is_empty() {
                        emptied.push(bid_price);
                    }
                }
                for p in emptied {
                    self.bids.remove(&p);
                }

                if qty > 0 {
                    self.asks.entry(price).or_default().push((order_id, qty));
                    self.orders.insert(order_id, (Side::Sell, price));
                }
            }
        }

        traded
    }

    fn cancel(&mut self, order_id: u64) -> bool {
        if let Some((side, price)) = self.orders.remove(&order_id) {
            let book = match side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            if let Some(queue) = book.get_mut(&price) {
                queue.retain(|(id, _)| *id != order_id);
                if queue.is_empty() {
                    book.remove(&price);
                }
            }
            true
        } else {
            false
        }
    }

    fn order_count(&self) -> usize {
        self.orders.len()
    }
}

fn drained_volume(rx: &mut Consumer<TradeRecord>, last_ts: &mut Option<u64>) -> u64 {
    let mut volume = 0u64;
    while let Some(t) = rx.try_pop() {
        volume += u64::from(t.qty);
        if let Some(prev) = *last_ts {
            assert!(t.timestamp > prev, "timestamps must strictly increase");
        }
        *last_ts = Some(t.timestamp);
    }
    volume
}

#[test]
fn test_fuzz_best_prices_and_counts() {
    const SEED: u64 = 0xFEED_FACE;
    const OPS: usize = 20_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let (mut engine, mut rx) = Engine::new(100_000);
    let mut reference = ReferenceBook::new();

    let mut next_order_id = 1u64;
    let mut active: Vec<u64> = Vec::new();
    let mut last_ts = None;

    for i in 0..OPS {
        // 70% place, 30% cancel
        if active.is_empty() || rng.gen_bool(0.7) {
            let order_id = next_order_id;
            next_order_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let price = rng.gen_range(9_800..10_200) * 100;
            let qty = rng.gen_range(1..200);

            engine.submit(order_id, side, OrderType::Limit, qty, price, 0).unwrap();
            reference.place(order_id, side, price, qty);
            active.push(order_id);
        } else {
            let idx = rng.gen_range(0..active.len());
            let order_id = active.swap_remove(idx);

            let removed = engine.cancel(order_id);
            assert_eq!(removed, reference.cancel(order_id), "cancel disagreement at op {i}");
        }

        drained_volume(&mut rx, &mut last_ts);

        assert_eq!(engine.best_bid(), reference.best_bid(), "best bid mismatch at op {i}");
        assert_eq!(engine.best_ask(), reference.best_ask(), "best ask mismatch at op {i}");
        if i % 100 == 0 {
            assert_eq!(engine.resting_count(), reference.order_count(), "count mismatch at op {i}");
        }
    }

    assert_eq!(engine.resting_count(), reference.order_count());
    assert_eq!(engine.dropped_trades(), 0);
}

#[test]
fn test_fuzz_traded_volume() {
    const SEED: u64 = 0x12345678;
    const OPS: usize = 10_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let (mut engine, mut rx) = Engine::new(100_000);
    let mut reference = ReferenceBook::new();

    let mut engine_volume = 0u64;
    let mut reference_volume = 0u64;
    let mut last_ts = None;

    for i in 0..OPS {
        let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let price = rng.gen_range(9_900..10_100) * 100;
        let qty = rng.gen_range(1..200);

        engine.submit(i as u64 + 1, side, OrderType::Limit, qty, price, 0).unwrap();
        reference_volume += u64::from(reference.place(i as u64 + 1, side, price, qty));
        engine_volume += drained_volume(&mut rx, &mut last_ts);
    }

    assert_eq!(engine_volume, reference_volume, "total traded volume diverged");
}

#[test]
fn test_fuzz_market_orders_against_reference() {
    const SEED: u64 = 0xBADC0DE;
    const OPS: usize = 10_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let (mut engine, mut rx) = Engine::new(100_000);
    let mut reference = ReferenceBook::new();

    let mut last_ts = None;

    for i in 0..OPS {
        let id = i as u64 + 1;
        let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let qty = rng.gen_range(1..100);

        if rng.gen_bool(0.3) {
            // A market order crosses anything; mirror with an extreme limit
            let _ = engine.submit(id, side, OrderType::Market, qty, 0, 0);
            let extreme = match side {
                Side::Buy => i64::MAX,
                Side::Sell => i64::MIN + 1,
            };
            // Reference "market": cross at any price, then drop the rest
            reference.place(id, side, extreme, qty);
            reference.cancel(id);
        } else {
            let price = rng.gen_range(9_950..10_050) * 100;
            engine.submit(id, side, OrderType::Limit, qty, price, 0).unwrap();
            reference.place(id, side, price, qty);
        }

        drained_volume(&mut rx, &mut last_ts);

        assert_eq!(engine.best_bid(), reference.best_bid(), "best bid mismatch at op {i}");
        assert_eq!(engine.best_ask(), reference.best_ask(), "best ask mismatch at op {i}");
    }

    assert_eq!(engine.resting_count(), reference.order_count());
}
