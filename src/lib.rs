//! # tickmatch
//!
//! A single-instrument limit order book matching engine with strict
//! price-time priority and stop orders.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns the book exclusively (no locks)
//! - **Arena Allocation**: no heap allocation in the hot path; orders
//!   and price levels live in fixed pools addressed by 32-bit indices
//! - **Balanced Book**: price levels sit in AVL trees, so best-price
//!   access and level churn stay O(log N) under any price distribution
//! - **Bounded Output**: fills leave through a lock-free SPSC ring;
//!   back-pressure drops records, never blocks the engine
//!
//! ## Architecture
//!
//! ```text
//! [Driver] --> submit/cancel/modify --> [Engine Thread]
//!                                            |
//!                      bid/ask AVL trees + stop trees + id maps
//!                                            |
//!                                    [SPSC Trade Ring] --> [Drain Thread]
//! ```
//!
//! Market, limit, stop, and stop-limit orders are supported. Stops arm
//! in a separate pair of trees keyed by trigger price and convert to
//! market/limit orders when a trade prints at or past their trigger;
//! triggering is evaluated once per submit against the final executed
//! price.

pub mod arena;
pub mod command;
pub mod engine;
pub mod matching;
pub mod order_book;
pub mod price_level;
pub mod ring;
pub mod tree;

// Re-exports for convenience
pub use arena::{LevelIx, OrderArena, OrderIx, OrderNode, NIL};
pub use command::{
    Action, CancelOrder, ModifyOrder, OrderType, Reject, Side, SubmitOrder, TradeRecord,
    TriggeredStop, BUY_MARKET_PRICE, SELL_MARKET_PRICE,
};
pub use engine::Engine;
pub use matching::{MatchingEngine, DEFAULT_TRADE_CAPACITY, INTERNAL_ID_BASE};
pub use order_book::OrderBook;
pub use price_level::{LevelArena, LevelNode};
pub use ring::{channel, ChannelFull, Consumer, Producer};
pub use tree::LevelTree;
