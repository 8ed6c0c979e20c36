//! Action and trade types for the matching engine.
//!
//! Actions are inputs from the submitting thread.
//! Trade records are outputs published on the trade channel.

use thiserror::Error;

/// Internal price a buy market order crosses with (willing to pay anything).
pub const BUY_MARKET_PRICE: i64 = i64::MAX;

/// Internal price a sell market order crosses with (willing to accept anything).
pub const SELL_MARKET_PRICE: i64 = 0;

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type determines matching behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum OrderType {
    /// Crosses anything on the opposite side; never rests
    Market = 0,
    /// Crosses while the price allows, rests the remainder (default)
    #[default]
    Limit = 1,
    /// Armed at a trigger price; converts to Market when a trade prints past it
    Stop = 2,
    /// Armed at a trigger price; converts to Limit when a trade prints past it
    StopLimit = 3,
}

// ============================================================================
// Input Actions
// ============================================================================

/// Submit a new order.
#[derive(Clone, Copy, Debug)]
pub struct SubmitOrder {
    /// External order ID (unique over the engine's lifetime)
    pub id: u64,
    /// Order side
    pub side: Side,
    /// Order type
    pub kind: OrderType,
    /// Share count
    pub qty: u32,
    /// Limit price in ticks (market orders may pass anything; the engine
    /// substitutes the unbounded sentinel for their side)
    pub price: i64,
    /// Trigger price in ticks; 0 for non-stop types
    pub stop_price: i64,
}

impl SubmitOrder {
    /// Create a limit order (most common case)
    #[inline]
    pub const fn limit(id: u64, side: Side, qty: u32, price: i64) -> Self {
        Self {
            id,
            side,
            kind: OrderType::Limit,
            qty,
            price,
            stop_price: 0,
        }
    }

    /// Create a market order
    #[inline]
    pub const fn market(id: u64, side: Side, qty: u32) -> Self {
        Self {
            id,
            side,
            kind: OrderType::Market,
            qty,
            price: match side {
                Side::Buy => BUY_MARKET_PRICE,
                Side::Sell => SELL_MARKET_PRICE,
            },
            stop_price: 0,
        }
    }

    /// Create a stop order (converts to a market order when triggered)
    #[inline]
    pub const fn stop(id: u64, side: Side, qty: u32, stop_price: i64) -> Self {
        Self {
            id,
            side,
            kind: OrderType::Stop,
            qty,
            price: match side {
                Side::Buy => BUY_MARKET_PRICE,
                Side::Sell => SELL_MARKET_PRICE,
            },
            stop_price,
        }
    }

    /// Create a stop-limit order (converts to a limit order when triggered)
    #[inline]
    pub const fn stop_limit(id: u64, side: Side, qty: u32, price: i64, stop_price: i64) -> Self {
        Self {
            id,
            side,
            kind: OrderType::StopLimit,
            qty,
            price,
            stop_price,
        }
    }
}

/// Cancel an existing order (resting or armed stop).
#[derive(Clone, Copy, Debug)]
pub struct CancelOrder {
    /// Order ID to cancel
    pub id: u64,
}

/// Reprice and/or resize a resting order.
#[derive(Clone, Copy, Debug)]
pub struct ModifyOrder {
    /// Order ID to modify
    pub id: u64,
    /// New share count
    pub new_qty: u32,
    /// New limit price
    pub new_price: i64,
}

/// Input actions accepted by the engine thread.
#[derive(Clone, Copy, Debug)]
pub enum Action {
    /// Submit a new order
    Submit(SubmitOrder),
    /// Cancel an existing order
    Cancel(CancelOrder),
    /// Modify a resting order
    Modify(ModifyOrder),
}

// ============================================================================
// Outputs
// ============================================================================

/// An executed fill, published on the trade channel.
///
/// `price` is always the resting maker's price. `timestamp` is a strictly
/// monotonic sequence number assigned by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeRecord {
    /// Aggressing order ID
    pub taker_id: u64,
    /// Resting order ID
    pub maker_id: u64,
    /// Shares traded
    pub qty: u32,
    /// Execution price (the maker's resting price)
    pub price: i64,
    /// Engine sequence number
    pub timestamp: u64,
}

/// Transient record of a stop that fired and awaits re-submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggeredStop {
    /// The stop order's original ID
    pub original_id: u64,
    /// The stop order's own side
    pub side: Side,
    /// Market for a Stop, Limit for a StopLimit
    pub convert_to: OrderType,
    /// Shares carried over
    pub qty: u32,
    /// Limit price to use after conversion
    pub limit_price: i64,
}

/// Reasons a submit is refused. The book is left untouched in every case.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Reject {
    /// An object pool had no free slot
    #[error("object pool exhausted")]
    PoolExhausted,
    /// The ID is already resting or armed
    #[error("duplicate order id {0}")]
    DuplicateId(u64),
    /// Orders must carry a positive share count
    #[error("zero quantity")]
    ZeroQuantity,
}
