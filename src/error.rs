//! Error types surfaced by the order book.

use crate::types::{OrderId, Size};

/// Errors returned by order book operations.
///
/// Parameter validation errors fail a submission synchronously with no state
/// change. Runtime errors raised while the dispatcher routes an order fail
/// that submission only; the dispatcher keeps running.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BookError {
    /// Price is off the tick grid or outside [min, max].
    #[error("invalid price {price}")]
    InvalidPrice {
        /// The offending price.
        price: f64,
    },

    /// Order size was zero.
    #[error("invalid order size")]
    InvalidSize,

    /// The advanced condition cannot ride this order type
    /// (e.g. OCO on a market order, FOK on a stop).
    #[error("invalid order type: {0}")]
    InvalidOrderType(String),

    /// Advanced ticket fields contradict each other.
    #[error("malformed advanced ticket: {0}")]
    AdvancedTicketMalformed(String),

    /// No resting order with this id.
    #[error("order #{0} not found")]
    OrderNotFound(OrderId),

    /// A market order exhausted the book with size remaining.
    #[error("liquidity exhausted for order #{id}: {remaining} of {initial} unfilled")]
    LiquidityExhausted {
        /// Size the order was submitted with.
        initial: Size,
        /// Size that could not be filled.
        remaining: Size,
        /// Id of the failed order.
        id: OrderId,
    },

    /// A derived price (trailing stop, bracket leg) fell outside the grid.
    #[error("derived price outside the grid: {0}")]
    DerivedPrice(String),

    /// Growing or allocating the book would exceed the memory cap.
    #[error("book memory cap exceeded: {required} bytes required, cap is {cap}")]
    ResourceExhausted {
        /// Bytes the operation would need.
        required: usize,
        /// Configured cap in bytes.
        cap: usize,
    },

    /// The book is shutting down; the dispatcher is gone.
    #[error("order book is shut down")]
    Shutdown,
}
