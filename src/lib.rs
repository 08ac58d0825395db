//! # gridbook
//!
//! A single-symbol, in-memory limit order book and matching engine on a
//! fixed tick grid.
//!
//! Orders from any number of threads funnel through an MPSC queue into one
//! dispatcher thread, the sole mutator of book state. Matching follows
//! strict price-time priority and fills at the resting (maker) price. The
//! book supports market, limit, stop, and stop-limit orders plus a family
//! of advanced conditions: one-cancels-other, one-triggers-other,
//! fill-or-kill, all-or-none, price brackets, trailing stops, and trailing
//! brackets.
//!
//! ## Quick start
//!
//! ```
//! use gridbook::{OrderBook, Side, TickRatio};
//!
//! let book = OrderBook::new(0.0, 100.0, TickRatio::HUNDREDTH).unwrap();
//!
//! // rest a bid, then hit it with a market sell
//! book.insert_limit_order(Side::Buy, 50.00, 100, None, None).unwrap();
//! book.insert_market_order(Side::Sell, 60, None, None).unwrap();
//!
//! assert_eq!(book.last_price(), 50.00);
//! assert_eq!(book.last_size(), 60);
//! assert_eq!(book.bid_size(), 40);
//! assert_eq!(book.volume(), 60);
//! ```
//!
//! ## Notifications
//!
//! Every order may carry an execution callback invoked for fills, cancels,
//! stop triggers, and advanced-order transitions. Callbacks never run under
//! the book's internal lock: matching defers them and the submitting thread
//! drains the queue after its operation completes, so a callback may safely
//! reenter the book.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use gridbook::{CallbackMsg, OrderBook, Side, TickRatio};
//!
//! let book = OrderBook::new(0.0, 100.0, TickRatio::HUNDREDTH).unwrap();
//! let fills = Arc::new(Mutex::new(Vec::new()));
//!
//! let seen = Arc::clone(&fills);
//! book.insert_limit_order(
//!     Side::Sell,
//!     10.00,
//!     50,
//!     Some(Arc::new(move |msg, _old, _new, price, size| {
//!         if msg == CallbackMsg::Fill {
//!             seen.lock().unwrap().push((price, size));
//!         }
//!     })),
//!     None,
//! )
//! .unwrap();
//!
//! book.insert_limit_order(Side::Buy, 10.00, 50, None, None).unwrap();
//! assert_eq!(fills.lock().unwrap().as_slice(), &[(10.00, 50)]);
//! ```
//!
//! ## Advanced conditions
//!
//! Advanced behavior rides a basic order as an [`AdvancedOrderTicket`]:
//!
//! ```
//! use gridbook::{AdvancedOrderTicket, OrderBook, Side, TickRatio};
//!
//! let book = OrderBook::new(0.0, 100.0, TickRatio::HUNDREDTH).unwrap();
//!
//! // fill-or-kill: no liquidity, so the order is discarded
//! let ticket = AdvancedOrderTicket::fok();
//! book.insert_limit_order(Side::Buy, 10.00, 100, None, Some(ticket)).unwrap();
//! assert_eq!(book.total_bid_size(), 0);
//! ```

mod advanced;
mod book;
mod bundle;
mod callback;
mod dispatch;
mod error;
mod grid;
mod level;
mod matching;
mod order;
mod orderbook;
mod query;
mod side;
mod stops;
mod tick;
mod ticket;
mod types;

pub use callback::{CallbackMsg, OrderExecCb};
pub use error::BookError;
pub use order::{ConditionTrigger, OrderCondition, OrderInfo, OrderParams, OrderType};
pub use orderbook::OrderBook;
pub use query::{AonDepthEntry, DepthEntry, MarketDepthEntry, TimeSaleEntry};
pub use side::Side;
pub use tick::{RoundMode, TickPrice, TickRatio};
pub use ticket::AdvancedOrderTicket;
pub use types::{OrderId, Size};
