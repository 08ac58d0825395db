//! The public order book handle: one object per instrument.
//!
//! Construction spawns the dispatcher thread; dropping the handle posts a
//! shutdown sentinel and joins it. All insert/replace/pull operations are
//! blocking: they enqueue, wait for the dispatcher's reply, wait for any
//! cascaded internal orders to settle, then drain the deferred callbacks on
//! the calling thread.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::book::BookCore;
use crate::callback::OrderExecCb;
use crate::dispatch::{
    block_on_outstanding, drain_callbacks, lock_core, run_dispatcher, OrderElem, QueueElem,
    Request, Shared,
};
use crate::error::BookError;
use crate::grid::{self, PriceGrid, DEFAULT_MEM_CAP};
use crate::order::{ConditionTrigger, OrderCondition, OrderInfo, OrderType};
use crate::query::{AonDepthEntry, DepthEntry, MarketDepthEntry, TimeSaleEntry};
use crate::side::Side;
use crate::tick::{RoundMode, TickPrice, TickRatio};
use crate::ticket::AdvancedOrderTicket;
use crate::types::{OrderId, Size};

/// A single-symbol limit order book and matching engine.
///
/// Prices live on a fixed tick grid spanning `[min, max]`. Orders are
/// matched under strict price-time priority; fills execute at the resting
/// (maker) price. Many threads may submit concurrently; a single dispatcher
/// thread applies all mutations.
///
/// The AON pre-trade sweep records its direct fills at the incoming order's
/// level (both orders' price when they overlap exactly); no price mediation
/// is attempted for gapped AON fills.
pub struct OrderBook {
    shared: Arc<Shared>,
    ratio: TickRatio,
    dispatcher: Option<JoinHandle<()>>,
}

impl OrderBook {
    /// Build a book spanning `[min, max]` on the given tick grid.
    ///
    /// Fails if `min` is negative, `min > max`, or the range holds fewer
    /// than three ticks. A `min` of exactly zero is nudged up one tick (the
    /// zero level is never tradable).
    pub fn new(min: f64, max: f64, ratio: TickRatio) -> Result<Self, BookError> {
        Self::with_memory_cap(min, max, ratio, DEFAULT_MEM_CAP)
    }

    /// Like [`OrderBook::new`] with an explicit cap on level-array memory.
    pub fn with_memory_cap(
        min: f64,
        max: f64,
        ratio: TickRatio,
        mem_cap: usize,
    ) -> Result<Self, BookError> {
        if !min.is_finite() || min < 0.0 {
            return Err(BookError::InvalidPrice { price: min });
        }
        if !max.is_finite() || min > max {
            return Err(BookError::InvalidPrice { price: max });
        }
        let mut lo = ratio.from_f64(min, RoundMode::Nearest);
        if lo.as_ticks() <= 0 {
            lo = ratio.from_ticks(1);
        }
        let hi = ratio.from_f64(max, RoundMode::Nearest);
        let count = TickPrice::ticks_between(lo, hi) + 1;
        if count < 3 {
            return Err(BookError::InvalidPrice { price: max });
        }

        let grid = PriceGrid::new(ratio, lo, count as usize, mem_cap)?;
        let (tx, rx) = crossbeam_channel::unbounded();
        let outstanding = Arc::new(AtomicI64::new(0));
        let shared = Arc::new(Shared {
            core: Mutex::new(BookCore::new(grid, tx.clone(), Arc::clone(&outstanding))),
            tx,
            outstanding,
            busy_with_callbacks: AtomicBool::new(false),
        });

        let worker = Arc::clone(&shared);
        let dispatcher = std::thread::Builder::new()
            .name("gridbook-dispatcher".into())
            .spawn(move || run_dispatcher(worker, rx))
            .expect("failed to spawn dispatcher thread");

        Ok(OrderBook {
            shared,
            ratio,
            dispatcher: Some(dispatcher),
        })
    }

    // --- submission plumbing ---

    fn push_and_wait(&self, req: Request) -> Result<OrderId, BookError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        if self
            .shared
            .tx
            .send(QueueElem {
                req,
                reply: Some(reply_tx),
            })
            .is_err()
        {
            self.shared.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(BookError::Shutdown);
        }

        let result = match reply_rx.recv() {
            Ok(r) => r,
            Err(_) => return Err(BookError::Shutdown),
        };
        // cascaded reinjections must complete before callbacks drain
        block_on_outstanding(&self.shared);
        drain_callbacks(&self.shared);
        result
    }

    /// Insert a limit order. Returns the resolved order id.
    ///
    /// With an OCO ticket whose sibling fills on insertion, the returned id
    /// is the sibling's (the surviving identity).
    pub fn insert_limit_order(
        &self,
        side: Side,
        limit: f64,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if size == 0 {
            return Err(BookError::InvalidSize);
        }
        let (limit, condition, trigger, params1, params2) = {
            let core = lock_core(&self.shared);
            let limit = core.tick_price_or_err(limit)?;
            match &advanced {
                None => (limit, OrderCondition::None, ConditionTrigger::None, None, None),
                Some(t) => {
                    let condition = t.condition();
                    let (p1, p2) = core.build_advanced_params(side, size, t)?;
                    match condition {
                        OrderCondition::Bracket => {
                            core.check_limit_pairing(side, limit, p2.as_ref().expect("bracket target"))?;
                        }
                        OrderCondition::OneCancelsOther => {
                            core.check_limit_pairing(side, limit, p1.as_ref().expect("OCO sibling"))?;
                        }
                        OrderCondition::TrailingBracket => {
                            let p2r = p2.as_ref().expect("trailing target");
                            let p1r = p1.as_ref().expect("trailing loss");
                            core.check_nticks(side.is_buy(), limit, p2r.limit_ticks())?;
                            core.check_nticks(!side.is_buy(), limit, p1r.stop_ticks())?;
                        }
                        OrderCondition::TrailingStop => {
                            // the trailing stop sits on the host's side of
                            // the market: above a buy, below a sell
                            let p1r = p1.as_ref().expect("trailing loss");
                            core.check_nticks(side.is_buy(), limit, p1r.stop_ticks())?;
                        }
                        _ => {}
                    }
                    (limit, condition, t.trigger(), p1, p2)
                }
            }
        };

        self.push_and_wait(Request::Order(Box::new(OrderElem {
            otype: OrderType::Limit,
            side,
            limit,
            stop: 0.0,
            sz: size,
            cb,
            id: OrderId::NONE,
            condition,
            trigger,
            params1,
            params2,
            parent: OrderId::NONE,
        })))
    }

    /// Insert a market order. Fails with `LiquidityExhausted` when the book
    /// cannot absorb the full size; fills already made stand.
    pub fn insert_market_order(
        &self,
        side: Side,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if size == 0 {
            return Err(BookError::InvalidSize);
        }
        let (condition, trigger, params1, params2) = {
            let core = lock_core(&self.shared);
            match &advanced {
                None => (OrderCondition::None, ConditionTrigger::None, None, None),
                Some(t) => {
                    match t.condition() {
                        OrderCondition::OneCancelsOther => {
                            return Err(BookError::InvalidOrderType(
                                "OCO invalid for market order".into(),
                            ))
                        }
                        OrderCondition::FillOrKill => {
                            return Err(BookError::InvalidOrderType(
                                "FOK invalid for market order".into(),
                            ))
                        }
                        OrderCondition::AllOrNone => {
                            return Err(BookError::InvalidOrderType(
                                "AON invalid for market order".into(),
                            ))
                        }
                        _ => {}
                    }
                    let (p1, p2) = core.build_advanced_params(side, size, t)?;
                    (t.condition(), t.trigger(), p1, p2)
                }
            }
        };

        self.push_and_wait(Request::Order(Box::new(OrderElem {
            otype: OrderType::Market,
            side,
            limit: 0.0,
            stop: 0.0,
            sz: size,
            cb,
            id: OrderId::NONE,
            condition,
            trigger,
            params1,
            params2,
            parent: OrderId::NONE,
        })))
    }

    /// Insert a stop order (market on trigger).
    pub fn insert_stop_order(
        &self,
        side: Side,
        stop: f64,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        self.insert_stop_impl(side, stop, 0.0, size, cb, advanced)
    }

    /// Insert a stop-limit order (limit at `limit` on trigger).
    pub fn insert_stop_limit_order(
        &self,
        side: Side,
        stop: f64,
        limit: f64,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if limit == 0.0 {
            return Err(BookError::InvalidPrice { price: limit });
        }
        self.insert_stop_impl(side, stop, limit, size, cb, advanced)
    }

    fn insert_stop_impl(
        &self,
        side: Side,
        stop: f64,
        limit: f64,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if size == 0 {
            return Err(BookError::InvalidSize);
        }
        let (otype, stop, limit, condition, trigger, params1, params2) = {
            let core = lock_core(&self.shared);
            let stop = core.tick_price_or_err(stop)?;
            let (otype, limit) = if limit != 0.0 {
                (OrderType::StopLimit, core.tick_price_or_err(limit)?)
            } else {
                (OrderType::Stop, 0.0)
            };
            match &advanced {
                None => (otype, stop, limit, OrderCondition::None, ConditionTrigger::None, None, None),
                Some(t) => {
                    match t.condition() {
                        OrderCondition::FillOrKill => {
                            return Err(BookError::InvalidOrderType(
                                "FOK invalid for stop order".into(),
                            ))
                        }
                        OrderCondition::AllOrNone => {
                            return Err(BookError::InvalidOrderType(
                                "AON invalid for stop order".into(),
                            ))
                        }
                        _ => {}
                    }
                    let (p1, p2) = core.build_advanced_params(side, size, t)?;
                    if let Some(p1r) = p1.as_ref() {
                        if p1r.is_by_price() && p1r.stop_price() == stop {
                            return Err(BookError::AdvancedTicketMalformed(
                                "paired stop orders at the same price".into(),
                            ));
                        }
                    }
                    match t.condition() {
                        OrderCondition::TrailingBracket => {
                            let p2r = p2.as_ref().expect("trailing target");
                            let p1r = p1.as_ref().expect("trailing loss");
                            if limit != 0.0 {
                                core.check_nticks(side.is_buy(), limit, p2r.limit_ticks())?;
                            }
                            core.check_nticks(side.is_buy(), stop, p2r.limit_ticks())?;
                            if limit != 0.0 {
                                core.check_nticks(!side.is_buy(), limit, p1r.stop_ticks())?;
                            }
                            core.check_nticks(!side.is_buy(), stop, p1r.stop_ticks())?;
                        }
                        OrderCondition::TrailingStop => {
                            let p1r = p1.as_ref().expect("trailing loss");
                            if limit != 0.0 {
                                core.check_nticks(side.is_buy(), limit, p1r.stop_ticks())?;
                            }
                            core.check_nticks(side.is_buy(), stop, p1r.stop_ticks())?;
                        }
                        _ => {}
                    }
                    (otype, stop, limit, t.condition(), t.trigger(), p1, p2)
                }
            }
        };

        self.push_and_wait(Request::Order(Box::new(OrderElem {
            otype,
            side,
            limit,
            stop,
            sz: size,
            cb,
            id: OrderId::NONE,
            condition,
            trigger,
            params1,
            params2,
            parent: OrderId::NONE,
        })))
    }

    /// Cancel a resting order. Returns whether it was found and removed.
    /// Cancelling either member of an OCO-linked pair removes both.
    pub fn pull_order(&self, id: OrderId) -> Result<bool, BookError> {
        if id.is_none() {
            return Err(BookError::OrderNotFound(id));
        }
        let rid = self.push_and_wait(Request::Pull { id })?;
        Ok(!rid.is_none())
    }

    /// Pull `id` and insert a limit order in its place. Returns the new id,
    /// or `OrderId::NONE` when the pull failed (state unchanged).
    pub fn replace_with_limit_order(
        &self,
        id: OrderId,
        side: Side,
        limit: f64,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if !self.pull_order(id)? {
            return Ok(OrderId::NONE);
        }
        self.insert_limit_order(side, limit, size, cb, advanced)
    }

    /// Pull `id` and insert a market order in its place.
    pub fn replace_with_market_order(
        &self,
        id: OrderId,
        side: Side,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if !self.pull_order(id)? {
            return Ok(OrderId::NONE);
        }
        self.insert_market_order(side, size, cb, advanced)
    }

    /// Pull `id` and insert a stop order in its place.
    pub fn replace_with_stop_order(
        &self,
        id: OrderId,
        side: Side,
        stop: f64,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if !self.pull_order(id)? {
            return Ok(OrderId::NONE);
        }
        self.insert_stop_order(side, stop, size, cb, advanced)
    }

    /// Pull `id` and insert a stop-limit order in its place.
    pub fn replace_with_stop_limit_order(
        &self,
        id: OrderId,
        side: Side,
        stop: f64,
        limit: f64,
        size: Size,
        cb: Option<OrderExecCb>,
        advanced: Option<AdvancedOrderTicket>,
    ) -> Result<OrderId, BookError> {
        if !self.pull_order(id)? {
            return Ok(OrderId::NONE);
        }
        self.insert_stop_limit_order(side, stop, limit, size, cb, advanced)
    }

    /// Snapshot a resting order, `None` if the id is not live.
    pub fn get_order_info(&self, id: OrderId) -> Option<OrderInfo> {
        lock_core(&self.shared).order_info(id)
    }

    // --- queries ---

    /// Best non-AON bid price, 0 when none.
    pub fn bid_price(&self) -> f64 {
        lock_core(&self.shared).q_bid_price()
    }

    /// Best non-AON ask price, 0 when none.
    pub fn ask_price(&self) -> f64 {
        lock_core(&self.shared).q_ask_price()
    }

    /// Price of the most recent trade, 0 before any trade.
    pub fn last_price(&self) -> f64 {
        lock_core(&self.shared).q_last_price()
    }

    pub fn min_price(&self) -> f64 {
        lock_core(&self.shared).grid.min_price()
    }

    pub fn max_price(&self) -> f64 {
        lock_core(&self.shared).grid.max_price()
    }

    /// Non-AON size resting at the inside bid.
    pub fn bid_size(&self) -> Size {
        lock_core(&self.shared).q_bid_size()
    }

    /// Non-AON size resting at the inside ask.
    pub fn ask_size(&self) -> Size {
        lock_core(&self.shared).q_ask_size()
    }

    /// Size of the most recent trade.
    pub fn last_size(&self) -> Size {
        lock_core(&self.shared).last_size
    }

    pub fn total_bid_size(&self) -> Size {
        lock_core(&self.shared).q_total_limit_size(Side::Buy)
    }

    pub fn total_ask_size(&self) -> Size {
        lock_core(&self.shared).q_total_limit_size(Side::Sell)
    }

    pub fn total_size(&self) -> Size {
        let core = lock_core(&self.shared);
        core.q_total_limit_size(Side::Buy) + core.q_total_limit_size(Side::Sell)
    }

    pub fn total_aon_bid_size(&self) -> Size {
        lock_core(&self.shared).q_total_aon_size(Side::Buy)
    }

    pub fn total_aon_ask_size(&self) -> Size {
        lock_core(&self.shared).q_total_aon_size(Side::Sell)
    }

    pub fn total_aon_size(&self) -> Size {
        let core = lock_core(&self.shared);
        core.q_total_aon_size(Side::Buy) + core.q_total_aon_size(Side::Sell)
    }

    /// Cumulative traded volume.
    pub fn volume(&self) -> u64 {
        lock_core(&self.shared).total_volume
    }

    /// Most recently allocated order id.
    pub fn last_id(&self) -> OrderId {
        OrderId(lock_core(&self.shared).last_id)
    }

    /// Bid-side depth within `depth` ticks of the inside, best first.
    pub fn bid_depth(&self, depth: usize) -> Vec<DepthEntry> {
        lock_core(&self.shared).q_depth(Side::Buy, depth)
    }

    /// Ask-side depth within `depth` ticks of the inside, best first.
    pub fn ask_depth(&self, depth: usize) -> Vec<DepthEntry> {
        lock_core(&self.shared).q_depth(Side::Sell, depth)
    }

    /// Both sides of the depth, ascending by price.
    pub fn market_depth(&self, depth: usize) -> Vec<MarketDepthEntry> {
        lock_core(&self.shared).q_market_depth(depth)
    }

    /// All resting all-or-none liquidity by price, ascending.
    pub fn aon_market_depth(&self) -> Vec<AonDepthEntry> {
        lock_core(&self.shared).q_aon_market_depth()
    }

    /// The append-only time & sales log.
    pub fn time_and_sales(&self) -> Vec<TimeSaleEntry> {
        lock_core(&self.shared).timesales.clone()
    }

    // --- management ---

    /// Extend the grid upward to `new_max`, preserving all resting orders.
    pub fn grow_book_above(&self, new_max: f64) -> Result<(), BookError> {
        lock_core(&self.shared).grow_above(new_max)
    }

    /// Extend the grid downward to `new_min`, preserving all resting orders.
    pub fn grow_book_below(&self, new_min: f64) -> Result<(), BookError> {
        lock_core(&self.shared).grow_below(new_min)
    }

    // --- utilities ---

    /// The grid's price increment.
    pub fn tick_size(&self) -> f64 {
        self.ratio.tick_size()
    }

    /// Round a price onto the tick grid.
    pub fn price_to_tick(&self, price: f64) -> f64 {
        self.ratio
            .from_f64(price, RoundMode::Nearest)
            .as_f64(self.ratio)
    }

    /// Number of ticks between two prices.
    pub fn ticks_in_range(&self, lower: f64, upper: f64) -> i64 {
        TickPrice::ticks_between(
            self.ratio.from_f64(lower, RoundMode::Nearest),
            self.ratio.from_f64(upper, RoundMode::Nearest),
        )
    }

    /// Bytes of level storage a `[lower, upper]` grid would need.
    pub fn tick_memory_required(&self, lower: f64, upper: f64) -> usize {
        grid::memory_required(self.ticks_in_range(lower, upper).max(0) as usize)
    }

    /// Whether a price lies on the live grid.
    pub fn is_valid_price(&self, price: f64) -> bool {
        lock_core(&self.shared).grid.index_of(price).is_some()
    }
}

impl Drop for OrderBook {
    fn drop(&mut self) {
        let _ = self.shared.tx.send(QueueElem {
            req: Request::Shutdown,
            reply: None,
        });
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                tracing::error!("dispatcher thread panicked during shutdown");
            }
        }
    }
}
