//! Core book state: the grid plus every cached index, the id lookup cache,
//! trailing-stop sets, time & sales, and the deferred-callback buffer.
//!
//! `BookCore` is the single-writer state behind the master lock. Cached
//! cursors are `isize` level indices with two sentinels: `BELOW` (-1, "empty
//! from the low side") and `above()` (len, "empty from the high side"),
//! mirroring the one-past-each-end convention of the level array.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bundle::{Advanced, AonBundle, ChainKind, LimitBundle, StopBundle};
use crate::callback::{CallbackMsg, DeferredCallback, OrderExecCb};
use crate::dispatch::{OrderElem, QueueElem, Request};
use crate::error::BookError;
use crate::grid::PriceGrid;
use crate::order::{ConditionTrigger, OrderCondition, OrderInfo, OrderType};
use crate::query::TimeSaleEntry;
use crate::side::Side;
use crate::tick::RoundMode;
use crate::types::{OrderId, Size};

/// Cached location of a resting order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OrderLoc {
    pub level: usize,
    pub kind: ChainKind,
}

pub(crate) struct BookCore {
    pub grid: PriceGrid,

    /// Level of the most recent trade.
    pub last: Option<usize>,
    pub bid: isize,
    pub ask: isize,
    pub low_buy_limit: isize,
    pub high_sell_limit: isize,
    pub low_buy_stop: isize,
    pub high_buy_stop: isize,
    pub low_sell_stop: isize,
    pub high_sell_stop: isize,
    pub low_buy_aon: isize,
    pub high_buy_aon: isize,
    pub low_sell_aon: isize,
    pub high_sell_aon: isize,

    pub id_cache: FxHashMap<OrderId, OrderLoc>,
    pub trailing_buy_stops: BTreeSet<OrderId>,
    pub trailing_sell_stops: BTreeSet<OrderId>,

    pub last_id: u64,
    pub last_size: Size,
    pub total_volume: u64,
    pub timesales: Vec<TimeSaleEntry>,
    pub deferred: Vec<DeferredCallback>,
    pub need_check_for_stops: bool,

    internal_tx: crossbeam_channel::Sender<QueueElem>,
    outstanding: Arc<AtomicI64>,
}

pub(crate) const BELOW: isize = -1;

impl BookCore {
    pub fn new(
        grid: PriceGrid,
        internal_tx: crossbeam_channel::Sender<QueueElem>,
        outstanding: Arc<AtomicI64>,
    ) -> Self {
        let above = grid.len() as isize;
        BookCore {
            grid,
            last: None,
            bid: BELOW,
            ask: above,
            low_buy_limit: above,
            high_sell_limit: BELOW,
            low_buy_stop: above,
            high_buy_stop: BELOW,
            low_sell_stop: above,
            high_sell_stop: BELOW,
            low_buy_aon: above,
            high_buy_aon: BELOW,
            low_sell_aon: above,
            high_sell_aon: BELOW,
            id_cache: FxHashMap::default(),
            trailing_buy_stops: BTreeSet::new(),
            trailing_sell_stops: BTreeSet::new(),
            last_id: 0,
            last_size: 0,
            total_volume: 0,
            timesales: Vec::new(),
            deferred: Vec::new(),
            need_check_for_stops: false,
            internal_tx,
            outstanding,
        }
    }

    /// One past the top of the grid; the "empty from above" sentinel.
    #[inline]
    pub fn above(&self) -> isize {
        self.grid.len() as isize
    }

    #[inline]
    pub fn generate_id(&mut self) -> OrderId {
        self.last_id += 1;
        OrderId(self.last_id)
    }

    /// Queue a notification for the post-dispatch drain.
    pub fn push_deferred(
        &mut self,
        msg: CallbackMsg,
        cb: &Option<OrderExecCb>,
        id_old: OrderId,
        id_new: OrderId,
        price: f64,
        size: Size,
    ) {
        if let Some(cb) = cb {
            self.deferred.push(DeferredCallback {
                msg,
                cb: Arc::clone(cb),
                id_old,
                id_new,
                price,
                size,
            });
        }
    }

    /// Hand an order to the dispatcher without blocking; used for stop
    /// reinjections and advanced-order spawns from inside routing.
    pub fn push_internal(&mut self, elem: OrderElem) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self
            .internal_tx
            .send(QueueElem {
                req: Request::Order(Box::new(elem)),
                reply: None,
            })
            .is_err()
        {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("internal order dropped: dispatcher gone");
        }
    }

    // --- chain pushes with cache + extrema bookkeeping ---

    pub fn push_limit(&mut self, idx: usize, side: Side, bundle: LimitBundle) {
        let id = bundle.id;
        self.grid.level_mut(idx).limit_push(bundle);
        self.id_cache.insert(
            id,
            OrderLoc {
                level: idx,
                kind: ChainKind::Limit,
            },
        );
        let p = idx as isize;
        match side {
            Side::Buy => {
                if p > self.bid {
                    self.bid = p;
                }
                if p < self.low_buy_limit {
                    self.low_buy_limit = p;
                }
            }
            Side::Sell => {
                if p < self.ask {
                    self.ask = p;
                }
                if p > self.high_sell_limit {
                    self.high_sell_limit = p;
                }
            }
        }
    }

    pub fn push_stop(&mut self, idx: usize, bundle: StopBundle) {
        let id = bundle.id;
        let is_buy = bundle.is_buy;
        self.grid.level_mut(idx).stop_push(bundle);
        self.id_cache.insert(
            id,
            OrderLoc {
                level: idx,
                kind: ChainKind::Stop,
            },
        );
        let p = idx as isize;
        if is_buy {
            if p < self.low_buy_stop {
                self.low_buy_stop = p;
            }
            if p > self.high_buy_stop {
                self.high_buy_stop = p;
            }
        } else {
            if p < self.low_sell_stop {
                self.low_sell_stop = p;
            }
            if p > self.high_sell_stop {
                self.high_sell_stop = p;
            }
        }
    }

    pub fn push_aon(&mut self, idx: usize, side: Side, bundle: AonBundle) {
        let id = bundle.id;
        self.grid.level_mut(idx).aon_push(side, bundle);
        self.id_cache.insert(
            id,
            OrderLoc {
                level: idx,
                kind: match side {
                    Side::Buy => ChainKind::AonBuy,
                    Side::Sell => ChainKind::AonSell,
                },
            },
        );
        let p = idx as isize;
        match side {
            Side::Buy => {
                if p < self.low_buy_aon {
                    self.low_buy_aon = p;
                }
                if p > self.high_buy_aon {
                    self.high_buy_aon = p;
                }
            }
            Side::Sell => {
                if p < self.low_sell_aon {
                    self.low_sell_aon = p;
                }
                if p > self.high_sell_aon {
                    self.high_sell_aon = p;
                }
            }
        }
    }

    // --- extrema bookkeeping after removals ---

    /// Re-derive bid/ask and the outer limit bounds after the limit chain
    /// at `idx` emptied.
    pub fn limit_bookkeep_after_empty(&mut self, idx: usize) {
        let p = idx as isize;
        if p == self.bid {
            let mut h = self.bid;
            while h >= 0 && self.grid.level(h as usize).limit_is_empty() {
                h -= 1;
            }
            self.bid = if h >= 0 { h } else { BELOW };
        }
        if p == self.ask {
            let mut l = self.ask;
            let above = self.above();
            while l < above && self.grid.level(l as usize).limit_is_empty() {
                l += 1;
            }
            self.ask = l;
        }
        if p == self.low_buy_limit {
            let mut l = self.low_buy_limit;
            while l <= self.bid && (l as usize) < self.grid.len() {
                if !self.grid.level(l as usize).limit_is_empty() {
                    break;
                }
                l += 1;
            }
            self.low_buy_limit = if self.bid >= 0 && l <= self.bid {
                l
            } else {
                self.above()
            };
        }
        if p == self.high_sell_limit {
            let mut h = self.high_sell_limit;
            while h >= self.ask && h >= 0 {
                if !self.grid.level(h as usize).limit_is_empty() {
                    break;
                }
                h -= 1;
            }
            self.high_sell_limit = if self.ask < self.above() && h >= self.ask {
                h
            } else {
                BELOW
            };
        }
    }

    /// Tighten the four stop bounds after stops were removed at `idx`.
    pub fn stop_bookkeep_after_remove(&mut self, idx: usize) {
        let p = idx as isize;
        let above = self.above();

        let scan_up = |grid: &PriceGrid, mut from: isize, to: isize, is_buy: bool| -> isize {
            while from <= to {
                if grid.level(from as usize).stop_has_side(is_buy) {
                    return from;
                }
                from += 1;
            }
            above
        };
        let scan_down = |grid: &PriceGrid, mut from: isize, to: isize, is_buy: bool| -> isize {
            while from >= to {
                if grid.level(from as usize).stop_has_side(is_buy) {
                    return from;
                }
                from -= 1;
            }
            BELOW
        };

        if p == self.low_buy_stop {
            self.low_buy_stop = scan_up(&self.grid, self.low_buy_stop, self.high_buy_stop, true);
            if self.low_buy_stop == above {
                self.high_buy_stop = BELOW;
            }
        }
        if p == self.high_buy_stop && self.high_buy_stop != BELOW {
            self.high_buy_stop = scan_down(&self.grid, self.high_buy_stop, self.low_buy_stop, true);
            if self.high_buy_stop == BELOW {
                self.low_buy_stop = above;
            }
        }
        if p == self.low_sell_stop {
            self.low_sell_stop = scan_up(&self.grid, self.low_sell_stop, self.high_sell_stop, false);
            if self.low_sell_stop == above {
                self.high_sell_stop = BELOW;
            }
        }
        if p == self.high_sell_stop && self.high_sell_stop != BELOW {
            self.high_sell_stop =
                scan_down(&self.grid, self.high_sell_stop, self.low_sell_stop, false);
            if self.high_sell_stop == BELOW {
                self.low_sell_stop = above;
            }
        }
    }

    /// Tighten one side's AON bounds after its chain at `idx` emptied.
    pub fn aon_bookkeep_after_remove(&mut self, idx: usize, side: Side) {
        let p = idx as isize;
        let above = self.above();
        let (low, high) = match side {
            Side::Buy => (self.low_buy_aon, self.high_buy_aon),
            Side::Sell => (self.low_sell_aon, self.high_sell_aon),
        };
        let mut low = low;
        let mut high = high;

        if p == low {
            while low <= high && self.grid.level(low as usize).aon_is_empty(side) {
                low += 1;
            }
            if low > high {
                low = above;
                high = BELOW;
            }
        }
        if p == high && high != BELOW {
            while high >= low && self.grid.level(high as usize).aon_is_empty(side) {
                high -= 1;
            }
            if high < low {
                low = above;
                high = BELOW;
            }
        }
        match side {
            Side::Buy => {
                self.low_buy_aon = low;
                self.high_buy_aon = high;
            }
            Side::Sell => {
                self.low_sell_aon = low;
                self.high_sell_aon = high;
            }
        }
    }

    // --- cache-directed removal ---

    pub fn pop_limit(&mut self, id: OrderId) -> Option<(usize, LimitBundle)> {
        let loc = *self.id_cache.get(&id)?;
        debug_assert_eq!(loc.kind, ChainKind::Limit);
        let bundle = self.grid.level_mut(loc.level).limit_remove(id)?;
        self.id_cache.remove(&id);
        if self.grid.level(loc.level).limit_is_empty() {
            self.limit_bookkeep_after_empty(loc.level);
        }
        Some((loc.level, bundle))
    }

    pub fn pop_stop(&mut self, id: OrderId) -> Option<(usize, StopBundle)> {
        let loc = *self.id_cache.get(&id)?;
        debug_assert_eq!(loc.kind, ChainKind::Stop);
        let bundle = self.grid.level_mut(loc.level).stop_remove(id)?;
        self.id_cache.remove(&id);
        self.stop_bookkeep_after_remove(loc.level);
        Some((loc.level, bundle))
    }

    pub fn pop_aon(&mut self, id: OrderId) -> Option<(usize, Side, AonBundle)> {
        let loc = *self.id_cache.get(&id)?;
        let side = match loc.kind {
            ChainKind::AonBuy => Side::Buy,
            ChainKind::AonSell => Side::Sell,
            _ => return None,
        };
        let bundle = self.grid.level_mut(loc.level).aon_remove(side, id)?;
        self.id_cache.remove(&id);
        if self.grid.level(loc.level).aon_is_empty(side) {
            self.aon_bookkeep_after_remove(loc.level, side);
        }
        Some((loc.level, side, bundle))
    }

    /// Remove a resting order by id, emitting the cancel notification and,
    /// when `pull_linked`, pulling its OCO-class sibling as well.
    pub fn pull_order(&mut self, id: OrderId, pull_linked: bool) -> bool {
        let Some(loc) = self.id_cache.get(&id).copied() else {
            return false;
        };
        match loc.kind {
            ChainKind::Limit => {
                let Some((_, bundle)) = self.pop_limit(id) else {
                    return false;
                };
                self.push_deferred(CallbackMsg::Cancel, &bundle.cb, id, id, 0.0, 0);
                if pull_linked {
                    self.pull_linked(&bundle.advanced);
                }
                true
            }
            ChainKind::Stop => {
                let Some((_, bundle)) = self.pop_stop(id) else {
                    return false;
                };
                self.trailing_erase(id, bundle.is_buy);
                self.push_deferred(CallbackMsg::Cancel, &bundle.cb, id, id, 0.0, 0);
                if pull_linked {
                    self.pull_linked(&bundle.advanced);
                }
                true
            }
            ChainKind::AonBuy | ChainKind::AonSell => {
                let Some((_, _, bundle)) = self.pop_aon(id) else {
                    return false;
                };
                self.push_deferred(CallbackMsg::Cancel, &bundle.cb, id, id, 0.0, 0);
                true
            }
        }
    }

    fn pull_linked(&mut self, advanced: &Advanced) {
        if let Some(loc) = advanced.linked() {
            // sibling must not pull us back; we are already gone
            self.pull_order(loc.id, false);
        }
    }

    // --- trailing-stop set maintenance ---

    pub fn trailing_insert(&mut self, id: OrderId, is_buy: bool) {
        if is_buy {
            self.trailing_buy_stops.insert(id);
        } else {
            self.trailing_sell_stops.insert(id);
        }
    }

    pub fn trailing_erase(&mut self, id: OrderId, is_buy: bool) {
        if is_buy {
            self.trailing_buy_stops.remove(&id);
        } else {
            self.trailing_sell_stops.remove(&id);
        }
    }

    // --- predicates shared by matching and queries ---

    /// True when the maker side has limit liquidity priced to trade at `idx`.
    pub fn limit_tradable(&self, maker: Side, idx: usize) -> bool {
        let p = idx as isize;
        match maker {
            Side::Sell => self.ask <= p && self.ask < self.above(),
            Side::Buy => self.bid >= p && self.bid != BELOW,
        }
    }

    /// Side of limit entries resting at `idx`.
    pub fn level_is_buy_limit(&self, idx: usize) -> bool {
        (idx as isize) < self.ask
    }

    // --- bundle access through the cache ---

    /// Add (or subtract, with a negative delta) size on a resting bundle.
    /// Returns (level price, new size, callback, is_limit) on success.
    pub fn bundle_size_add(
        &mut self,
        id: OrderId,
        delta: i64,
    ) -> Option<(f64, Size, Option<OrderExecCb>, bool)> {
        let loc = *self.id_cache.get(&id)?;
        let price = self.grid.itop(loc.level);
        let level = self.grid.level_mut(loc.level);
        let (sz, cb, is_limit) = match loc.kind {
            ChainKind::Limit => {
                let b = level.limit_get_mut(id)?;
                b.sz = (b.sz as i64 + delta).max(0) as Size;
                (b.sz, b.cb.clone(), true)
            }
            ChainKind::Stop => {
                let b = level.stop_get_mut(id)?;
                b.sz = (b.sz as i64 + delta).max(0) as Size;
                (b.sz, b.cb.clone(), false)
            }
            ChainKind::AonBuy | ChainKind::AonSell => {
                let side = if loc.kind == ChainKind::AonBuy {
                    Side::Buy
                } else {
                    Side::Sell
                };
                let b = level.aon_get_mut(side, id)?;
                b.sz = (b.sz as i64 + delta).max(0) as Size;
                (b.sz, b.cb.clone(), true)
            }
        };
        Some((price, sz, cb, is_limit))
    }

    /// Attach advanced state to a resting bundle.
    pub fn set_advanced(&mut self, id: OrderId, advanced: Advanced, trigger: ConditionTrigger) -> bool {
        let Some(loc) = self.id_cache.get(&id).copied() else {
            return false;
        };
        let level = self.grid.level_mut(loc.level);
        match loc.kind {
            ChainKind::Limit => {
                if let Some(b) = level.limit_get_mut(id) {
                    b.advanced = advanced;
                    b.trigger = trigger;
                    return true;
                }
            }
            ChainKind::Stop => {
                if let Some(b) = level.stop_get_mut(id) {
                    b.advanced = advanced;
                    b.trigger = trigger;
                    return true;
                }
            }
            ChainKind::AonBuy | ChainKind::AonSell => {
                let side = if loc.kind == ChainKind::AonBuy {
                    Side::Buy
                } else {
                    Side::Sell
                };
                if let Some(b) = level.aon_get_mut(side, id) {
                    b.advanced = advanced;
                    b.trigger = trigger;
                    return true;
                }
            }
        }
        false
    }

    /// Snapshot a resting order.
    pub fn order_info(&self, id: OrderId) -> Option<OrderInfo> {
        let loc = *self.id_cache.get(&id)?;
        let price = self.grid.itop(loc.level);
        let level = self.grid.level(loc.level);
        match loc.kind {
            ChainKind::Limit => {
                let b = level.limit_get(id)?;
                Some(OrderInfo {
                    order_type: OrderType::Limit,
                    side: Side::from_is_buy(self.level_is_buy_limit(loc.level)),
                    limit: price,
                    stop: 0.0,
                    size: b.sz,
                    condition: b.advanced.condition(),
                    trigger: b.trigger,
                })
            }
            ChainKind::Stop => {
                let b = level.stop_get(id)?;
                Some(OrderInfo {
                    order_type: if b.limit.is_some() {
                        OrderType::StopLimit
                    } else {
                        OrderType::Stop
                    },
                    side: Side::from_is_buy(b.is_buy),
                    limit: b.limit.unwrap_or(0.0),
                    stop: price,
                    size: b.sz,
                    condition: b.advanced.condition(),
                    trigger: b.trigger,
                })
            }
            ChainKind::AonBuy | ChainKind::AonSell => {
                let side = if loc.kind == ChainKind::AonBuy {
                    Side::Buy
                } else {
                    Side::Sell
                };
                let b = level.aon_get(side, id)?;
                Some(OrderInfo {
                    order_type: OrderType::Limit,
                    side,
                    limit: price,
                    stop: 0.0,
                    size: b.sz,
                    condition: OrderCondition::AllOrNone,
                    trigger: b.trigger,
                })
            }
        }
    }

    // --- growth ---

    fn remap_cursor(c: isize, old_above: isize, offset: isize, new_above: isize) -> isize {
        if c == BELOW {
            BELOW
        } else if c == old_above {
            new_above
        } else {
            c + offset
        }
    }

    fn remap_all(&mut self, old_above: isize, offset: isize) {
        let new_above = self.above();
        for c in [
            &mut self.bid,
            &mut self.ask,
            &mut self.low_buy_limit,
            &mut self.high_sell_limit,
            &mut self.low_buy_stop,
            &mut self.high_buy_stop,
            &mut self.low_sell_stop,
            &mut self.high_sell_stop,
            &mut self.low_buy_aon,
            &mut self.high_buy_aon,
            &mut self.low_sell_aon,
            &mut self.high_sell_aon,
        ] {
            *c = Self::remap_cursor(*c, old_above, offset, new_above);
        }
        if offset != 0 {
            if let Some(last) = self.last.as_mut() {
                *last += offset as usize;
            }
            for loc in self.id_cache.values_mut() {
                loc.level += offset as usize;
            }
        }
    }

    pub fn grow_above(&mut self, new_max: f64) -> Result<(), BookError> {
        let tick = self.grid.ratio().from_f64(new_max, RoundMode::Nearest);
        let old_above = self.above();
        self.grid.grow_above(tick)?;
        self.remap_all(old_above, 0);
        Ok(())
    }

    pub fn grow_below(&mut self, new_min: f64) -> Result<(), BookError> {
        let mut tick = self.grid.ratio().from_f64(new_min, RoundMode::Nearest);
        if tick.as_ticks() <= 0 {
            // the level at price zero is never tradable
            tick = self.grid.ratio().from_ticks(1);
        }
        let old_above = self.above();
        let offset = self.grid.grow_below(tick)? as isize;
        self.remap_all(old_above, offset);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::core;
    use super::*;

    fn limit(id: u64, sz: Size) -> LimitBundle {
        LimitBundle::plain(OrderId(id), sz, None)
    }

    #[test]
    fn bid_ask_track_pushes() {
        let mut c = core(1.0, 2.0);
        let i150 = c.grid.ptoi(1.50).unwrap();
        let i160 = c.grid.ptoi(1.60).unwrap();

        let b = limit(1, 10);
        c.push_limit(i150, Side::Buy, b);
        assert_eq!(c.bid, i150 as isize);
        assert_eq!(c.low_buy_limit, i150 as isize);

        let b = limit(2, 10);
        c.push_limit(i160, Side::Sell, b);
        assert_eq!(c.ask, i160 as isize);
        assert_eq!(c.high_sell_limit, i160 as isize);
    }

    #[test]
    fn pop_limit_rederives_bid() {
        let mut c = core(1.0, 2.0);
        let i140 = c.grid.ptoi(1.40).unwrap();
        let i150 = c.grid.ptoi(1.50).unwrap();

        let b = limit(1, 10);
        c.push_limit(i140, Side::Buy, b);
        let b = limit(2, 10);
        c.push_limit(i150, Side::Buy, b);
        assert_eq!(c.bid, i150 as isize);

        assert!(c.pop_limit(OrderId(2)).is_some());
        assert_eq!(c.bid, i140 as isize);
        assert!(c.id_cache.get(&OrderId(2)).is_none());

        assert!(c.pop_limit(OrderId(1)).is_some());
        assert_eq!(c.bid, BELOW);
        assert_eq!(c.low_buy_limit, c.above());
    }

    #[test]
    fn stop_bounds_track() {
        let mut c = core(1.0, 2.0);
        let i120 = c.grid.ptoi(1.20).unwrap();
        let i180 = c.grid.ptoi(1.80).unwrap();

        c.push_stop(
            i180,
            StopBundle {
                id: OrderId(1),
                sz: 10,
                is_buy: true,
                limit: None,
                cb: None,
                trigger: ConditionTrigger::None,
                advanced: Advanced::None,
            },
        );
        c.push_stop(
            i120,
            StopBundle {
                id: OrderId(2),
                sz: 10,
                is_buy: false,
                limit: None,
                cb: None,
                trigger: ConditionTrigger::None,
                advanced: Advanced::None,
            },
        );
        assert_eq!(c.low_buy_stop, i180 as isize);
        assert_eq!(c.high_buy_stop, i180 as isize);
        assert_eq!(c.low_sell_stop, i120 as isize);

        c.pop_stop(OrderId(1)).unwrap();
        assert_eq!(c.low_buy_stop, c.above());
        assert_eq!(c.high_buy_stop, BELOW);
        // sell bounds untouched
        assert_eq!(c.low_sell_stop, i120 as isize);
    }

    #[test]
    fn pull_order_emits_nothing_without_cb_and_evicts() {
        let mut c = core(1.0, 2.0);
        let i150 = c.grid.ptoi(1.50).unwrap();
        let b = limit(1, 10);
        c.push_limit(i150, Side::Buy, b);

        assert!(c.pull_order(OrderId(1), true));
        assert!(c.id_cache.is_empty());
        assert!(c.deferred.is_empty());
        assert!(!c.pull_order(OrderId(1), true));
    }

    #[test]
    fn aon_bounds_track() {
        let mut c = core(1.0, 2.0);
        let i130 = c.grid.ptoi(1.30).unwrap();
        c.push_aon(
            i130,
            Side::Sell,
            AonBundle {
                id: OrderId(1),
                sz: 100,
                cb: None,
                trigger: ConditionTrigger::FillFull,
                advanced: Advanced::Aon,
            },
        );
        assert_eq!(c.low_sell_aon, i130 as isize);
        assert_eq!(c.high_sell_aon, i130 as isize);

        c.pop_aon(OrderId(1)).unwrap();
        assert_eq!(c.low_sell_aon, c.above());
        assert_eq!(c.high_sell_aon, BELOW);
    }

    #[test]
    fn grow_below_remaps_everything() {
        let mut c = core(1.0, 2.0);
        let i150 = c.grid.ptoi(1.50).unwrap();
        let b = limit(1, 10);
        c.push_limit(i150, Side::Buy, b);
        c.last = Some(i150);
        let old_ask = c.ask;
        assert_eq!(old_ask, c.above());

        c.grow_below(0.50).unwrap();
        let offset = 50;
        assert_eq!(c.bid, (i150 + offset) as isize);
        assert_eq!(c.last, Some(i150 + offset));
        assert_eq!(c.id_cache.get(&OrderId(1)).unwrap().level, i150 + offset);
        // empty-ask sentinel follows the new end
        assert_eq!(c.ask, c.above());
        assert_eq!(c.grid.min_price(), 0.50);
    }

    #[test]
    fn grow_above_keeps_indices() {
        let mut c = core(1.0, 2.0);
        let i150 = c.grid.ptoi(1.50).unwrap();
        let b = limit(1, 10);
        c.push_limit(i150, Side::Buy, b);

        c.grow_above(3.0).unwrap();
        assert_eq!(c.bid, i150 as isize);
        assert_eq!(c.grid.max_price(), 3.0);
        assert_eq!(c.ask, c.above());
    }

    #[test]
    fn order_info_reports_side_and_prices() {
        let mut c = core(1.0, 2.0);
        let i150 = c.grid.ptoi(1.50).unwrap();
        let b = limit(1, 10);
        c.push_limit(i150, Side::Buy, b);

        let info = c.order_info(OrderId(1)).unwrap();
        assert_eq!(info.order_type, OrderType::Limit);
        assert_eq!(info.side, Side::Buy);
        assert_eq!(info.limit, 1.50);
        assert_eq!(info.size, 10);
        assert_eq!(info.condition, OrderCondition::None);

        assert!(c.order_info(OrderId(9)).is_none());
    }
}
