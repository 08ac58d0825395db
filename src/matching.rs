//! The matching engine: the `trade` hot loop, AON sweeps, fillability
//! checks, and basic order insertion.
//!
//! Matching walks opposing price levels from best outward under strict
//! price-time priority. At each level the AON chain is consumed first (its
//! entries are older than anything on the limit chain), then the limit
//! chain FIFO. Fills always execute at the resting (maker) price.

use std::time::Instant;

use crate::book::{BookCore, BELOW};
use crate::bundle::{Advanced, AonBundle, LimitBundle, StopBundle};
use crate::callback::{CallbackMsg, OrderExecCb};
use crate::dispatch::OrderElem;
use crate::error::BookError;
use crate::order::{ConditionTrigger, OrderCondition, OrderType};
use crate::query::TimeSaleEntry;
use crate::side::Side;
use crate::types::{OrderId, Size};

impl BookCore {
    /// First level to probe when consuming the `maker` side: the inside
    /// quote or the nearest AON level beyond it, whichever comes first.
    fn maker_begin(&self, maker: Side) -> isize {
        match maker {
            Side::Sell => self.ask.min(self.low_sell_aon),
            Side::Buy => self.bid.max(self.high_buy_aon),
        }
    }

    /// True while `p` has not walked past the taker's limit level.
    #[inline]
    fn inside_of(maker: Side, p: isize, limit: isize) -> bool {
        match maker {
            Side::Sell => p <= limit,
            Side::Buy => p >= limit,
        }
    }

    #[inline]
    fn next_level(maker: Side, p: isize) -> isize {
        match maker {
            Side::Sell => p + 1,
            Side::Buy => p - 1,
        }
    }

    #[inline]
    fn in_grid(&self, p: isize) -> bool {
        p >= 0 && p < self.above()
    }

    /// True when level `p` lies within the maker side's AON-chain bounds.
    fn aon_in_window(&self, maker: Side, p: isize) -> bool {
        match maker {
            Side::Sell => self.low_sell_aon <= p && p <= self.high_sell_aon,
            Side::Buy => self.low_buy_aon <= p && p <= self.high_buy_aon,
        }
    }

    /// True when level `p` holds maker-side limit liquidity (at or beyond
    /// the inside quote).
    fn limit_in_window(&self, maker: Side, p: isize) -> bool {
        match maker {
            Side::Sell => p >= self.ask && self.ask < self.above(),
            Side::Buy => p <= self.bid && self.bid != BELOW,
        }
    }

    /// Record a match: both fill notifications (buy side first), the
    /// time & sales entry, and the derived state updates.
    pub(crate) fn trade_occurred(
        &mut self,
        idx: usize,
        amount: Size,
        id_buy: OrderId,
        id_sell: OrderId,
        cb_buy: &Option<OrderExecCb>,
        cb_sell: &Option<OrderExecCb>,
    ) {
        let price = self.grid.itop(idx);
        self.push_deferred(CallbackMsg::Fill, cb_buy, id_buy, id_buy, price, amount);
        self.push_deferred(CallbackMsg::Fill, cb_sell, id_sell, id_sell, price, amount);
        self.timesales.push(TimeSaleEntry {
            time: Instant::now(),
            price,
            size: amount,
        });
        self.last = Some(idx);
        self.last_size = amount;
        self.total_volume += amount;
        self.need_check_for_stops = true;
    }

    /// Consume liquidity on the `maker` side from best outward through
    /// `plimit`, filling up to `size`. Returns what could not be filled.
    ///
    /// After the walk: trailing stops follow any `last` move, then newly
    /// triggered stops are handled.
    pub(crate) fn trade(
        &mut self,
        maker: Side,
        plimit: isize,
        taker_id: OrderId,
        mut size: Size,
        taker_cb: &Option<OrderExecCb>,
    ) -> Result<Size, BookError> {
        let old_last = self.last;
        let mut p = self.maker_begin(maker);

        while size > 0 && self.in_grid(p) && Self::inside_of(maker, p, plimit) {
            let idx = p as usize;

            if self.aon_in_window(maker, p) && !self.grid.level(idx).aon_is_empty(maker) {
                size = self.hit_aon_chain(idx, maker, taker_id, size, taker_cb);
            }

            if size > 0
                && self.limit_in_window(maker, p)
                && !self.grid.level(idx).limit_is_empty()
            {
                size = self.hit_chain(idx, maker, taker_id, size, taker_cb)?;
            }

            p = Self::next_level(maker, p);
        }

        if self.last != old_last {
            let moved_down = matches!((old_last, self.last), (Some(o), Some(n)) if n < o);
            self.adjust_trailing_stops(moved_down)?;
        }
        if self.need_check_for_stops {
            self.look_for_triggered_stops()?;
        }

        Ok(size)
    }

    /// Fill whole AON bundles at `idx` that fit inside `size` (FIFO).
    fn hit_aon_chain(
        &mut self,
        idx: usize,
        maker: Side,
        taker_id: OrderId,
        mut size: Size,
        taker_cb: &Option<OrderExecCb>,
    ) -> Size {
        for aid in self.grid.level(idx).aon_ids(maker) {
            if size == 0 {
                break;
            }
            let Some(bsz) = self.grid.level(idx).aon_get(maker, aid).map(|b| b.sz) else {
                continue;
            };
            if size >= bsz {
                let (_, _, bundle) = self
                    .pop_aon(aid)
                    .expect("invariant: aon id listed in its chain");
                match maker {
                    Side::Sell => {
                        self.trade_occurred(idx, bundle.sz, taker_id, aid, taker_cb, &bundle.cb)
                    }
                    Side::Buy => {
                        self.trade_occurred(idx, bundle.sz, aid, taker_id, &bundle.cb, taker_cb)
                    }
                }
                size -= bsz;
            }
        }
        size
    }

    /// Fill against the limit chain at `idx`, front to back.
    ///
    /// AON entries riding the chain that no longer fit the remaining taker
    /// size migrate to the level's AON chain instead of blocking it.
    fn hit_chain(
        &mut self,
        idx: usize,
        maker: Side,
        taker_id: OrderId,
        mut size: Size,
        taker_cb: &Option<OrderExecCb>,
    ) -> Result<Size, BookError> {
        while size > 0 {
            let Some((fid, fsz, is_aon)) = self
                .grid
                .level(idx)
                .limit_front()
                .map(|f| (f.id, f.sz, f.advanced.is_aon()))
            else {
                break;
            };

            if is_aon && size < fsz {
                let b = self
                    .grid
                    .level_mut(idx)
                    .limit_pop_front()
                    .expect("invariant: front exists");
                self.push_aon(idx, maker, AonBundle::from_limit(b));
                continue;
            }

            let amount = size.min(fsz);
            let (fcb, trigger) = {
                let f = self.grid.level(idx).limit_front().expect("front exists");
                (f.cb.clone(), f.trigger)
            };

            match maker {
                Side::Sell => self.trade_occurred(idx, amount, taker_id, fid, taker_cb, &fcb),
                Side::Buy => self.trade_occurred(idx, amount, fid, taker_id, &fcb, taker_cb),
            }
            size -= amount;

            // evaluate the advanced condition before reducing the resting
            // size, so handlers can read the original
            let fires = {
                let f = self.grid.level(idx).limit_front().expect("front exists");
                !f.advanced.is_none()
                    && f.trigger != ConditionTrigger::None
                    && (f.trigger == ConditionTrigger::FillPartial || fsz == amount)
            };
            if fires {
                let adv = {
                    let f = self
                        .grid
                        .level_mut(idx)
                        .limit_front_mut()
                        .expect("front exists");
                    std::mem::take(&mut f.advanced)
                };
                let adv = self.fire_condition(adv, trigger, fid, amount, fsz, &fcb)?;
                if let Some(f) = self.grid.level_mut(idx).limit_front_mut() {
                    if f.id == fid {
                        f.advanced = adv;
                    }
                }
            }

            if let Some(f) = self.grid.level_mut(idx).limit_front_mut() {
                if f.id == fid {
                    f.sz -= amount;
                    if f.sz == 0 {
                        self.grid.level_mut(idx).limit_pop_front();
                        self.id_cache.remove(&fid);
                    }
                }
            }
        }

        if self.grid.level(idx).limit_is_empty() {
            self.limit_bookkeep_after_empty(idx);
        }
        Ok(size)
    }

    /// Look-ahead check: can a `taker`-side order for `sz` at `plimit` fill
    /// completely against the book right now?
    ///
    /// Returns `(fillable, total)`. AON entries count only when the still
    /// unfilled remainder covers them whole. `total` stops accumulating
    /// once the answer is known.
    pub(crate) fn limit_is_fillable(
        &self,
        taker: Side,
        plimit: isize,
        sz: Size,
        allow_partial: bool,
    ) -> (bool, Size) {
        let maker = taker.opposite();
        let mut tot: Size = 0;

        let mut check = |elem_sz: Size, is_aon: bool| -> bool {
            if is_aon {
                if sz - tot >= elem_sz {
                    tot += elem_sz;
                    if allow_partial {
                        return true;
                    }
                }
            } else {
                tot += elem_sz;
                if allow_partial {
                    return true;
                }
            }
            tot >= sz
        };

        let mut p = self.maker_begin(maker);
        while self.in_grid(p) && Self::inside_of(maker, p, plimit) {
            let level = self.grid.level(p as usize);
            for b in level.aon_iter(maker) {
                if check(b.sz, true) {
                    return (true, tot);
                }
            }
            if self.limit_in_window(maker, p) {
                for b in level.limit_iter() {
                    if check(b.sz, b.advanced.is_aon()) {
                        return (true, tot);
                    }
                }
            }
            p = Self::next_level(maker, p);
        }
        (false, tot)
    }

    /// Opposite-side AON levels overlapping a `taker`-side order at `pidx`,
    /// ordered farthest from the taker's limit first.
    fn overlapping_aon_levels(&self, taker: Side, pidx: isize) -> Vec<usize> {
        let mut levels = Vec::new();
        match taker {
            Side::Buy => {
                let hi = self.high_sell_aon.min(pidx);
                let mut l = self.low_sell_aon;
                while l <= hi {
                    if !self.grid.level(l as usize).aon_is_empty(Side::Sell) {
                        levels.push(l as usize);
                    }
                    l += 1;
                }
            }
            Side::Sell => {
                let lo = self.low_buy_aon.max(pidx);
                let mut h = self.high_buy_aon;
                while h >= lo && h != BELOW {
                    if !self.grid.level(h as usize).aon_is_empty(Side::Buy) {
                        levels.push(h as usize);
                    }
                    h -= 1;
                }
            }
        }
        levels
    }

    /// Before matching a new order, fill any opposite-side AONs that the
    /// incoming size (plus book liquidity) can now satisfy. An AON at a
    /// better price takes priority over standard limits on the other side.
    /// Returns the incoming size left over.
    pub(crate) fn match_aon_pre_trade(
        &mut self,
        taker: Side,
        taker_id: OrderId,
        taker_cb: &Option<OrderExecCb>,
        taker_is_aon: bool,
        pidx: isize,
        mut rmndr: Size,
    ) -> Result<Size, BookError> {
        let aon_side = taker.opposite();

        for lvl in self.overlapping_aon_levels(taker, pidx) {
            for aid in self.grid.level(lvl).aon_ids(aon_side) {
                let Some(bsz) = self.grid.level(lvl).aon_get(aon_side, aid).map(|b| b.sz) else {
                    continue;
                };
                let (fillable, book_avail) =
                    self.limit_is_fillable(aon_side, lvl as isize, bsz, false);
                let available = rmndr + book_avail;

                if fillable
                    || (taker_is_aon && bsz == available)
                    || (!taker_is_aon && bsz < available)
                {
                    let (_, _, bundle) = self
                        .pop_aon(aid)
                        .expect("invariant: aon id listed in its chain");
                    let r = self.trade(taker, lvl as isize, bundle.id, bundle.sz, &bundle.cb)?;
                    debug_assert!(r <= rmndr, "AON has left over size after pre-trade sweep");

                    let filled_this = r.min(rmndr);
                    if filled_this > 0 {
                        // the remainder trades against the incoming order
                        // itself, at the incoming order's level
                        let idx = pidx as usize;
                        match taker {
                            Side::Buy => self.trade_occurred(
                                idx,
                                filled_this,
                                taker_id,
                                bundle.id,
                                taker_cb,
                                &bundle.cb,
                            ),
                            Side::Sell => self.trade_occurred(
                                idx,
                                filled_this,
                                bundle.id,
                                taker_id,
                                &bundle.cb,
                                taker_cb,
                            ),
                        }
                        rmndr -= filled_this;
                    }
                    if rmndr == 0 {
                        return Ok(0);
                    }
                }
            }
        }
        Ok(rmndr)
    }

    /// After a new order rested, re-run the AON sweep: opposite AONs
    /// overlapping its level may now be fully fillable from the book.
    pub(crate) fn match_aon_post_trade(
        &mut self,
        taker: Side,
        pidx: isize,
    ) -> Result<(), BookError> {
        let aon_side = taker.opposite();
        for lvl in self.overlapping_aon_levels(taker, pidx) {
            for aid in self.grid.level(lvl).aon_ids(aon_side) {
                let Some(bsz) = self.grid.level(lvl).aon_get(aon_side, aid).map(|b| b.sz) else {
                    continue;
                };
                if self.limit_is_fillable(aon_side, lvl as isize, bsz, false).0 {
                    let (_, _, bundle) = self
                        .pop_aon(aid)
                        .expect("invariant: aon id listed in its chain");
                    let r = self.trade(taker, lvl as isize, bundle.id, bundle.sz, &bundle.cb)?;
                    debug_assert_eq!(r, 0, "AON has left over size after post-trade sweep");
                }
            }
        }
        Ok(())
    }

    /// Current resting size of an order, if it still rests anywhere.
    fn resting_size(&self, id: OrderId) -> Option<Size> {
        let loc = *self.id_cache.get(&id)?;
        let level = self.grid.level(loc.level);
        match loc.kind {
            crate::bundle::ChainKind::Limit => level.limit_get(id).map(|b| b.sz),
            crate::bundle::ChainKind::Stop => level.stop_get(id).map(|b| b.sz),
            crate::bundle::ChainKind::AonBuy => level.aon_get(Side::Buy, id).map(|b| b.sz),
            crate::bundle::ChainKind::AonSell => level.aon_get(Side::Sell, id).map(|b| b.sz),
        }
    }

    /// Insert a limit order: AON pre-sweep, main trade, rest the remainder,
    /// AON post-sweep. Returns the filled amount.
    pub(crate) fn insert_limit(&mut self, e: &OrderElem) -> Result<Size, BookError> {
        debug_assert_eq!(e.otype, OrderType::Limit);
        let pidx = self.grid.ptoi(e.limit)? as isize;
        let is_aon = e.condition == OrderCondition::AllOrNone;

        let mut rmndr = self.match_aon_pre_trade(e.side, e.id, &e.cb, is_aon, pidx, e.sz)?;
        if rmndr == 0 {
            return Ok(e.sz);
        }

        let maker = e.side.opposite();
        if self.limit_tradable(maker, pidx as usize) {
            // an AON needs a full-fill look-ahead before it may trade
            if !is_aon || self.limit_is_fillable(e.side, pidx, rmndr, false).0 {
                rmndr = self.trade(maker, pidx, e.id, rmndr, &e.cb)?;
            }
        }

        if rmndr > 0 {
            let idx = pidx as usize;
            if is_aon
                && (self.limit_tradable(maker, idx) || self.grid.level(idx).limit_is_empty())
            {
                // an opposing chain blocks this level, or we would be the
                // chain's first entry: rest on the AON chain
                self.push_aon(
                    idx,
                    e.side,
                    AonBundle {
                        id: e.id,
                        sz: rmndr,
                        cb: e.cb.clone(),
                        trigger: e.trigger,
                        advanced: Advanced::Aon,
                    },
                );
            } else {
                let mut b = LimitBundle::plain(e.id, rmndr, e.cb.clone());
                if is_aon {
                    b.advanced = Advanced::Aon;
                    b.trigger = e.trigger;
                }
                self.push_limit(idx, e.side, b);
            }
            self.match_aon_post_trade(e.side, pidx)?;
        }

        // the post sweep may have consumed the rested remainder
        Ok(match self.resting_size(e.id) {
            Some(sz) => e.sz - sz,
            None => e.sz,
        })
    }

    /// Insert a market order. Fails with `LiquidityExhausted` if the book
    /// ran dry with size remaining; fills already made stand.
    pub(crate) fn insert_market(&mut self, e: &OrderElem) -> Result<(), BookError> {
        debug_assert_eq!(e.otype, OrderType::Market);
        let pidx = match e.side {
            Side::Buy => self.above() - 1,
            Side::Sell => 0,
        };

        let mut rmndr = self.match_aon_pre_trade(e.side, e.id, &e.cb, false, pidx, e.sz)?;
        if rmndr > 0 {
            rmndr = self.trade(e.side.opposite(), pidx, e.id, rmndr, &e.cb)?;
        }
        if rmndr > 0 {
            return Err(BookError::LiquidityExhausted {
                initial: e.sz,
                remaining: rmndr,
                id: e.id,
            });
        }
        Ok(())
    }

    /// Insert a stop order. Stops never trigger on insertion; an actual
    /// trade at or through the stop price is required.
    pub(crate) fn insert_stop(&mut self, e: &OrderElem) -> Result<(), BookError> {
        debug_assert!(matches!(e.otype, OrderType::Stop | OrderType::StopLimit));
        let idx = self.grid.ptoi(e.stop)?;
        self.push_stop(
            idx,
            StopBundle {
                id: e.id,
                sz: e.sz,
                is_buy: e.side.is_buy(),
                limit: (e.limit != 0.0).then_some(e.limit),
                cb: e.cb.clone(),
                trigger: e.trigger,
                advanced: Advanced::None,
            },
        );
        Ok(())
    }

    /// Route a basic (unconditioned) order. Returns the filled amount.
    pub(crate) fn route_basic(&mut self, e: &OrderElem) -> Result<Size, BookError> {
        match e.otype {
            OrderType::Limit => self.insert_limit(e),
            OrderType::Market => {
                self.insert_market(e)?;
                Ok(e.sz)
            }
            OrderType::Stop | OrderType::StopLimit => {
                self.insert_stop(e)?;
                Ok(0)
            }
        }
    }
}
