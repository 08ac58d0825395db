//! Stop-order triggering and trailing-stop adjustment.
//!
//! A stop triggers when a trade occurs at or through its stop price; stops
//! never trigger on insertion. Triggered stops are removed, given a fresh
//! id, and reinjected through the order queue as market/limit orders so the
//! current dispatcher iteration finishes first.

use crate::book::{BookCore, BELOW};
use crate::bundle::Advanced;
use crate::callback::CallbackMsg;
use crate::dispatch::OrderElem;
use crate::error::BookError;
use crate::order::{ConditionTrigger, OrderCondition, OrderType};
use crate::side::Side;
use crate::types::OrderId;

impl BookCore {
    /// Level for a trailing stop `nticks` away from `last`.
    ///
    /// Buy stops sit above the market, sell stops below.
    pub(crate) fn trailing_stop_level(
        &self,
        side: Side,
        nticks: usize,
    ) -> Result<usize, BookError> {
        debug_assert!(nticks > 0);
        let from = self.last.expect("trailing price requires a last trade") as isize;
        let p = match side {
            Side::Buy => from + nticks as isize,
            Side::Sell => from - nticks as isize,
        };
        if p < 0 || p >= self.above() {
            return Err(BookError::DerivedPrice(format!(
                "{} ticks from {} leaves the grid",
                nticks,
                self.grid.itop(from as usize)
            )));
        }
        Ok(p as usize)
    }

    /// Level for a trailing (target) limit `nticks` away from `last`.
    ///
    /// Mirror of the stop side: buy limits below the market, sell above.
    pub(crate) fn trailing_limit_level(
        &self,
        side: Side,
        nticks: usize,
    ) -> Result<usize, BookError> {
        debug_assert!(nticks > 0);
        let from = self.last.expect("trailing price requires a last trade") as isize;
        let p = match side {
            Side::Buy => from - nticks as isize,
            Side::Sell => from + nticks as isize,
        };
        if p < 0 || p >= self.above() {
            return Err(BookError::DerivedPrice(format!(
                "{} ticks from {} leaves the grid",
                nticks,
                self.grid.itop(from as usize)
            )));
        }
        Ok(p as usize)
    }

    /// Scan between the cached stop bounds and `last`, triggering every
    /// stop chain the last trade reached. Buy scan first, then sell.
    pub(crate) fn look_for_triggered_stops(&mut self) -> Result<(), BookError> {
        let Some(last) = self.last else {
            self.need_check_for_stops = false;
            return Ok(());
        };
        let last = last as isize;

        let mut p = self.low_buy_stop;
        while p <= last {
            if p >= 0 && !self.grid.level(p as usize).stop_is_empty() {
                self.handle_triggered_stop_chain(p as usize)?;
            }
            p += 1;
        }

        let mut p = self.high_sell_stop;
        while p >= last && p != BELOW {
            if (p as usize) < self.grid.len() && !self.grid.level(p as usize).stop_is_empty() {
                self.handle_triggered_stop_chain(p as usize)?;
            }
            p -= 1;
        }

        self.need_check_for_stops = false;
        Ok(())
    }

    /// Trigger every stop resting at `idx`.
    ///
    /// The chain is moved out first so reinjections cannot revisit it.
    /// Each stop gets a new id for its market/limit reincarnation; the
    /// `stop_to_*` notification carries (old, new) so consumers can re-key.
    fn handle_triggered_stop_chain(&mut self, idx: usize) -> Result<(), BookError> {
        let Some(chain) = self.grid.level_mut(idx).stop_take_chain() else {
            return Ok(());
        };
        self.stop_bookkeep_after_remove(idx);

        for mut bndl in chain {
            let id = bndl.id;
            self.trailing_erase(id, bndl.is_buy);

            // cancel-class reactions (OCO, active bracket legs) come first
            let mut adv = std::mem::take(&mut bndl.advanced);
            if !adv.is_none() {
                let (next, _) = self.fire_cancel_class(adv, id, bndl.sz, bndl.sz, &bndl.cb);
                adv = next;
            }

            let id_new = self.generate_id();
            let (msg, cb_price) = match bndl.limit {
                Some(l) => (CallbackMsg::StopToLimit, l),
                None => (CallbackMsg::StopToMarket, 0.0),
            };
            self.push_deferred(msg, &bndl.cb, id, id_new, cb_price, bndl.sz);

            let otype = if bndl.limit.is_some() {
                OrderType::Limit
            } else {
                OrderType::Market
            };
            let side = Side::from_is_buy(bndl.is_buy);
            let limit = bndl.limit.unwrap_or(0.0);

            match adv {
                // trailing conditions transfer to the new order so it can
                // activate from the post-fill price
                Advanced::TrailingStop { params, .. } => {
                    self.push_internal(OrderElem {
                        otype,
                        side,
                        limit,
                        stop: 0.0,
                        sz: bndl.sz,
                        cb: bndl.cb.clone(),
                        id: id_new,
                        condition: OrderCondition::TrailingStop,
                        trigger: bndl.trigger,
                        params1: Some(*params),
                        params2: None,
                        parent: OrderId::NONE,
                    });
                }
                Advanced::TrailingBracket { orders } => {
                    self.push_internal(OrderElem {
                        otype,
                        side,
                        limit,
                        stop: 0.0,
                        sz: bndl.sz,
                        cb: bndl.cb.clone(),
                        id: id_new,
                        condition: OrderCondition::TrailingBracket,
                        trigger: bndl.trigger,
                        params1: Some(orders.loss),
                        params2: Some(orders.target),
                        parent: OrderId::NONE,
                    });
                }
                other => {
                    self.push_internal(OrderElem {
                        otype,
                        side,
                        limit,
                        stop: 0.0,
                        sz: bndl.sz,
                        cb: bndl.cb.clone(),
                        id: id_new,
                        condition: OrderCondition::None,
                        trigger: ConditionTrigger::None,
                        params1: None,
                        params2: None,
                        parent: OrderId::NONE,
                    });
                    // remaining trigger-class reactions fire after the
                    // reinjection is queued, dropping the condition
                    if !other.is_none() {
                        self.fire_trigger_class(other, bndl.trigger, id, bndl.sz, bndl.sz, &bndl.cb)?;
                    }
                }
            }

            self.id_cache.remove(&id);
        }
        Ok(())
    }

    /// Move every active trailing stop on the favorable side to its new
    /// distance from `last`.
    ///
    /// A move down re-anchors buy-side trailers; a move up re-anchors
    /// sell-side trailers.
    pub(crate) fn adjust_trailing_stops(&mut self, moved_down: bool) -> Result<(), BookError> {
        let buy_stops = moved_down;
        let ids: Vec<OrderId> = if buy_stops {
            self.trailing_buy_stops.iter().copied().collect()
        } else {
            self.trailing_sell_stops.iter().copied().collect()
        };
        for id in ids {
            self.trailing_stop_adjust(id, buy_stops)?;
        }
        Ok(())
    }

    fn trailing_stop_adjust(&mut self, id: OrderId, buy_stop: bool) -> Result<(), BookError> {
        let Some((old_idx, bndl)) = self.pop_stop(id) else {
            return Ok(());
        };
        debug_assert_eq!(bndl.is_buy, buy_stop);

        let nticks = match &bndl.advanced {
            Advanced::TrailingStopActive { nticks } => *nticks,
            Advanced::TrailingBracketActive { nticks, .. } => *nticks,
            _ => {
                debug_assert!(false, "non-trailing stop in trailing set");
                self.push_stop(old_idx, bndl);
                return Ok(());
            }
        };

        let new_idx = match self.trailing_stop_level(Side::from_is_buy(buy_stop), nticks) {
            Ok(i) => i,
            Err(e) => {
                // keep the order at its old level rather than lose it
                self.push_stop(old_idx, bndl);
                return Err(e);
            }
        };

        let price = self.grid.itop(new_idx);
        self.push_deferred(CallbackMsg::AdjustTrailingStop, &bndl.cb, id, id, price, bndl.sz);

        // a trailing bracket's target caches this stop's location
        if let Advanced::TrailingBracketActive { linked, .. } = &bndl.advanced {
            self.refresh_linked_location(linked.id, id, price);
        }

        self.push_stop(new_idx, bndl);
        Ok(())
    }

    /// Rewrite the cached location price that `holder` keeps for `of`.
    fn refresh_linked_location(&mut self, holder: OrderId, of: OrderId, price: f64) {
        let Some(loc) = self.id_cache.get(&holder).copied() else {
            return;
        };
        let level = self.grid.level_mut(loc.level);
        let adv = match loc.kind {
            crate::bundle::ChainKind::Limit => level.limit_get_mut(holder).map(|b| &mut b.advanced),
            crate::bundle::ChainKind::Stop => level.stop_get_mut(holder).map(|b| &mut b.advanced),
            _ => None,
        };
        if let Some(Advanced::TrailingBracketActive { linked, .. }) = adv {
            if linked.id == of {
                linked.price = price;
            }
        }
    }
}
