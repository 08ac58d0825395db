//! Advanced-order state machines: routing entry points, per-condition
//! fill/cancel handlers, and ticket validation.
//!
//! The engine multiplexes on the condition tag carried by the queue element
//! or resting bundle. Handlers take the bundle's advanced payload by value
//! and return the state to store back, so no handler ever holds a reference
//! into chain storage while mutating the book.

use crate::book::BookCore;
use crate::bundle::{Advanced, BracketParams, OrderLocation, StopBundle};
use crate::callback::{CallbackMsg, OrderExecCb};
use crate::dispatch::OrderElem;
use crate::error::BookError;
use crate::order::{ConditionTrigger, OrderCondition, OrderParams, OrderType};
use crate::side::Side;
use crate::ticket::AdvancedOrderTicket;
use crate::types::{OrderId, Size};

fn malformed(msg: &str) -> BookError {
    BookError::AdvancedTicketMalformed(msg.to_string())
}

impl BookCore {
    /// Route an order whose condition is not `None`. Returns the id the
    /// submission resolves to (OCO may rewrite it to the sibling's).
    pub(crate) fn route_advanced(&mut self, e: &OrderElem) -> Result<OrderId, BookError> {
        match e.condition {
            OrderCondition::TrailingBracketActive => self.insert_active_bracket(e, true),
            OrderCondition::BracketActive => self.insert_active_bracket(e, false),
            OrderCondition::OneCancelsOther => self.insert_oco(e),
            OrderCondition::TrailingStop => self.insert_trailing_stop(e),
            OrderCondition::TrailingBracket => self.insert_bracket(e, true),
            OrderCondition::Bracket => self.insert_bracket(e, false),
            OrderCondition::OneTriggersOther => self.insert_oto(e),
            OrderCondition::FillOrKill => self.insert_fok(e),
            OrderCondition::TrailingStopActive => self.insert_trailing_stop_active(e),
            OrderCondition::AllOrNone => {
                let filled = self.route_basic(e)?;
                debug_assert!(filled == e.sz || filled == 0);
                Ok(e.id)
            }
            OrderCondition::None => unreachable!("basic order routed as advanced"),
        }
    }

    /// Route as a plain order and report whether the condition's trigger
    /// was satisfied by the insertion fills.
    fn inject_basic(&mut self, e: &OrderElem) -> Result<(Size, bool), BookError> {
        let filled = self.route_basic(e)?;
        let fired =
            filled == e.sz || (e.trigger == ConditionTrigger::FillPartial && filled > 0);
        Ok((filled, fired))
    }

    // --- condition firing on fills of resting bundles ---

    /// Fire a condition met by a fill: cancel-class handlers first, then
    /// trigger-class. Returns the advanced state to store back.
    pub(crate) fn fire_condition(
        &mut self,
        adv: Advanced,
        trigger: ConditionTrigger,
        id: OrderId,
        fill_sz: Size,
        bndl_sz: Size,
        cb: &Option<OrderExecCb>,
    ) -> Result<Advanced, BookError> {
        let (adv, handled) = self.fire_cancel_class(adv, id, fill_sz, bndl_sz, cb);
        if handled {
            return Ok(adv);
        }
        self.fire_trigger_class(adv, trigger, id, fill_sz, bndl_sz, cb)
    }

    /// OCO-style reactions: filling one side of a pair pulls the other.
    /// Active bracket legs are pairs too, but only a complete fill closes
    /// them; partial fills fall through to the trigger class.
    pub(crate) fn fire_cancel_class(
        &mut self,
        adv: Advanced,
        id: OrderId,
        fill_sz: Size,
        bndl_sz: Size,
        cb: &Option<OrderExecCb>,
    ) -> (Advanced, bool) {
        match adv {
            Advanced::Oco { linked } => {
                self.close_pair(CallbackMsg::TriggerOco, &linked, id, cb);
                (Advanced::None, true)
            }
            Advanced::BracketActive { linked } => {
                if fill_sz != bndl_sz {
                    (Advanced::BracketActive { linked }, false)
                } else {
                    self.close_pair(CallbackMsg::TriggerBracketClose, &linked, id, cb);
                    (Advanced::None, true)
                }
            }
            Advanced::TrailingBracketActive { nticks, linked } => {
                if fill_sz != bndl_sz {
                    (Advanced::TrailingBracketActive { nticks, linked }, false)
                } else {
                    self.close_pair(CallbackMsg::TriggerBracketClose, &linked, id, cb);
                    (Advanced::None, true)
                }
            }
            other => (other, false),
        }
    }

    fn close_pair(
        &mut self,
        msg: CallbackMsg,
        linked: &OrderLocation,
        id: OrderId,
        cb: &Option<OrderExecCb>,
    ) {
        let id_old = if linked.is_primary { linked.id } else { id };
        self.push_deferred(msg, cb, id_old, id, 0.0, 0);
        // the sibling must not pull us back; we are mid-fill or gone
        self.pull_order(linked.id, false);
    }

    /// Trigger-class reactions: spawn or adjust contingent orders.
    pub(crate) fn fire_trigger_class(
        &mut self,
        adv: Advanced,
        _trigger: ConditionTrigger,
        id: OrderId,
        fill_sz: Size,
        bndl_sz: Size,
        cb: &Option<OrderExecCb>,
    ) -> Result<Advanced, BookError> {
        match adv {
            Advanced::None | Advanced::Aon | Advanced::Oco { .. } => Ok(adv),

            Advanced::TrailingStopActive { nticks } => {
                debug_assert_eq!(fill_sz, bndl_sz);
                self.push_deferred(CallbackMsg::TriggerTrailingStopClose, cb, id, id, 0.0, 0);
                Ok(Advanced::TrailingStopActive { nticks })
            }

            Advanced::BracketActive { linked } => {
                self.adjust_active_sibling(&linked, fill_sz, bndl_sz);
                Ok(Advanced::BracketActive { linked })
            }
            Advanced::TrailingBracketActive { nticks, linked } => {
                self.adjust_active_sibling(&linked, fill_sz, bndl_sz);
                Ok(Advanced::TrailingBracketActive { nticks, linked })
            }

            Advanced::Oto { params } => {
                self.exec_oto(&params, cb, id);
                Ok(Advanced::None)
            }

            Advanced::Bracket { orders } => {
                self.handle_bracket(orders, false, id, fill_sz, bndl_sz, cb)
            }
            Advanced::TrailingBracket { orders } => {
                self.handle_bracket(orders, true, id, fill_sz, bndl_sz, cb)
            }

            Advanced::TrailingStop { params, active } => {
                self.handle_trailing_stop(params, active, id, fill_sz, bndl_sz, cb)
            }
        }
    }

    /// A partial fill of one active bracket leg shrinks the sibling.
    fn adjust_active_sibling(&mut self, linked: &OrderLocation, fill_sz: Size, bndl_sz: Size) {
        if fill_sz == bndl_sz {
            return;
        }
        let other = linked.id;
        if let Some((price, new_sz, cb, is_limit)) = self.bundle_size_add(other, -(fill_sz as i64))
        {
            let msg = if is_limit {
                CallbackMsg::TriggerBracketAdjTarget
            } else {
                CallbackMsg::TriggerBracketAdjLoss
            };
            self.push_deferred(msg, &cb, other, other, price, new_sz);
        }
    }

    /// Fill of a bracket primary: first fill spawns the active pair,
    /// subsequent fills grow the active children instead.
    fn handle_bracket(
        &mut self,
        mut orders: Box<BracketParams>,
        trailing: bool,
        id: OrderId,
        fill_sz: Size,
        bndl_sz: Size,
        cb: &Option<OrderExecCb>,
    ) -> Result<Advanced, BookError> {
        orders.loss.set_size(fill_sz);
        orders.target.set_size(fill_sz);

        let mut exec = true;
        if !orders.active_loss.is_none() {
            if let Some((price, new_sz, lcb, _)) =
                self.bundle_size_add(orders.active_loss, fill_sz as i64)
            {
                self.push_deferred(
                    CallbackMsg::TriggerBracketAdjLoss,
                    &lcb,
                    orders.active_loss,
                    orders.active_loss,
                    price,
                    new_sz,
                );
                if let Some((price, new_sz, tcb, _)) =
                    self.bundle_size_add(orders.active_target, fill_sz as i64)
                {
                    self.push_deferred(
                        CallbackMsg::TriggerBracketAdjTarget,
                        &tcb,
                        orders.active_target,
                        orders.active_target,
                        price,
                        new_sz,
                    );
                }
                exec = false;
            }
        }

        if exec {
            self.exec_bracket(&orders.loss, &orders.target, fill_sz, cb, id, trailing)?;
        }

        if fill_sz == bndl_sz {
            Ok(Advanced::None)
        } else if trailing {
            Ok(Advanced::TrailingBracket { orders })
        } else {
            Ok(Advanced::Bracket { orders })
        }
    }

    /// Fill of a trailing-stop primary: first fill spawns the active stop,
    /// subsequent fills grow it.
    fn handle_trailing_stop(
        &mut self,
        mut params: Box<OrderParams>,
        active: OrderId,
        id: OrderId,
        fill_sz: Size,
        bndl_sz: Size,
        cb: &Option<OrderExecCb>,
    ) -> Result<Advanced, BookError> {
        params.set_size(fill_sz);

        let mut exec = true;
        if !active.is_none() {
            if let Some((price, new_sz, scb, _)) = self.bundle_size_add(active, fill_sz as i64) {
                self.push_deferred(
                    CallbackMsg::TriggerTrailingStopAdjLoss,
                    &scb,
                    active,
                    active,
                    price,
                    new_sz,
                );
                exec = false;
            }
        }

        if exec {
            self.exec_trailing_stop(&params, fill_sz, cb, id);
        }

        if fill_sz == bndl_sz {
            Ok(Advanced::None)
        } else {
            Ok(Advanced::TrailingStop { params, active })
        }
    }

    // --- contingent-order execution ---

    fn exec_oto(&mut self, params: &OrderParams, cb: &Option<OrderExecCb>, id: OrderId) {
        debug_assert!(params.is_by_price());
        let id_new = self.generate_id();
        self.push_deferred(CallbackMsg::TriggerOto, cb, id, id_new, 0.0, 0);
        self.push_internal(OrderElem {
            otype: params.order_type(),
            side: params.side(),
            limit: params.limit_price(),
            stop: params.stop_price(),
            sz: params.size(),
            cb: cb.clone(),
            id: id_new,
            condition: OrderCondition::None,
            trigger: ConditionTrigger::None,
            params1: None,
            params2: None,
            parent: OrderId::NONE,
        });
    }

    /// Queue the active (target) leg of a bracket. The target is a limit
    /// order carrying the loss description; routing it builds the stop leg
    /// and links the pair.
    fn exec_bracket(
        &mut self,
        loss: &OrderParams,
        target: &OrderParams,
        sz: Size,
        cb: &Option<OrderExecCb>,
        id: OrderId,
        trailing: bool,
    ) -> Result<(), BookError> {
        debug_assert_eq!(target.order_type(), OrderType::Limit);

        let id_new = self.generate_id();
        self.push_deferred(CallbackMsg::TriggerBracketOpen, cb, id, id_new, 0.0, 0);

        let (limit, condition) = if trailing {
            let p = self.trailing_limit_level(target.side(), target.limit_ticks())?;
            (self.grid.itop(p), OrderCondition::TrailingBracketActive)
        } else {
            (target.limit_price(), OrderCondition::BracketActive)
        };

        let mut loss = loss.clone();
        loss.set_size(sz);

        self.push_internal(OrderElem {
            otype: OrderType::Limit,
            side: target.side(),
            limit,
            stop: 0.0,
            sz,
            cb: cb.clone(),
            id: id_new,
            condition,
            trigger: ConditionTrigger::FillPartial,
            params1: Some(loss),
            params2: None,
            parent: id,
        });
        Ok(())
    }

    /// Queue the active stop for a filled trailing-stop primary.
    fn exec_trailing_stop(
        &mut self,
        params: &OrderParams,
        sz: Size,
        cb: &Option<OrderExecCb>,
        id: OrderId,
    ) {
        debug_assert!(!params.is_by_price());
        let id_new = self.generate_id();
        self.push_deferred(CallbackMsg::TriggerTrailingStopOpen, cb, id, id_new, 0.0, 0);

        let mut params = params.clone();
        params.set_size(sz);

        self.push_internal(OrderElem {
            otype: OrderType::Stop,
            side: params.side(),
            limit: 0.0,
            stop: 0.0,
            sz,
            cb: cb.clone(),
            id: id_new,
            condition: OrderCondition::TrailingStopActive,
            trigger: ConditionTrigger::FillFull,
            params1: Some(params),
            params2: None,
            parent: id,
        });
    }

    // --- routing entry points ---

    fn insert_oco(&mut self, e: &OrderElem) -> Result<OrderId, BookError> {
        let (_, fired) = self.inject_basic(e)?;
        if fired {
            // the primary filled on insertion; no sibling is entered
            self.push_deferred(CallbackMsg::TriggerOco, &e.cb, e.id, e.id, 0.0, 0);
            return Ok(e.id);
        }

        let p1 = e.params1.as_ref().expect("OCO carries its sibling params");
        let id2 = self.generate_id();
        let e2 = OrderElem {
            otype: p1.order_type(),
            side: p1.side(),
            limit: p1.limit_price(),
            stop: p1.stop_price(),
            sz: p1.size(),
            cb: e.cb.clone(),
            id: id2,
            condition: e.condition,
            trigger: e.trigger,
            params1: None,
            params2: None,
            parent: OrderId::NONE,
        };

        let (_, fired2) = self.inject_basic(&e2)?;
        if fired2 {
            // the sibling filled first: pull the primary and hand the
            // caller the sibling's id as the surviving identity
            self.push_deferred(CallbackMsg::TriggerOco, &e.cb, e.id, id2, 0.0, 0);
            self.pull_order(e.id, false);
            return Ok(id2);
        }

        let loc_of = |x: &OrderElem, primary: bool| OrderLocation {
            is_limit: x.otype == OrderType::Limit,
            price: if x.otype == OrderType::Limit {
                x.limit
            } else {
                x.stop
            },
            id: x.id,
            is_primary: primary,
        };
        self.set_advanced(
            e.id,
            Advanced::Oco {
                linked: loc_of(&e2, false),
            },
            e.trigger,
        );
        self.set_advanced(
            id2,
            Advanced::Oco {
                linked: loc_of(e, true),
            },
            e.trigger,
        );
        Ok(e.id)
    }

    fn insert_oto(&mut self, e: &OrderElem) -> Result<OrderId, BookError> {
        let p1 = e.params1.as_ref().expect("OTO carries its contingent params");
        debug_assert!(p1.is_by_price());

        let (_, fired) = self.inject_basic(e)?;
        if fired {
            let params = p1.clone();
            self.exec_oto(&params, &e.cb, e.id);
            return Ok(e.id);
        }

        self.set_advanced(
            e.id,
            Advanced::Oto {
                params: Box::new(p1.clone()),
            },
            e.trigger,
        );
        Ok(e.id)
    }

    fn insert_fok(&mut self, e: &OrderElem) -> Result<OrderId, BookError> {
        debug_assert_eq!(e.otype, OrderType::Limit);
        let pidx = self.grid.ptoi(e.limit)? as isize;
        let allow_partial = e.trigger == ConditionTrigger::FillPartial;

        if !self.limit_is_fillable(e.side, pidx, e.sz, allow_partial).0 {
            self.push_deferred(CallbackMsg::Kill, &e.cb, e.id, e.id, e.limit, e.sz);
            return Ok(e.id);
        }
        self.route_basic(e)?;
        Ok(e.id)
    }

    fn insert_bracket(&mut self, e: &OrderElem, trailing: bool) -> Result<OrderId, BookError> {
        let loss = e.params1.as_ref().expect("bracket carries a loss leg").clone();
        let target = e.params2.as_ref().expect("bracket carries a target leg").clone();

        let filled = self.route_basic(e)?;
        let fired =
            (e.trigger == ConditionTrigger::FillPartial && filled > 0) || filled == e.sz;
        if fired {
            self.exec_bracket(&loss, &target, filled, &e.cb, e.id, trailing)?;
            if filled == e.sz {
                return Ok(e.id);
            }
        }

        let mut loss = loss;
        let mut target = target;
        loss.set_size(loss.size() - filled);
        target.set_size(target.size() - filled);
        let orders = Box::new(BracketParams {
            loss,
            target,
            active_loss: OrderId::NONE,
            active_target: OrderId::NONE,
        });
        self.set_advanced(
            e.id,
            if trailing {
                Advanced::TrailingBracket { orders }
            } else {
                Advanced::Bracket { orders }
            },
            e.trigger,
        );
        Ok(e.id)
    }

    fn insert_trailing_stop(&mut self, e: &OrderElem) -> Result<OrderId, BookError> {
        let params = e
            .params1
            .as_ref()
            .expect("trailing stop carries tick params")
            .clone();
        debug_assert!(!params.is_by_price());

        let filled = self.route_basic(e)?;
        let fired =
            (e.trigger == ConditionTrigger::FillPartial && filled > 0) || filled == e.sz;
        if fired {
            self.exec_trailing_stop(&params, filled, &e.cb, e.id);
            if filled == e.sz {
                return Ok(e.id);
            }
        }

        let mut params = params;
        params.set_size(params.size() - filled);
        self.set_advanced(
            e.id,
            Advanced::TrailingStop {
                params: Box::new(params),
                active: OrderId::NONE,
            },
            e.trigger,
        );
        Ok(e.id)
    }

    /// Route the reinjected active trailing stop: rest it `nticks` from
    /// `last`, register it in the trailing set, and tell the entry order.
    fn insert_trailing_stop_active(&mut self, e: &OrderElem) -> Result<OrderId, BookError> {
        let params = e.params1.as_ref().expect("active trailing stop has params");
        let nticks = params.stop_ticks();
        debug_assert!(nticks > 0);

        let idx = self.trailing_stop_level(e.side, nticks)?;
        self.push_stop(
            idx,
            StopBundle {
                id: e.id,
                sz: e.sz,
                is_buy: e.side.is_buy(),
                limit: None,
                cb: e.cb.clone(),
                trigger: e.trigger,
                advanced: Advanced::TrailingStopActive { nticks },
            },
        );
        self.trailing_insert(e.id, e.side.is_buy());
        let price = self.grid.itop(idx);
        self.push_deferred(
            CallbackMsg::TriggerTrailingStopOpenLoss,
            &e.cb,
            e.parent,
            e.id,
            price,
            e.sz,
        );

        self.note_trailing_active(e.parent, e.id);
        Ok(e.id)
    }

    /// Route an active bracket leg: rest the target limit, then push the
    /// loss stop directly onto its chain and link the pair.
    fn insert_active_bracket(&mut self, e: &OrderElem, trailing: bool) -> Result<OrderId, BookError> {
        debug_assert_eq!(e.otype, OrderType::Limit);
        let loss = e.params1.as_ref().expect("active bracket carries its loss").clone();

        let filled = self.route_basic(e)?;
        let rmndr = e.sz - filled;
        if rmndr == 0 {
            // target filled on arrival; the bracket opens and closes at once
            self.push_deferred(CallbackMsg::TriggerBracketClose, &e.cb, e.id, e.id, 0.0, 0);
            return Ok(e.id);
        }

        self.push_deferred(
            CallbackMsg::TriggerBracketOpenTarget,
            &e.cb,
            e.parent,
            e.id,
            e.limit,
            rmndr,
        );

        let nticks = loss.stop_ticks();
        let stop_idx = if trailing {
            debug_assert!(nticks > 0);
            self.trailing_stop_level(loss.side(), nticks)?
        } else {
            self.grid.ptoi(loss.stop_price())?
        };
        let stop_price = self.grid.itop(stop_idx);

        let id2 = self.generate_id();
        let target_loc = OrderLocation {
            is_limit: true,
            price: e.limit,
            id: e.id,
            is_primary: true,
        };
        let stop_loc = OrderLocation {
            is_limit: false,
            price: stop_price,
            id: id2,
            is_primary: false,
        };

        // link the resting target to the stop we are about to place
        let target_adv = if trailing {
            Advanced::TrailingBracketActive {
                nticks: 0,
                linked: stop_loc,
            }
        } else {
            Advanced::BracketActive { linked: stop_loc }
        };
        self.set_advanced(e.id, target_adv, e.trigger);

        let stop_adv = if trailing {
            Advanced::TrailingBracketActive {
                nticks,
                linked: target_loc,
            }
        } else {
            Advanced::BracketActive { linked: target_loc }
        };
        let limit = loss.limit_price();
        self.push_stop(
            stop_idx,
            StopBundle {
                id: id2,
                sz: rmndr,
                is_buy: loss.side().is_buy(),
                limit: (limit != 0.0).then_some(limit),
                cb: e.cb.clone(),
                trigger: e.trigger,
                advanced: stop_adv,
            },
        );
        if trailing {
            self.trailing_insert(id2, loss.side().is_buy());
        }

        self.push_deferred(
            CallbackMsg::TriggerBracketOpenLoss,
            &e.cb,
            e.parent,
            id2,
            stop_price,
            rmndr,
        );

        self.note_bracket_actives(e.parent, id2, e.id);
        Ok(e.id)
    }

    /// Record the active stop id on a trailing-stop entry order, if it
    /// still rests (it may already be gone after a full fill).
    fn note_trailing_active(&mut self, parent: OrderId, active: OrderId) {
        let Some(loc) = self.id_cache.get(&parent).copied() else {
            return;
        };
        let level = self.grid.level_mut(loc.level);
        let adv = match loc.kind {
            crate::bundle::ChainKind::Limit => level.limit_get_mut(parent).map(|b| &mut b.advanced),
            crate::bundle::ChainKind::Stop => level.stop_get_mut(parent).map(|b| &mut b.advanced),
            _ => None,
        };
        if let Some(Advanced::TrailingStop { active: a, .. }) = adv {
            *a = active;
        }
    }

    /// Record the active children ids on a bracket entry order.
    fn note_bracket_actives(&mut self, parent: OrderId, loss: OrderId, target: OrderId) {
        let Some(loc) = self.id_cache.get(&parent).copied() else {
            return;
        };
        let level = self.grid.level_mut(loc.level);
        let adv = match loc.kind {
            crate::bundle::ChainKind::Limit => level.limit_get_mut(parent).map(|b| &mut b.advanced),
            crate::bundle::ChainKind::Stop => level.stop_get_mut(parent).map(|b| &mut b.advanced),
            _ => None,
        };
        if let Some(Advanced::Bracket { orders } | Advanced::TrailingBracket { orders }) = adv {
            orders.active_loss = loss;
            orders.active_target = target;
        }
    }

    // --- ticket validation (runs on the submitting thread, under the
    //     master lock, before anything is queued) ---

    /// A grid price or `InvalidPrice`, rounded onto the tick grid.
    pub(crate) fn tick_price_or_err(&self, price: f64) -> Result<f64, BookError> {
        let idx = self.grid.ptoi(price)?;
        Ok(self.grid.itop(idx))
    }

    /// Expand a ticket into the internal parameter pair, validating prices
    /// and tick offsets against the live grid.
    pub(crate) fn build_advanced_params(
        &self,
        side: Side,
        size: Size,
        ticket: &AdvancedOrderTicket,
    ) -> Result<(Option<OrderParams>, Option<OrderParams>), BookError> {
        match ticket.condition() {
            OrderCondition::TrailingBracket => {
                let p2 = self.build_nticks_params(
                    side.opposite(),
                    size,
                    ticket.order2().expect("trailing bracket has a target"),
                )?;
                let p1 = self.build_nticks_params(
                    side.opposite(),
                    size,
                    ticket.order1().expect("trailing bracket has a loss"),
                )?;
                Ok((Some(p1), Some(p2)))
            }
            OrderCondition::TrailingStop => {
                // a trailing stop rides its host's own side: a buy entry
                // rests a buy stop above the market that follows it down
                let p1 = self.build_nticks_params(
                    side,
                    size,
                    ticket.order1().expect("trailing stop has params"),
                )?;
                Ok((Some(p1), None))
            }
            OrderCondition::Bracket => {
                let p1 =
                    self.build_price_params(size, ticket.order1().expect("bracket has a loss"))?;
                let p2 =
                    self.build_price_params(size, ticket.order2().expect("bracket has a target"))?;
                Ok((Some(p1), Some(p2)))
            }
            OrderCondition::OneTriggersOther | OrderCondition::OneCancelsOther => {
                let o1 = ticket.order1().expect("OCO/OTO has a linked order");
                let p1 = self.build_price_params(o1.size(), o1)?;
                Ok((Some(p1), None))
            }
            OrderCondition::FillOrKill | OrderCondition::AllOrNone => Ok((None, None)),
            other => Err(malformed(&format!("invalid ticket condition {other}"))),
        }
    }

    fn build_nticks_params(
        &self,
        side: Side,
        size: Size,
        order: &OrderParams,
    ) -> Result<OrderParams, BookError> {
        debug_assert!(!order.is_by_price());
        let total = self.grid.len();
        if order.limit_ticks() >= total {
            return Err(malformed("target nticks larger than the grid"));
        }
        if order.stop_ticks() >= total {
            return Err(malformed("stop nticks larger than the grid"));
        }
        Ok(OrderParams::ByTicks {
            side,
            size,
            limit_ticks: order.limit_ticks(),
            stop_ticks: order.stop_ticks(),
        })
    }

    fn build_price_params(
        &self,
        size: Size,
        order: &OrderParams,
    ) -> Result<OrderParams, BookError> {
        debug_assert!(order.is_by_price());
        if size == 0 {
            return Err(malformed("linked order size is zero"));
        }
        let mut limit = 0.0;
        let mut stop = 0.0;
        match order.order_type() {
            OrderType::StopLimit => {
                stop = self
                    .tick_price_or_err(order.stop_price())
                    .map_err(|_| malformed("invalid stop price in ticket"))?;
                limit = self
                    .tick_price_or_err(order.limit_price())
                    .map_err(|_| malformed("invalid limit price in ticket"))?;
            }
            OrderType::Limit => {
                limit = self
                    .tick_price_or_err(order.limit_price())
                    .map_err(|_| malformed("invalid limit price in ticket"))?;
            }
            OrderType::Stop => {
                stop = self
                    .tick_price_or_err(order.stop_price())
                    .map_err(|_| malformed("invalid stop price in ticket"))?;
            }
            OrderType::Market => {}
        }
        Ok(OrderParams::ByPrice {
            side: order.side(),
            size,
            limit,
            stop,
        })
    }

    /// A limit/limit pairing must not trivially cross the host order.
    pub(crate) fn check_limit_pairing(
        &self,
        side: Side,
        limit: f64,
        op: &OrderParams,
    ) -> Result<(), BookError> {
        match op.order_type() {
            OrderType::Market => {
                return Err(BookError::InvalidOrderType(
                    "market order cannot be the linked side of a limit pairing".into(),
                ))
            }
            OrderType::Limit => {}
            _ => return Ok(()),
        }
        let other = op.limit_price();
        if side.is_buy() && !op.side().is_buy() && limit >= other {
            return Err(malformed("paired limit buy price >= sell price"));
        }
        if !side.is_buy() && op.side().is_buy() && limit <= other {
            return Err(malformed("paired limit sell price <= buy price"));
        }
        if other == limit {
            return Err(malformed("paired limits at the same price"));
        }
        Ok(())
    }

    /// A trailing offset must stay inside the grid from its reference price.
    pub(crate) fn check_nticks(
        &self,
        above: bool,
        price: f64,
        nticks: usize,
    ) -> Result<(), BookError> {
        if nticks == 0 {
            return Err(malformed("nticks is zero"));
        }
        let idx = self.grid.ptoi(price)?;
        let avail = if above {
            self.grid.len() - 1 - idx
        } else {
            idx
        };
        if nticks > avail {
            return Err(malformed(
                "nticks would derive a price outside the tradable range",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::test_support::core;

    fn elem(
        otype: OrderType,
        side: Side,
        limit: f64,
        sz: Size,
        id: u64,
        condition: OrderCondition,
        trigger: ConditionTrigger,
    ) -> OrderElem {
        OrderElem {
            otype,
            side,
            limit,
            stop: 0.0,
            sz,
            cb: None,
            id: OrderId(id),
            condition,
            trigger,
            params1: None,
            params2: None,
            parent: OrderId::NONE,
        }
    }

    #[test]
    fn oco_links_both_orders() {
        let mut c = core(1.0, 10.0);
        let mut e = elem(
            OrderType::Limit,
            Side::Buy,
            2.0,
            100,
            0,
            OrderCondition::OneCancelsOther,
            ConditionTrigger::FillPartial,
        );
        e.id = c.generate_id();
        e.params1 = Some(OrderParams::ByPrice {
            side: Side::Sell,
            size: 100,
            limit: 3.0,
            stop: 0.0,
        });

        let rid = c.route_advanced(&e).unwrap();
        assert_eq!(rid, e.id);

        let info1 = c.order_info(e.id).unwrap();
        assert_eq!(info1.condition, OrderCondition::OneCancelsOther);
        let sib_id = OrderId(e.id.0 + 1);
        let info2 = c.order_info(sib_id).unwrap();
        assert_eq!(info2.condition, OrderCondition::OneCancelsOther);
        assert_eq!(info2.side, Side::Sell);
        assert_eq!(info2.limit, 3.0);
    }

    #[test]
    fn oco_pull_removes_both() {
        let mut c = core(1.0, 10.0);
        let mut e = elem(
            OrderType::Limit,
            Side::Buy,
            2.0,
            100,
            0,
            OrderCondition::OneCancelsOther,
            ConditionTrigger::FillPartial,
        );
        e.id = c.generate_id();
        e.params1 = Some(OrderParams::ByPrice {
            side: Side::Sell,
            size: 100,
            limit: 3.0,
            stop: 0.0,
        });
        c.route_advanced(&e).unwrap();
        let sib_id = OrderId(e.id.0 + 1);

        assert!(c.pull_order(e.id, true));
        assert!(c.id_cache.get(&e.id).is_none());
        assert!(c.id_cache.get(&sib_id).is_none());
    }

    #[test]
    fn fok_kills_without_liquidity() {
        let mut c = core(1.0, 10.0);
        let mut e = elem(
            OrderType::Limit,
            Side::Buy,
            2.0,
            100,
            0,
            OrderCondition::FillOrKill,
            ConditionTrigger::FillFull,
        );
        e.id = c.generate_id();
        let hits: std::sync::Arc<std::sync::Mutex<Vec<CallbackMsg>>> = Default::default();
        let h = hits.clone();
        e.cb = Some(std::sync::Arc::new(move |m, _, _, _, _| {
            h.lock().unwrap().push(m)
        }));

        c.route_advanced(&e).unwrap();
        assert!(c.id_cache.is_empty());
        assert_eq!(c.deferred.len(), 1);
        assert_eq!(c.deferred[0].msg, CallbackMsg::Kill);
    }

    #[test]
    fn check_limit_pairing_rules() {
        let c = core(1.0, 10.0);
        let sell3 = OrderParams::ByPrice {
            side: Side::Sell,
            size: 10,
            limit: 3.0,
            stop: 0.0,
        };
        assert!(c.check_limit_pairing(Side::Buy, 2.0, &sell3).is_ok());
        assert!(c.check_limit_pairing(Side::Buy, 3.0, &sell3).is_err());
        assert!(c.check_limit_pairing(Side::Buy, 3.5, &sell3).is_err());

        let market = OrderParams::ByPrice {
            side: Side::Sell,
            size: 10,
            limit: 0.0,
            stop: 0.0,
        };
        assert!(matches!(
            c.check_limit_pairing(Side::Buy, 2.0, &market),
            Err(BookError::InvalidOrderType(_))
        ));
    }

    #[test]
    fn check_nticks_range() {
        let c = core(1.0, 2.0);
        assert!(c.check_nticks(true, 1.50, 50).is_ok());
        assert!(c.check_nticks(true, 1.50, 51).is_err());
        assert!(c.check_nticks(false, 1.50, 50).is_ok());
        assert!(c.check_nticks(false, 1.50, 51).is_err());
        assert!(c.check_nticks(true, 1.50, 0).is_err());
    }
}
