//! Advanced-order tickets: value objects attached to an order at submission
//! to request an advanced condition (OCO, OTO, FOK, AON, brackets, trailing
//! stops).
//!
//! Builders validate what they can statically (sizes, price relations, tick
//! offsets); grid-dependent validation happens when the ticket is submitted
//! with an order.

use crate::error::BookError;
use crate::order::{ConditionTrigger, OrderCondition, OrderParams};
use crate::side::Side;
use crate::types::Size;

/// An advanced-order request riding a basic order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvancedOrderTicket {
    condition: OrderCondition,
    trigger: ConditionTrigger,
    order1: Option<OrderParams>,
    order2: Option<OrderParams>,
}

fn malformed(msg: &str) -> BookError {
    BookError::AdvancedTicketMalformed(msg.to_string())
}

impl AdvancedOrderTicket {
    fn new(
        condition: OrderCondition,
        trigger: ConditionTrigger,
        order1: Option<OrderParams>,
        order2: Option<OrderParams>,
    ) -> Self {
        AdvancedOrderTicket {
            condition,
            trigger,
            order1,
            order2,
        }
    }

    /// The condition this ticket requests.
    pub fn condition(&self) -> OrderCondition {
        self.condition
    }

    /// When the condition fires relative to the host order's fills.
    pub fn trigger(&self) -> ConditionTrigger {
        self.trigger
    }

    /// First linked-order description, if the condition carries one.
    pub fn order1(&self) -> Option<&OrderParams> {
        self.order1.as_ref()
    }

    /// Second linked-order description, if the condition carries one.
    pub fn order2(&self) -> Option<&OrderParams> {
        self.order2.as_ref()
    }

    /// Override the trigger kind.
    ///
    /// Trailing-stop and trailing-bracket tickets only support
    /// [`ConditionTrigger::FillFull`]; the override is ignored for them.
    pub fn with_trigger(mut self, trigger: ConditionTrigger) -> Self {
        if !matches!(
            self.condition,
            OrderCondition::TrailingStop | OrderCondition::TrailingBracket
        ) {
            self.trigger = trigger;
        }
        self
    }

    fn oco(side: Side, size: Size, limit: f64, stop: f64) -> Result<Self, BookError> {
        if size == 0 {
            return Err(malformed("OCO order size is zero"));
        }
        Ok(Self::new(
            OrderCondition::OneCancelsOther,
            ConditionTrigger::FillPartial,
            Some(OrderParams::ByPrice {
                side,
                size,
                limit,
                stop,
            }),
            None,
        ))
    }

    /// OCO with a limit sibling.
    pub fn oco_limit(side: Side, limit: f64, size: Size) -> Result<Self, BookError> {
        if limit == 0.0 {
            return Err(malformed("OCO limit price is zero"));
        }
        Self::oco(side, size, limit, 0.0)
    }

    /// OCO with a stop sibling.
    pub fn oco_stop(side: Side, stop: f64, size: Size) -> Result<Self, BookError> {
        if stop == 0.0 {
            return Err(malformed("OCO stop price is zero"));
        }
        Self::oco(side, size, 0.0, stop)
    }

    /// OCO with a stop-limit sibling.
    pub fn oco_stop_limit(side: Side, stop: f64, limit: f64, size: Size) -> Result<Self, BookError> {
        if stop == 0.0 || limit == 0.0 {
            return Err(malformed("OCO stop-limit price is zero"));
        }
        Self::oco(side, size, limit, stop)
    }

    fn oto(side: Side, size: Size, limit: f64, stop: f64) -> Result<Self, BookError> {
        if size == 0 {
            return Err(malformed("OTO order size is zero"));
        }
        Ok(Self::new(
            OrderCondition::OneTriggersOther,
            ConditionTrigger::FillPartial,
            Some(OrderParams::ByPrice {
                side,
                size,
                limit,
                stop,
            }),
            None,
        ))
    }

    /// OTO spawning a market order.
    pub fn oto_market(side: Side, size: Size) -> Result<Self, BookError> {
        Self::oto(side, size, 0.0, 0.0)
    }

    /// OTO spawning a limit order.
    pub fn oto_limit(side: Side, limit: f64, size: Size) -> Result<Self, BookError> {
        if limit == 0.0 {
            return Err(malformed("OTO limit price is zero"));
        }
        Self::oto(side, size, limit, 0.0)
    }

    /// OTO spawning a stop order.
    pub fn oto_stop(side: Side, stop: f64, size: Size) -> Result<Self, BookError> {
        if stop == 0.0 {
            return Err(malformed("OTO stop price is zero"));
        }
        Self::oto(side, size, 0.0, stop)
    }

    /// OTO spawning a stop-limit order.
    pub fn oto_stop_limit(side: Side, stop: f64, limit: f64, size: Size) -> Result<Self, BookError> {
        if stop == 0.0 || limit == 0.0 {
            return Err(malformed("OTO stop-limit price is zero"));
        }
        Self::oto(side, size, limit, stop)
    }

    /// Fill-or-kill: the host limit order is discarded unless it can fill
    /// per its trigger (full by default).
    pub fn fok() -> Self {
        Self::new(OrderCondition::FillOrKill, ConditionTrigger::FillFull, None, None)
    }

    /// All-or-none: the host limit order only ever matches in its entirety.
    pub fn aon() -> Self {
        Self::new(OrderCondition::AllOrNone, ConditionTrigger::FillFull, None, None)
    }

    fn bracket(
        child_side: Side,
        size: Size,
        loss_limit: f64,
        loss_stop: f64,
        target_limit: f64,
    ) -> Self {
        Self::new(
            OrderCondition::Bracket,
            ConditionTrigger::FillPartial,
            Some(OrderParams::ByPrice {
                side: child_side,
                size,
                limit: loss_limit,
                stop: loss_stop,
            }),
            Some(OrderParams::ByPrice {
                side: child_side,
                size,
                limit: target_limit,
                stop: 0.0,
            }),
        )
    }

    /// Price bracket with a sell stop loss and a sell limit target
    /// (protects a buy entry).
    pub fn bracket_sell_stop(
        loss_stop: f64,
        target_limit: f64,
        size: Size,
    ) -> Result<Self, BookError> {
        if size == 0 {
            return Err(malformed("bracket order size is zero"));
        }
        if target_limit <= loss_stop {
            return Err(malformed("bracket target_limit <= loss_stop"));
        }
        Ok(Self::bracket(Side::Sell, size, 0.0, loss_stop, target_limit))
    }

    /// Price bracket with a sell stop-limit loss and a sell limit target.
    pub fn bracket_sell_stop_limit(
        loss_stop: f64,
        loss_limit: f64,
        target_limit: f64,
        size: Size,
    ) -> Result<Self, BookError> {
        if size == 0 {
            return Err(malformed("bracket order size is zero"));
        }
        if target_limit <= loss_stop {
            return Err(malformed("bracket target_limit <= loss_stop"));
        }
        if loss_limit > loss_stop {
            return Err(malformed("bracket loss_limit > loss_stop"));
        }
        Ok(Self::bracket(
            Side::Sell,
            size,
            loss_limit,
            loss_stop,
            target_limit,
        ))
    }

    /// Price bracket with a buy stop loss and a buy limit target
    /// (protects a sell entry).
    pub fn bracket_buy_stop(
        loss_stop: f64,
        target_limit: f64,
        size: Size,
    ) -> Result<Self, BookError> {
        if size == 0 {
            return Err(malformed("bracket order size is zero"));
        }
        if target_limit >= loss_stop {
            return Err(malformed("bracket target_limit >= loss_stop"));
        }
        Ok(Self::bracket(Side::Buy, size, 0.0, loss_stop, target_limit))
    }

    /// Price bracket with a buy stop-limit loss and a buy limit target.
    pub fn bracket_buy_stop_limit(
        loss_stop: f64,
        loss_limit: f64,
        target_limit: f64,
        size: Size,
    ) -> Result<Self, BookError> {
        if size == 0 {
            return Err(malformed("bracket order size is zero"));
        }
        if target_limit >= loss_stop {
            return Err(malformed("bracket target_limit >= loss_stop"));
        }
        if loss_limit < loss_stop {
            return Err(malformed("bracket loss_limit < loss_stop"));
        }
        Ok(Self::bracket(
            Side::Buy,
            size,
            loss_limit,
            loss_stop,
            target_limit,
        ))
    }

    /// Trailing stop: once the host order fills in full, rest a stop
    /// `nticks` away from `last` that follows favorable moves.
    pub fn trailing_stop(nticks: usize) -> Result<Self, BookError> {
        if nticks == 0 {
            return Err(malformed("trailing nticks is zero"));
        }
        Ok(Self::new(
            OrderCondition::TrailingStop,
            ConditionTrigger::FillFull,
            Some(OrderParams::ByTicks {
                side: Side::Sell, // rewritten to the opposite of the host at submit
                size: 0,
                limit_ticks: 0,
                stop_ticks: nticks,
            }),
            None,
        ))
    }

    /// Trailing bracket: a trailing stop loss plus a fixed-offset target,
    /// spawned once the host order fills in full.
    pub fn trailing_bracket(stop_nticks: usize, target_nticks: usize) -> Result<Self, BookError> {
        if stop_nticks == 0 || target_nticks == 0 {
            return Err(malformed("trailing nticks is zero"));
        }
        Ok(Self::new(
            OrderCondition::TrailingBracket,
            ConditionTrigger::FillFull,
            Some(OrderParams::ByTicks {
                side: Side::Sell,
                size: 0,
                limit_ticks: 0,
                stop_ticks: stop_nticks,
            }),
            Some(OrderParams::ByTicks {
                side: Side::Sell,
                size: 0,
                limit_ticks: target_nticks,
                stop_ticks: 0,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderType;

    #[test]
    fn oco_builders() {
        let t = AdvancedOrderTicket::oco_limit(Side::Sell, 2.0, 100).unwrap();
        assert_eq!(t.condition(), OrderCondition::OneCancelsOther);
        assert_eq!(t.trigger(), ConditionTrigger::FillPartial);
        assert_eq!(t.order1().unwrap().order_type(), OrderType::Limit);

        let t = AdvancedOrderTicket::oco_stop_limit(Side::Sell, 1.5, 1.4, 100).unwrap();
        assert_eq!(t.order1().unwrap().order_type(), OrderType::StopLimit);

        assert!(AdvancedOrderTicket::oco_limit(Side::Sell, 0.0, 100).is_err());
        assert!(AdvancedOrderTicket::oco_limit(Side::Sell, 2.0, 0).is_err());
    }

    #[test]
    fn oto_builders() {
        let t = AdvancedOrderTicket::oto_market(Side::Buy, 50).unwrap();
        assert_eq!(t.condition(), OrderCondition::OneTriggersOther);
        assert_eq!(t.order1().unwrap().order_type(), OrderType::Market);

        let t = AdvancedOrderTicket::oto_stop(Side::Sell, 0.9, 50).unwrap();
        assert_eq!(t.order1().unwrap().order_type(), OrderType::Stop);
        assert!(AdvancedOrderTicket::oto_limit(Side::Buy, 0.0, 50).is_err());
    }

    #[test]
    fn fok_and_aon_triggers() {
        assert_eq!(AdvancedOrderTicket::fok().trigger(), ConditionTrigger::FillFull);
        assert_eq!(AdvancedOrderTicket::aon().condition(), OrderCondition::AllOrNone);
        let t = AdvancedOrderTicket::fok().with_trigger(ConditionTrigger::FillPartial);
        assert_eq!(t.trigger(), ConditionTrigger::FillPartial);
    }

    #[test]
    fn bracket_price_relations() {
        assert!(AdvancedOrderTicket::bracket_sell_stop(0.9, 1.1, 100).is_ok());
        assert!(AdvancedOrderTicket::bracket_sell_stop(1.1, 0.9, 100).is_err());
        assert!(AdvancedOrderTicket::bracket_sell_stop_limit(0.9, 0.8, 1.1, 100).is_ok());
        assert!(AdvancedOrderTicket::bracket_sell_stop_limit(0.9, 0.95, 1.1, 100).is_err());

        assert!(AdvancedOrderTicket::bracket_buy_stop(1.1, 0.9, 100).is_ok());
        assert!(AdvancedOrderTicket::bracket_buy_stop(0.9, 1.1, 100).is_err());
        assert!(AdvancedOrderTicket::bracket_buy_stop_limit(1.1, 1.2, 0.9, 100).is_ok());
        assert!(AdvancedOrderTicket::bracket_buy_stop_limit(1.1, 1.05, 0.9, 100).is_err());
    }

    #[test]
    fn trailing_builders() {
        let t = AdvancedOrderTicket::trailing_stop(10).unwrap();
        assert_eq!(t.condition(), OrderCondition::TrailingStop);
        assert_eq!(t.trigger(), ConditionTrigger::FillFull);
        assert_eq!(t.order1().unwrap().stop_ticks(), 10);

        // trailing tickets are pinned to full-fill triggers
        let t = t.with_trigger(ConditionTrigger::FillPartial);
        assert_eq!(t.trigger(), ConditionTrigger::FillFull);

        let t = AdvancedOrderTicket::trailing_bracket(10, 20).unwrap();
        assert_eq!(t.order1().unwrap().stop_ticks(), 10);
        assert_eq!(t.order2().unwrap().limit_ticks(), 20);
        assert!(AdvancedOrderTicket::trailing_stop(0).is_err());
    }
}
