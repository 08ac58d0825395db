//! Resting-order bundles and the advanced-condition linkage payload.
//!
//! Linkages hold `OrderLocation` values (chain kind + price + id), never
//! references into chain storage, so grow/reallocation cannot dangle them;
//! the id cache resolves locations on demand.

use crate::callback::OrderExecCb;
use crate::order::{ConditionTrigger, OrderCondition, OrderParams};
use crate::types::{OrderId, Size};

/// Which chain a cached order lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChainKind {
    Limit,
    Stop,
    AonBuy,
    AonSell,
}

/// Where a linked order rests: enough to find it again without pointers.
#[derive(Clone, Debug)]
pub(crate) struct OrderLocation {
    /// True when the linked order rests on a limit chain, false for stop.
    pub is_limit: bool,
    /// Grid price of the linked order's level (limit or stop price).
    pub price: f64,
    pub id: OrderId,
    /// True when the linked order is the primary of its pair.
    pub is_primary: bool,
}

/// Pre-activation bracket payload: the two child descriptions plus the ids
/// of the active children once spawned (`OrderId::NONE` until then).
#[derive(Clone, Debug)]
pub(crate) struct BracketParams {
    pub loss: OrderParams,
    pub target: OrderParams,
    pub active_loss: OrderId,
    pub active_target: OrderId,
}

/// Advanced-condition state carried by a resting bundle.
#[derive(Clone, Debug, Default)]
pub(crate) enum Advanced {
    #[default]
    None,
    /// OCO pair member; the sibling's location.
    Oco { linked: OrderLocation },
    /// OTO primary; the contingent order to spawn on trigger.
    Oto { params: Box<OrderParams> },
    /// All-or-none marker (rides limit and AON chains).
    Aon,
    /// Trailing-stop primary awaiting its triggering fill.
    TrailingStop {
        params: Box<OrderParams>,
        /// Id of the spawned active stop, NONE until activation.
        active: OrderId,
    },
    /// Active trailing stop registered in the trailing set.
    TrailingStopActive { nticks: usize },
    /// Price-bracket primary awaiting its triggering fill.
    Bracket { orders: Box<BracketParams> },
    /// Trailing-bracket primary (children described by tick offsets).
    TrailingBracket { orders: Box<BracketParams> },
    /// Active leg of a price bracket, OCO-linked to its sibling.
    BracketActive { linked: OrderLocation },
    /// Active leg of a trailing bracket. `nticks` is nonzero only on the
    /// trailing (stop) leg; the target leg carries zero.
    TrailingBracketActive {
        nticks: usize,
        linked: OrderLocation,
    },
}

impl Advanced {
    /// The condition tag for this state.
    pub fn condition(&self) -> OrderCondition {
        match self {
            Advanced::None => OrderCondition::None,
            Advanced::Oco { .. } => OrderCondition::OneCancelsOther,
            Advanced::Oto { .. } => OrderCondition::OneTriggersOther,
            Advanced::Aon => OrderCondition::AllOrNone,
            Advanced::TrailingStop { .. } => OrderCondition::TrailingStop,
            Advanced::TrailingStopActive { .. } => OrderCondition::TrailingStopActive,
            Advanced::Bracket { .. } => OrderCondition::Bracket,
            Advanced::TrailingBracket { .. } => OrderCondition::TrailingBracket,
            Advanced::BracketActive { .. } => OrderCondition::BracketActive,
            Advanced::TrailingBracketActive { .. } => OrderCondition::TrailingBracketActive,
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Advanced::None)
    }

    #[inline]
    pub fn is_aon(&self) -> bool {
        matches!(self, Advanced::Aon)
    }

    /// Linked-order location for OCO-class states.
    pub fn linked(&self) -> Option<&OrderLocation> {
        match self {
            Advanced::Oco { linked }
            | Advanced::BracketActive { linked }
            | Advanced::TrailingBracketActive { linked, .. } => Some(linked),
            _ => None,
        }
    }
}

/// A resting limit order.
#[derive(Clone)]
pub(crate) struct LimitBundle {
    pub id: OrderId,
    pub sz: Size,
    pub cb: Option<OrderExecCb>,
    pub trigger: ConditionTrigger,
    pub advanced: Advanced,
}

impl LimitBundle {
    pub fn plain(id: OrderId, sz: Size, cb: Option<OrderExecCb>) -> Self {
        LimitBundle {
            id,
            sz,
            cb,
            trigger: ConditionTrigger::None,
            advanced: Advanced::None,
        }
    }
}

/// A resting stop order (market or limit on trigger).
#[derive(Clone)]
pub(crate) struct StopBundle {
    pub id: OrderId,
    pub sz: Size,
    pub is_buy: bool,
    /// Limit price for stop-limits, `None` for plain stops.
    pub limit: Option<f64>,
    pub cb: Option<OrderExecCb>,
    pub trigger: ConditionTrigger,
    pub advanced: Advanced,
}

/// A resting all-or-none order awaiting a counterparty large enough to
/// fill it completely.
#[derive(Clone)]
pub(crate) struct AonBundle {
    pub id: OrderId,
    pub sz: Size,
    pub cb: Option<OrderExecCb>,
    pub trigger: ConditionTrigger,
    pub advanced: Advanced,
}

impl AonBundle {
    pub fn from_limit(b: LimitBundle) -> Self {
        AonBundle {
            id: b.id,
            sz: b.sz,
            cb: b.cb,
            trigger: b.trigger,
            advanced: b.advanced,
        }
    }
}


impl std::fmt::Debug for LimitBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitBundle")
            .field("id", &self.id)
            .field("sz", &self.sz)
            .field("trigger", &self.trigger)
            .field("advanced", &self.advanced)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for StopBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopBundle")
            .field("id", &self.id)
            .field("sz", &self.sz)
            .field("is_buy", &self.is_buy)
            .field("limit", &self.limit)
            .field("trigger", &self.trigger)
            .field("advanced", &self.advanced)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for AonBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AonBundle")
            .field("id", &self.id)
            .field("sz", &self.sz)
            .field("trigger", &self.trigger)
            .field("advanced", &self.advanced)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::Side;

    #[test]
    fn condition_tags() {
        assert_eq!(Advanced::None.condition(), OrderCondition::None);
        assert_eq!(Advanced::Aon.condition(), OrderCondition::AllOrNone);
        let oco = Advanced::Oco {
            linked: OrderLocation {
                is_limit: true,
                price: 1.0,
                id: OrderId(2),
                is_primary: true,
            },
        };
        assert_eq!(oco.condition(), OrderCondition::OneCancelsOther);
        assert_eq!(oco.linked().unwrap().id, OrderId(2));
    }

    #[test]
    fn aon_from_limit_keeps_fields() {
        let b = LimitBundle {
            id: OrderId(5),
            sz: 40,
            cb: None,
            trigger: ConditionTrigger::FillFull,
            advanced: Advanced::Aon,
        };
        let a = AonBundle::from_limit(b);
        assert_eq!(a.id, OrderId(5));
        assert_eq!(a.sz, 40);
        assert!(a.advanced.is_aon());
    }

    #[test]
    fn trailing_states() {
        let t = Advanced::TrailingStop {
            params: Box::new(OrderParams::ByTicks {
                side: Side::Sell,
                size: 10,
                limit_ticks: 0,
                stop_ticks: 5,
            }),
            active: OrderId::NONE,
        };
        assert_eq!(t.condition(), OrderCondition::TrailingStop);
        assert!(t.linked().is_none());

        let a = Advanced::TrailingStopActive { nticks: 5 };
        assert_eq!(a.condition(), OrderCondition::TrailingStopActive);
    }
}
