//! Order classification: types, conditions, triggers, and the parameter
//! bundles used to describe linked/contingent orders.

use std::fmt;

use crate::side::Side;
use crate::types::Size;

/// Basic order type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
            OrderType::Stop => write!(f, "stop"),
            OrderType::StopLimit => write!(f, "stop-limit"),
        }
    }
}

/// Advanced order condition attached to an order.
///
/// The `*Active` variants are internal post-activation states: the book
/// rewrites a bracket or trailing condition into its active form once the
/// host order fills. They appear in [`OrderInfo`] for orders in that state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderCondition {
    #[default]
    None,
    OneCancelsOther,
    OneTriggersOther,
    FillOrKill,
    AllOrNone,
    Bracket,
    TrailingBracket,
    TrailingStop,
    /// Active leg of a price bracket (OCO-linked to its sibling).
    BracketActive,
    /// Active leg of a trailing bracket.
    TrailingBracketActive,
    /// Active trailing stop registered in the trailing set.
    TrailingStopActive,
}

impl fmt::Display for OrderCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderCondition::None => "none",
            OrderCondition::OneCancelsOther => "one-cancels-other",
            OrderCondition::OneTriggersOther => "one-triggers-other",
            OrderCondition::FillOrKill => "fill-or-kill",
            OrderCondition::AllOrNone => "all-or-none",
            OrderCondition::Bracket => "bracket",
            OrderCondition::TrailingBracket => "trailing-bracket",
            OrderCondition::TrailingStop => "trailing-stop",
            OrderCondition::BracketActive => "bracket-active",
            OrderCondition::TrailingBracketActive => "trailing-bracket-active",
            OrderCondition::TrailingStopActive => "trailing-stop-active",
        };
        write!(f, "{s}")
    }
}

/// When an advanced condition fires relative to the host order's fills.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionTrigger {
    #[default]
    None,
    /// Fires on any fill of the host order.
    FillPartial,
    /// Fires only when the host order fills completely.
    FillFull,
}

/// Parameters describing a linked or contingent order.
///
/// `ByPrice` carries explicit limit/stop prices; the basic order type is
/// deducible from which prices are nonzero. `ByTicks` carries tick offsets
/// for trailing orders whose live price is derived from `last`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderParams {
    ByPrice {
        side: Side,
        size: Size,
        /// Limit price, 0 when absent.
        limit: f64,
        /// Stop price, 0 when absent.
        stop: f64,
    },
    ByTicks {
        side: Side,
        size: Size,
        /// Tick offset of the (target) limit, 0 when absent.
        limit_ticks: usize,
        /// Tick offset of the (loss) stop, 0 when absent.
        stop_ticks: usize,
    },
}

impl OrderParams {
    /// Side of the described order.
    pub fn side(&self) -> Side {
        match *self {
            OrderParams::ByPrice { side, .. } | OrderParams::ByTicks { side, .. } => side,
        }
    }

    /// Size of the described order.
    pub fn size(&self) -> Size {
        match *self {
            OrderParams::ByPrice { size, .. } | OrderParams::ByTicks { size, .. } => size,
        }
    }

    /// Replace the size in place.
    pub fn set_size(&mut self, sz: Size) {
        match self {
            OrderParams::ByPrice { size, .. } | OrderParams::ByTicks { size, .. } => *size = sz,
        }
    }

    /// Limit price (0 when absent or by-ticks).
    pub fn limit_price(&self) -> f64 {
        match *self {
            OrderParams::ByPrice { limit, .. } => limit,
            OrderParams::ByTicks { .. } => 0.0,
        }
    }

    /// Stop price (0 when absent or by-ticks).
    pub fn stop_price(&self) -> f64 {
        match *self {
            OrderParams::ByPrice { stop, .. } => stop,
            OrderParams::ByTicks { .. } => 0.0,
        }
    }

    /// Limit tick offset (0 when absent or by-price).
    pub fn limit_ticks(&self) -> usize {
        match *self {
            OrderParams::ByTicks { limit_ticks, .. } => limit_ticks,
            OrderParams::ByPrice { .. } => 0,
        }
    }

    /// Stop tick offset (0 when absent or by-price).
    pub fn stop_ticks(&self) -> usize {
        match *self {
            OrderParams::ByTicks { stop_ticks, .. } => stop_ticks,
            OrderParams::ByPrice { .. } => 0,
        }
    }

    /// True for the by-price representation.
    pub fn is_by_price(&self) -> bool {
        matches!(self, OrderParams::ByPrice { .. })
    }

    /// Basic order type implied by which prices are set.
    pub fn order_type(&self) -> OrderType {
        match *self {
            OrderParams::ByPrice { limit, stop, .. } => {
                if stop != 0.0 {
                    if limit != 0.0 {
                        OrderType::StopLimit
                    } else {
                        OrderType::Stop
                    }
                } else if limit != 0.0 {
                    OrderType::Limit
                } else {
                    OrderType::Market
                }
            }
            OrderParams::ByTicks {
                limit_ticks,
                stop_ticks,
                ..
            } => {
                if stop_ticks != 0 {
                    if limit_ticks != 0 {
                        OrderType::StopLimit
                    } else {
                        OrderType::Stop
                    }
                } else if limit_ticks != 0 {
                    OrderType::Limit
                } else {
                    OrderType::Market
                }
            }
        }
    }
}

/// Snapshot of a resting order, as returned by `get_order_info`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderInfo {
    pub order_type: OrderType,
    pub side: Side,
    /// Limit price, 0 when the order has none.
    pub limit: f64,
    /// Stop price, 0 when the order has none.
    pub stop: f64,
    pub size: Size,
    /// Advanced condition currently riding the order.
    pub condition: OrderCondition,
    /// Trigger of the advanced condition.
    pub trigger: ConditionTrigger,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_order_type_deduction() {
        let p = OrderParams::ByPrice {
            side: Side::Buy,
            size: 10,
            limit: 0.0,
            stop: 0.0,
        };
        assert_eq!(p.order_type(), OrderType::Market);

        let p = OrderParams::ByPrice {
            side: Side::Buy,
            size: 10,
            limit: 1.0,
            stop: 0.0,
        };
        assert_eq!(p.order_type(), OrderType::Limit);

        let p = OrderParams::ByPrice {
            side: Side::Buy,
            size: 10,
            limit: 0.0,
            stop: 2.0,
        };
        assert_eq!(p.order_type(), OrderType::Stop);

        let p = OrderParams::ByPrice {
            side: Side::Buy,
            size: 10,
            limit: 1.0,
            stop: 2.0,
        };
        assert_eq!(p.order_type(), OrderType::StopLimit);
    }

    #[test]
    fn by_ticks_order_type_deduction() {
        let p = OrderParams::ByTicks {
            side: Side::Sell,
            size: 5,
            limit_ticks: 0,
            stop_ticks: 10,
        };
        assert_eq!(p.order_type(), OrderType::Stop);
        assert_eq!(p.stop_ticks(), 10);
        assert_eq!(p.limit_price(), 0.0);
    }

    #[test]
    fn set_size() {
        let mut p = OrderParams::ByTicks {
            side: Side::Sell,
            size: 5,
            limit_ticks: 3,
            stop_ticks: 0,
        };
        p.set_size(42);
        assert_eq!(p.size(), 42);
    }
}
