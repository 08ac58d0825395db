//! Book queries: inside prices and sizes, depth maps, AON totals, and the
//! time & sales log.
//!
//! All query logic runs with the master lock held; the public handle wraps
//! each method in a short critical section. The cached bid/ask cursors may
//! rest on a level whose limit chain holds only AON entries, so the price
//! and size queries scan inward for real (non-AON) liquidity.

use std::time::Instant;

use crate::book::{BookCore, BELOW};
use crate::side::Side;
use crate::types::Size;

/// One time & sales entry: a single match event.
#[derive(Clone, Copy, Debug)]
pub struct TimeSaleEntry {
    /// When the match happened.
    pub time: Instant,
    /// Maker-side resting price of the fill.
    pub price: f64,
    /// Fill size.
    pub size: Size,
}

/// One price level of a depth query.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthEntry {
    pub price: f64,
    pub size: Size,
}

/// One price level of a combined market-depth query.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarketDepthEntry {
    pub price: f64,
    pub size: Size,
    pub side: Side,
}

/// Resting all-or-none liquidity at one price.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AonDepthEntry {
    pub price: f64,
    pub buy_size: Size,
    pub sell_size: Size,
}

fn not_aon(b: &crate::bundle::LimitBundle) -> bool {
    !b.advanced.is_aon()
}

fn is_aon(b: &crate::bundle::LimitBundle) -> bool {
    b.advanced.is_aon()
}

impl BookCore {
    /// Highest price with non-AON bid liquidity, 0 when none.
    pub(crate) fn q_bid_price(&self) -> f64 {
        let mut h = self.bid;
        while h >= 0 {
            if self.grid.level(h as usize).limit_any(not_aon) {
                return self.grid.itop(h as usize);
            }
            h -= 1;
        }
        0.0
    }

    /// Lowest price with non-AON ask liquidity, 0 when none.
    pub(crate) fn q_ask_price(&self) -> f64 {
        let mut l = self.ask;
        while l < self.above() {
            if self.grid.level(l as usize).limit_any(not_aon) {
                return self.grid.itop(l as usize);
            }
            l += 1;
        }
        0.0
    }

    pub(crate) fn q_last_price(&self) -> f64 {
        self.last.map(|idx| self.grid.itop(idx)).unwrap_or(0.0)
    }

    /// Non-AON size at the inside bid.
    pub(crate) fn q_bid_size(&self) -> Size {
        let mut h = self.bid;
        while h >= 0 {
            let tot = self.grid.level(h as usize).limit_size_if(not_aon);
            if tot > 0 {
                return tot;
            }
            h -= 1;
        }
        0
    }

    /// Non-AON size at the inside ask.
    pub(crate) fn q_ask_size(&self) -> Size {
        let mut l = self.ask;
        while l < self.above() {
            let tot = self.grid.level(l as usize).limit_size_if(not_aon);
            if tot > 0 {
                return tot;
            }
            l += 1;
        }
        0
    }

    /// Total resting non-AON size on one side.
    pub(crate) fn q_total_limit_size(&self, side: Side) -> Size {
        let (lo, hi) = match side {
            Side::Buy => (self.low_buy_limit, self.bid),
            Side::Sell => (self.ask, self.high_sell_limit),
        };
        let mut tot = 0;
        let mut p = lo;
        while p <= hi && p != BELOW && p < self.above() {
            if p >= 0 {
                tot += self.grid.level(p as usize).limit_size_if(not_aon);
            }
            p += 1;
        }
        tot
    }

    /// Total resting AON size on one side: the side's AON chains plus AON
    /// entries riding limit chains.
    pub(crate) fn q_total_aon_size(&self, side: Side) -> Size {
        let mut tot = 0;

        let (lo, hi) = match side {
            Side::Buy => (self.low_buy_aon, self.high_buy_aon),
            Side::Sell => (self.low_sell_aon, self.high_sell_aon),
        };
        let mut p = lo;
        while p <= hi && p != BELOW && p < self.above() {
            if p >= 0 {
                tot += self.grid.level(p as usize).aon_size(side);
            }
            p += 1;
        }

        let (lo, hi) = match side {
            Side::Buy => (self.low_buy_limit, self.bid),
            Side::Sell => (self.ask, self.high_sell_limit),
        };
        let mut p = lo;
        while p <= hi && p != BELOW && p < self.above() {
            if p >= 0 {
                tot += self.grid.level(p as usize).limit_size_if(is_aon);
            }
            p += 1;
        }
        tot
    }

    /// Non-AON depth within `depth` ticks of the inside, best level first.
    pub(crate) fn q_depth(&self, side: Side, depth: usize) -> Vec<DepthEntry> {
        let mut out = Vec::new();
        match side {
            Side::Buy => {
                if self.bid == BELOW {
                    return out;
                }
                let stop = (self.bid - depth as isize + 1).max(0);
                let mut p = self.bid;
                while p >= stop {
                    let sz = self.grid.level(p as usize).limit_size_if(not_aon);
                    if sz > 0 {
                        out.push(DepthEntry {
                            price: self.grid.itop(p as usize),
                            size: sz,
                        });
                    }
                    p -= 1;
                }
            }
            Side::Sell => {
                if self.ask == self.above() {
                    return out;
                }
                let stop = (self.ask + depth as isize - 1).min(self.above() - 1);
                let mut p = self.ask;
                while p <= stop {
                    let sz = self.grid.level(p as usize).limit_size_if(not_aon);
                    if sz > 0 {
                        out.push(DepthEntry {
                            price: self.grid.itop(p as usize),
                            size: sz,
                        });
                    }
                    p += 1;
                }
            }
        }
        out
    }

    /// Both sides of the non-AON depth, ascending by price.
    pub(crate) fn q_market_depth(&self, depth: usize) -> Vec<MarketDepthEntry> {
        let mut out: Vec<MarketDepthEntry> = self
            .q_depth(Side::Buy, depth)
            .into_iter()
            .map(|e| MarketDepthEntry {
                price: e.price,
                size: e.size,
                side: Side::Buy,
            })
            .collect();
        out.reverse();
        out.extend(self.q_depth(Side::Sell, depth).into_iter().map(|e| {
            MarketDepthEntry {
                price: e.price,
                size: e.size,
                side: Side::Sell,
            }
        }));
        out
    }

    /// All resting AON liquidity by price, ascending. Includes AON entries
    /// riding limit chains, attributed by which side the level belongs to.
    pub(crate) fn q_aon_market_depth(&self) -> Vec<AonDepthEntry> {
        let mut lo = self
            .low_buy_aon
            .min(self.low_sell_aon)
            .min(self.low_buy_limit)
            .min(self.ask);
        let hi = self
            .high_buy_aon
            .max(self.high_sell_aon)
            .max(self.high_sell_limit)
            .max(self.bid);
        if lo == self.above() || hi == BELOW {
            return Vec::new();
        }
        lo = lo.max(0);

        let mut out = Vec::new();
        let mut p = lo;
        while p <= hi && p < self.above() {
            let level = self.grid.level(p as usize);
            let mut buy_sz = level.aon_size(Side::Buy);
            let mut sell_sz = level.aon_size(Side::Sell);

            if self.limit_tradable(Side::Buy, p as usize) {
                buy_sz += level.limit_size_if(is_aon);
            } else if self.limit_tradable(Side::Sell, p as usize) {
                sell_sz += level.limit_size_if(is_aon);
            }

            if buy_sz > 0 || sell_sz > 0 {
                out.push(AonDepthEntry {
                    price: self.grid.itop(p as usize),
                    buy_size: buy_sz,
                    sell_size: sell_sz,
                });
            }
            p += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::test_support::core;
    use crate::bundle::{Advanced, AonBundle, LimitBundle};
    use crate::order::ConditionTrigger;
    use crate::types::OrderId;

    #[test]
    fn inside_queries_skip_aon_only_levels() {
        let mut c = core(1.0, 10.0);
        let i5 = c.grid.ptoi(5.0).unwrap();
        let i49 = c.grid.ptoi(4.90).unwrap();

        // real bid at 4.90, an AON-only entry above it at 5.00
        c.push_limit(i49, Side::Buy, LimitBundle::plain(OrderId(1), 30, None));
        let mut aon = LimitBundle::plain(OrderId(2), 100, None);
        aon.advanced = Advanced::Aon;
        c.push_limit(i5, Side::Buy, aon);

        assert_eq!(c.q_bid_price(), 4.90);
        assert_eq!(c.q_bid_size(), 30);
    }

    #[test]
    fn totals_split_aon_from_regular() {
        let mut c = core(1.0, 10.0);
        let i5 = c.grid.ptoi(5.0).unwrap();
        let i6 = c.grid.ptoi(6.0).unwrap();

        c.push_limit(i6, Side::Sell, LimitBundle::plain(OrderId(1), 40, None));
        c.push_aon(
            i5,
            Side::Sell,
            AonBundle {
                id: OrderId(2),
                sz: 100,
                cb: None,
                trigger: ConditionTrigger::FillFull,
                advanced: Advanced::Aon,
            },
        );

        assert_eq!(c.q_total_limit_size(Side::Sell), 40);
        assert_eq!(c.q_total_aon_size(Side::Sell), 100);
        assert_eq!(c.q_total_limit_size(Side::Buy), 0);
        assert_eq!(c.q_total_aon_size(Side::Buy), 0);
    }

    #[test]
    fn depth_is_best_first_and_windowed() {
        let mut c = core(1.0, 10.0);
        for (i, price) in [5.00, 4.99, 4.90].iter().enumerate() {
            let idx = c.grid.ptoi(*price).unwrap();
            c.push_limit(
                idx,
                Side::Buy,
                LimitBundle::plain(OrderId(i as u64 + 1), 10 * (i as u64 + 1), None),
            );
        }

        let d = c.q_depth(Side::Buy, 2);
        assert_eq!(
            d,
            vec![
                DepthEntry {
                    price: 5.00,
                    size: 10
                },
                DepthEntry {
                    price: 4.99,
                    size: 20
                },
            ]
        );

        let d = c.q_depth(Side::Buy, 11);
        assert_eq!(d.len(), 3);
        assert_eq!(d[2].price, 4.90);
    }

    #[test]
    fn market_depth_is_price_ascending() {
        let mut c = core(1.0, 10.0);
        let b = c.grid.ptoi(4.99).unwrap();
        let a = c.grid.ptoi(5.01).unwrap();
        c.push_limit(b, Side::Buy, LimitBundle::plain(OrderId(1), 10, None));
        c.push_limit(a, Side::Sell, LimitBundle::plain(OrderId(2), 20, None));

        let d = c.q_market_depth(8);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].price, 4.99);
        assert_eq!(d[0].side, Side::Buy);
        assert_eq!(d[1].price, 5.01);
        assert_eq!(d[1].side, Side::Sell);
    }

    #[test]
    fn aon_depth_covers_both_chains() {
        let mut c = core(1.0, 10.0);
        let i5 = c.grid.ptoi(5.0).unwrap();

        c.push_aon(
            i5,
            Side::Sell,
            AonBundle {
                id: OrderId(1),
                sz: 100,
                cb: None,
                trigger: ConditionTrigger::FillFull,
                advanced: Advanced::Aon,
            },
        );
        // an AON riding the bid limit chain at the same price
        c.push_limit(i5, Side::Buy, LimitBundle::plain(OrderId(2), 10, None));
        let mut aon = LimitBundle::plain(OrderId(3), 60, None);
        aon.advanced = Advanced::Aon;
        c.push_limit(i5, Side::Buy, aon);

        let d = c.q_aon_market_depth();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].price, 5.0);
        assert_eq!(d[0].buy_size, 60);
        assert_eq!(d[0].sell_size, 100);
    }
}
