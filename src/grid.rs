//! The price grid: a contiguous, index-addressable array of levels
//! spanning [min, max], one per tick.
//!
//! Levels are identified internally by index; all cached state elsewhere in
//! the book stores indices, so growing below is a plain offset rewrite and
//! growing above touches nothing.

use std::mem;

use crate::error::BookError;
use crate::level::Level;
use crate::tick::{RoundMode, TickPrice, TickRatio};

/// Default cap on level-array memory.
pub(crate) const DEFAULT_MEM_CAP: usize = 128 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct PriceGrid {
    ratio: TickRatio,
    /// Price of level index 0.
    base: TickPrice,
    levels: Vec<Level>,
    mem_cap: usize,
}

/// Bytes of level storage needed for `count` ticks.
pub(crate) fn memory_required(count: usize) -> usize {
    count.saturating_mul(mem::size_of::<Level>())
}

impl PriceGrid {
    pub fn new(
        ratio: TickRatio,
        min: TickPrice,
        count: usize,
        mem_cap: usize,
    ) -> Result<Self, BookError> {
        let required = memory_required(count);
        if required > mem_cap {
            return Err(BookError::ResourceExhausted {
                required,
                cap: mem_cap,
            });
        }
        let mut levels = Vec::new();
        levels.resize_with(count, Level::default);
        Ok(PriceGrid {
            ratio,
            base: min,
            levels,
            mem_cap,
        })
    }

    #[inline]
    pub fn ratio(&self) -> TickRatio {
        self.ratio
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn level(&self, idx: usize) -> &Level {
        &self.levels[idx]
    }

    #[inline]
    pub fn level_mut(&mut self, idx: usize) -> &mut Level {
        &mut self.levels[idx]
    }

    /// Index of a grid price; `None` outside [min, max].
    ///
    /// Off-grid real prices round to the nearest tick first, as everywhere
    /// on the public surface.
    pub fn index_of(&self, price: f64) -> Option<usize> {
        let p = self.ratio.from_f64(price, RoundMode::Nearest);
        let off = TickPrice::ticks_between(self.base, p);
        if off >= 0 && (off as usize) < self.levels.len() {
            Some(off as usize)
        } else {
            None
        }
    }

    /// Index of a grid price, or `InvalidPrice`.
    pub fn ptoi(&self, price: f64) -> Result<usize, BookError> {
        self.index_of(price)
            .ok_or(BookError::InvalidPrice { price })
    }

    /// Tick price of a level index.
    #[inline]
    pub fn tick_at(&self, idx: usize) -> TickPrice {
        debug_assert!(idx < self.levels.len());
        self.base.add_ticks(idx as i64)
    }

    /// Real price of a level index.
    #[inline]
    pub fn itop(&self, idx: usize) -> f64 {
        self.tick_at(idx).as_f64(self.ratio)
    }

    pub fn min_price(&self) -> f64 {
        self.base.as_f64(self.ratio)
    }

    pub fn max_price(&self) -> f64 {
        self.itop(self.levels.len() - 1)
    }

    /// Append levels so the grid reaches `new_max`. Existing indices are
    /// unchanged. Returns the number of levels added.
    pub fn grow_above(&mut self, new_max: TickPrice) -> Result<usize, BookError> {
        let cur_max = self.base.add_ticks(self.levels.len() as i64 - 1);
        let added = TickPrice::ticks_between(cur_max, new_max);
        if added <= 0 {
            return Ok(0);
        }
        let added = added as usize;
        let required = memory_required(self.levels.len() + added);
        if required > self.mem_cap {
            return Err(BookError::ResourceExhausted {
                required,
                cap: self.mem_cap,
            });
        }
        self.levels.resize_with(self.levels.len() + added, Level::default);
        Ok(added)
    }

    /// Prepend levels so the grid reaches down to `new_min`. Every existing
    /// index shifts up by the returned offset.
    pub fn grow_below(&mut self, new_min: TickPrice) -> Result<usize, BookError> {
        let offset = TickPrice::ticks_between(new_min, self.base);
        if offset <= 0 {
            return Ok(0);
        }
        let offset = offset as usize;
        let required = memory_required(self.levels.len() + offset);
        if required > self.mem_cap {
            return Err(BookError::ResourceExhausted {
                required,
                cap: self.mem_cap,
            });
        }
        let mut levels = Vec::with_capacity(self.levels.len() + offset);
        levels.resize_with(offset, Level::default);
        levels.append(&mut self.levels);
        self.levels = levels;
        self.base = new_min;
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::LimitBundle;
    use crate::types::OrderId;

    fn grid(min: f64, max: f64) -> PriceGrid {
        let r = TickRatio::HUNDREDTH;
        let lo = r.from_f64(min, RoundMode::Nearest);
        let hi = r.from_f64(max, RoundMode::Nearest);
        let count = TickPrice::ticks_between(lo, hi) as usize + 1;
        PriceGrid::new(r, lo, count, DEFAULT_MEM_CAP).unwrap()
    }

    #[test]
    fn index_round_trip() {
        let g = grid(0.01, 10.0);
        assert_eq!(g.len(), 1000);
        assert_eq!(g.ptoi(0.01).unwrap(), 0);
        assert_eq!(g.ptoi(10.0).unwrap(), 999);
        assert_eq!(g.itop(0), 0.01);
        assert_eq!(g.itop(999), 10.0);
        for i in (0..1000).step_by(37) {
            assert_eq!(g.ptoi(g.itop(i)).unwrap(), i);
        }
    }

    #[test]
    fn out_of_range_rejected() {
        let g = grid(1.0, 2.0);
        assert!(g.ptoi(0.99).is_err());
        assert!(g.ptoi(2.01).is_err());
        assert!(g.ptoi(1.50).is_ok());
    }

    #[test]
    fn off_grid_price_rounds() {
        let g = grid(1.0, 2.0);
        assert_eq!(g.ptoi(1.504).unwrap(), g.ptoi(1.50).unwrap());
        assert_eq!(g.ptoi(1.506).unwrap(), g.ptoi(1.51).unwrap());
    }

    #[test]
    fn grow_above_extends() {
        let mut g = grid(1.0, 2.0);
        let old_len = g.len();
        let r = g.ratio();
        let added = g
            .grow_above(r.from_f64(3.0, RoundMode::Nearest))
            .unwrap();
        assert_eq!(added, 100);
        assert_eq!(g.len(), old_len + 100);
        assert_eq!(g.max_price(), 3.0);
        assert_eq!(g.min_price(), 1.0);
    }

    #[test]
    fn grow_below_shifts_indices() {
        let mut g = grid(1.0, 2.0);
        let idx = g.ptoi(1.50).unwrap();
        g.level_mut(idx)
            .limit_push(LimitBundle::plain(OrderId(1), 10, None));

        let r = g.ratio();
        let offset = g
            .grow_below(r.from_f64(0.50, RoundMode::Nearest))
            .unwrap();
        assert_eq!(offset, 50);
        assert_eq!(g.min_price(), 0.50);

        // the resting order followed its level
        let new_idx = g.ptoi(1.50).unwrap();
        assert_eq!(new_idx, idx + offset);
        assert!(!g.level(new_idx).limit_is_empty());
    }

    #[test]
    fn grow_noop_when_not_larger() {
        let mut g = grid(1.0, 2.0);
        let r = g.ratio();
        assert_eq!(g.grow_above(r.from_f64(1.5, RoundMode::Nearest)).unwrap(), 0);
        assert_eq!(g.grow_below(r.from_f64(1.5, RoundMode::Nearest)).unwrap(), 0);
        assert_eq!(g.len(), 101);
    }

    #[test]
    fn memory_cap_enforced() {
        let r = TickRatio::HUNDREDTH;
        let lo = r.from_f64(1.0, RoundMode::Nearest);
        let err = PriceGrid::new(r, lo, 10_000, 1024).unwrap_err();
        assert!(matches!(err, BookError::ResourceExhausted { .. }));
    }
}
