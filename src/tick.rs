//! Fixed-grid price arithmetic.
//!
//! Prices on the grid are `(whole, ticks)` pairs against a tick ratio
//! `num/den` with `den % num == 0`; the pair is always normalized so
//! `0 <= ticks < ticks_per_unit`. Real-number conversion rounds at a fixed
//! decimal precision so that real -> tick -> real is stable on grid points.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Rounding applied when constructing a tick price from a real number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoundMode {
    /// Round to the nearest tick (ties away from zero).
    #[default]
    Nearest,
    /// Round toward the lower tick.
    Floor,
    /// Round toward the higher tick.
    Ceil,
}

impl RoundMode {
    #[inline]
    fn apply(self, v: f64) -> f64 {
        match self {
            RoundMode::Nearest => v.round(),
            RoundMode::Floor => v.floor(),
            RoundMode::Ceil => v.ceil(),
        }
    }
}

/// A tick ratio `num/den`, the price increment of the grid.
///
/// Accepted ratios lie between 1/1 and 1/1_000_000 inclusive, and `den`
/// must be a multiple of `num` so ticks divide evenly into one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickRatio {
    num: u32,
    den: u32,
}

impl TickRatio {
    /// 1/4 ticks.
    pub const QUARTER: TickRatio = TickRatio { num: 1, den: 4 };
    /// 1/10 ticks.
    pub const TENTH: TickRatio = TickRatio { num: 1, den: 10 };
    /// 1/32 ticks.
    pub const THIRTY_SECONDTH: TickRatio = TickRatio { num: 1, den: 32 };
    /// 1/100 ticks.
    pub const HUNDREDTH: TickRatio = TickRatio { num: 1, den: 100 };
    /// 1/1000 ticks.
    pub const THOUSANDTH: TickRatio = TickRatio { num: 1, den: 1000 };
    /// 1/10000 ticks.
    pub const TEN_THOUSANDTH: TickRatio = TickRatio { num: 1, den: 10000 };

    /// Build a ratio `num/den`.
    ///
    /// # Panics
    ///
    /// Panics if the ratio is outside [1/1_000_000, 1/1] or `den` is not a
    /// multiple of `num`. A bad ratio is a configuration error, not data.
    pub fn new(num: u32, den: u32) -> Self {
        assert!(num > 0 && den > 0, "tick ratio terms must be nonzero");
        assert!(num <= den, "tick ratio must not exceed 1/1");
        assert!(
            den / num <= 1_000_000,
            "tick ratio must not be below 1/1000000"
        );
        assert!(den % num == 0, "tick ratio den must be a multiple of num");
        TickRatio { num, den }
    }

    /// Number of ticks in one whole unit.
    #[inline]
    pub fn ticks_per_unit(self) -> u32 {
        self.den / self.num
    }

    /// The price increment as a real number.
    #[inline]
    pub fn tick_size(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Decimal precision used for real-number conversion.
    ///
    /// At least 5, at least enough digits for the tick size, at most 9.
    pub fn round_precision(self) -> u32 {
        let digits = f64::from(self.ticks_per_unit()).log10().round() as u32;
        digits.max(5).min(9)
    }

    #[inline]
    fn radj(self) -> f64 {
        10f64.powi(self.round_precision() as i32)
    }

    /// Price from whole units plus a (possibly unnormalized) tick count.
    pub fn price(self, whole: i64, ticks: i64) -> TickPrice {
        let per = i64::from(self.ticks_per_unit());
        TickPrice {
            whole: whole + ticks.div_euclid(per),
            ticks: ticks.rem_euclid(per) as u32,
            per_unit: self.ticks_per_unit(),
        }
    }

    /// Price from a total tick count measured from zero.
    #[inline]
    pub fn from_ticks(self, ticks: i64) -> TickPrice {
        self.price(0, ticks)
    }

    /// Price from a real number, rounding fractional ticks with `mode`.
    pub fn from_f64(self, r: f64, mode: RoundMode) -> TickPrice {
        let per = self.ticks_per_unit();
        let whole = r.floor() as i64;
        let ticks = mode.apply((r - whole as f64) * f64::from(per)) as i64;
        self.price(whole, ticks)
    }
}

/// A price on the tick grid: whole units plus ticks within the unit.
///
/// Self-contained and `Copy`; comparisons and arithmetic require both
/// operands to come from the same ratio.
#[derive(Clone, Copy, Debug)]
pub struct TickPrice {
    whole: i64,
    ticks: u32,
    per_unit: u32,
}

impl TickPrice {
    /// Whole-unit part.
    #[inline]
    pub fn whole(self) -> i64 {
        self.whole
    }

    /// Ticks within the whole unit, in `[0, ticks_per_unit)`.
    #[inline]
    pub fn ticks(self) -> u32 {
        self.ticks
    }

    /// Total ticks from zero.
    #[inline]
    pub fn as_ticks(self) -> i64 {
        self.whole * i64::from(self.per_unit) + i64::from(self.ticks)
    }

    /// This price shifted by a signed tick count.
    pub fn add_ticks(self, n: i64) -> TickPrice {
        let per = i64::from(self.per_unit);
        let t = i64::from(self.ticks) + n;
        TickPrice {
            whole: self.whole + t.div_euclid(per),
            ticks: t.rem_euclid(per) as u32,
            per_unit: self.per_unit,
        }
    }

    /// Signed tick distance from `a` to `b`.
    pub fn ticks_between(a: TickPrice, b: TickPrice) -> i64 {
        debug_assert_eq!(a.per_unit, b.per_unit, "prices from different grids");
        b.as_ticks() - a.as_ticks()
    }

    /// Real-number value, rounded at the grid's conversion precision.
    pub fn as_f64(self, ratio: TickRatio) -> f64 {
        debug_assert_eq!(self.per_unit, ratio.ticks_per_unit());
        let raw = self.whole as f64 + f64::from(self.ticks) * ratio.tick_size();
        let radj = ratio.radj();
        (raw * radj).round() / radj
    }
}

impl PartialEq for TickPrice {
    fn eq(&self, other: &Self) -> bool {
        debug_assert_eq!(self.per_unit, other.per_unit, "prices from different grids");
        self.whole == other.whole && self.ticks == other.ticks
    }
}

impl Eq for TickPrice {}

impl PartialOrd for TickPrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TickPrice {
    fn cmp(&self, other: &Self) -> Ordering {
        debug_assert_eq!(self.per_unit, other.per_unit, "prices from different grids");
        self.whole
            .cmp(&other.whole)
            .then(self.ticks.cmp(&other.ticks))
    }
}

impl Add for TickPrice {
    type Output = TickPrice;

    fn add(self, rhs: TickPrice) -> TickPrice {
        debug_assert_eq!(self.per_unit, rhs.per_unit, "prices from different grids");
        self.add_ticks(rhs.as_ticks())
    }
}

impl Sub for TickPrice {
    type Output = TickPrice;

    fn sub(self, rhs: TickPrice) -> TickPrice {
        debug_assert_eq!(self.per_unit, rhs.per_unit, "prices from different grids");
        self.add_ticks(-rhs.as_ticks())
    }
}

impl fmt::Display for TickPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}/{}", self.whole, self.ticks, self.per_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: TickRatio = TickRatio::HUNDREDTH;

    #[test]
    fn normalization() {
        let p = R.price(1, 250);
        assert_eq!(p.whole(), 3);
        assert_eq!(p.ticks(), 50);

        let p = R.price(1, -30);
        assert_eq!(p.whole(), 0);
        assert_eq!(p.ticks(), 70);

        let p = R.price(0, -1);
        assert_eq!(p.whole(), -1);
        assert_eq!(p.ticks(), 99);
    }

    #[test]
    fn from_f64_rounding() {
        assert_eq!(R.from_f64(1.006, RoundMode::Nearest).as_ticks(), 101);
        assert_eq!(R.from_f64(1.004, RoundMode::Nearest).as_ticks(), 100);
        assert_eq!(R.from_f64(1.009, RoundMode::Floor).as_ticks(), 100);
        assert_eq!(R.from_f64(1.001, RoundMode::Ceil).as_ticks(), 101);
    }

    #[test]
    fn from_f64_overflow_to_next_whole() {
        let p = R.from_f64(1.9999, RoundMode::Nearest);
        assert_eq!(p.whole(), 2);
        assert_eq!(p.ticks(), 0);
    }

    #[test]
    fn round_trip_on_grid_points() {
        for t in 0..=10_000i64 {
            let p = R.from_ticks(t);
            let r = p.as_f64(R);
            assert_eq!(R.from_f64(r, RoundMode::Nearest).as_ticks(), t, "at {r}");
        }
    }

    #[test]
    fn negative_round_trip() {
        let p = R.from_f64(-2.37, RoundMode::Nearest);
        assert_eq!(p.as_f64(R), -2.37);
        assert_eq!(p.whole(), -3);
        assert_eq!(p.ticks(), 63);
    }

    #[test]
    fn ordering() {
        assert!(R.from_f64(1.01, RoundMode::Nearest) < R.from_f64(1.02, RoundMode::Nearest));
        assert!(R.from_f64(2.00, RoundMode::Nearest) > R.from_f64(1.99, RoundMode::Nearest));
        assert_eq!(
            R.from_f64(1.50, RoundMode::Nearest),
            R.price(1, 50)
        );
    }

    #[test]
    fn arithmetic() {
        let a = R.from_f64(1.50, RoundMode::Nearest);
        let b = R.from_f64(0.75, RoundMode::Nearest);
        assert_eq!((a + b).as_f64(R), 2.25);
        assert_eq!((a - b).as_f64(R), 0.75);
        assert_eq!(a.add_ticks(51).as_f64(R), 2.01);
        assert_eq!(a.add_ticks(-151).as_f64(R), -0.01);
    }

    #[test]
    fn ticks_between() {
        let a = R.from_f64(1.00, RoundMode::Nearest);
        let b = R.from_f64(2.50, RoundMode::Nearest);
        assert_eq!(TickPrice::ticks_between(a, b), 150);
        assert_eq!(TickPrice::ticks_between(b, a), -150);
    }

    #[test]
    fn ratio_properties() {
        assert_eq!(TickRatio::QUARTER.ticks_per_unit(), 4);
        assert_eq!(TickRatio::QUARTER.tick_size(), 0.25);
        assert_eq!(R.round_precision(), 5);
        assert_eq!(TickRatio::new(1, 1_000_000).round_precision(), 6);
        assert_eq!(TickRatio::new(2, 10).ticks_per_unit(), 5);
    }

    #[test]
    #[should_panic(expected = "multiple")]
    fn uneven_ratio_rejected() {
        TickRatio::new(3, 10);
    }

    #[test]
    #[should_panic(expected = "exceed")]
    fn ratio_above_one_rejected() {
        TickRatio::new(2, 1);
    }
}
