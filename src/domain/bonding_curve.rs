//! Linear bonding-curve pricer.
//!
//! [`BondingCurve`] maps circulating supply to a spot price by linear
//! interpolation between a floor and a ceiling price. It holds no state
//! beyond its parameters and is safe to share across tasks by value.

use serde::{Deserialize, Serialize};

/// Default floor price (lamports per whole token) at zero supply.
pub const DEFAULT_PMIN: f64 = 40_000.0;

/// Default ceiling price reached at [`DEFAULT_SMAX`].
pub const DEFAULT_PMAX: f64 = 100_000_000.0;

/// Default supply cap at which the curve reaches its ceiling.
pub const DEFAULT_SMAX: f64 = 10_000_000_000_000_000.0;

/// Default lamports-per-SOL normalisation for market capitalisation.
pub const DEFAULT_SCALE_FACTOR: f64 = 1_000_000_000.0;

/// Parameters of the linear bonding curve.
///
/// `price(s) = pmin + (pmax - pmin) * (s / smax)`.
///
/// Supply outside `[0, smax]` is not clamped: the curve extrapolates
/// linearly and callers decide what an out-of-range supply means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondingCurve {
    /// Price at zero supply.
    pub pmin: f64,
    /// Price at `smax` supply.
    pub pmax: f64,
    /// Supply at which the curve reaches `pmax`.
    pub smax: f64,
    /// Divisor converting `price * supply` into whole collateral units.
    pub scale_factor: f64,
}

impl BondingCurve {
    /// Creates a curve with explicit parameters.
    #[must_use]
    pub const fn new(pmin: f64, pmax: f64, smax: f64, scale_factor: f64) -> Self {
        Self {
            pmin,
            pmax,
            smax,
            scale_factor,
        }
    }

    /// Spot price at the given circulating supply.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn price(&self, supply: i128) -> f64 {
        if self.smax == 0.0 {
            return self.pmin;
        }
        self.pmin + (self.pmax - self.pmin) * (supply as f64 / self.smax)
    }

    /// Market capitalisation in whole collateral units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn market_cap(&self, price: f64, supply: i128) -> f64 {
        if self.scale_factor == 0.0 {
            return 0.0;
        }
        price * supply as f64 / self.scale_factor
    }

    /// Returns `true` when `supply` lies inside `[0, smax]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn in_range(&self, supply: i128) -> bool {
        supply >= 0 && supply as f64 <= self.smax
    }
}

impl Default for BondingCurve {
    fn default() -> Self {
        Self::new(DEFAULT_PMIN, DEFAULT_PMAX, DEFAULT_SMAX, DEFAULT_SCALE_FACTOR)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn price_at_zero_is_floor() {
        let curve = BondingCurve::default();
        assert_eq!(curve.price(0), DEFAULT_PMIN);
    }

    #[test]
    fn price_at_cap_is_ceiling() {
        let curve = BondingCurve::default();
        assert_eq!(curve.price(10_000_000_000_000_000), DEFAULT_PMAX);
    }

    #[test]
    fn small_buy_moves_price_by_fraction() {
        let curve = BondingCurve::default();
        let price = curve.price(500_000);
        let expected = 40_000.0 + (100_000_000.0 - 40_000.0) * (500_000.0 / 1e16);
        assert!((price - expected).abs() < 1e-9);
        assert!(price > DEFAULT_PMIN);
        assert!((price - 40_000.004_998).abs() < 1e-6);
    }

    #[test]
    fn negative_supply_extrapolates_below_floor() {
        let curve = BondingCurve::default();
        assert!(curve.price(-1_000_000_000_000) < DEFAULT_PMIN);
        assert!(!curve.in_range(-1));
    }

    #[test]
    fn market_cap_scales_to_whole_units() {
        let curve = BondingCurve::new(10.0, 10.0, 1.0e6, 1_000.0);
        assert_eq!(curve.market_cap(curve.price(500), 500), 5.0);
        assert_eq!(curve.market_cap(curve.price(0), 0), 0.0);
    }

    #[test]
    fn degenerate_parameters_do_not_divide_by_zero() {
        let curve = BondingCurve::new(1.0, 2.0, 0.0, 0.0);
        assert_eq!(curve.price(100), 1.0);
        assert_eq!(curve.market_cap(1.0, 100), 0.0);
    }

    proptest! {
        #[test]
        fn price_is_monotonic_within_range(a in 0i128..=10_000_000_000_000_000, b in 0i128..=10_000_000_000_000_000) {
            let curve = BondingCurve::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(curve.price(lo) <= curve.price(hi));
        }

        #[test]
        fn price_stays_between_floor_and_ceiling(s in 0i128..=10_000_000_000_000_000) {
            let curve = BondingCurve::default();
            let p = curve.price(s);
            prop_assert!(p >= DEFAULT_PMIN && p <= DEFAULT_PMAX);
        }
    }
}
