//! Property-based tests for book invariants.
//!
//! Random operation sequences must preserve: volume accounting against
//! time & sales, an uncrossed book, cache/bundle consistency as observed
//! through `get_order_info`, all-or-none atomicity, replace semantics, and
//! OCO pairing.

use gridbook::{AdvancedOrderTicket, OrderBook, OrderId, Side, TickRatio};
use proptest::prelude::*;

fn book() -> OrderBook {
    OrderBook::new(0.0, 200.0, TickRatio::HUNDREDTH).unwrap()
}

/// A grid price between 1.00 and 199.00 in whole ticks.
fn price_strategy() -> impl Strategy<Value = f64> {
    (100i64..=19_900i64).prop_map(|t| t as f64 / 100.0)
}

fn size_strategy() -> impl Strategy<Value = u64> {
    1u64..=500u64
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // ========================================================================
    // VOLUME AND TIME & SALES
    // ========================================================================

    /// volume always equals the sum of time & sales sizes, and every entry
    /// records a positive maker price.
    #[test]
    fn volume_matches_time_and_sales(
        orders in prop::collection::vec(
            (side_strategy(), price_strategy(), size_strategy()),
            1..60
        )
    ) {
        let book = book();
        for (side, price, size) in orders {
            book.insert_limit_order(side, price, size, None, None).unwrap();

            let ts = book.time_and_sales();
            let ts_total: u64 = ts.iter().map(|e| e.size).sum();
            prop_assert_eq!(book.volume(), ts_total);
            for e in &ts {
                prop_assert!(e.price > 0.0);
                prop_assert!(e.size > 0);
            }
        }
    }

    // ========================================================================
    // UNCROSSED BOOK
    // ========================================================================

    /// After any sequence of limit orders, bid < ask whenever both exist.
    #[test]
    fn book_never_crossed(
        orders in prop::collection::vec(
            (side_strategy(), price_strategy(), size_strategy()),
            1..80
        )
    ) {
        let book = book();
        for (side, price, size) in orders {
            book.insert_limit_order(side, price, size, None, None).unwrap();

            let bid = book.bid_price();
            let ask = book.ask_price();
            if bid > 0.0 && ask > 0.0 {
                prop_assert!(bid < ask, "crossed book: bid {} >= ask {}", bid, ask);
            }
        }
    }

    // ========================================================================
    // FILL CONSERVATION
    // ========================================================================

    /// Buy-side fills equal sell-side fills: total resting plus volume on
    /// each side accounts for everything submitted to that side.
    #[test]
    fn fills_conserved_per_side(
        orders in prop::collection::vec(
            (side_strategy(), price_strategy(), size_strategy()),
            1..60
        )
    ) {
        let book = book();
        let mut submitted_buy = 0u64;
        let mut submitted_sell = 0u64;
        for (side, price, size) in orders {
            match side {
                Side::Buy => submitted_buy += size,
                Side::Sell => submitted_sell += size,
            }
            book.insert_limit_order(side, price, size, None, None).unwrap();
        }

        // each unit of volume consumed one buy unit and one sell unit
        prop_assert_eq!(book.total_bid_size() + book.volume(), submitted_buy);
        prop_assert_eq!(book.total_ask_size() + book.volume(), submitted_sell);
    }

    // ========================================================================
    // CANCEL / REPLACE
    // ========================================================================

    /// Pulling a resting order removes it exactly once.
    #[test]
    fn pull_is_idempotent(
        side in side_strategy(),
        price in price_strategy(),
        size in size_strategy(),
    ) {
        let book = book();
        let id = book.insert_limit_order(side, price, size, None, None).unwrap();

        prop_assert!(book.pull_order(id).unwrap());
        prop_assert!(book.get_order_info(id).is_none());
        prop_assert!(!book.pull_order(id).unwrap());
        prop_assert_eq!(book.total_size(), 0);
    }

    /// Replace either returns NONE and leaves state unchanged, or returns a
    /// fresh id with the original fully removed.
    #[test]
    fn replace_semantics(
        side in side_strategy(),
        price in price_strategy(),
        new_price in price_strategy(),
        size in size_strategy(),
        new_size in size_strategy(),
    ) {
        let book = book();
        let id = book.insert_limit_order(side, price, size, None, None).unwrap();

        let new_id = book
            .replace_with_limit_order(id, side, new_price, new_size, None, None)
            .unwrap();
        prop_assert!(!new_id.is_none());
        prop_assert!(book.get_order_info(id).is_none());
        let info = book.get_order_info(new_id).unwrap();
        prop_assert_eq!(info.size, new_size);

        // replacing a dead id is a no-op
        let dead = book
            .replace_with_limit_order(id, side, new_price, new_size, None, None)
            .unwrap();
        prop_assert_eq!(dead, OrderId::NONE);
        prop_assert!(book.get_order_info(new_id).is_some());
    }

    // ========================================================================
    // ALL-OR-NONE ATOMICITY
    // ========================================================================

    /// A resting AON is always fully present or fully gone; its size as
    /// observed through the public surface never shrinks.
    #[test]
    fn aon_full_or_absent(
        aon_size in 50u64..=300u64,
        takers in prop::collection::vec(1u64..=100u64, 1..12)
    ) {
        let book = book();
        book.insert_limit_order(
            Side::Sell,
            100.0,
            aon_size,
            None,
            Some(AdvancedOrderTicket::aon()),
        )
        .unwrap();
        let aon_id = book.last_id();

        for t in takers {
            book.insert_limit_order(Side::Buy, 100.0, t, None, None).unwrap();
            match book.get_order_info(aon_id) {
                Some(info) => prop_assert_eq!(info.size, aon_size),
                None => {
                    // filled whole, in one event
                    prop_assert!(book.volume() >= aon_size);
                }
            }
        }
    }

    // ========================================================================
    // OCO PAIRING
    // ========================================================================

    /// Cancelling either member of an OCO pair removes both.
    #[test]
    fn oco_pull_either_pulls_both(
        pull_primary in any::<bool>(),
        buy_price in (100i64..=9_000i64).prop_map(|t| t as f64 / 100.0),
        sell_off in (100i64..=5_000i64),
        size in size_strategy(),
    ) {
        let book = book();
        let sell_price = buy_price + sell_off as f64 / 100.0;
        let ticket = AdvancedOrderTicket::oco_limit(Side::Sell, sell_price, size).unwrap();
        let primary = book
            .insert_limit_order(Side::Buy, buy_price, size, None, Some(ticket))
            .unwrap();
        let sibling = book.last_id();
        prop_assert_ne!(primary, sibling);

        let target = if pull_primary { primary } else { sibling };
        prop_assert!(book.pull_order(target).unwrap());
        prop_assert!(book.get_order_info(primary).is_none());
        prop_assert!(book.get_order_info(sibling).is_none());
        prop_assert_eq!(book.total_size(), 0);
    }

    // ========================================================================
    // DETERMINISM
    // ========================================================================

    /// The same operation sequence produces the same observable state.
    #[test]
    fn deterministic_replay(
        orders in prop::collection::vec(
            (side_strategy(), price_strategy(), size_strategy()),
            1..40
        )
    ) {
        let run = |orders: &[(Side, f64, u64)]| {
            let book = book();
            for &(side, price, size) in orders {
                book.insert_limit_order(side, price, size, None, None).unwrap();
            }
            (
                book.volume(),
                book.bid_price(),
                book.ask_price(),
                book.last_price(),
                book.total_bid_size(),
                book.total_ask_size(),
            )
        };

        prop_assert_eq!(run(&orders), run(&orders));
    }

    // ========================================================================
    // DEPTH CONSISTENCY
    // ========================================================================

    /// Depth entries are sorted best-first and sum to the side totals when
    /// the window covers the whole grid.
    #[test]
    fn depth_sorted_and_complete(
        orders in prop::collection::vec(
            (side_strategy(), price_strategy(), size_strategy()),
            1..50
        )
    ) {
        let book = book();
        for (side, price, size) in orders {
            book.insert_limit_order(side, price, size, None, None).unwrap();
        }

        let bids = book.bid_depth(20_000);
        for w in bids.windows(2) {
            prop_assert!(w[0].price > w[1].price, "bids not descending");
        }
        let asks = book.ask_depth(20_000);
        for w in asks.windows(2) {
            prop_assert!(w[0].price < w[1].price, "asks not ascending");
        }

        let bid_total: u64 = bids.iter().map(|e| e.size).sum();
        let ask_total: u64 = asks.iter().map(|e| e.size).sum();
        prop_assert_eq!(bid_total, book.total_bid_size());
        prop_assert_eq!(ask_total, book.total_ask_size());
    }
}

// ============================================================================
// REGRESSION TESTS
// ============================================================================

#[test]
fn regression_empty_book_queries() {
    let book = book();
    assert_eq!(book.bid_price(), 0.0);
    assert_eq!(book.ask_price(), 0.0);
    assert_eq!(book.last_price(), 0.0);
    assert_eq!(book.volume(), 0);
    assert!(book.bid_depth(10).is_empty());
    assert!(book.ask_depth(10).is_empty());
    assert!(book.market_depth(10).is_empty());
    assert!(book.aon_market_depth().is_empty());
    assert!(book.time_and_sales().is_empty());
}

#[test]
fn regression_same_price_exact_cross() {
    let book = book();
    book.insert_limit_order(Side::Sell, 100.0, 10, None, None).unwrap();
    book.insert_limit_order(Side::Buy, 100.0, 10, None, None).unwrap();
    assert_eq!(book.volume(), 10);
    assert_eq!(book.total_size(), 0);
    assert_eq!(book.bid_price(), 0.0);
    assert_eq!(book.ask_price(), 0.0);
}
