//! Concurrency behavior: many producer threads against one dispatcher, and
//! callbacks reentering the book from the drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use gridbook::{CallbackMsg, OrderBook, OrderId, Side, TickRatio};

#[test]
fn many_producers_one_consumer() {
    let book = Arc::new(OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap());
    let threads = 8;
    let per_thread = 50;

    let mut handles = Vec::new();
    for t in 0..threads {
        let book = Arc::clone(&book);
        handles.push(thread::spawn(move || {
            let mut ids = Vec::new();
            for i in 0..per_thread {
                // spread prices so the book never crosses
                let price = 100.0 + (t * per_thread + i) as f64 * 0.01;
                let id = book
                    .insert_limit_order(Side::Buy, price, 10, None, None)
                    .unwrap();
                ids.push(id);
            }
            ids
        }));
    }

    let mut all_ids: Vec<OrderId> = Vec::new();
    for h in handles {
        all_ids.extend(h.join().unwrap());
    }

    // every submission got a unique, monotonic-from-1 id
    all_ids.sort();
    all_ids.dedup();
    assert_eq!(all_ids.len(), threads * per_thread);
    assert_eq!(book.last_id(), OrderId((threads * per_thread) as u64));

    assert_eq!(book.total_bid_size(), (threads * per_thread * 10) as u64);
    assert_eq!(book.volume(), 0);
}

#[test]
fn concurrent_submit_and_pull() {
    let book = Arc::new(OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap());
    let pulled = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for t in 0..4 {
        let book = Arc::clone(&book);
        let pulled = Arc::clone(&pulled);
        handles.push(thread::spawn(move || {
            for i in 0..40 {
                let price = 50.0 + (t * 40 + i) as f64 * 0.01;
                let id = book
                    .insert_limit_order(Side::Buy, price, 5, None, None)
                    .unwrap();
                if i % 2 == 0 && book.pull_order(id).unwrap() {
                    pulled.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let pulled = pulled.load(Ordering::SeqCst);
    assert_eq!(pulled, 4 * 20);
    assert_eq!(book.total_bid_size(), (4 * 40 * 5) - pulled * 5);
}

#[test]
fn callback_may_reenter_the_book() {
    let book = Arc::new(OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap());

    // on its fill, this callback submits a fresh bid from inside the drain
    let reentrant = Arc::clone(&book);
    let nested_id = Arc::new(Mutex::new(OrderId::NONE));
    let nested_slot = Arc::clone(&nested_id);
    book.insert_limit_order(
        Side::Sell,
        100.0,
        50,
        Some(Arc::new(move |msg, _old, _new, _price, _size| {
            if msg == CallbackMsg::Fill {
                let id = reentrant
                    .insert_limit_order(Side::Buy, 90.0, 25, None, None)
                    .unwrap();
                *nested_slot.lock().unwrap() = id;
            }
        })),
        None,
    )
    .unwrap();

    book.insert_market_order(Side::Buy, 50, None, None).unwrap();

    let nested = *nested_id.lock().unwrap();
    assert!(!nested.is_none());
    assert_eq!(book.bid_price(), 90.0);
    assert_eq!(book.bid_size(), 25);
    assert_eq!(book.volume(), 50);
}

#[test]
fn panicking_callback_does_not_corrupt_the_book() {
    let book = OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap();

    book.insert_limit_order(
        Side::Sell,
        100.0,
        50,
        Some(Arc::new(|_msg, _old, _new, _price, _size| {
            panic!("listener bug");
        })),
        None,
    )
    .unwrap();

    // the fill callback panics; the submission still completes
    book.insert_market_order(Side::Buy, 50, None, None).unwrap();
    assert_eq!(book.volume(), 50);

    // and the book keeps working afterwards
    book.insert_limit_order(Side::Buy, 99.0, 10, None, None).unwrap();
    assert_eq!(book.bid_price(), 99.0);
}

#[test]
fn queries_race_with_submissions() {
    let book = Arc::new(OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap());

    let writer = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            for i in 0..200 {
                let price = 100.0 + (i % 50) as f64 * 0.01;
                book.insert_limit_order(Side::Buy, price, 1, None, None)
                    .unwrap();
            }
        })
    };
    let reader = {
        let book = Arc::clone(&book);
        thread::spawn(move || {
            for _ in 0..200 {
                let bid = book.bid_price();
                let ask = book.ask_price();
                if bid > 0.0 && ask > 0.0 {
                    assert!(bid < ask);
                }
                let _ = book.bid_depth(8);
                let _ = book.volume();
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(book.total_bid_size(), 200);
}
