//! Matching-engine throughput benches.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gridbook::{OrderBook, Side, TickRatio};

fn bench_add_only(c: &mut Criterion) {
    c.bench_function("add_only_1000", |b| {
        b.iter(|| {
            let book = OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap();
            for i in 0..500u64 {
                let price = 400.0 + (i % 100) as f64 * 0.01;
                book.insert_limit_order(Side::Buy, price, 10, None, None).unwrap();
                let price = 500.0 + (i % 100) as f64 * 0.01;
                book.insert_limit_order(Side::Sell, price, 10, None, None).unwrap();
            }
            black_box(book.total_size())
        })
    });
}

fn bench_cross_heavy(c: &mut Criterion) {
    c.bench_function("cross_heavy_1000", |b| {
        b.iter(|| {
            let book = OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap();
            for _ in 0..500u64 {
                book.insert_limit_order(Side::Sell, 500.0, 10, None, None).unwrap();
                book.insert_limit_order(Side::Buy, 500.0, 10, None, None).unwrap();
            }
            black_box(book.volume())
        })
    });
}

fn bench_stop_triggers(c: &mut Criterion) {
    c.bench_function("stop_trigger_chain", |b| {
        b.iter(|| {
            let book = OrderBook::new(0.0, 1_000.0, TickRatio::HUNDREDTH).unwrap();
            for i in 0..50u64 {
                let price = 500.0 + i as f64 * 0.02;
                book.insert_limit_order(Side::Sell, price, 10, None, None).unwrap();
            }
            for i in 0..49u64 {
                let price = 500.0 + i as f64 * 0.02;
                book.insert_stop_order(Side::Buy, price, 10, None, None).unwrap();
            }
            book.insert_limit_order(Side::Buy, 500.0, 10, None, None).unwrap();
            black_box(book.volume())
        })
    });
}

criterion_group!(benches, bench_add_only, bench_cross_heavy, bench_stop_triggers);
criterion_main!(benches);
