//! Engine integration tests
//!
//! Drives the full engine surface the way a gateway would: pair
//! listing, order flow, fills, cancels, and export/install, with
//! invariant audits after every phase.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use book_engine::Engine;
use types::errors::EngineError;
use types::ids::{AssetId, BookId, Direction, OrderId, ParticipantId};
use types::numeric::{Amount, Price};
use types::order::OrderRequest;
use types::pair::PairListing;

fn participant(tag: u8) -> ParticipantId {
    ParticipantId::from_bytes([tag; 20])
}

fn amt(value: u64) -> Amount {
    Amount::from_u64(value)
}

fn listing(asset0: u32, asset1: u32) -> PairListing {
    PairListing {
        asset0: AssetId::new(asset0),
        asset1: AssetId::new(asset1),
        tick_spacing: 5,
        tick_lower_bound: Price::new(5),
        tick_upper_bound: Price::new(1_000_000),
    }
}

fn request(book_id: BookId, price: u32, amount: u64, tag: u8) -> OrderRequest {
    OrderRequest {
        book_id,
        price: Price::new(price),
        amount: amt(amount),
        participant: participant(tag),
    }
}

#[test]
fn test_full_trading_session() {
    let engine = Engine::with_defaults();
    let pair = engine.register_pair(&listing(1, 2)).unwrap();
    let selling = BookId::compose(pair.pair_id, Direction::ZeroForOne);
    let buying = selling.opposite();

    // Maker 1 quotes both sides, maker 2 stacks the selling book.
    engine.submit_order(&request(selling, 1000, 50, 1)).unwrap();
    engine.submit_order(&request(selling, 1010, 30, 2)).unwrap();
    engine.submit_order(&request(selling, 1020, 20, 2)).unwrap();
    engine.submit_order(&request(buying, 990, 40, 1)).unwrap();

    assert_eq!(engine.best_price(selling).unwrap(), Some(Price::new(1000)));
    assert_eq!(engine.best_price(buying).unwrap(), Some(Price::new(990)));
    assert_eq!(engine.book_weight(selling).unwrap(), amt(100));
    engine.verify_book(selling).unwrap();
    engine.verify_book(buying).unwrap();

    // A taker sweeps through the best selling level into the second.
    let outcome = engine.fill_liquidity(selling, amt(60)).unwrap();
    assert!(outcome.is_complete());
    assert_eq!(outcome.fills.len(), 2);
    assert_eq!(outcome.fills[0].price, Price::new(1000));
    assert_eq!(outcome.fills[1].price, Price::new(1010));
    assert_eq!(engine.book_weight(selling).unwrap(), amt(40));
    assert_eq!(engine.best_price(selling).unwrap(), Some(Price::new(1010)));
    engine.verify_book(selling).unwrap();

    // Maker 1 is fully consumed, maker 2 keeps the remainder.
    assert!(engine.list_orders(participant(1), selling).unwrap().is_empty());
    let resting = engine.list_orders(participant(2), selling).unwrap();
    assert_eq!(resting.len(), 2);

    // Maker 2 pulls the worst quote.
    let worst = resting.iter().find(|o| o.price == Price::new(1020)).unwrap();
    let removed = engine
        .cancel_order(participant(2), selling, worst.order_id)
        .unwrap();
    assert_eq!(removed, amt(20));
    assert_eq!(engine.book_weight(selling).unwrap(), amt(20));
    engine.verify_book(selling).unwrap();

    // The buying book never moved.
    assert_eq!(engine.book_weight(buying).unwrap(), amt(40));
    engine.verify_book(buying).unwrap();
}

#[test]
fn test_directions_fill_from_opposite_ends() {
    let engine = Engine::with_defaults();
    let pair = engine.register_pair(&listing(1, 2)).unwrap();

    for direction in [Direction::ZeroForOne, Direction::OneForZero] {
        let book_id = BookId::compose(pair.pair_id, direction);
        for price in [100, 200, 300] {
            engine.submit_order(&request(book_id, price, 10, 1)).unwrap();
        }
    }

    let selling = BookId::compose(pair.pair_id, Direction::ZeroForOne);
    let outcome = engine.fill_liquidity(selling, amt(15)).unwrap();
    assert_eq!(outcome.fills[0].price, Price::new(100));
    assert_eq!(engine.best_price(selling).unwrap(), Some(Price::new(200)));

    let buying = BookId::compose(pair.pair_id, Direction::OneForZero);
    let outcome = engine.fill_liquidity(buying, amt(15)).unwrap();
    assert_eq!(outcome.fills[0].price, Price::new(300));
    assert_eq!(engine.best_price(buying).unwrap(), Some(Price::new(200)));
}

#[test]
fn test_bounded_fill_stops_at_the_limit() {
    let engine = Engine::with_defaults();
    let pair = engine.register_pair(&listing(1, 2)).unwrap();
    let selling = BookId::compose(pair.pair_id, Direction::ZeroForOne);

    engine.submit_order(&request(selling, 100, 10, 1)).unwrap();
    engine.submit_order(&request(selling, 200, 10, 1)).unwrap();
    engine.submit_order(&request(selling, 300, 10, 1)).unwrap();

    let outcome = engine
        .fill_liquidity_bounded(selling, amt(25), Some(Price::new(200)))
        .unwrap();
    assert_eq!(outcome.filled, amt(20));
    assert_eq!(outcome.unfilled(), amt(5));
    assert_eq!(engine.best_price(selling).unwrap(), Some(Price::new(300)));
    engine.verify_book(selling).unwrap();
}

#[test]
fn test_exhausting_a_book_leaves_it_usable() {
    let engine = Engine::with_defaults();
    let pair = engine.register_pair(&listing(1, 2)).unwrap();
    let selling = BookId::compose(pair.pair_id, Direction::ZeroForOne);

    for price in [100, 150, 200, 250] {
        engine.submit_order(&request(selling, price, 5, 1)).unwrap();
    }
    let outcome = engine.fill_liquidity(selling, amt(100)).unwrap();
    assert_eq!(outcome.filled, amt(20));
    assert_eq!(outcome.unfilled(), amt(80));
    assert_eq!(engine.book_weight(selling).unwrap(), Amount::ZERO);
    assert_eq!(engine.best_price(selling).unwrap(), None);
    engine.verify_book(selling).unwrap();

    // The emptied book accepts fresh orders.
    engine.submit_order(&request(selling, 120, 3, 2)).unwrap();
    assert_eq!(engine.best_price(selling).unwrap(), Some(Price::new(120)));
    engine.verify_book(selling).unwrap();
}

#[test]
fn test_multiple_pairs_stay_isolated() {
    let engine = Engine::with_defaults();
    let first = engine.register_pair(&listing(1, 2)).unwrap();
    let second = engine.register_pair(&listing(3, 4)).unwrap();
    assert_ne!(first.pair_id, second.pair_id);

    let book_one = BookId::compose(first.pair_id, Direction::ZeroForOne);
    let book_two = BookId::compose(second.pair_id, Direction::ZeroForOne);
    engine.submit_order(&request(book_one, 100, 10, 1)).unwrap();
    engine.submit_order(&request(book_two, 500, 20, 1)).unwrap();

    engine.fill_liquidity(book_one, amt(10)).unwrap();
    assert_eq!(engine.book_weight(book_one).unwrap(), Amount::ZERO);
    assert_eq!(engine.book_weight(book_two).unwrap(), amt(20));

    assert_eq!(engine.book_ids().unwrap().len(), 4);
}

#[test]
fn test_duplicate_listing_rejected_in_either_order() {
    let engine = Engine::with_defaults();
    engine.register_pair(&listing(1, 2)).unwrap();

    assert!(matches!(
        engine.register_pair(&listing(1, 2)),
        Err(EngineError::DuplicatePair { .. })
    ));
    assert!(matches!(
        engine.register_pair(&listing(2, 1)),
        Err(EngineError::DuplicatePair { .. })
    ));
}

#[test]
fn test_concurrent_submissions_assign_unique_ids() {
    let engine = Arc::new(Engine::with_defaults());
    let pair = engine.register_pair(&listing(1, 2)).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|worker: u32| {
            let engine = Arc::clone(&engine);
            let direction = if worker % 2 == 0 {
                Direction::ZeroForOne
            } else {
                Direction::OneForZero
            };
            let book_id = BookId::compose(pair.pair_id, direction);
            thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..100u32 {
                    let price = 100 + 5 * (i % 40);
                    let req = request(book_id, price, 1, worker as u8 + 1);
                    ids.push(engine.submit_order(&req).unwrap());
                }
                ids
            })
        })
        .collect();

    let mut seen: HashSet<OrderId> = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "order id assigned twice: {}", id);
        }
    }
    assert_eq!(seen.len(), 400);

    for direction in [Direction::ZeroForOne, Direction::OneForZero] {
        let book_id = BookId::compose(pair.pair_id, direction);
        assert_eq!(engine.book_weight(book_id).unwrap(), amt(200));
        engine.verify_book(book_id).unwrap();
    }
    assert_eq!(engine.stats().orders_submitted, 400);
}

#[test]
fn test_concurrent_fills_and_submissions_balance() {
    let engine = Arc::new(Engine::with_defaults());
    let pair = engine.register_pair(&listing(1, 2)).unwrap();
    let book_id = BookId::compose(pair.pair_id, Direction::ZeroForOne);

    // Seed enough liquidity that fills never fully drain the book.
    for i in 0..50u32 {
        engine
            .submit_order(&request(book_id, 100 + 5 * i, 100, 1))
            .unwrap();
    }

    let makers: Vec<_> = (0..2)
        .map(|worker: u32| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..200u32 {
                    let price = 400 + 5 * (i % 20);
                    engine
                        .submit_order(&request(book_id, price, 2, worker as u8 + 2))
                        .unwrap();
                }
            })
        })
        .collect();

    let takers: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut filled = Amount::ZERO;
                for _ in 0..100 {
                    let outcome = engine.fill_liquidity(book_id, amt(3)).unwrap();
                    filled += outcome.filled;
                }
                filled
            })
        })
        .collect();

    for handle in makers {
        handle.join().unwrap();
    }
    let mut taken = Amount::ZERO;
    for handle in takers {
        taken += handle.join().unwrap();
    }

    // submitted == still resting + taken out
    let submitted = amt(50 * 100 + 2 * 200 * 2);
    assert_eq!(engine.book_weight(book_id).unwrap() + taken, submitted);
    engine.verify_book(book_id).unwrap();
}

#[test]
fn test_export_survives_later_mutation() {
    let engine = Engine::with_defaults();
    let pair = engine.register_pair(&listing(1, 2)).unwrap();
    let book_id = BookId::compose(pair.pair_id, Direction::ZeroForOne);

    engine.submit_order(&request(book_id, 100, 10, 1)).unwrap();
    engine.submit_order(&request(book_id, 200, 20, 2)).unwrap();
    let export = engine.export_book(book_id).unwrap();

    // Keep mutating the source; the export is an independent copy.
    engine.fill_liquidity(book_id, amt(25)).unwrap();
    assert_eq!(engine.book_weight(book_id).unwrap(), amt(5));

    let replica = Engine::with_defaults();
    replica.install_book(&export).unwrap();
    assert_eq!(replica.book_weight(book_id).unwrap(), amt(30));
    assert_eq!(replica.best_price(book_id).unwrap(), Some(Price::new(100)));
    replica.verify_book(book_id).unwrap();

    // The replica keeps trading from where the export was taken.
    let outcome = replica.fill_liquidity(book_id, amt(15)).unwrap();
    assert!(outcome.is_complete());
    replica.verify_book(book_id).unwrap();
}

#[test]
fn test_install_replaces_existing_book() {
    let engine = Engine::with_defaults();
    let pair = engine.register_pair(&listing(1, 2)).unwrap();
    let book_id = BookId::compose(pair.pair_id, Direction::ZeroForOne);

    engine.submit_order(&request(book_id, 100, 10, 1)).unwrap();
    let export = engine.export_book(book_id).unwrap();

    // Diverge, then roll back to the export.
    engine.submit_order(&request(book_id, 200, 99, 2)).unwrap();
    engine.install_book(&export).unwrap();

    assert_eq!(engine.book_weight(book_id).unwrap(), amt(10));
    assert!(engine.list_orders(participant(2), book_id).unwrap().is_empty());
    engine.verify_book(book_id).unwrap();
}

#[test]
fn test_depth_reports_best_levels_first() {
    let engine = Engine::with_defaults();
    let pair = engine.register_pair(&listing(1, 2)).unwrap();
    let buying = BookId::compose(pair.pair_id, Direction::OneForZero);

    for price in [100, 300, 200, 500, 400] {
        engine.submit_order(&request(buying, price, 1, 1)).unwrap();
    }

    let depth = engine.depth(buying, 3).unwrap();
    let prices: Vec<u32> = depth.iter().map(|l| l.price.as_u32()).collect();
    assert_eq!(prices, vec![500, 400, 300]);
}
