use super::*;
use crate::common::error::CoreError;
use shared::Owner;
use std::thread;

/// Retry an operation while it reports a retryable conflict, the way an
/// API layer in front of this crate would
fn with_retry<T>(mut op: impl FnMut() -> Result<T, CoreError>) -> Result<T, CoreError> {
    loop {
        match op() {
            Err(e) if e.is_retryable() => continue,
            other => return other,
        }
    }
}

#[test]
fn test_contended_adds_all_land() {
    let state = test_state();
    seed_product(&state, "p1", "Widget", "5.00", 1_000);
    let owner = Owner::User("u1".into());

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            let owner = owner.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    with_retry(|| state.carts.add_item(&owner, "p1", 1)).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    // Every add either merged or created exactly once
    let cart = state.carts.get(&owner).unwrap();
    assert_eq!(cart.item("p1").unwrap().quantity, 40);
    assert_eq!(stock_of(&state, "p1"), 960);
}

#[test]
fn test_contended_adds_of_distinct_products_all_land() {
    let state = test_state();
    for i in 0..8 {
        seed_product(&state, &format!("p{i}"), "Widget", "5.00", 10);
    }
    let owner = Owner::User("u1".into());

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let state = state.clone();
            let owner = owner.clone();
            thread::spawn(move || {
                with_retry(|| state.carts.add_item(&owner, &format!("p{i}"), 1)).unwrap();
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    // No add silently overwrote another: one line per product
    let cart = state.carts.get(&owner).unwrap();
    assert_eq!(cart.items.len(), 8);
    for i in 0..8 {
        assert_eq!(stock_of(&state, &format!("p{i}")), 9);
    }
}

#[test]
fn test_contended_reserves_never_oversell() {
    let state = test_state();
    seed_product(&state, "p1", "Widget", "5.00", 5);

    let threads: Vec<_> = (0..10)
        .map(|i| {
            let state = state.clone();
            thread::spawn(move || {
                let owner = Owner::Guest(format!("g{i}"));
                with_retry(|| state.carts.add_item(&owner, "p1", 1))
            })
        })
        .collect();

    let mut won = 0;
    let mut starved = 0;
    for t in threads {
        match t.join().unwrap() {
            Ok(_) => won += 1,
            Err(CoreError::InsufficientStock { .. }) => starved += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(won, 5);
    assert_eq!(starved, 5);
    assert_eq!(stock_of(&state, "p1"), 0);
}

#[test]
fn test_stale_writer_loses() {
    let state = test_state();
    seed_product(&state, "p1", "Widget", "5.00", 100);
    seed_product(&state, "p2", "Gadget", "1.00", 100);
    let owner = Owner::User("u1".into());
    let cart = state.carts.add_item(&owner, "p1", 1).unwrap();

    // Another session mutates the cart after our read
    state.carts.add_item(&owner, "p2", 1).unwrap();

    let err = state
        .carts
        .update(
            &cart.id,
            &owner,
            cart.version,
            vec![shared::CartItemInput {
                product_id: "p1".into(),
                quantity: 3,
            }],
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::ConcurrencyConflict { entity: "cart", .. }));

    // Losing the race left reservations exactly as the winner set them
    assert_eq!(stock_of(&state, "p1"), 99);
    assert_eq!(stock_of(&state, "p2"), 99);
}

#[test]
fn test_concurrent_first_adds_build_one_cart() {
    let state = test_state();
    seed_product(&state, "p1", "Widget", "5.00", 100);
    let owner = Owner::Guest("g1".into());

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let state = state.clone();
            let owner = owner.clone();
            thread::spawn(move || with_retry(|| state.carts.add_item(&owner, "p1", 1)).unwrap())
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let cart = state.carts.get(&owner).unwrap();
    assert_eq!(cart.item("p1").unwrap().quantity, 4);
    assert_eq!(stock_of(&state, "p1"), 96);
}
