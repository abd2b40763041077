//! Randomised checks of the energy account invariants.
//!
//! Drives seeded random sequences of charge, discharge, and transfer
//! operations through a small set of accounts and checks after every step
//! that no account leaves `[0, capacity]` and that transfers conserve the
//! total held energy.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tpg_ledger::{EnergyAccount, transfer};

fn random_wh(rng: &mut StdRng, max: i64) -> Decimal {
    Decimal::new(rng.random_range(-max / 10..=max), 0)
}

fn check(accounts: &[EnergyAccount]) {
    for account in accounts {
        assert!(account.stored_wh() >= Decimal::ZERO, "{account:?}");
        assert!(account.stored_wh() <= account.capacity_wh(), "{account:?}");
    }
}

#[test]
fn invariant_holds_under_random_operations() {
    for seed in 0..20_u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut accounts = vec![
            EnergyAccount::new(dec!(1000), dec!(100)).unwrap(),
            EnergyAccount::new(dec!(5000), dec!(0)).unwrap(),
            EnergyAccount::new(dec!(250), dec!(250)).unwrap(),
        ];

        for _ in 0..500 {
            let op = rng.random_range(0..3);
            let i = rng.random_range(0..accounts.len());
            match op {
                0 => {
                    let amount = random_wh(&mut rng, 2000);
                    let before = accounts[i].stored_wh();
                    let outcome = accounts[i].charge(amount);
                    assert_eq!(accounts[i].stored_wh() - before, outcome.accepted_wh);
                }
                1 => {
                    let amount = random_wh(&mut rng, 2000);
                    let before = accounts[i].stored_wh();
                    let removed = accounts[i].discharge(amount);
                    assert_eq!(before - accounts[i].stored_wh(), removed);
                }
                _ => {
                    let j = (i + 1) % accounts.len();
                    let total_before: Decimal = accounts.iter().map(EnergyAccount::stored_wh).sum();
                    let (left, right) = accounts.split_at_mut(i.max(j));
                    let (from, to) = if i < j {
                        (&mut left[i], &mut right[0])
                    } else {
                        (&mut right[0], &mut left[j])
                    };
                    let from_before = from.stored_wh();
                    let to_before = to.stored_wh();
                    let moved = transfer(from, to, random_wh(&mut rng, 3000));
                    assert_eq!(from_before - from.stored_wh(), moved);
                    assert_eq!(to.stored_wh() - to_before, moved);
                    let total_after: Decimal = accounts.iter().map(EnergyAccount::stored_wh).sum();
                    assert_eq!(total_before, total_after);
                }
            }
            check(&accounts);
        }
    }
}

#[test]
fn documented_transfer_scenario() {
    // Request 1,000,000 Wh; source holds 600,000 Wh; destination has 900,000 Wh free.
    let mut source = EnergyAccount::new(dec!(2000000), dec!(600000)).unwrap();
    let mut destination = EnergyAccount::new(dec!(1000000), dec!(100000)).unwrap();
    assert_eq!(destination.free_wh(), dec!(900000));

    let moved = transfer(&mut source, &mut destination, dec!(1000000));

    assert_eq!(moved, dec!(600000));
    assert_eq!(source.stored_wh(), Decimal::ZERO);
    assert_eq!(destination.stored_wh(), dec!(700000));
}
