//! Settlement of a closed scope.
//!
//! Reduces the net positions of a group to a list of transfers using greedy
//! largest-debtor / largest-creditor matching. Each step settles at least one
//! side completely, so `n` non-zero positions produce at most `n - 1`
//! transfers. The result is not guaranteed to be the global minimum.

use serde::{Deserialize, Serialize};

use crate::{EngineError, MemberId, MoneyCents, NetPosition, ResultEngine};

/// Positions and transfers at or below this magnitude are treated as settled.
///
/// Amounts are exact integer cents, so the default is zero.
pub const SETTLEMENT_TOLERANCE: MoneyCents = MoneyCents::ZERO;

/// A suggested payment from a debtor to a creditor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: MoneyCents,
}

/// Reduces `positions` to transfers using [`SETTLEMENT_TOLERANCE`].
pub fn reduce_to_transfers(positions: &[NetPosition]) -> ResultEngine<Vec<Transfer>> {
    reduce_to_transfers_with_tolerance(positions, SETTLEMENT_TOLERANCE)
}

/// Reduces `positions` to transfers.
///
/// Fails with [`EngineError::Inconsistent`] when the nets do not sum to zero
/// within `tolerance`. Ties in magnitude keep the input order.
pub fn reduce_to_transfers_with_tolerance(
    positions: &[NetPosition],
    tolerance: MoneyCents,
) -> ResultEngine<Vec<Transfer>> {
    if tolerance.is_negative() {
        return Err(EngineError::InvalidInput(
            "tolerance must be >= 0".to_string(),
        ));
    }

    let sum = MoneyCents::checked_sum(positions.iter().map(|p| p.net)).ok_or_else(|| {
        EngineError::Inconsistent("net positions sum out of range".to_string())
    })?;
    if sum > tolerance || sum < -tolerance {
        return Err(EngineError::Inconsistent(format!(
            "net positions sum to {sum}, expected 0"
        )));
    }

    let mut debtors: Vec<(MemberId, MoneyCents)> = Vec::new();
    let mut creditors: Vec<(MemberId, MoneyCents)> = Vec::new();
    for position in positions {
        if position.net.is_negative() {
            let owes = position.net.checked_neg().ok_or_else(|| {
                EngineError::Inconsistent(format!(
                    "net position of member {} out of range",
                    position.member
                ))
            })?;
            if owes > tolerance {
                debtors.push((position.member, owes));
            }
        } else if position.net > tolerance {
            creditors.push((position.member, position.net));
        }
    }

    // `sort_by` is stable.
    debtors.sort_by(|a, b| b.1.cmp(&a.1));
    creditors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut transfers = Vec::with_capacity(debtors.len() + creditors.len());
    let (mut d, mut c) = (0, 0);
    while d < debtors.len() && c < creditors.len() {
        let amount = debtors[d].1.min(creditors[c].1);
        if amount > tolerance {
            transfers.push(Transfer {
                from: debtors[d].0,
                to: creditors[c].0,
                amount,
            });
        }

        debtors[d].1 -= amount;
        creditors[c].1 -= amount;
        if debtors[d].1 <= tolerance {
            d += 1;
        }
        if creditors[c].1 <= tolerance {
            c += 1;
        }
    }

    Ok(transfers)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{
        ExpenseScope,
        ledger::tests::{A, B, C, expense, ledger},
    };

    fn position(member: MemberId, net: i64) -> NetPosition {
        NetPosition {
            net: MoneyCents::new(net),
            ..NetPosition::zero(member)
        }
    }

    fn apply(positions: &[NetPosition], transfers: &[Transfer]) -> HashMap<MemberId, MoneyCents> {
        let mut nets: HashMap<MemberId, MoneyCents> =
            positions.iter().map(|p| (p.member, p.net)).collect();
        for t in transfers {
            *nets.entry(t.from).or_default() += t.amount;
            *nets.entry(t.to).or_default() -= t.amount;
        }
        nets
    }

    /// Deterministic pseudo-random sequence for generated ledgers.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) % bound
        }
    }

    #[test]
    fn worked_group_example_settles_in_two_transfers() {
        let ledger = ledger(vec![
            expense(1, ExpenseScope::Group(10), A, 3000, &[A, B, C]),
            expense(2, ExpenseScope::Group(10), B, 1500, &[B, C]),
        ]);
        let positions = ledger.positions_for(&[A, B, C]);
        let transfers = reduce_to_transfers(&positions).unwrap();

        assert_eq!(transfers, vec![
            Transfer {
                from: C,
                to: A,
                amount: MoneyCents::new(1750),
            },
            Transfer {
                from: B,
                to: A,
                amount: MoneyCents::new(250),
            },
        ]);
        assert!(apply(&positions, &transfers).values().all(|n| n.is_zero()));
    }

    #[test]
    fn empty_and_settled_inputs_yield_no_transfers() {
        assert!(reduce_to_transfers(&[]).unwrap().is_empty());
        assert!(
            reduce_to_transfers(&[position(A, 0), position(B, 0)])
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let positions = [
            position(1, -500),
            position(2, -500),
            position(3, 500),
            position(4, 500),
        ];
        let transfers = reduce_to_transfers(&positions).unwrap();
        assert_eq!(transfers, vec![
            Transfer {
                from: 1,
                to: 3,
                amount: MoneyCents::new(500),
            },
            Transfer {
                from: 2,
                to: 4,
                amount: MoneyCents::new(500),
            },
        ]);
    }

    #[test]
    fn largest_positions_are_matched_first() {
        let positions = [
            position(1, -100),
            position(2, 700),
            position(3, -600),
            position(4, 0),
        ];
        let transfers = reduce_to_transfers(&positions).unwrap();
        assert_eq!(transfers, vec![
            Transfer {
                from: 3,
                to: 2,
                amount: MoneyCents::new(600),
            },
            Transfer {
                from: 1,
                to: 2,
                amount: MoneyCents::new(100),
            },
        ]);
    }

    #[test]
    fn unbalanced_positions_are_inconsistent() {
        let err = reduce_to_transfers(&[position(A, 1000), position(B, -999)]).unwrap_err();
        assert_eq!(
            err,
            EngineError::Inconsistent("net positions sum to 0.01, expected 0".to_string())
        );
    }

    #[test]
    fn out_of_range_positions_are_inconsistent() {
        let err = reduce_to_transfers(&[
            position(A, i64::MAX),
            position(B, i64::MAX),
            position(C, -1),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::Inconsistent("net positions sum out of range".to_string())
        );

        let err = reduce_to_transfers(&[
            position(A, i64::MIN),
            position(B, i64::MAX),
            position(C, 1),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::Inconsistent(format!("net position of member {A} out of range"))
        );
    }

    #[test]
    fn tolerance_absorbs_residue() {
        let positions = [position(A, 1001), position(B, -500), position(C, -500)];
        let transfers =
            reduce_to_transfers_with_tolerance(&positions, MoneyCents::new(1)).unwrap();
        assert_eq!(transfers.len(), 2);
        assert!(
            apply(&positions, &transfers)
                .values()
                .all(|n| n.abs() <= MoneyCents::new(1))
        );

        assert!(matches!(
            reduce_to_transfers_with_tolerance(&positions, MoneyCents::new(-1)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn generated_ledgers_settle_within_bound() {
        let mut rng = Lcg(7);
        for round in 0..200 {
            let members: Vec<MemberId> = (1..=(2 + rng.next(6) as i64)).collect();
            let mut rows = Vec::new();
            for id in 0..(1 + rng.next(8) as i64) {
                let payer = members[rng.next(members.len() as u64) as usize];
                let participants: Vec<MemberId> = members
                    .iter()
                    .copied()
                    .filter(|_| rng.next(2) == 0)
                    .collect();
                let participants = if participants.is_empty() {
                    vec![payer]
                } else {
                    participants
                };
                let total = 1 + rng.next(50_000) as i64;
                rows.push(expense(
                    id,
                    ExpenseScope::Group(1),
                    payer,
                    total,
                    &participants,
                ));
            }

            let ledger = ledger(rows);
            let positions = ledger.positions_for(&members);
            let non_zero = positions.iter().filter(|p| !p.net.is_zero()).count();
            let transfers = reduce_to_transfers(&positions).unwrap();

            assert!(
                transfers.len() <= non_zero.saturating_sub(1),
                "round {round}: {} transfers for {non_zero} positions",
                transfers.len()
            );
            assert!(transfers.iter().all(|t| t.amount.is_positive()));
            assert!(
                apply(&positions, &transfers).values().all(|n| n.is_zero()),
                "round {round}: unsettled balances"
            );
            assert_eq!(transfers, reduce_to_transfers(&positions).unwrap());
        }
    }
}
