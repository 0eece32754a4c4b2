//! Equal division of an expense total among its participants.
//!
//! The total is divided in integer cents. When it does not divide evenly the
//! `total % n` leftover cents are handed out one each to the first
//! participants, in the order they were supplied. Shares therefore always sum
//! to the total and differ from each other by at most one cent.

use std::collections::HashSet;

use crate::{EngineError, MemberId, MoneyCents, ResultEngine};

/// Splits `total` equally among `participants`.
///
/// Returns one `(member, amount)` pair per participant, in input order.
pub fn equal_split(
    total: MoneyCents,
    participants: &[MemberId],
) -> ResultEngine<Vec<(MemberId, MoneyCents)>> {
    if !total.is_positive() {
        return Err(EngineError::InvalidAmount(
            "total amount must be > 0".to_string(),
        ));
    }
    if total > MoneyCents::MAX_TOTAL {
        return Err(EngineError::InvalidAmount(format!(
            "total amount must be <= {}",
            MoneyCents::MAX_TOTAL
        )));
    }
    if participants.is_empty() {
        return Err(EngineError::InvalidInput(
            "at least one participant is required".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(participants.len());
    for id in participants {
        if !seen.insert(*id) {
            return Err(EngineError::InvalidInput(format!(
                "duplicate participant: {id}"
            )));
        }
    }

    let count = i64::try_from(participants.len())
        .map_err(|_| EngineError::InvalidInput("too many participants".to_string()))?;
    let base = total.cents() / count;
    let residue = total.cents() % count;

    Ok(participants
        .iter()
        .zip(0i64..)
        .map(|(id, index)| {
            let extra = i64::from(index < residue);
            (*id, MoneyCents::new(base + extra))
        })
        .collect())
}
