//! Ledger aggregation.
//!
//! A [`Ledger`] is an in-memory snapshot of expenses and their shares, already
//! restricted by the caller to the scope being queried. Every figure is
//! derived on demand from that snapshot; nothing is cached between calls.
//!
//! For a member `m`:
//! - `paid` is the sum of the totals of expenses paid by `m`
//! - `owed` is the sum of `m`'s shares in expenses paid by someone else
//! - `to_receive` is the sum of other members' shares in expenses paid by `m`
//! - `net = to_receive - owed`
//!
//! A payer's own share counts neither as owed nor as to-receive.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, ExpenseId, GroupId, MemberId, MoneyCents, ResultEngine};

/// A registered user as seen by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub username: String,
    pub display_name: String,
    pub avatar_color: String,
}

/// Where an expense lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "group_id", rename_all = "snake_case")]
pub enum ExpenseScope {
    /// Not attached to any group.
    Personal,
    Group(GroupId),
}

impl ExpenseScope {
    pub fn group_id(self) -> Option<GroupId> {
        match self {
            Self::Personal => None,
            Self::Group(id) => Some(id),
        }
    }
}

impl From<Option<GroupId>> for ExpenseScope {
    fn from(value: Option<GroupId>) -> Self {
        value.map_or(Self::Personal, Self::Group)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub scope: ExpenseScope,
    pub payer: MemberId,
    pub description: String,
    pub total: MoneyCents,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
}

/// One participant's portion of an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub expense_id: ExpenseId,
    pub member: MemberId,
    pub amount: MoneyCents,
}

/// Derived balance of one member within a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPosition {
    pub member: MemberId,
    pub paid: MoneyCents,
    pub owed: MoneyCents,
    pub to_receive: MoneyCents,
    pub net: MoneyCents,
}

impl NetPosition {
    #[must_use]
    pub fn zero(member: MemberId) -> Self {
        Self {
            member,
            paid: MoneyCents::ZERO,
            owed: MoneyCents::ZERO,
            to_receive: MoneyCents::ZERO,
            net: MoneyCents::ZERO,
        }
    }
}

/// Net amount between a member and one counterparty.
///
/// Positive: the counterparty owes the member. Negative: the member owes the
/// counterparty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyBalance {
    pub counterparty: MemberId,
    pub net: MoneyCents,
}

/// Snapshot of expenses and shares for one balance query.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    expenses: Vec<Expense>,
    shares: Vec<Share>,
    payer_by_expense: HashMap<ExpenseId, (MemberId, ExpenseScope)>,
}

impl Ledger {
    /// Builds a ledger, checking that the shares of every expense sum to its
    /// total and that no share points outside the snapshot.
    ///
    /// The sum of every expense total must fit in an `i64`. Each position
    /// component is bounded by that sum, so the queries below cannot
    /// overflow once construction succeeds.
    pub fn new(expenses: Vec<Expense>, shares: Vec<Share>) -> ResultEngine<Self> {
        let mut payer_by_expense = HashMap::with_capacity(expenses.len());
        let mut share_totals: HashMap<ExpenseId, MoneyCents> =
            HashMap::with_capacity(expenses.len());

        for expense in &expenses {
            if !expense.total.is_positive() {
                return Err(EngineError::Inconsistent(format!(
                    "expense {} has a non-positive total",
                    expense.id
                )));
            }
            if expense.total > MoneyCents::MAX_TOTAL {
                return Err(EngineError::InvalidAmount(format!(
                    "expense {} exceeds the maximum total",
                    expense.id
                )));
            }
            if payer_by_expense
                .insert(expense.id, (expense.payer, expense.scope))
                .is_some()
            {
                return Err(EngineError::Inconsistent(format!(
                    "expense {} appears twice",
                    expense.id
                )));
            }
            share_totals.insert(expense.id, MoneyCents::ZERO);
        }
        if MoneyCents::checked_sum(expenses.iter().map(|e| e.total)).is_none() {
            return Err(EngineError::InvalidAmount(
                "ledger total out of range".to_string(),
            ));
        }

        for share in &shares {
            if share.amount.is_negative() {
                return Err(EngineError::Inconsistent(format!(
                    "share of member {} in expense {} is negative",
                    share.member, share.expense_id
                )));
            }
            let total = share_totals.get_mut(&share.expense_id).ok_or_else(|| {
                EngineError::Inconsistent(format!(
                    "share references expense {} outside the snapshot",
                    share.expense_id
                ))
            })?;
            *total = total.checked_add(share.amount).ok_or_else(|| {
                EngineError::Inconsistent(format!(
                    "shares of expense {} overflow",
                    share.expense_id
                ))
            })?;
        }

        for expense in &expenses {
            let shared = share_totals
                .get(&expense.id)
                .copied()
                .unwrap_or(MoneyCents::ZERO);
            if shared != expense.total {
                return Err(EngineError::Inconsistent(format!(
                    "shares of expense {} sum to {shared}, expected {}",
                    expense.id, expense.total
                )));
            }
        }

        Ok(Self {
            expenses,
            shares,
            payer_by_expense,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    /// Net position of `member` over the whole snapshot.
    pub fn position_of(&self, member: MemberId) -> NetPosition {
        self.position_matching(member, |_| true)
    }

    /// Net position of `member` restricted to expenses in `scope`.
    pub fn position_within(&self, member: MemberId, scope: ExpenseScope) -> NetPosition {
        self.position_matching(member, |s| s == scope)
    }

    /// One position per requested member, in the order given.
    pub fn positions_for(&self, members: &[MemberId]) -> Vec<NetPosition> {
        members.iter().map(|m| self.position_of(*m)).collect()
    }

    /// Every member that paid or holds a share in the snapshot, ascending.
    pub fn participants(&self) -> Vec<MemberId> {
        let mut ids: Vec<MemberId> = self
            .expenses
            .iter()
            .map(|e| e.payer)
            .chain(self.shares.iter().map(|s| s.member))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Distinct scopes present in the snapshot, ascending.
    pub fn scopes(&self) -> Vec<ExpenseScope> {
        let mut scopes: Vec<ExpenseScope> = self.expenses.iter().map(|e| e.scope).collect();
        scopes.sort_unstable();
        scopes.dedup();
        scopes
    }

    /// Pairwise nets between `member` and everyone they share expenses with,
    /// ordered by counterparty id. Counterparties that net to zero are kept.
    pub fn counterparties_of(&self, member: MemberId) -> Vec<CounterpartyBalance> {
        let mut nets: BTreeMap<MemberId, MoneyCents> = BTreeMap::new();
        for share in &self.shares {
            let Some((payer, _)) = self.payer_by_expense.get(&share.expense_id) else {
                continue;
            };
            if *payer == share.member {
                continue;
            }
            if *payer == member {
                *nets.entry(share.member).or_default() += share.amount;
            } else if share.member == member {
                *nets.entry(*payer).or_default() -= share.amount;
            }
        }
        nets.into_iter()
            .map(|(counterparty, net)| CounterpartyBalance { counterparty, net })
            .collect()
    }

    fn position_matching<F>(&self, member: MemberId, include: F) -> NetPosition
    where
        F: Fn(ExpenseScope) -> bool,
    {
        let paid = self
            .expenses
            .iter()
            .filter(|e| e.payer == member && include(e.scope))
            .map(|e| e.total)
            .sum();

        let mut owed = MoneyCents::ZERO;
        let mut to_receive = MoneyCents::ZERO;
        for share in &self.shares {
            let Some((payer, scope)) = self.payer_by_expense.get(&share.expense_id) else {
                continue;
            };
            if !include(*scope) || *payer == share.member {
                continue;
            }
            if share.member == member {
                owed += share.amount;
            } else if *payer == member {
                to_receive += share.amount;
            }
        }

        NetPosition {
            member,
            paid,
            owed,
            to_receive,
            net: to_receive - owed,
        }
    }
}
