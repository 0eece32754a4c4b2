//! Command structs for engine write operations.
//!
//! These types group parameters for expense creation and update, keeping
//! call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};

use crate::{Currency, ExpenseId, GroupId, MemberId, MoneyCents};

/// Create an expense inside a group, split equally among `participants`.
#[derive(Clone, Debug)]
pub struct GroupExpenseCmd {
    pub group_id: GroupId,
    pub payer_id: MemberId,
    pub description: String,
    pub total: MoneyCents,
    pub currency: Currency,
    pub participants: Vec<MemberId>,
    pub occurred_at: DateTime<Utc>,
    /// Member issuing the request; must belong to the group.
    pub requester_id: MemberId,
}

impl GroupExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: GroupId,
        requester_id: MemberId,
        description: impl Into<String>,
        total: MoneyCents,
        participants: Vec<MemberId>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id,
            payer_id: requester_id,
            description: description.into(),
            total,
            currency: Currency::default(),
            participants,
            occurred_at,
            requester_id,
        }
    }

    #[must_use]
    pub fn payer(mut self, payer_id: MemberId) -> Self {
        self.payer_id = payer_id;
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }
}

/// Create an expense outside any group. The requester is always the payer.
#[derive(Clone, Debug)]
pub struct PersonalExpenseCmd {
    pub description: String,
    pub total: MoneyCents,
    pub currency: Currency,
    /// Defaults to the payer alone when empty.
    pub participants: Vec<MemberId>,
    pub occurred_at: DateTime<Utc>,
    pub requester_id: MemberId,
}

impl PersonalExpenseCmd {
    #[must_use]
    pub fn new(
        requester_id: MemberId,
        description: impl Into<String>,
        total: MoneyCents,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            description: description.into(),
            total,
            currency: Currency::default(),
            participants: Vec::new(),
            occurred_at,
            requester_id,
        }
    }

    #[must_use]
    pub fn participants(mut self, participants: Vec<MemberId>) -> Self {
        self.participants = participants;
        self
    }
}

/// Replace the editable fields of an expense and recompute its shares.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub expense_id: ExpenseId,
    pub description: String,
    pub total: MoneyCents,
    pub payer_id: MemberId,
    pub participants: Vec<MemberId>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub requester_id: MemberId,
}
