//! Shared-expense ledger.
//!
//! Members form groups and record expenses split equally among participants.
//! Balances are never stored: every query reloads the expenses and shares of
//! its scope and derives net positions from them ([`Ledger`]), and group
//! settlements are reduced to transfers by [`reduce_to_transfers`].

pub use commands::{GroupExpenseCmd, PersonalExpenseCmd, UpdateExpenseCmd};
pub use currency::Currency;
pub use error::EngineError;
pub use groups::Group;
pub use ledger::{CounterpartyBalance, Expense, ExpenseScope, Ledger, Member, NetPosition, Share};
pub use money::MoneyCents;
pub use ops::{
    BalanceReport, BalanceScope, CounterpartyView, DASHBOARD_RECENT_LIMIT, DEFAULT_AVATAR_COLOR,
    DEFAULT_RECENT_LIMIT, Dashboard, Engine, EngineBuilder, ExpenseDetail, GroupBalance,
    GroupDetail, GroupMember, GroupOverview, GroupSettlement, MIN_PASSWORD_LEN, MemberBalance,
    MemberRole, ParticipantShare, RecentGroupExpense,
};
pub use settlement::{
    SETTLEMENT_TOLERANCE, Transfer, reduce_to_transfers, reduce_to_transfers_with_tolerance,
};
pub use split::equal_split;

mod commands;
mod currency;
mod error;
mod expense_shares;
mod expenses;
mod group_members;
mod groups;
mod ledger;
mod money;
mod ops;
mod settlement;
mod split;
mod users;
mod util;

pub type MemberId = i64;
pub type GroupId = i64;
pub type ExpenseId = i64;

pub type ResultEngine<T> = Result<T, EngineError>;
