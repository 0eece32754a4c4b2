//! Ledger rows read from the database.
//!
//! The balance operations only consume what these readers return: expenses
//! selected by a filter, the shares of those expenses and the members of a
//! group.

use sea_orm::{Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{
    Expense, ExpenseId, GroupId, Ledger, Member, MemberId, ResultEngine, Share, expense_shares,
    expenses, group_members, users,
};

use super::{Engine, GroupMember, MemberRole};

/// Selects expenses from the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpenseFilter {
    /// Expenses paid by the member, in any scope.
    PaidBy(MemberId),
    /// Expenses of one group.
    Group(GroupId),
    /// Expenses the member paid or holds a share in, in any scope.
    Involving(MemberId),
    /// Personal (group-less) expenses the member paid or holds a share in.
    PersonalInvolving(MemberId),
    /// Expenses of every group the member currently belongs to.
    GroupsOf(MemberId),
}

/// Selects shares from the ledger.
#[derive(Clone, Copy, Debug)]
pub enum ShareFilter<'a> {
    Expenses(&'a [ExpenseId]),
    Member(MemberId),
}

impl Engine {
    pub(super) async fn list_expense_models(
        &self,
        db: &DatabaseTransaction,
        filter: ExpenseFilter,
    ) -> ResultEngine<Vec<expenses::Model>> {
        expenses::Entity::find()
            .filter(self.expense_condition(db, filter).await?)
            .order_by_asc(expenses::Column::OccurredAt)
            .order_by_asc(expenses::Column::Id)
            .all(db)
            .await
            .map_err(Into::into)
    }

    /// The `limit` newest expenses selected by `filter`, newest first.
    pub(super) async fn latest_expenses(
        &self,
        db: &DatabaseTransaction,
        filter: ExpenseFilter,
        limit: u64,
    ) -> ResultEngine<Vec<Expense>> {
        expenses::Entity::find()
            .filter(self.expense_condition(db, filter).await?)
            .order_by_desc(expenses::Column::OccurredAt)
            .order_by_desc(expenses::Column::Id)
            .limit(limit)
            .all(db)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect()
    }

    async fn expense_condition(
        &self,
        db: &DatabaseTransaction,
        filter: ExpenseFilter,
    ) -> ResultEngine<Condition> {
        Ok(match filter {
            ExpenseFilter::PaidBy(member) => {
                Condition::all().add(expenses::Column::PayerId.eq(member))
            }
            ExpenseFilter::Group(group) => {
                Condition::all().add(expenses::Column::GroupId.eq(group))
            }
            ExpenseFilter::Involving(member) => self.involving(db, member).await?,
            ExpenseFilter::PersonalInvolving(member) => Condition::all()
                .add(expenses::Column::GroupId.is_null())
                .add(self.involving(db, member).await?),
            ExpenseFilter::GroupsOf(member) => {
                let groups: Vec<GroupId> = group_members::Entity::find()
                    .filter(group_members::Column::UserId.eq(member))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|m| m.group_id)
                    .collect();
                Condition::all().add(expenses::Column::GroupId.is_in(groups))
            }
        })
    }

    async fn involving(
        &self,
        db: &DatabaseTransaction,
        member: MemberId,
    ) -> ResultEngine<Condition> {
        let shared: Vec<ExpenseId> = self
            .list_shares(db, ShareFilter::Member(member))
            .await?
            .into_iter()
            .map(|s| s.expense_id)
            .collect();
        Ok(Condition::any()
            .add(expenses::Column::PayerId.eq(member))
            .add(expenses::Column::Id.is_in(shared)))
    }

    pub(super) async fn list_expenses(
        &self,
        db: &DatabaseTransaction,
        filter: ExpenseFilter,
    ) -> ResultEngine<Vec<Expense>> {
        self.list_expense_models(db, filter)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect()
    }

    pub(super) async fn list_shares(
        &self,
        db: &DatabaseTransaction,
        filter: ShareFilter<'_>,
    ) -> ResultEngine<Vec<Share>> {
        let query = match filter {
            ShareFilter::Expenses(ids) => expense_shares::Entity::find()
                .filter(expense_shares::Column::ExpenseId.is_in(ids.iter().copied())),
            ShareFilter::Member(member) => expense_shares::Entity::find()
                .filter(expense_shares::Column::UserId.eq(member)),
        };
        Ok(query
            .order_by_asc(expense_shares::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Share::from)
            .collect())
    }

    /// Current members of a group, oldest membership first.
    pub(super) async fn list_group_members(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
    ) -> ResultEngine<Vec<GroupMember>> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id))
            .find_also_related(users::Entity)
            .order_by_asc(group_members::Column::AddedAt)
            .order_by_asc(group_members::Column::UserId)
            .all(db)
            .await?;

        rows.into_iter()
            .filter_map(|(membership, user)| user.map(|user| (membership, user)))
            .map(|(membership, user)| {
                Ok(GroupMember {
                    member: Member::from(user),
                    role: MemberRole::try_from(membership.role.as_str())?,
                    added_at: membership.added_at,
                })
            })
            .collect()
    }

    pub(super) async fn list_members_by_id(
        &self,
        db: &DatabaseTransaction,
        ids: &[MemberId],
    ) -> ResultEngine<Vec<Member>> {
        Ok(users::Entity::find()
            .filter(users::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(users::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Member::from)
            .collect())
    }

    /// Loads the expenses selected by `filter` together with all of their
    /// shares.
    pub(super) async fn load_ledger(
        &self,
        db: &DatabaseTransaction,
        filter: ExpenseFilter,
    ) -> ResultEngine<Ledger> {
        let expenses = self.list_expenses(db, filter).await?;
        let ids: Vec<ExpenseId> = expenses.iter().map(|e| e.id).collect();
        let shares = self.list_shares(db, ShareFilter::Expenses(&ids)).await?;
        Ledger::new(expenses, shares)
    }
}
