use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Expense, ExpenseId, GroupExpenseCmd, GroupId, Member, MemberId, MoneyCents,
    PersonalExpenseCmd, ResultEngine, UpdateExpenseCmd, expense_shares, expenses,
    split::equal_split,
    util::{normalize_required_text, validate_id, validate_ids},
};

use super::{Engine, ExpenseFilter, ShareFilter};

/// Default number of rows returned by [`Engine::recent_expenses`].
pub const DEFAULT_RECENT_LIMIT: u64 = 5;
const MAX_RECENT_LIMIT: u64 = 100;

/// A participant of an expense with the portion they owe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantShare {
    pub member: Member,
    pub amount: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDetail {
    pub expense: Expense,
    pub shares: Vec<ParticipantShare>,
}

impl Engine {
    /// Records an expense in a group, split equally among `participants`.
    ///
    /// The requester, the payer and every participant must be current members
    /// of the group.
    pub async fn create_group_expense(&self, cmd: GroupExpenseCmd) -> ResultEngine<ExpenseDetail> {
        let description = normalize_required_text(&cmd.description, "description")?;
        validate_id(cmd.payer_id, "payer")?;
        validate_ids(&cmd.participants, "participant")?;
        let split = equal_split(cmd.total, &cmd.participants)?;

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine
                    .require_membership(db_tx, cmd.group_id, cmd.requester_id)
                    .await?;
                engine
                    .require_all_members(db_tx, cmd.group_id, &[cmd.payer_id])
                    .await?;
                engine
                    .require_all_members(db_tx, cmd.group_id, &cmd.participants)
                    .await?;

                let now = Utc::now();
                let model = expenses::ActiveModel {
                    group_id: ActiveValue::Set(Some(cmd.group_id)),
                    payer_id: ActiveValue::Set(cmd.payer_id),
                    description: ActiveValue::Set(description),
                    total_minor: ActiveValue::Set(cmd.total.cents()),
                    currency: ActiveValue::Set(cmd.currency.code().to_string()),
                    occurred_at: ActiveValue::Set(cmd.occurred_at),
                    created_at: ActiveValue::Set(now),
                    ..Default::default()
                }
                .insert(db_tx)
                .await?;

                engine.insert_shares(db_tx, model.id, &split).await?;
                engine.touch_group(db_tx, cmd.group_id).await?;
                engine.expense_detail(db_tx, model).await
            })
        })
        .await
    }

    /// Records an expense outside any group, paid by the requester.
    ///
    /// With no participants the payer carries the whole amount.
    pub async fn create_personal_expense(
        &self,
        cmd: PersonalExpenseCmd,
    ) -> ResultEngine<ExpenseDetail> {
        let description = normalize_required_text(&cmd.description, "description")?;
        let participants = if cmd.participants.is_empty() {
            vec![cmd.requester_id]
        } else {
            cmd.participants
        };
        validate_ids(&participants, "participant")?;
        let split = equal_split(cmd.total, &participants)?;

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, cmd.requester_id).await?;
                engine.require_members_exist(db_tx, &participants).await?;

                let model = expenses::ActiveModel {
                    group_id: ActiveValue::Set(None),
                    payer_id: ActiveValue::Set(cmd.requester_id),
                    description: ActiveValue::Set(description),
                    total_minor: ActiveValue::Set(cmd.total.cents()),
                    currency: ActiveValue::Set(cmd.currency.code().to_string()),
                    occurred_at: ActiveValue::Set(cmd.occurred_at),
                    created_at: ActiveValue::Set(Utc::now()),
                    ..Default::default()
                }
                .insert(db_tx)
                .await?;

                engine.insert_shares(db_tx, model.id, &split).await?;
                engine.expense_detail(db_tx, model).await
            })
        })
        .await
    }

    /// Replaces description, total, payer and participants of an expense and
    /// recomputes its shares.
    ///
    /// Group expenses can be edited by any member of the group. Personal
    /// expenses only by their payer, who cannot be changed.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<ExpenseDetail> {
        let description = normalize_required_text(&cmd.description, "description")?;
        validate_id(cmd.payer_id, "payer")?;
        validate_ids(&cmd.participants, "participant")?;
        let split = equal_split(cmd.total, &cmd.participants)?;

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let current = engine
                    .require_expense_write(db_tx, cmd.expense_id, cmd.requester_id)
                    .await?;

                match current.group_id {
                    Some(group_id) => {
                        engine
                            .require_all_members(db_tx, group_id, &[cmd.payer_id])
                            .await?;
                        engine
                            .require_all_members(db_tx, group_id, &cmd.participants)
                            .await?;
                    }
                    None => {
                        if cmd.payer_id != current.payer_id {
                            return Err(EngineError::InvalidInput(
                                "the payer of a personal expense cannot change".to_string(),
                            ));
                        }
                        engine
                            .require_members_exist(db_tx, &cmd.participants)
                            .await?;
                    }
                }

                let mut active: expenses::ActiveModel = current.into();
                active.description = ActiveValue::Set(description);
                active.total_minor = ActiveValue::Set(cmd.total.cents());
                active.payer_id = ActiveValue::Set(cmd.payer_id);
                if let Some(occurred_at) = cmd.occurred_at {
                    active.occurred_at = ActiveValue::Set(occurred_at);
                }
                let model = active.update(db_tx).await?;

                expense_shares::Entity::delete_many()
                    .filter(expense_shares::Column::ExpenseId.eq(model.id))
                    .exec(db_tx)
                    .await?;
                engine.insert_shares(db_tx, model.id, &split).await?;

                if let Some(group_id) = model.group_id {
                    engine.touch_group(db_tx, group_id).await?;
                }
                engine.expense_detail(db_tx, model).await
            })
        })
        .await
    }

    /// Deletes an expense and its shares.
    pub async fn delete_expense(
        &self,
        expense_id: ExpenseId,
        requester_id: MemberId,
    ) -> ResultEngine<()> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let model = engine
                    .require_expense_write(db_tx, expense_id, requester_id)
                    .await?;
                engine.remove_expense(db_tx, model).await
            })
        })
        .await
    }

    /// Deletes a personal expense. Group expenses are not found through here.
    pub async fn delete_personal_expense(
        &self,
        expense_id: ExpenseId,
        requester_id: MemberId,
    ) -> ResultEngine<()> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let model = engine
                    .require_expense_write(db_tx, expense_id, requester_id)
                    .await?;
                if model.group_id.is_some() {
                    return Err(EngineError::KeyNotFound(
                        "personal expense not exists".to_string(),
                    ));
                }
                engine.remove_expense(db_tx, model).await
            })
        })
        .await
    }

    /// Expenses paid by the member in any scope, newest first.
    pub async fn list_expenses_paid_by(&self, member_id: MemberId) -> ResultEngine<Vec<Expense>> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, member_id).await?;
                let mut expenses = engine
                    .list_expenses(db_tx, ExpenseFilter::PaidBy(member_id))
                    .await?;
                expenses.reverse();
                Ok(expenses)
            })
        })
        .await
    }

    /// Expenses of a group with their shares, newest first.
    pub async fn list_group_expenses(
        &self,
        group_id: GroupId,
        requester_id: MemberId,
    ) -> ResultEngine<Vec<ExpenseDetail>> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine
                    .require_membership(db_tx, group_id, requester_id)
                    .await?;
                let models = engine
                    .list_expense_models(db_tx, ExpenseFilter::Group(group_id))
                    .await?;
                engine.expense_details(db_tx, models).await
            })
        })
        .await
    }

    /// Personal expenses the member paid or takes part in, newest first.
    pub async fn list_personal_expenses(
        &self,
        member_id: MemberId,
    ) -> ResultEngine<Vec<ExpenseDetail>> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, member_id).await?;
                let models = engine
                    .list_expense_models(db_tx, ExpenseFilter::PersonalInvolving(member_id))
                    .await?;
                engine.expense_details(db_tx, models).await
            })
        })
        .await
    }

    /// Latest expenses involving the member across every scope.
    ///
    /// `limit` must be between 1 and 100.
    pub async fn recent_expenses(
        &self,
        member_id: MemberId,
        limit: u64,
    ) -> ResultEngine<Vec<Expense>> {
        if limit == 0 || limit > MAX_RECENT_LIMIT {
            return Err(EngineError::InvalidInput(format!(
                "limit must be between 1 and {MAX_RECENT_LIMIT}"
            )));
        }

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, member_id).await?;
                engine
                    .latest_expenses(db_tx, ExpenseFilter::Involving(member_id), limit)
                    .await
            })
        })
        .await
    }

    pub async fn expense(
        &self,
        expense_id: ExpenseId,
        requester_id: MemberId,
    ) -> ResultEngine<ExpenseDetail> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let model = engine
                    .require_expense_read(db_tx, expense_id, requester_id)
                    .await?;
                engine.expense_detail(db_tx, model).await
            })
        })
        .await
    }

    /// Participants of an expense with their shares.
    pub async fn expense_participants(
        &self,
        expense_id: ExpenseId,
        requester_id: MemberId,
    ) -> ResultEngine<Vec<ParticipantShare>> {
        self.expense(expense_id, requester_id)
            .await
            .map(|detail| detail.shares)
    }

    /// Group expenses are visible to group members. Personal expenses are
    /// visible to their payer and participants; to anyone else they do not
    /// exist.
    async fn require_expense_read(
        &self,
        db: &DatabaseTransaction,
        expense_id: ExpenseId,
        requester_id: MemberId,
    ) -> ResultEngine<expenses::Model> {
        validate_id(expense_id, "expense")?;
        let not_found = || EngineError::KeyNotFound("expense not exists".to_string());
        let model = expenses::Entity::find_by_id(expense_id)
            .one(db)
            .await?
            .ok_or_else(not_found)?;

        match model.group_id {
            Some(group_id) => {
                self.require_membership(db, group_id, requester_id).await?;
            }
            None if model.payer_id == requester_id => {}
            None => {
                let share = expense_shares::Entity::find()
                    .filter(expense_shares::Column::ExpenseId.eq(expense_id))
                    .filter(expense_shares::Column::UserId.eq(requester_id))
                    .one(db)
                    .await?;
                if share.is_none() {
                    return Err(not_found());
                }
            }
        }
        Ok(model)
    }

    async fn require_expense_write(
        &self,
        db: &DatabaseTransaction,
        expense_id: ExpenseId,
        requester_id: MemberId,
    ) -> ResultEngine<expenses::Model> {
        let model = self
            .require_expense_read(db, expense_id, requester_id)
            .await?;
        if model.group_id.is_none() && model.payer_id != requester_id {
            return Err(EngineError::Forbidden(
                "only the payer can modify a personal expense".to_string(),
            ));
        }
        Ok(model)
    }

    async fn require_members_exist(
        &self,
        db: &DatabaseTransaction,
        member_ids: &[MemberId],
    ) -> ResultEngine<()> {
        let found = self.list_members_by_id(db, member_ids).await?;
        for id in member_ids {
            if !found.iter().any(|m| m.id == *id) {
                return Err(EngineError::KeyNotFound(format!(
                    "member {id} not exists"
                )));
            }
        }
        Ok(())
    }

    async fn insert_shares(
        &self,
        db: &DatabaseTransaction,
        expense_id: ExpenseId,
        split: &[(MemberId, MoneyCents)],
    ) -> ResultEngine<()> {
        let rows = split.iter().map(|(member, amount)| expense_shares::ActiveModel {
            expense_id: ActiveValue::Set(expense_id),
            user_id: ActiveValue::Set(*member),
            amount_minor: ActiveValue::Set(amount.cents()),
            ..Default::default()
        });
        expense_shares::Entity::insert_many(rows).exec(db).await?;
        Ok(())
    }

    async fn remove_expense(
        &self,
        db: &DatabaseTransaction,
        model: expenses::Model,
    ) -> ResultEngine<()> {
        expense_shares::Entity::delete_many()
            .filter(expense_shares::Column::ExpenseId.eq(model.id))
            .exec(db)
            .await?;
        expenses::Entity::delete_by_id(model.id).exec(db).await?;
        if let Some(group_id) = model.group_id {
            self.touch_group(db, group_id).await?;
        }
        Ok(())
    }

    async fn expense_detail(
        &self,
        db: &DatabaseTransaction,
        model: expenses::Model,
    ) -> ResultEngine<ExpenseDetail> {
        let mut details = self.expense_details(db, vec![model]).await?;
        details
            .pop()
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    /// Attaches shares and participant profiles. Output is newest first.
    async fn expense_details(
        &self,
        db: &DatabaseTransaction,
        models: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<ExpenseDetail>> {
        let ids: Vec<ExpenseId> = models.iter().map(|m| m.id).collect();
        let all_shares = self.list_shares(db, ShareFilter::Expenses(&ids)).await?;
        let mut member_ids: Vec<MemberId> = all_shares.iter().map(|s| s.member).collect();
        member_ids.sort_unstable();
        member_ids.dedup();
        let members = self.list_members_by_id(db, &member_ids).await?;

        let mut details = Vec::with_capacity(models.len());
        for model in models.into_iter().rev() {
            let expense = Expense::try_from(model)?;
            let shares = all_shares
                .iter()
                .filter(|s| s.expense_id == expense.id)
                .map(|share| {
                    members
                        .iter()
                        .find(|m| m.id == share.member)
                        .map(|member| ParticipantShare {
                            member: member.clone(),
                            amount: share.amount,
                        })
                        .ok_or_else(|| {
                            EngineError::Inconsistent(format!(
                                "share of expense {} references unknown member {}",
                                expense.id, share.member
                            ))
                        })
                })
                .collect::<ResultEngine<Vec<_>>>()?;
            details.push(ExpenseDetail { expense, shares });
        }
        Ok(details)
    }
}
