use serde::{Deserialize, Serialize};

use crate::{Expense, Group, Member, MemberId, MoneyCents, NetPosition, ResultEngine};

use super::{Engine, ExpenseFilter};

/// Number of group expenses listed in [`Dashboard::recent`].
pub const DASHBOARD_RECENT_LIMIT: u64 = 10;

/// One of the member's groups with its size and latest expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOverview {
    pub group: Group,
    pub members_count: usize,
    pub last_expense: Option<Expense>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentGroupExpense {
    pub expense: Expense,
    pub payer: Member,
}

/// Summary of the member's current groups.
///
/// Only expenses of groups the member still belongs to are counted.
/// Personal expenses are left out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Sum of the totals the member paid in those groups.
    pub total_paid: MoneyCents,
    pub active_groups: usize,
    pub position: NetPosition,
    /// Same order as [`Engine::list_groups_for`].
    pub groups: Vec<GroupOverview>,
    /// Newest first.
    pub recent: Vec<RecentGroupExpense>,
}

impl Engine {
    pub async fn dashboard(&self, member_id: MemberId) -> ResultEngine<Dashboard> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, member_id).await?;

                let ledger = engine
                    .load_ledger(db_tx, ExpenseFilter::GroupsOf(member_id))
                    .await?;
                let position = ledger.position_of(member_id);

                let models = engine.member_group_models(db_tx, member_id).await?;
                let mut groups = Vec::with_capacity(models.len());
                for model in models {
                    let members_count = engine.list_group_members(db_tx, model.id).await?.len();
                    let last_expense = engine
                        .latest_expenses(db_tx, ExpenseFilter::Group(model.id), 1)
                        .await?
                        .into_iter()
                        .next();
                    groups.push(GroupOverview {
                        group: Group::from(model),
                        members_count,
                        last_expense,
                    });
                }

                let latest = engine
                    .latest_expenses(
                        db_tx,
                        ExpenseFilter::GroupsOf(member_id),
                        DASHBOARD_RECENT_LIMIT,
                    )
                    .await?;
                let mut payer_ids: Vec<MemberId> = latest.iter().map(|e| e.payer).collect();
                payer_ids.sort_unstable();
                payer_ids.dedup();
                let payers = engine.list_members_by_id(db_tx, &payer_ids).await?;
                let recent = latest
                    .into_iter()
                    .filter_map(|expense| {
                        let payer = payers.iter().find(|m| m.id == expense.payer)?.clone();
                        Some(RecentGroupExpense { expense, payer })
                    })
                    .collect();

                Ok(Dashboard {
                    total_paid: position.paid,
                    active_groups: groups.len(),
                    position,
                    groups,
                    recent,
                })
            })
        })
        .await
    }
}
