//! Balance queries.
//!
//! Each query loads the ledger rows of its scope inside one transaction and
//! hands them to [`crate::Ledger`]; nothing computed here is persisted.

use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ExpenseScope, Group, GroupId, Member, MemberId, MoneyCents, NetPosition,
    ResultEngine, Transfer, settlement::reduce_to_transfers, util::validate_id,
};

use super::{Engine, ExpenseFilter};

/// Portion of the ledger a balance is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalanceScope {
    /// Every expense the member paid or shares, in any scope.
    Overall { member: MemberId },
    /// Expenses outside any group.
    Personal { member: MemberId },
    /// One position per group the member belongs to.
    AllGroupsFor { member: MemberId },
    /// One position per member of the group.
    Group { group: GroupId },
    GroupMember { group: GroupId, member: MemberId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum BalanceReport {
    Position(NetPosition),
    Members(Vec<MemberBalance>),
    Groups(Vec<GroupBalance>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub member: Member,
    pub position: NetPosition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalance {
    pub group: Group,
    pub position: NetPosition,
}

/// Positions of every member of a group and the transfers that settle them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettlement {
    pub group_id: GroupId,
    pub balances: Vec<MemberBalance>,
    pub transfers: Vec<Transfer>,
}

/// Net between the requester and one other member, across all scopes.
///
/// Positive: the other member owes the requester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartyView {
    pub member: Member,
    pub net: MoneyCents,
}

impl Engine {
    /// Computes the balances of `scope` on behalf of `requester`.
    ///
    /// Member-level scopes are only visible to the member themselves. Group
    /// scopes require the requester to belong to the group.
    pub async fn compute_balances(
        &self,
        requester: MemberId,
        scope: BalanceScope,
    ) -> ResultEngine<BalanceReport> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                match scope {
                    BalanceScope::Overall { member } => engine
                        .overall_position(db_tx, requester, member)
                        .await
                        .map(BalanceReport::Position),
                    BalanceScope::Personal { member } => engine
                        .personal_position(db_tx, requester, member)
                        .await
                        .map(BalanceReport::Position),
                    BalanceScope::AllGroupsFor { member } => engine
                        .group_positions_for(db_tx, requester, member)
                        .await
                        .map(BalanceReport::Groups),
                    BalanceScope::Group { group } => engine
                        .group_member_balances(db_tx, group, requester)
                        .await
                        .map(BalanceReport::Members),
                    BalanceScope::GroupMember { group, member } => engine
                        .group_member_position(db_tx, group, member, requester)
                        .await
                        .map(BalanceReport::Position),
                }
            })
        })
        .await
    }

    /// Position of the member across every scope.
    pub async fn overall_balance(&self, member: MemberId) -> ResultEngine<NetPosition> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move { engine.overall_position(db_tx, member, member).await })
        })
        .await
    }

    /// Position of the member over personal expenses only.
    pub async fn personal_balance(&self, member: MemberId) -> ResultEngine<NetPosition> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move { engine.personal_position(db_tx, member, member).await })
        })
        .await
    }

    /// One position per group the member belongs to, most recently updated
    /// group first.
    pub async fn group_summaries(&self, member: MemberId) -> ResultEngine<Vec<GroupBalance>> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move { engine.group_positions_for(db_tx, member, member).await })
        })
        .await
    }

    /// Positions of every member of the group.
    ///
    /// Former members that still appear in the group's expenses are listed
    /// after the current ones, so the positions always sum to zero.
    pub async fn group_balances(
        &self,
        group: GroupId,
        requester: MemberId,
    ) -> ResultEngine<Vec<MemberBalance>> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine
                    .group_member_balances(db_tx, group, requester)
                    .await
            })
        })
        .await
    }

    pub async fn member_balance_in_group(
        &self,
        group: GroupId,
        member: MemberId,
        requester: MemberId,
    ) -> ResultEngine<NetPosition> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine
                    .group_member_position(db_tx, group, member, requester)
                    .await
            })
        })
        .await
    }

    /// Group positions plus the transfers that settle them.
    pub async fn group_settlement(
        &self,
        group: GroupId,
        requester: MemberId,
    ) -> ResultEngine<GroupSettlement> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let balances = engine
                    .group_member_balances(db_tx, group, requester)
                    .await?;
                let positions: Vec<NetPosition> = balances.iter().map(|b| b.position).collect();
                let transfers = reduce_to_transfers(&positions)?;
                Ok(GroupSettlement {
                    group_id: group,
                    balances,
                    transfers,
                })
            })
        })
        .await
    }

    /// Pairwise nets between the member and everyone they share expenses
    /// with, ordered by counterparty id.
    pub async fn counterparty_balances(
        &self,
        member: MemberId,
    ) -> ResultEngine<Vec<CounterpartyView>> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, member).await?;
                let ledger = engine
                    .load_ledger(db_tx, ExpenseFilter::Involving(member))
                    .await?;
                let nets = ledger.counterparties_of(member);
                let ids: Vec<MemberId> = nets.iter().map(|c| c.counterparty).collect();
                let profiles = engine.list_members_by_id(db_tx, &ids).await?;

                nets.into_iter()
                    .map(|c| {
                        profiles
                            .iter()
                            .find(|m| m.id == c.counterparty)
                            .map(|m| CounterpartyView {
                                member: m.clone(),
                                net: c.net,
                            })
                            .ok_or_else(|| {
                                EngineError::Inconsistent(format!(
                                    "counterparty {} has no profile",
                                    c.counterparty
                                ))
                            })
                    })
                    .collect()
            })
        })
        .await
    }

    async fn overall_position(
        &self,
        db: &DatabaseTransaction,
        requester: MemberId,
        member: MemberId,
    ) -> ResultEngine<NetPosition> {
        self.require_self(requester, member)?;
        self.require_member_exists(db, member).await?;
        let ledger = self
            .load_ledger(db, ExpenseFilter::Involving(member))
            .await?;
        Ok(ledger.position_of(member))
    }

    async fn personal_position(
        &self,
        db: &DatabaseTransaction,
        requester: MemberId,
        member: MemberId,
    ) -> ResultEngine<NetPosition> {
        self.require_self(requester, member)?;
        self.require_member_exists(db, member).await?;
        let ledger = self
            .load_ledger(db, ExpenseFilter::PersonalInvolving(member))
            .await?;
        Ok(ledger.position_within(member, ExpenseScope::Personal))
    }

    async fn group_positions_for(
        &self,
        db: &DatabaseTransaction,
        requester: MemberId,
        member: MemberId,
    ) -> ResultEngine<Vec<GroupBalance>> {
        self.require_self(requester, member)?;
        self.require_member_exists(db, member).await?;
        let groups = self.member_group_models(db, member).await?;
        let ledger = self
            .load_ledger(db, ExpenseFilter::Involving(member))
            .await?;

        Ok(groups
            .into_iter()
            .map(|model| {
                let position = ledger.position_within(member, ExpenseScope::Group(model.id));
                GroupBalance {
                    group: Group::from(model),
                    position,
                }
            })
            .collect())
    }

    /// One balance per current member, then per former member still present
    /// in the group's expenses.
    async fn group_member_balances(
        &self,
        db: &DatabaseTransaction,
        group: GroupId,
        requester: MemberId,
    ) -> ResultEngine<Vec<MemberBalance>> {
        self.require_membership(db, group, requester).await?;
        let ledger = self.load_ledger(db, ExpenseFilter::Group(group)).await?;

        let mut members: Vec<Member> = self
            .list_group_members(db, group)
            .await?
            .into_iter()
            .map(|gm| gm.member)
            .collect();
        let former: Vec<MemberId> = ledger
            .participants()
            .into_iter()
            .filter(|id| !members.iter().any(|m| m.id == *id))
            .collect();
        if !former.is_empty() {
            members.extend(self.list_members_by_id(db, &former).await?);
        }

        Ok(members
            .into_iter()
            .map(|member| MemberBalance {
                position: ledger.position_of(member.id),
                member,
            })
            .collect())
    }

    async fn group_member_position(
        &self,
        db: &DatabaseTransaction,
        group: GroupId,
        member: MemberId,
        requester: MemberId,
    ) -> ResultEngine<NetPosition> {
        self.require_membership(db, group, requester).await?;
        validate_id(member, "member")?;
        let ledger = self.load_ledger(db, ExpenseFilter::Group(group)).await?;
        if !self.is_member(db, group, member).await? && !ledger.participants().contains(&member) {
            return Err(EngineError::KeyNotFound(
                "member not exists in group".to_string(),
            ));
        }
        Ok(ledger.position_of(member))
    }
}
