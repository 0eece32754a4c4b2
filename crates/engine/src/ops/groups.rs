use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, JoinType, QueryFilter, QueryOrder, QuerySelect, prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Group, GroupId, Member, MemberId, ResultEngine, group_members, groups,
    util::{normalize_required_text, validate_id},
};

use super::{Engine, MemberRole};

/// A member of a group with their role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub member: Member,
    pub role: MemberRole,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDetail {
    pub group: Group,
    pub members: Vec<GroupMember>,
}

impl Engine {
    /// Creates a group. The creator becomes its owner.
    pub async fn create_group(&self, name: &str, creator_id: MemberId) -> ResultEngine<Group> {
        let name = normalize_required_text(name, "group name")?;
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, creator_id).await?;

                let now = Utc::now();
                let group = groups::ActiveModel {
                    name: ActiveValue::Set(name),
                    owner_id: ActiveValue::Set(creator_id),
                    created_at: ActiveValue::Set(now),
                    updated_at: ActiveValue::Set(now),
                    ..Default::default()
                }
                .insert(db_tx)
                .await?;

                group_members::ActiveModel {
                    group_id: ActiveValue::Set(group.id),
                    user_id: ActiveValue::Set(creator_id),
                    role: ActiveValue::Set(MemberRole::Owner.as_str().to_string()),
                    added_at: ActiveValue::Set(now),
                }
                .insert(db_tx)
                .await?;

                Ok(Group::from(group))
            })
        })
        .await
    }

    /// Groups the member belongs to, most recently updated first.
    pub async fn list_groups_for(&self, member_id: MemberId) -> ResultEngine<Vec<Group>> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, member_id).await?;
                let models = engine.member_group_models(db_tx, member_id).await?;
                Ok(models.into_iter().map(Group::from).collect())
            })
        })
        .await
    }

    /// Group with its members; the requester must belong to it.
    pub async fn group_detail(
        &self,
        group_id: GroupId,
        requester_id: MemberId,
    ) -> ResultEngine<GroupDetail> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine
                    .require_membership(db_tx, group_id, requester_id)
                    .await?;
                let members = engine.list_group_members(db_tx, group_id).await?;
                Ok(GroupDetail {
                    group: Group::from(group),
                    members,
                })
            })
        })
        .await
    }

    /// Adds a member to a group (owner-only). Adding an existing member is a
    /// no-op.
    pub async fn add_group_member(
        &self,
        group_id: GroupId,
        member_id: MemberId,
        requester_id: MemberId,
    ) -> ResultEngine<()> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine
                    .require_group_manager(db_tx, group_id, requester_id)
                    .await?;
                engine.require_member_exists(db_tx, member_id).await?;

                if engine.is_member(db_tx, group_id, member_id).await? {
                    return Ok(());
                }

                group_members::ActiveModel {
                    group_id: ActiveValue::Set(group_id),
                    user_id: ActiveValue::Set(member_id),
                    role: ActiveValue::Set(MemberRole::Member.as_str().to_string()),
                    added_at: ActiveValue::Set(Utc::now()),
                }
                .insert(db_tx)
                .await?;

                engine.touch_group(db_tx, group_id).await
            })
        })
        .await
    }

    /// Removes a member from a group (owner-only). The owner cannot be
    /// removed. Expenses involving the removed member stay in the group.
    pub async fn remove_group_member(
        &self,
        group_id: GroupId,
        member_id: MemberId,
        requester_id: MemberId,
    ) -> ResultEngine<()> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let group = engine
                    .require_group_manager(db_tx, group_id, requester_id)
                    .await?;
                validate_id(member_id, "member")?;
                if member_id == group.owner_id {
                    return Err(EngineError::InvalidInput(
                        "cannot remove the group owner".to_string(),
                    ));
                }

                let result = group_members::Entity::delete_by_id((group_id, member_id))
                    .exec(db_tx)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(EngineError::KeyNotFound(
                        "group member not exists".to_string(),
                    ));
                }

                engine.touch_group(db_tx, group_id).await
            })
        })
        .await
    }

    pub(super) async fn member_group_models(
        &self,
        db: &DatabaseTransaction,
        member_id: MemberId,
    ) -> ResultEngine<Vec<groups::Model>> {
        groups::Entity::find()
            .join(JoinType::InnerJoin, groups::Relation::GroupMembers.def())
            .filter(group_members::Column::UserId.eq(member_id))
            .order_by_desc(groups::Column::UpdatedAt)
            .order_by_asc(groups::Column::Id)
            .all(db)
            .await
            .map_err(Into::into)
    }

    /// Bumps `updated_at` after any change to the group or its expenses.
    pub(super) async fn touch_group(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
    ) -> ResultEngine<()> {
        groups::ActiveModel {
            id: ActiveValue::Unchanged(group_id),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .update(db)
        .await?;
        Ok(())
    }
}
