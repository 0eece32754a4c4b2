use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, GroupId, Member, MemberId, ResultEngine, group_members, groups, users,
    util::validate_id,
};

use super::Engine;

/// Role of a member inside a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// Created the group; manages its members.
    Owner,
    Member,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }

    pub(super) fn can_manage(self) -> bool {
        matches!(self, Self::Owner)
    }
}

impl TryFrom<&str> for MemberRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "owner" => Ok(Self::Owner),
            "member" => Ok(Self::Member),
            other => Err(EngineError::InvalidInput(format!(
                "invalid member role: {other}"
            ))),
        }
    }
}

impl Engine {
    pub(super) async fn find_group(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
    ) -> ResultEngine<Option<groups::Model>> {
        groups::Entity::find_by_id(group_id)
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
    ) -> ResultEngine<groups::Model> {
        validate_id(group_id, "group")?;
        self.find_group(db, group_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    pub(super) async fn membership_role(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
        member_id: MemberId,
    ) -> ResultEngine<Option<MemberRole>> {
        let row = group_members::Entity::find_by_id((group_id, member_id))
            .one(db)
            .await?;
        row.as_ref()
            .map(|m| MemberRole::try_from(m.role.as_str()))
            .transpose()
    }

    /// Membership check used before any group-scoped read or write.
    pub(super) async fn is_member(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
        member_id: MemberId,
    ) -> ResultEngine<bool> {
        Ok(self
            .membership_role(db, group_id, member_id)
            .await?
            .is_some())
    }

    /// Fails with `KeyNotFound` when the group is missing and with `Forbidden`
    /// when `member_id` does not belong to it.
    pub(super) async fn require_membership(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
        member_id: MemberId,
    ) -> ResultEngine<groups::Model> {
        let group = self.require_group(db, group_id).await?;
        if !self.is_member(db, group_id, member_id).await? {
            return Err(EngineError::Forbidden(format!(
                "not a member of group {group_id}"
            )));
        }
        Ok(group)
    }

    pub(super) async fn require_group_manager(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
        member_id: MemberId,
    ) -> ResultEngine<groups::Model> {
        let group = self.require_group(db, group_id).await?;
        let role = self
            .membership_role(db, group_id, member_id)
            .await?
            .ok_or_else(|| EngineError::Forbidden(format!("not a member of group {group_id}")))?;
        if !role.can_manage() {
            return Err(EngineError::Forbidden(
                "only the group owner can manage members".to_string(),
            ));
        }
        Ok(group)
    }

    pub(super) async fn require_member_exists(
        &self,
        db: &DatabaseTransaction,
        member_id: MemberId,
    ) -> ResultEngine<Member> {
        validate_id(member_id, "member")?;
        users::Entity::find_by_id(member_id)
            .one(db)
            .await?
            .map(Member::from)
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))
    }

    /// Every id must belong to a current member of the group.
    pub(super) async fn require_all_members(
        &self,
        db: &DatabaseTransaction,
        group_id: GroupId,
        member_ids: &[MemberId],
    ) -> ResultEngine<()> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id))
            .filter(group_members::Column::UserId.is_in(member_ids.iter().copied()))
            .all(db)
            .await?;
        for id in member_ids {
            if !rows.iter().any(|r| r.user_id == *id) {
                return Err(EngineError::InvalidInput(format!(
                    "member {id} does not belong to group {group_id}"
                )));
            }
        }
        Ok(())
    }

    /// Ensures the requester may only query their own member-level balances.
    pub(super) fn require_self(&self, requester: MemberId, member: MemberId) -> ResultEngine<()> {
        validate_id(member, "member")?;
        if requester != member {
            return Err(EngineError::Forbidden(
                "balances of other members are not visible".to_string(),
            ));
        }
        Ok(())
    }
}
