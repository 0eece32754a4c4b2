use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{
    EngineError, Member, MemberId, ResultEngine, group_members, groups, users,
    util::{normalize_optional_text, normalize_required_text, validate_color},
};

use super::{Engine, ExpenseFilter};

/// Color assigned to new members that do not pick one.
pub const DEFAULT_AVATAR_COLOR: &str = "#4f46e5";
/// Shortest password accepted by [`Engine::change_password`].
pub const MIN_PASSWORD_LEN: usize = 6;

impl Engine {
    /// Registers a new member. Usernames are unique.
    pub async fn register_user(
        &self,
        username: &str,
        display_name: &str,
        password: &str,
        avatar_color: Option<&str>,
    ) -> ResultEngine<Member> {
        let username = normalize_required_text(username, "username")?;
        let display_name = normalize_required_text(display_name, "display name")?;
        if password.is_empty() {
            return Err(EngineError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }
        let avatar_color = match normalize_optional_text(avatar_color) {
            Some(color) => validate_color(&color)?,
            None => DEFAULT_AVATAR_COLOR.to_string(),
        };
        let password = password.to_string();

        self.with_tx(|_, db_tx| {
            Box::pin(async move {
                let existing = users::Entity::find()
                    .filter(users::Column::Username.eq(username.as_str()))
                    .one(db_tx)
                    .await?;
                if existing.is_some() {
                    return Err(EngineError::ExistingKey(username));
                }

                let model = users::ActiveModel {
                    username: ActiveValue::Set(username),
                    display_name: ActiveValue::Set(display_name),
                    avatar_color: ActiveValue::Set(avatar_color),
                    password: ActiveValue::Set(password),
                    created_at: ActiveValue::Set(Utc::now()),
                    ..Default::default()
                }
                .insert(db_tx)
                .await?;

                Ok(Member::from(model))
            })
        })
        .await
    }

    /// Returns the member matching the credentials, if any.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> ResultEngine<Option<Member>> {
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.database)
            .await?;
        Ok(user
            .filter(|u| u.password == password)
            .map(Member::from))
    }

    pub async fn member(&self, member_id: MemberId) -> ResultEngine<Member> {
        self.with_tx(|engine, db_tx| {
            Box::pin(async move { engine.require_member_exists(db_tx, member_id).await })
        })
        .await
    }

    pub async fn member_by_username(&self, username: &str) -> ResultEngine<Member> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username.trim()))
            .one(&self.database)
            .await?
            .map(Member::from)
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))
    }

    /// Lists every registered member, ordered by display name.
    pub async fn list_members(&self) -> ResultEngine<Vec<Member>> {
        Ok(users::Entity::find()
            .order_by_asc(users::Column::DisplayName)
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Member::from)
            .collect())
    }

    /// Updates the display name and/or avatar color of a member.
    pub async fn update_profile(
        &self,
        member_id: MemberId,
        display_name: Option<&str>,
        avatar_color: Option<&str>,
    ) -> ResultEngine<Member> {
        let display_name = display_name
            .map(|name| normalize_required_text(name, "display name"))
            .transpose()?;
        let avatar_color = avatar_color.map(validate_color).transpose()?;

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_member_exists(db_tx, member_id).await?;

                let mut active = users::ActiveModel {
                    id: ActiveValue::Unchanged(member_id),
                    ..Default::default()
                };
                if let Some(name) = display_name {
                    active.display_name = ActiveValue::Set(name);
                }
                if let Some(color) = avatar_color {
                    active.avatar_color = ActiveValue::Set(color);
                }
                if active.is_changed() {
                    active.update(db_tx).await?;
                }

                engine.require_member_exists(db_tx, member_id).await
            })
        })
        .await
    }

    /// Replaces the member's password after checking the current one.
    pub async fn change_password(
        &self,
        member_id: MemberId,
        current_password: &str,
        new_password: &str,
    ) -> ResultEngine<()> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(EngineError::InvalidInput(format!(
                "new password must have at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let current_password = current_password.to_string();
        let new_password = new_password.to_string();

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine
                    .require_password(db_tx, member_id, &current_password)
                    .await?;
                users::ActiveModel {
                    id: ActiveValue::Unchanged(member_id),
                    password: ActiveValue::Set(new_password),
                    ..Default::default()
                }
                .update(db_tx)
                .await?;
                Ok(())
            })
        })
        .await
    }

    /// Deletes the member's account.
    ///
    /// Refused while the member paid or holds a share in any expense, or owns
    /// a group that still has other members or expenses. Groups the member
    /// owns alone are deleted with the account; other memberships are
    /// dropped.
    pub async fn delete_account(&self, member_id: MemberId, password: &str) -> ResultEngine<()> {
        let password = password.to_string();

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                engine.require_password(db_tx, member_id, &password).await?;

                let involved = engine
                    .list_expense_models(db_tx, ExpenseFilter::Involving(member_id))
                    .await?;
                if !involved.is_empty() {
                    return Err(EngineError::InvalidInput(
                        "member still takes part in expenses".to_string(),
                    ));
                }

                let owned: Vec<groups::Model> = groups::Entity::find()
                    .filter(groups::Column::OwnerId.eq(member_id))
                    .all(db_tx)
                    .await?;
                for group in &owned {
                    let members = engine.list_group_members(db_tx, group.id).await?;
                    let expenses = engine
                        .list_expense_models(db_tx, ExpenseFilter::Group(group.id))
                        .await?;
                    if members.iter().any(|m| m.member.id != member_id) || !expenses.is_empty() {
                        return Err(EngineError::InvalidInput(format!(
                            "group \"{}\" still has members or expenses",
                            group.name
                        )));
                    }
                }

                let memberships = group_members::Entity::find()
                    .filter(group_members::Column::UserId.eq(member_id))
                    .all(db_tx)
                    .await?;
                group_members::Entity::delete_many()
                    .filter(group_members::Column::UserId.eq(member_id))
                    .exec(db_tx)
                    .await?;
                for membership in memberships {
                    if !owned.iter().any(|g| g.id == membership.group_id) {
                        engine.touch_group(db_tx, membership.group_id).await?;
                    }
                }

                groups::Entity::delete_many()
                    .filter(groups::Column::OwnerId.eq(member_id))
                    .exec(db_tx)
                    .await?;
                users::Entity::delete_by_id(member_id).exec(db_tx).await?;
                Ok(())
            })
        })
        .await
    }

    async fn require_password(
        &self,
        db: &DatabaseTransaction,
        member_id: MemberId,
        password: &str,
    ) -> ResultEngine<users::Model> {
        let user = users::Entity::find_by_id(member_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;
        if password.is_empty() || user.password != password {
            return Err(EngineError::InvalidCredentials(
                "password does not match".to_string(),
            ));
        }
        Ok(user)
    }
}
