//! Group and membership endpoints.

use api_types::group::{GroupDetail, GroupNew, GroupView, MemberAdd};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{GroupId, Member, MemberId};

use crate::{
    ServerError,
    convert::{group_detail, group_view},
    server::ServerState,
};

pub async fn list(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<GroupView>>, ServerError> {
    let groups = state.engine.list_groups_for(member.id).await?;
    Ok(Json(groups.into_iter().map(group_view).collect()))
}

pub async fn create(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let group = state.engine.create_group(&payload.name, member.id).await?;
    Ok((StatusCode::CREATED, Json(group_view(group))))
}

pub async fn detail(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<GroupId>,
) -> Result<Json<GroupDetail>, ServerError> {
    let detail = state.engine.group_detail(id, member.id).await?;
    Ok(Json(group_detail(detail)))
}

/// Adds a member by username (owner-only).
pub async fn add_member(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<GroupId>,
    Json(payload): Json<MemberAdd>,
) -> Result<StatusCode, ServerError> {
    let new_member = state.engine.member_by_username(&payload.username).await?;
    state
        .engine
        .add_group_member(id, new_member.id, member.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path((id, member_id)): Path<(GroupId, MemberId)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .remove_group_member(id, member_id, member.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
