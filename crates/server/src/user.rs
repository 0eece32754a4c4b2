//! Registration and profile endpoints.

use api_types::{
    dashboard::DashboardView,
    user::{AccountDelete, PasswordChange, UserRegister, UserUpdate, UserView},
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::Member;

use crate::{
    ServerError,
    convert::{self, user_view},
    server::ServerState,
};

/// Creates a member. This is the only endpoint that does not require
/// credentials.
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<UserRegister>,
) -> Result<(StatusCode, Json<UserView>), ServerError> {
    let member = state
        .engine
        .register_user(
            &payload.username,
            &payload.display_name,
            &payload.password,
            payload.avatar_color.as_deref(),
        )
        .await?;
    tracing::info!("registered member {}", member.id);
    Ok((StatusCode::CREATED, Json(user_view(member))))
}

pub async fn me(Extension(member): Extension<Member>) -> Json<UserView> {
    Json(user_view(member))
}

pub async fn update_me(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserView>, ServerError> {
    let member = state
        .engine
        .update_profile(
            member.id,
            payload.display_name.as_deref(),
            payload.avatar_color.as_deref(),
        )
        .await?;
    Ok(Json(user_view(member)))
}

pub async fn list(
    _: Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<UserView>>, ServerError> {
    let members = state.engine.list_members().await?;
    Ok(Json(members.into_iter().map(user_view).collect()))
}

pub async fn change_password(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Json(payload): Json<PasswordChange>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .change_password(member.id, &payload.current_password, &payload.new_password)
        .await?;
    tracing::info!("member {} changed their password", member.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_me(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountDelete>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_account(member.id, &payload.password)
        .await?;
    tracing::info!("deleted member {}", member.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn dashboard(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<DashboardView>, ServerError> {
    let dashboard = state.engine.dashboard(member.id).await?;
    Ok(Json(convert::dashboard(dashboard)))
}
