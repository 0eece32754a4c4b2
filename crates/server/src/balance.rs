//! Balance endpoints.
//!
//! Member-level balances are always those of the caller.

use api_types::balance::{
    CounterpartyView, GroupBalanceView, GroupSettlementView, MemberBalanceView, NetPositionView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use engine::{GroupId, Member};

use crate::{
    ServerError,
    convert::{counterparty, group_balance, member_balance, position_view, settlement},
    server::ServerState,
};

pub async fn overall(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<NetPositionView>, ServerError> {
    let position = state.engine.overall_balance(member.id).await?;
    Ok(Json(position_view(position)))
}

pub async fn personal(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<NetPositionView>, ServerError> {
    let position = state.engine.personal_balance(member.id).await?;
    Ok(Json(position_view(position)))
}

pub async fn groups(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<GroupBalanceView>>, ServerError> {
    let balances = state.engine.group_summaries(member.id).await?;
    Ok(Json(balances.into_iter().map(group_balance).collect()))
}

pub async fn counterparties(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<CounterpartyView>>, ServerError> {
    let views = state.engine.counterparty_balances(member.id).await?;
    Ok(Json(views.into_iter().map(counterparty).collect()))
}

pub async fn group(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<GroupId>,
) -> Result<Json<Vec<MemberBalanceView>>, ServerError> {
    let balances = state.engine.group_balances(id, member.id).await?;
    Ok(Json(balances.into_iter().map(member_balance).collect()))
}

/// Group balances with the transfers that settle them.
pub async fn group_transactions(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<GroupId>,
) -> Result<Json<GroupSettlementView>, ServerError> {
    let result = state.engine.group_settlement(id, member.id).await?;
    Ok(Json(settlement(result)))
}
