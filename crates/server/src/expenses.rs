//! Expense endpoints.

use api_types::expense::{
    ExpenseDetail, ExpenseUpdate, ExpenseView, GroupExpenseNew, PersonalExpenseNew, RecentQuery,
    ShareView,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{
    DEFAULT_RECENT_LIMIT, ExpenseId, GroupExpenseCmd, GroupId, Member, MoneyCents,
    PersonalExpenseCmd, UpdateExpenseCmd,
};

use crate::{
    ServerError,
    convert::{expense_detail, expense_view, parse_currency, share_view},
    server::ServerState,
};

pub async fn create_group(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseDetail>), ServerError> {
    let cmd = GroupExpenseCmd::new(
        payload.group_id,
        member.id,
        payload.description,
        MoneyCents::new(payload.amount.cents()),
        payload.participants,
        payload.occurred_at.unwrap_or_else(Utc::now),
    )
    .payer(payload.payer_id.unwrap_or(member.id))
    .currency(parse_currency(payload.currency));

    let detail = state.engine.create_group_expense(cmd).await?;
    tracing::debug!(
        "member {} added expense {} to group {}",
        member.id,
        detail.expense.id,
        payload.group_id
    );
    Ok((StatusCode::CREATED, Json(expense_detail(detail))))
}

/// Expenses paid by the caller.
pub async fn paid_by_me(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<ExpenseView>>, ServerError> {
    let expenses = state.engine.list_expenses_paid_by(member.id).await?;
    Ok(Json(expenses.into_iter().map(expense_view).collect()))
}

pub async fn recent(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ExpenseView>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let expenses = state.engine.recent_expenses(member.id, limit).await?;
    Ok(Json(expenses.into_iter().map(expense_view).collect()))
}

pub async fn list_personal(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<ExpenseDetail>>, ServerError> {
    let expenses = state.engine.list_personal_expenses(member.id).await?;
    Ok(Json(expenses.into_iter().map(expense_detail).collect()))
}

pub async fn create_personal(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Json(payload): Json<PersonalExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseDetail>), ServerError> {
    let mut cmd = PersonalExpenseCmd::new(
        member.id,
        payload.description,
        MoneyCents::new(payload.amount.cents()),
        payload.occurred_at.unwrap_or_else(Utc::now),
    )
    .participants(payload.participants);
    cmd.currency = parse_currency(payload.currency);

    let detail = state.engine.create_personal_expense(cmd).await?;
    Ok((StatusCode::CREATED, Json(expense_detail(detail))))
}

pub async fn delete_personal(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<ExpenseId>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_personal_expense(id, member.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_group(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(group_id): Path<GroupId>,
) -> Result<Json<Vec<ExpenseDetail>>, ServerError> {
    let expenses = state
        .engine
        .list_group_expenses(group_id, member.id)
        .await?;
    Ok(Json(expenses.into_iter().map(expense_detail).collect()))
}

pub async fn participants(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<ExpenseId>,
) -> Result<Json<Vec<ShareView>>, ServerError> {
    let shares = state.engine.expense_participants(id, member.id).await?;
    Ok(Json(shares.into_iter().map(share_view).collect()))
}

pub async fn update(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<ExpenseId>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseDetail>, ServerError> {
    let detail = state
        .engine
        .update_expense(UpdateExpenseCmd {
            expense_id: id,
            description: payload.description,
            total: MoneyCents::new(payload.amount.cents()),
            payer_id: payload.payer_id,
            participants: payload.participants,
            occurred_at: payload.occurred_at,
            requester_id: member.id,
        })
        .await?;
    Ok(Json(expense_detail(detail)))
}

pub async fn delete(
    Extension(member): Extension<Member>,
    State(state): State<ServerState>,
    Path(id): Path<ExpenseId>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_expense(id, member.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
