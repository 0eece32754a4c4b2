use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};

use std::sync::Arc;

use crate::{balance, expenses, groups, user};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// Resolves the Basic credentials to a member and stores it in the request
/// extensions for the handlers.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(credentials)) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let member = state
        .engine
        .authenticate(credentials.username(), credentials.password())
        .await
        .map_err(|err| {
            tracing::error!("failed to authenticate {}: {err}", credentials.username());
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(member);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let authenticated = Router::new()
        .route("/users", get(user::list))
        .route(
            "/users/me",
            get(user::me).patch(user::update_me).delete(user::delete_me),
        )
        .route("/users/me/password", patch(user::change_password))
        .route("/users/me/dashboard", get(user::dashboard))
        .route("/groups", get(groups::list).post(groups::create))
        .route("/groups/{id}", get(groups::detail))
        .route("/groups/{id}/members", post(groups::add_member))
        .route(
            "/groups/{id}/members/{member_id}",
            delete(groups::remove_member),
        )
        .route("/expenses", post(expenses::create_group))
        .route("/expenses/me", get(expenses::paid_by_me))
        .route("/expenses/recent", get(expenses::recent))
        .route(
            "/expenses/personal",
            get(expenses::list_personal).post(expenses::create_personal),
        )
        .route("/expenses/personal/{id}", delete(expenses::delete_personal))
        .route("/expenses/group/{group_id}", get(expenses::list_group))
        .route("/expenses/{id}/participants", get(expenses::participants))
        .route(
            "/expenses/{id}",
            put(expenses::update).delete(expenses::delete),
        )
        .route("/balance", get(balance::overall))
        .route("/balance/personal", get(balance::personal))
        .route("/balance/groups", get(balance::groups))
        .route("/balance/counterparties", get(balance::counterparties))
        .route("/balance/group/{id}", get(balance::group))
        .route(
            "/balance/group/{id}/transactions",
            get(balance::group_transactions),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    Router::new()
        .route("/users/register", post(user::register))
        .merge(authenticated)
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}
