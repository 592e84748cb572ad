use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    error::ApiResult,
    state::AppState,
    users::{
        dto::{PublicUser, UpdateUserRequest},
        repo::User,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(remove_user),
        )
}

#[instrument(skip(state, _user))]
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = User::list(&state.db).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, _user))]
pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Option<PublicUser>>> {
    let user = User::find_by_id(&state.db, id).await?;
    Ok(Json(user.map(PublicUser::from)))
}

#[instrument(skip(state, _user, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<Option<PublicUser>>> {
    let updated = User::update(
        &state.db,
        id,
        payload.email.as_deref(),
        payload.name.as_deref(),
        payload.password.as_deref(),
        payload.age,
    )
    .await?;

    if updated.is_some() {
        info!(user_id = id, "user updated");
    }
    Ok(Json(updated.map(PublicUser::from)))
}

#[instrument(skip(state, _user))]
pub async fn remove_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    User::delete(&state.db, id).await?;
    info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
