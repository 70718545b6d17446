use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::error::AppResult;
use crate::models::Goal;
use crate::repository::goals;
use crate::schemas::{validate_input, CreateGoalInput, UpdateGoalInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/goals", post(create_goal))
        .route("/goals/{id}", put(update_goal))
        .route("/goals/{branch_id}/{year}/{month}", get(get_goal))
}

async fn create_goal(
    State(state): State<AppState>,
    Json(input): Json<CreateGoalInput>,
) -> AppResult<(StatusCode, Json<Goal>)> {
    validate_input(&input)?;
    let goal = goals::create(&state.db_pool, &input).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn update_goal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateGoalInput>,
) -> AppResult<Json<Goal>> {
    validate_input(&input)?;
    let goal = goals::update_by_id(&state.db_pool, id, &input).await?;
    Ok(Json(goal))
}

async fn get_goal(
    State(state): State<AppState>,
    Path((branch_id, year, month)): Path<(i64, i32, i32)>,
) -> AppResult<Json<Option<Goal>>> {
    let goal = goals::get_by_branch_and_period(&state.db_pool, branch_id, year, month).await?;
    Ok(Json(goal))
}
