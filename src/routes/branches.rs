use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::models::CompanyBranch;
use crate::repository::branches;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/company-branches/{company_id}", get(list_branches))
}

async fn list_branches(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
) -> AppResult<Json<Vec<CompanyBranch>>> {
    let branches = branches::list_by_company(&state.db_pool, company_id).await?;
    Ok(Json(branches))
}
