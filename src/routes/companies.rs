use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::models::Company;
use crate::repository::companies;
use crate::schemas::{validate_input, CreateCompanyInput};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/companies", post(create_company).get(list_companies))
}

async fn create_company(
    State(state): State<AppState>,
    Json(input): Json<CreateCompanyInput>,
) -> AppResult<(StatusCode, Json<Company>)> {
    validate_input(&input)?;
    let company = companies::create(&state.db_pool, input.name.trim()).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

async fn list_companies(State(state): State<AppState>) -> AppResult<Json<Vec<Company>>> {
    let companies = companies::list(&state.db_pool).await?;
    Ok(Json(companies))
}
