use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::try_join;

use crate::error::AppResult;
use crate::repository::customers::{self, CustomerFilters};
use crate::schemas::{resolve_pagination, CustomersQuery, MetricsQuery};
use crate::services::customer_metrics::{self, CustomerMetricsReport};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers/metrics", get(metrics))
        .route("/customers/{company_id}", get(list_customers))
}

async fn list_customers(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Query(query): Query<CustomersQuery>,
) -> AppResult<Json<Value>> {
    let (offset, limit) = resolve_pagination(query.page, query.per_page, 50)?;
    let filters = CustomerFilters {
        name: query.name,
        tax_id: query.tax_id,
    };
    let (data, total) = try_join!(
        customers::find_page(&state.db_pool, company_id, &filters, offset, limit),
        customers::count(&state.db_pool, company_id, &filters),
    )?;
    Ok(Json(json!({ "data": data, "total": total })))
}

async fn metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> AppResult<Json<CustomerMetricsReport>> {
    let report = customer_metrics::customer_metrics(
        &state.db_pool,
        &query.month_and_year,
        query.company_branch_id,
    )
    .await?;
    Ok(Json(report))
}
