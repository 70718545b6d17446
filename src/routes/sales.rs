use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::try_join;

use crate::error::AppResult;
use crate::models::{ImportedSpreadsheet, Sale};
use crate::period::{parse_day, DayBound};
use crate::repository::sales::{self, SaleFilters};
use crate::repository::spreadsheets;
use crate::schemas::{
    resolve_pagination, validate_input, CreateSaleInput, MetricsQuery, SalesListQuery,
    UpdateSaleInput,
};
use crate::services::ingestion;
use crate::services::sales_metrics::{self, SalesMetricsReport};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", post(create_sales))
        .route("/sales/metrics", get(metrics))
        .route("/sales/{id}", get(list_sales).put(update_sale).delete(delete_sale))
        .route(
            "/imported-spreadsheets/{id}",
            get(list_spreadsheets).delete(delete_spreadsheet),
        )
}

async fn create_sales(
    State(state): State<AppState>,
    Json(records): Json<Vec<CreateSaleInput>>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let created = ingestion::create_sales(&state.db_pool, &records).await?;
    let count = created.len();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Sales imported successfully.",
            "sales": created,
            "count": count,
        })),
    ))
}

// The path parameter is the company id; the route also carries the
// per-sale PUT/DELETE, where the same segment is the sale id.
async fn list_sales(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
    Query(query): Query<SalesListQuery>,
) -> AppResult<Json<Value>> {
    let filters = SaleFilters {
        customer_id: query.customer_id,
        status: query.status,
        sale_type: query.sale_type,
        start_date: query
            .start_date
            .as_deref()
            .map(|raw| parse_day(raw, DayBound::Start))
            .transpose()?,
        end_date: query
            .end_date
            .as_deref()
            .map(|raw| parse_day(raw, DayBound::End))
            .transpose()?,
        description: query.description,
        customer: query.customer,
    };

    let export = query.export.unwrap_or(false);
    let (offset, limit) = if export {
        (0, None)
    } else {
        let (offset, limit) = resolve_pagination(query.page, query.limit, 10)?;
        (offset, Some(limit))
    };

    let (sales, total) = try_join!(
        sales::find_page(&state.db_pool, company_id, &filters, offset, limit),
        sales::count(&state.db_pool, company_id, &filters),
    )?;
    Ok(Json(json!({ "sales": sales, "total": total })))
}

async fn update_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateSaleInput>,
) -> AppResult<Json<Sale>> {
    validate_input(&input)?;
    let sale = sales::update(&state.db_pool, id, &input).await?;
    Ok(Json(sale))
}

async fn delete_sale(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<StatusCode> {
    sales::delete(&state.db_pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> AppResult<Json<SalesMetricsReport>> {
    let report = sales_metrics::sales_metrics(
        &state.db_pool,
        &query.month_and_year,
        query.company_branch_id,
    )
    .await?;
    Ok(Json(report))
}

// Same segment duality as /sales/{id}: GET treats it as a company id,
// DELETE as a spreadsheet id.
async fn list_spreadsheets(
    State(state): State<AppState>,
    Path(company_id): Path<i64>,
) -> AppResult<Json<Vec<ImportedSpreadsheet>>> {
    let spreadsheets = spreadsheets::list_by_company(&state.db_pool, company_id).await?;
    Ok(Json(spreadsheets))
}

async fn delete_spreadsheet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    spreadsheets::delete_cascade(&state.db_pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
