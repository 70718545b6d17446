use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::try_join;

use crate::error::{AppError, AppResult};
use crate::models::MarketingMetric;
use crate::period::{parse_day, DayBound};
use crate::repository::{branches, marketing};
use crate::schemas::{
    resolve_pagination, validate_input, CreateMarketingMetricInput, IdsInput, MarketingListQuery,
    UpdateMarketingMetricInput,
};
use crate::services::marketing_metrics::{self, MarketingMetricsReport};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/companies/{company_branch_id}/marketing-metrics",
            post(create_metrics).get(list_or_report).delete(delete_many),
        )
        .route(
            "/companies/{company_branch_id}/marketing-metrics/{id}",
            get(get_metric).put(update_metric).delete(delete_metric),
        )
}

async fn create_metrics(
    State(state): State<AppState>,
    Path(company_branch_id): Path<i64>,
    Json(records): Json<Vec<CreateMarketingMetricInput>>,
) -> AppResult<(StatusCode, Json<Value>)> {
    if records.is_empty() {
        return Err(AppError::BadRequest(
            "No marketing metric records provided.".to_string(),
        ));
    }
    branches::get_by_id(&state.db_pool, company_branch_id).await?;

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        validate_input(record)?;
        let date = parse_day(&record.date, DayBound::Start)?;
        // one row per (day, source) and branch
        if marketing::get_by_date_and_source(&state.db_pool, company_branch_id, date, &record.source)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "A {} metric for {} already exists.",
                record.source, record.date
            )));
        }
        rows.push(marketing::NewMarketingMetric {
            date,
            source: record.source.clone(),
            investment: record.investment,
            leads_generated: record.leads_generated,
            sales: record.sales,
            cpl: record.cpl,
            meeting_to_sale_rate: record.meeting_to_sale_rate,
            roas: record.roas,
            impressions: record.impressions,
            clicks: record.clicks,
            ctr: record.ctr,
            cpc: record.cpc,
        });
    }

    let created = marketing::create_many(&state.db_pool, company_branch_id, &rows).await?;
    let count = created.len();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Marketing metrics created successfully.",
            "data": created,
            "count": count,
        })),
    ))
}

/// With `page` this is the paginated listing; otherwise `monthAndYear` is
/// required and the month-over-month average report is returned.
async fn list_or_report(
    State(state): State<AppState>,
    Path(company_branch_id): Path<i64>,
    Query(query): Query<MarketingListQuery>,
) -> AppResult<Json<Value>> {
    if query.page.is_some() {
        let (offset, limit) = resolve_pagination(query.page, query.limit, 10)?;
        let source = query.source.as_deref();
        let (data, count) = try_join!(
            marketing::find_page(&state.db_pool, company_branch_id, source, offset, limit),
            marketing::count(&state.db_pool, company_branch_id, source),
        )?;
        return Ok(Json(json!({ "data": data, "count": count })));
    }

    let month_and_year = query.month_and_year.as_deref().ok_or_else(|| {
        AppError::BadRequest("monthAndYear is required for the average report.".to_string())
    })?;
    let report: MarketingMetricsReport =
        marketing_metrics::average_metrics(&state.db_pool, month_and_year, company_branch_id)
            .await?;
    Ok(Json(serde_json::to_value(report).map_err(|error| {
        AppError::Internal(error.to_string())
    })?))
}

async fn get_metric(
    State(state): State<AppState>,
    Path((company_branch_id, id)): Path<(i64, i64)>,
) -> AppResult<Json<MarketingMetric>> {
    let metric = marketing::get_by_id(&state.db_pool, id, company_branch_id).await?;
    Ok(Json(metric))
}

async fn update_metric(
    State(state): State<AppState>,
    Path((company_branch_id, id)): Path<(i64, i64)>,
    Json(input): Json<UpdateMarketingMetricInput>,
) -> AppResult<Json<MarketingMetric>> {
    validate_input(&input)?;
    let date = input
        .date
        .as_deref()
        .map(|raw| parse_day(raw, DayBound::Start))
        .transpose()?;

    // (branch, date, source) stays unique through updates
    let current = marketing::get_by_id(&state.db_pool, id, company_branch_id).await?;
    let effective_date = date.unwrap_or(current.date);
    let effective_source = input.source.as_deref().unwrap_or(&current.source);
    let existing = marketing::get_by_date_and_source(
        &state.db_pool,
        company_branch_id,
        effective_date,
        effective_source,
    )
    .await?;
    if marketing::occupied_by_other(existing.as_ref(), id) {
        return Err(AppError::BadRequest(format!(
            "A {effective_source} metric for that date already exists."
        )));
    }

    let metric = marketing::update(&state.db_pool, id, company_branch_id, &input, date).await?;
    Ok(Json(metric))
}

async fn delete_metric(
    State(state): State<AppState>,
    Path((company_branch_id, id)): Path<(i64, i64)>,
) -> AppResult<Json<Value>> {
    marketing::delete(&state.db_pool, id, company_branch_id).await?;
    Ok(Json(json!({ "message": "Marketing metric deleted successfully." })))
}

async fn delete_many(
    State(state): State<AppState>,
    Path(company_branch_id): Path<i64>,
    Json(input): Json<IdsInput>,
) -> AppResult<Json<Value>> {
    if input.ids.is_empty() {
        return Err(AppError::BadRequest("No ids provided.".to_string()));
    }
    let deleted = marketing::delete_many(&state.db_pool, &input.ids, company_branch_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}
