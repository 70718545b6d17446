use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::MarketingMetric;
use crate::period::DateRange;
use crate::schemas::UpdateMarketingMetricInput;

const METRIC_COLUMNS: &str = "id, date, source, investment, leads_generated, sales, cpl, \
     meeting_to_sale_rate, roas, impressions, clicks, ctr, cpc, company_branch_id, created_at";

pub struct NewMarketingMetric {
    pub date: DateTime<Utc>,
    pub source: String,
    pub investment: f64,
    pub leads_generated: i64,
    pub sales: i64,
    pub cpl: f64,
    pub meeting_to_sale_rate: f64,
    pub roas: f64,
    pub impressions: Option<i64>,
    pub clicks: Option<i64>,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
}

pub async fn create_many(
    pool: &PgPool,
    company_branch_id: i64,
    records: &[NewMarketingMetric],
) -> AppResult<Vec<MarketingMetric>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO marketing_metrics (date, source, investment, leads_generated, sales, cpl, \
         meeting_to_sale_rate, roas, impressions, clicks, ctr, cpc, company_branch_id) ",
    );
    builder.push_values(records, |mut row, record| {
        row.push_bind(record.date)
            .push_bind(&record.source)
            .push_bind(record.investment)
            .push_bind(record.leads_generated)
            .push_bind(record.sales)
            .push_bind(record.cpl)
            .push_bind(record.meeting_to_sale_rate)
            .push_bind(record.roas)
            .push_bind(record.impressions)
            .push_bind(record.clicks)
            .push_bind(record.ctr)
            .push_bind(record.cpc)
            .push_bind(company_branch_id);
    });
    builder.push(format!(" RETURNING {METRIC_COLUMNS}"));
    builder
        .build_query_as::<MarketingMetric>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn by_range_and_branch(
    pool: &PgPool,
    company_branch_id: i64,
    range: &DateRange,
) -> AppResult<Vec<MarketingMetric>> {
    sqlx::query_as::<_, MarketingMetric>(&format!(
        "SELECT {METRIC_COLUMNS} FROM marketing_metrics \
         WHERE company_branch_id = $1 AND date >= $2 AND date <= $3 \
         ORDER BY date ASC"
    ))
    .bind(company_branch_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

fn page_query<'a>(
    select: &str,
    company_branch_id: i64,
    source: Option<&'a str>,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {select} FROM marketing_metrics WHERE company_branch_id = "
    ));
    builder.push_bind(company_branch_id);
    if let Some(source) = source {
        builder.push(" AND source = ").push_bind(source);
    }
    builder
}

pub async fn find_page(
    pool: &PgPool,
    company_branch_id: i64,
    source: Option<&str>,
    offset: i64,
    limit: i64,
) -> AppResult<Vec<MarketingMetric>> {
    let mut builder = page_query(METRIC_COLUMNS, company_branch_id, source);
    builder
        .push(" ORDER BY date DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    builder
        .build_query_as::<MarketingMetric>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn count(
    pool: &PgPool,
    company_branch_id: i64,
    source: Option<&str>,
) -> AppResult<i64> {
    let mut builder = page_query("COUNT(*)", company_branch_id, source);
    builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(map_db_error)
}

/// Lookup scoped by branch so one tenant cannot address another's rows.
pub async fn get_by_id(
    pool: &PgPool,
    id: i64,
    company_branch_id: i64,
) -> AppResult<MarketingMetric> {
    sqlx::query_as::<_, MarketingMetric>(&format!(
        "SELECT {METRIC_COLUMNS} FROM marketing_metrics \
         WHERE id = $1 AND company_branch_id = $2"
    ))
    .bind(id)
    .bind(company_branch_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Marketing metric not found.".to_string()))
}

pub async fn get_by_date_and_source(
    pool: &PgPool,
    company_branch_id: i64,
    date: DateTime<Utc>,
    source: &str,
) -> AppResult<Option<MarketingMetric>> {
    sqlx::query_as::<_, MarketingMetric>(&format!(
        "SELECT {METRIC_COLUMNS} FROM marketing_metrics \
         WHERE company_branch_id = $1 AND date = $2 AND source = $3"
    ))
    .bind(company_branch_id)
    .bind(date)
    .bind(source)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)
}

/// True when the (date, source) slot is already taken by a row other
/// than the one being updated.
pub fn occupied_by_other(existing: Option<&MarketingMetric>, id: i64) -> bool {
    existing.is_some_and(|metric| metric.id != id)
}

pub async fn update(
    pool: &PgPool,
    id: i64,
    company_branch_id: i64,
    input: &UpdateMarketingMetricInput,
    date: Option<DateTime<Utc>>,
) -> AppResult<MarketingMetric> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE marketing_metrics SET ");
    let mut fields = builder.separated(", ");
    let mut touched = false;

    macro_rules! set_field {
        ($column:literal, $value:expr) => {
            if let Some(value) = $value {
                fields.push(concat!($column, " = ")).push_bind_unseparated(value);
                touched = true;
            }
        };
    }

    set_field!("date", date);
    set_field!("source", input.source.as_deref());
    set_field!("investment", input.investment);
    set_field!("leads_generated", input.leads_generated);
    set_field!("sales", input.sales);
    set_field!("cpl", input.cpl);
    set_field!("meeting_to_sale_rate", input.meeting_to_sale_rate);
    set_field!("roas", input.roas);
    set_field!("impressions", input.impressions);
    set_field!("clicks", input.clicks);
    set_field!("ctr", input.ctr);
    set_field!("cpc", input.cpc);

    if !touched {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(" AND company_branch_id = ")
        .push_bind(company_branch_id)
        .push(format!(" RETURNING {METRIC_COLUMNS}"));
    builder
        .build_query_as::<MarketingMetric>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Marketing metric not found.".to_string()))
}

pub async fn delete(pool: &PgPool, id: i64, company_branch_id: i64) -> AppResult<()> {
    let result =
        sqlx::query("DELETE FROM marketing_metrics WHERE id = $1 AND company_branch_id = $2")
            .bind(id)
            .bind(company_branch_id)
            .execute(pool)
            .await
            .map_err(map_db_error)?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Marketing metric not found.".to_string()));
    }
    Ok(())
}

pub async fn delete_many(
    pool: &PgPool,
    ids: &[i64],
    company_branch_id: i64,
) -> AppResult<u64> {
    let result =
        sqlx::query("DELETE FROM marketing_metrics WHERE id = ANY($1) AND company_branch_id = $2")
            .bind(ids)
            .bind(company_branch_id)
            .execute(pool)
            .await
            .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_conflict_ignores_the_row_itself() {
        use chrono::{TimeZone, Utc};

        let metric = MarketingMetric {
            id: 7,
            date: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            source: "GOOGLE".to_string(),
            investment: 0.0,
            leads_generated: 0,
            sales: 0,
            cpl: 0.0,
            meeting_to_sale_rate: 0.0,
            roas: 0.0,
            impressions: None,
            clicks: None,
            ctr: None,
            cpc: None,
            company_branch_id: 1,
            created_at: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        };
        // updating row 7 onto its own slot is fine, onto row 7's slot
        // from another id is not
        assert!(!occupied_by_other(Some(&metric), 7));
        assert!(occupied_by_other(Some(&metric), 8));
        assert!(!occupied_by_other(None, 8));
    }

    #[test]
    fn source_filter_is_optional() {
        let with = page_query("COUNT(*)", 1, Some("GOOGLE"));
        assert!(with.sql().contains("source = $2"));

        let without = page_query("COUNT(*)", 1, None);
        assert!(!without.sql().contains("source = "));
    }
}
