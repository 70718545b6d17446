use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::{Sale, SaleWithCustomer, SALE_STATUS_COMPLETED};
use crate::period::DateRange;
use crate::schemas::UpdateSaleInput;

const SALE_COLUMNS: &str = "id, sale_date, code, description, quantity, unit_value, total_value, \
     type, status, customer_id, company_branch_id, imported_spreadsheet_id, created_at";

fn prefixed_columns(alias: &str) -> String {
    format!("{alias}.{}", SALE_COLUMNS.replace(", ", &format!(", {alias}.")))
}

#[derive(Debug, Clone, Default)]
pub struct SaleFilters {
    pub customer_id: Option<i64>,
    pub status: Option<String>,
    pub sale_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub customer: Option<String>,
}

fn filtered_query<'a>(
    select: String,
    company_id: i64,
    filters: &'a SaleFilters,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {select} FROM sales s \
         JOIN company_branches cb ON cb.id = s.company_branch_id \
         JOIN customers c ON c.id = s.customer_id \
         WHERE cb.company_id = "
    ));
    builder.push_bind(company_id);
    if let Some(customer_id) = filters.customer_id {
        builder.push(" AND s.customer_id = ").push_bind(customer_id);
    }
    if let Some(status) = &filters.status {
        builder.push(" AND s.status = ").push_bind(status);
    }
    if let Some(sale_type) = &filters.sale_type {
        builder.push(" AND s.type = ").push_bind(sale_type);
    }
    if let Some(start) = filters.start_date {
        builder.push(" AND s.sale_date >= ").push_bind(start);
    }
    if let Some(end) = filters.end_date {
        builder.push(" AND s.sale_date <= ").push_bind(end);
    }
    if let Some(description) = &filters.description {
        builder
            .push(" AND s.description ILIKE ")
            .push_bind(format!("%{description}%"));
    }
    if let Some(customer) = &filters.customer {
        builder
            .push(" AND c.name ILIKE ")
            .push_bind(format!("%{customer}%"));
    }
    builder
}

pub async fn find_page(
    pool: &PgPool,
    company_id: i64,
    filters: &SaleFilters,
    offset: i64,
    limit: Option<i64>,
) -> AppResult<Vec<SaleWithCustomer>> {
    let select = format!("{}, c.name AS customer_name", prefixed_columns("s"));
    let mut builder = filtered_query(select, company_id, filters);
    builder.push(" ORDER BY s.sale_date DESC");
    if let Some(limit) = limit {
        builder
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
    }
    builder
        .build_query_as::<SaleWithCustomer>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn count(pool: &PgPool, company_id: i64, filters: &SaleFilters) -> AppResult<i64> {
    let mut builder = filtered_query("COUNT(*)".to_string(), company_id, filters);
    builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get_by_id(pool: &PgPool, id: i64) -> AppResult<Sale> {
    sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Sale not found.".to_string()))
}

/// Codes from `candidates` that already exist, used to reject duplicate
/// imports before inserting anything.
pub async fn existing_codes(pool: &PgPool, candidates: &[String]) -> AppResult<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT code FROM sales WHERE code = ANY($1)")
        .bind(candidates)
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    sale_date: DateTime<Utc>,
    code: &str,
    description: &str,
    quantity: i32,
    unit_value: f64,
    total_value: f64,
    sale_type: &str,
    status: &str,
    customer_id: i64,
    company_branch_id: i64,
    imported_spreadsheet_id: Option<i64>,
) -> AppResult<Sale> {
    sqlx::query_as::<_, Sale>(&format!(
        "INSERT INTO sales (sale_date, code, description, quantity, unit_value, total_value, \
         type, status, customer_id, company_branch_id, imported_spreadsheet_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {SALE_COLUMNS}"
    ))
    .bind(sale_date)
    .bind(code)
    .bind(description)
    .bind(quantity)
    .bind(unit_value)
    .bind(total_value)
    .bind(sale_type)
    .bind(status)
    .bind(customer_id)
    .bind(company_branch_id)
    .bind(imported_spreadsheet_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn update(pool: &PgPool, id: i64, input: &UpdateSaleInput) -> AppResult<Sale> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE sales SET ");
    let mut fields = builder.separated(", ");
    let mut touched = false;

    if let Some(sale_date) = input.sale_date {
        fields.push("sale_date = ").push_bind_unseparated(sale_date);
        touched = true;
    }
    if let Some(code) = &input.code {
        fields.push("code = ").push_bind_unseparated(code);
        touched = true;
    }
    if let Some(description) = &input.description {
        fields
            .push("description = ")
            .push_bind_unseparated(description);
        touched = true;
    }
    if let Some(quantity) = input.quantity {
        fields.push("quantity = ").push_bind_unseparated(quantity);
        touched = true;
    }
    if let Some(unit_value) = input.unit_value {
        fields
            .push("unit_value = ")
            .push_bind_unseparated(unit_value);
        touched = true;
    }
    if let Some(total_value) = input.total_value {
        fields
            .push("total_value = ")
            .push_bind_unseparated(total_value);
        touched = true;
    }
    if let Some(sale_type) = &input.sale_type {
        fields.push("type = ").push_bind_unseparated(sale_type);
        touched = true;
    }
    if let Some(status) = &input.status {
        fields.push("status = ").push_bind_unseparated(status);
        touched = true;
    }
    if !touched {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(format!(" RETURNING {SALE_COLUMNS}"));
    builder
        .build_query_as::<Sale>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Sale not found.".to_string()))
}

pub async fn delete(pool: &PgPool, id: i64) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM sales WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(map_db_error)?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Sale not found.".to_string()));
    }
    Ok(())
}

/// Completed sales of a branch within the period. Cancelled rows never
/// participate in reporting figures.
pub async fn completed_in_range(
    pool: &PgPool,
    company_branch_id: i64,
    range: &DateRange,
) -> AppResult<Vec<Sale>> {
    sqlx::query_as::<_, Sale>(&format!(
        "SELECT {SALE_COLUMNS} FROM sales \
         WHERE company_branch_id = $1 AND status = $2 \
         AND sale_date >= $3 AND sale_date <= $4"
    ))
    .bind(company_branch_id)
    .bind(SALE_STATUS_COMPLETED)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn completed_revenue_in_range(
    pool: &PgPool,
    company_branch_id: i64,
    range: &DateRange,
) -> AppResult<f64> {
    sqlx::query_scalar::<_, Option<f64>>(
        "SELECT SUM(total_value) FROM sales \
         WHERE company_branch_id = $1 AND status = $2 \
         AND sale_date >= $3 AND sale_date <= $4",
    )
    .bind(company_branch_id)
    .bind(SALE_STATUS_COMPLETED)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await
    .map(|total| total.unwrap_or(0.0))
    .map_err(map_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_filters_compose_into_sql() {
        let filters = SaleFilters {
            customer_id: Some(4),
            status: Some("COMPLETED".to_string()),
            sale_type: None,
            start_date: None,
            end_date: None,
            description: Some("corte".to_string()),
            customer: None,
        };
        let builder = filtered_query("COUNT(*)".to_string(), 1, &filters);
        let sql = builder.sql();
        assert!(sql.contains("cb.company_id = $1"));
        assert!(sql.contains("s.customer_id = $2"));
        assert!(sql.contains("s.status = $3"));
        assert!(sql.contains("s.description ILIKE $4"));
        assert!(!sql.contains("s.type = "));
    }

    #[test]
    fn column_prefixing_touches_every_column() {
        let prefixed = prefixed_columns("s");
        assert!(prefixed.starts_with("s.id, s.sale_date"));
        assert_eq!(
            prefixed.matches("s.").count(),
            SALE_COLUMNS.split(", ").count()
        );
    }
}
