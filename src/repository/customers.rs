use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::{map_db_error, AppResult};
use crate::models::{Customer, CUSTOMER_STATUS_ACTIVE};
use crate::period::DateRange;

const CUSTOMER_COLUMNS: &str =
    "id, name, tax_id, status, company_branch_id, imported_spreadsheet_id, created_at";

#[derive(Debug, Clone, Default)]
pub struct CustomerFilters {
    pub name: Option<String>,
    pub tax_id: Option<String>,
}

/// Customers of a company, newest first. The tax id filter compares
/// digits only so punctuation in stored documents does not break lookups.
fn filtered_query<'a>(
    select: &str,
    company_id: i64,
    filters: &'a CustomerFilters,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {select} FROM customers c \
         JOIN company_branches cb ON cb.id = c.company_branch_id \
         WHERE cb.company_id = "
    ));
    builder.push_bind(company_id);
    if let Some(name) = &filters.name {
        builder.push(" AND c.name ILIKE ").push_bind(format!("%{name}%"));
    }
    if let Some(tax_id) = &filters.tax_id {
        let digits: String = tax_id.chars().filter(char::is_ascii_digit).collect();
        builder
            .push(" AND regexp_replace(COALESCE(c.tax_id, ''), '[^0-9]', '', 'g') LIKE ")
            .push_bind(format!("%{digits}%"));
    }
    builder
}

pub async fn find_page(
    pool: &PgPool,
    company_id: i64,
    filters: &CustomerFilters,
    offset: i64,
    limit: i64,
) -> AppResult<Vec<Customer>> {
    let select = format!("c.{}", CUSTOMER_COLUMNS.replace(", ", ", c."));
    let mut builder = filtered_query(&select, company_id, filters);
    builder
        .push(" ORDER BY c.created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    builder
        .build_query_as::<Customer>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn count(
    pool: &PgPool,
    company_id: i64,
    filters: &CustomerFilters,
) -> AppResult<i64> {
    let mut builder = filtered_query("COUNT(*)", company_id, filters);
    builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .map_err(map_db_error)
}

/// Get-or-create keyed on tax id. NULL tax ids never conflict, so this is
/// only used when a document number is present.
pub async fn upsert_by_tax_id(
    pool: &PgPool,
    name: &str,
    tax_id: &str,
    company_branch_id: i64,
    imported_spreadsheet_id: Option<i64>,
) -> AppResult<Customer> {
    sqlx::query_as::<_, Customer>(&format!(
        "INSERT INTO customers (name, tax_id, status, company_branch_id, imported_spreadsheet_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (tax_id) DO UPDATE SET name = EXCLUDED.name \
         RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(name)
    .bind(tax_id)
    .bind(CUSTOMER_STATUS_ACTIVE)
    .bind(company_branch_id)
    .bind(imported_spreadsheet_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Case-insensitive name lookup within a company, for rows that carry no
/// tax id. Lookup-then-create still has a narrow race window; a duplicate
/// name created concurrently is tolerated.
pub async fn get_by_name_ci(
    pool: &PgPool,
    name: &str,
    company_id: i64,
) -> AppResult<Option<Customer>> {
    let select = format!("c.{}", CUSTOMER_COLUMNS.replace(", ", ", c."));
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {select} FROM customers c \
         JOIN company_branches cb ON cb.id = c.company_branch_id \
         WHERE cb.company_id = $1 AND LOWER(c.name) = LOWER($2) \
         LIMIT 1"
    ))
    .bind(company_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    tax_id: Option<&str>,
    company_branch_id: i64,
    imported_spreadsheet_id: Option<i64>,
) -> AppResult<Customer> {
    sqlx::query_as::<_, Customer>(&format!(
        "INSERT INTO customers (name, tax_id, status, company_branch_id, imported_spreadsheet_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {CUSTOMER_COLUMNS}"
    ))
    .bind(name)
    .bind(tax_id)
    .bind(CUSTOMER_STATUS_ACTIVE)
    .bind(company_branch_id)
    .bind(imported_spreadsheet_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Active customers first seen in the period, for the new-customers figure.
pub async fn created_in_range(
    pool: &PgPool,
    company_branch_id: i64,
    range: &DateRange,
) -> AppResult<Vec<Customer>> {
    sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers \
         WHERE company_branch_id = $1 AND status = $2 \
         AND created_at >= $3 AND created_at <= $4"
    ))
    .bind(company_branch_id)
    .bind(CUSTOMER_STATUS_ACTIVE)
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_compose_into_sql() {
        let filters = CustomerFilters {
            name: Some("ana".to_string()),
            tax_id: Some("123.456.789-00".to_string()),
        };
        let builder = filtered_query("COUNT(*)", 1, &filters);
        let sql = builder.sql();
        assert!(sql.contains("cb.company_id = $1"));
        assert!(sql.contains("c.name ILIKE $2"));
        assert!(sql.contains("regexp_replace"));
    }

    #[test]
    fn tax_id_filter_is_a_substring_match() {
        let filters = CustomerFilters {
            name: None,
            tax_id: Some("678".to_string()),
        };
        let builder = filtered_query("COUNT(*)", 1, &filters);
        // a partial document number must still match
        assert!(builder
            .sql()
            .contains("regexp_replace(COALESCE(c.tax_id, ''), '[^0-9]', '', 'g') LIKE $2"));
    }

    #[test]
    fn no_filters_means_scope_only() {
        let filters = CustomerFilters::default();
        let builder = filtered_query("COUNT(*)", 7, &filters);
        assert!(!builder.sql().contains("ILIKE"));
        assert!(!builder.sql().contains("regexp_replace"));
    }
}
