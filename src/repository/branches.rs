use sqlx::PgPool;

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::CompanyBranch;

const BRANCH_COLUMNS: &str = "id, name, code, company_id, imported_spreadsheet_id, created_at";

pub async fn list_by_company(pool: &PgPool, company_id: i64) -> AppResult<Vec<CompanyBranch>> {
    sqlx::query_as::<_, CompanyBranch>(&format!(
        "SELECT {BRANCH_COLUMNS} FROM company_branches WHERE company_id = $1 ORDER BY name ASC"
    ))
    .bind(company_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

pub async fn get_by_id(pool: &PgPool, id: i64) -> AppResult<CompanyBranch> {
    sqlx::query_as::<_, CompanyBranch>(&format!(
        "SELECT {BRANCH_COLUMNS} FROM company_branches WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Company branch not found.".to_string()))
}

/// Get-or-create keyed on (company_id, name). The upsert keeps concurrent
/// imports from racing a lookup-then-insert into a unique violation; the
/// no-op DO UPDATE makes RETURNING yield the existing row.
pub async fn upsert(
    pool: &PgPool,
    name: &str,
    code: &str,
    company_id: i64,
    imported_spreadsheet_id: Option<i64>,
) -> AppResult<CompanyBranch> {
    sqlx::query_as::<_, CompanyBranch>(&format!(
        "INSERT INTO company_branches (name, code, company_id, imported_spreadsheet_id) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (company_id, name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING {BRANCH_COLUMNS}"
    ))
    .bind(name)
    .bind(code)
    .bind(company_id)
    .bind(imported_spreadsheet_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}
