use sqlx::PgPool;

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::ImportedSpreadsheet;

pub async fn create(pool: &PgPool, file_name: &str, company_id: i64) -> AppResult<ImportedSpreadsheet> {
    sqlx::query_as::<_, ImportedSpreadsheet>(
        "INSERT INTO imported_spreadsheets (file_name, company_id) VALUES ($1, $2) \
         RETURNING id, file_name, company_id, created_at",
    )
    .bind(file_name)
    .bind(company_id)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn list_by_company(pool: &PgPool, company_id: i64) -> AppResult<Vec<ImportedSpreadsheet>> {
    sqlx::query_as::<_, ImportedSpreadsheet>(
        "SELECT id, file_name, company_id, created_at FROM imported_spreadsheets \
         WHERE company_id = $1 ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
    .map_err(map_db_error)
}

// Dependency order: sales reference customers and branches, customers
// reference branches, everything references the spreadsheet. Sales are
// removed whether linked to the spreadsheet directly or through one of
// its customers.
const CASCADE_STATEMENTS: [&str; 4] = [
    "DELETE FROM sales WHERE imported_spreadsheet_id = $1 \
     OR customer_id IN (SELECT id FROM customers WHERE imported_spreadsheet_id = $1)",
    "DELETE FROM customers WHERE imported_spreadsheet_id = $1",
    "DELETE FROM company_branches WHERE imported_spreadsheet_id = $1",
    "DELETE FROM imported_spreadsheets WHERE id = $1",
];

/// Remove a spreadsheet and everything it brought in, in one transaction.
pub async fn delete_cascade(pool: &PgPool, id: i64) -> AppResult<()> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM imported_spreadsheets WHERE id = $1",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_db_error)?;
    if exists == 0 {
        return Err(AppError::NotFound("Imported spreadsheet not found.".to_string()));
    }

    for statement in CASCADE_STATEMENTS {
        sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
    }

    tx.commit().await.map_err(map_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_deletes_children_before_the_spreadsheet() {
        assert!(CASCADE_STATEMENTS[0].starts_with("DELETE FROM sales"));
        assert!(CASCADE_STATEMENTS[1].starts_with("DELETE FROM customers"));
        assert!(CASCADE_STATEMENTS[2].starts_with("DELETE FROM company_branches"));
        assert!(CASCADE_STATEMENTS[3].starts_with("DELETE FROM imported_spreadsheets"));
    }

    #[test]
    fn cascade_covers_sales_reached_through_imported_customers() {
        // a sale entered manually against an imported customer must not
        // survive as an orphan
        assert!(CASCADE_STATEMENTS[0].contains(
            "customer_id IN (SELECT id FROM customers WHERE imported_spreadsheet_id = $1)"
        ));
        for statement in CASCADE_STATEMENTS {
            assert!(statement.contains("$1"));
        }
    }
}
