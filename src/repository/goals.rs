use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::{map_db_error, AppError, AppResult};
use crate::models::Goal;
use crate::schemas::{CreateGoalInput, UpdateGoalInput};

const GOAL_COLUMNS: &str = "id, company_branch_id, year, month, product_revenue, service_revenue, \
     ticket_average, customers, new_customers, products_per_client, services_per_client, \
     marketing, leads_generated, leads_meetings, marketing_sales, cpl, lead_to_meeting_rate, \
     meeting_to_sale_rate, roas, created_at";

// INSERT..SELECT guarded by branch existence, so a goal for an unknown
// branch writes nothing instead of failing on the foreign key.
fn insert_sql() -> String {
    format!(
        "INSERT INTO goals (company_branch_id, year, month, product_revenue, service_revenue, \
         ticket_average, customers, new_customers, products_per_client, services_per_client, \
         marketing, leads_generated, leads_meetings, marketing_sales, cpl, lead_to_meeting_rate, \
         meeting_to_sale_rate, roas) \
         SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18 \
         WHERE EXISTS (SELECT 1 FROM company_branches WHERE id = $1) \
         RETURNING {GOAL_COLUMNS}"
    )
}

/// One goal row per (branch, year, month); a second insert for the same
/// period surfaces as a conflict, a missing branch as not-found.
pub async fn create(pool: &PgPool, input: &CreateGoalInput) -> AppResult<Goal> {
    sqlx::query_as::<_, Goal>(&insert_sql())
    .bind(input.company_branch_id)
    .bind(input.year)
    .bind(input.month)
    .bind(input.product_revenue)
    .bind(input.service_revenue)
    .bind(input.ticket_average)
    .bind(input.customers)
    .bind(input.new_customers)
    .bind(input.products_per_client)
    .bind(input.services_per_client)
    .bind(input.marketing)
    .bind(input.leads_generated)
    .bind(input.leads_meetings)
    .bind(input.marketing_sales)
    .bind(input.cpl)
    .bind(input.lead_to_meeting_rate)
    .bind(input.meeting_to_sale_rate)
    .bind(input.roas)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Company branch not found.".to_string()))
}

pub async fn update_by_id(pool: &PgPool, id: i64, input: &UpdateGoalInput) -> AppResult<Goal> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE goals SET ");
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

    set_field!("month", input.month);
    set_field!("year", input.year);
    set_field!("product_revenue", input.product_revenue);
    set_field!("service_revenue", input.service_revenue);
    set_field!("ticket_average", input.ticket_average);
    set_field!("customers", input.customers);
    set_field!("new_customers", input.new_customers);
    set_field!("products_per_client", input.products_per_client);
    set_field!("services_per_client", input.services_per_client);
    set_field!("marketing", input.marketing);
    set_field!("leads_generated", input.leads_generated);
    set_field!("leads_meetings", input.leads_meetings);
    set_field!("marketing_sales", input.marketing_sales);
    set_field!("cpl", input.cpl);
    set_field!("lead_to_meeting_rate", input.lead_to_meeting_rate);
    set_field!("meeting_to_sale_rate", input.meeting_to_sale_rate);
    set_field!("roas", input.roas);

    if !touched {
        return Err(AppError::BadRequest("No fields to update.".to_string()));
    }

    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(format!(" RETURNING {GOAL_COLUMNS}"));
    builder
        .build_query_as::<Goal>()
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Goal not found.".to_string()))
}

pub async fn get_by_branch_and_period(
    pool: &PgPool,
    company_branch_id: i64,
    year: i32,
    month: i32,
) -> AppResult<Option<Goal>> {
    sqlx::query_as::<_, Goal>(&format!(
        "SELECT {GOAL_COLUMNS} FROM goals \
         WHERE company_branch_id = $1 AND year = $2 AND month = $3"
    ))
    .bind(company_branch_id)
    .bind(year)
    .bind(month)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_writes_nothing_without_the_branch() {
        let sql = insert_sql();
        assert!(sql.contains("WHERE EXISTS (SELECT 1 FROM company_branches WHERE id = $1)"));
        assert!(sql.contains("RETURNING"));
        // guarded SELECT form, not a bare VALUES insert
        assert!(!sql.contains("VALUES"));
    }
}
