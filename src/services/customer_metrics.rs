use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgPool;
use tokio::try_join;

use crate::error::AppResult;
use crate::models::{Customer, Goal, Sale, SALE_TYPE_PRODUCT, SALE_TYPE_SERVICE};
use crate::period::{
    month_range, parse_month_and_year, previous_month, round2, weeks_in_month, DateRange,
    GoalSplit,
};
use crate::repository::{customers, goals, sales};
use crate::services::report::MetricFigure;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerMetricsReport {
    pub customers_served: MetricFigure,
    pub new_customers: MetricFigure,
    pub products_per_customer: MetricFigure,
    pub services_per_customer: MetricFigure,
}

pub async fn customer_metrics(
    pool: &PgPool,
    month_and_year: &str,
    company_branch_id: i64,
) -> AppResult<CustomerMetricsReport> {
    let (year, month) = parse_month_and_year(month_and_year)?;
    let (prev_year, prev_month) = previous_month(year, month);

    let current_range = month_range(year, month)?;
    let previous_range = month_range(prev_year, prev_month)?;
    let current_weeks = weeks_in_month(year, month)?;
    let previous_weeks = weeks_in_month(prev_year, prev_month)?;

    let (current_sales, previous_sales, current_customers, previous_customers, goal) = try_join!(
        sales::completed_in_range(pool, company_branch_id, &current_range),
        sales::completed_in_range(pool, company_branch_id, &previous_range),
        customers::created_in_range(pool, company_branch_id, &current_range),
        customers::created_in_range(pool, company_branch_id, &previous_range),
        goals::get_by_branch_and_period(pool, company_branch_id, year, month as i32),
    )?;

    Ok(build_report(
        &current_sales,
        &previous_sales,
        &current_customers,
        &previous_customers,
        goal.as_ref(),
        &current_weeks,
        &previous_weeks,
    ))
}

fn build_report(
    current_sales: &[Sale],
    previous_sales: &[Sale],
    current_customers: &[Customer],
    previous_customers: &[Customer],
    goal: Option<&Goal>,
    current_weeks: &[DateRange; 4],
    previous_weeks: &[DateRange; 4],
) -> CustomerMetricsReport {
    let served_goal = goal.map_or(0.0, |g| g.customers as f64);
    let new_goal = goal.map_or(0.0, |g| g.new_customers as f64);
    let products_goal = goal.map_or(0.0, |g| g.products_per_client);
    let services_goal = goal.map_or(0.0, |g| g.services_per_client);

    let weekly =
        |figure: &dyn Fn(&[Sale], &[Customer]) -> f64, weeks: &[DateRange; 4], sales: &[Sale], customers: &[Customer]| {
            let mut values = [0.0; 4];
            for (slot, week) in values.iter_mut().zip(weeks) {
                let week_sales: Vec<Sale> = sales
                    .iter()
                    .filter(|sale| week.contains(sale.sale_date))
                    .cloned()
                    .collect();
                let week_customers: Vec<Customer> = customers
                    .iter()
                    .filter(|customer| week.contains(customer.created_at))
                    .cloned()
                    .collect();
                *slot = figure(&week_sales, &week_customers);
            }
            values
        };

    let served = |sales: &[Sale], _: &[Customer]| customers_served(sales) as f64;
    let fresh = |_: &[Sale], customers: &[Customer]| customers.len() as f64;
    let products =
        |sales: &[Sale], _: &[Customer]| quantity_per_customer(sales, SALE_TYPE_PRODUCT);
    let services =
        |sales: &[Sale], _: &[Customer]| quantity_per_customer(sales, SALE_TYPE_SERVICE);

    CustomerMetricsReport {
        customers_served: MetricFigure::build(
            served(current_sales, current_customers),
            served(previous_sales, previous_customers),
            served_goal,
            weekly(&served, current_weeks, current_sales, current_customers),
            weekly(&served, previous_weeks, previous_sales, previous_customers),
            GoalSplit::DivideEvenly,
        ),
        new_customers: MetricFigure::build(
            fresh(current_sales, current_customers),
            fresh(previous_sales, previous_customers),
            new_goal,
            weekly(&fresh, current_weeks, current_sales, current_customers),
            weekly(&fresh, previous_weeks, previous_sales, previous_customers),
            GoalSplit::DivideEvenly,
        ),
        products_per_customer: MetricFigure::build(
            products(current_sales, current_customers),
            products(previous_sales, previous_customers),
            products_goal,
            weekly(&products, current_weeks, current_sales, current_customers),
            weekly(&products, previous_weeks, previous_sales, previous_customers),
            GoalSplit::RepeatUnchanged,
        ),
        services_per_customer: MetricFigure::build(
            services(current_sales, current_customers),
            services(previous_sales, previous_customers),
            services_goal,
            weekly(&services, current_weeks, current_sales, current_customers),
            weekly(&services, previous_weeks, previous_sales, previous_customers),
            GoalSplit::RepeatUnchanged,
        ),
    }
}

fn customers_served(sales: &[Sale]) -> usize {
    sales
        .iter()
        .map(|sale| sale.customer_id)
        .collect::<HashSet<_>>()
        .len()
}

/// Units sold per distinct buying customer for one sale type; 0 when no
/// customer bought that type in the range.
fn quantity_per_customer(sales: &[Sale], sale_type: &str) -> f64 {
    let mut quantity = 0_i64;
    let mut buyers = HashSet::new();
    for sale in sales.iter().filter(|sale| sale.sale_type == sale_type) {
        quantity += i64::from(sale.quantity);
        buyers.insert(sale.customer_id);
    }
    if buyers.is_empty() {
        return 0.0;
    }
    round2(quantity as f64 / buyers.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sale(customer_id: i64, sale_type: &str, quantity: i32, day: u32) -> Sale {
        Sale {
            id: customer_id * 100 + i64::from(day),
            sale_date: Utc.with_ymd_and_hms(2025, 4, day, 12, 0, 0).unwrap(),
            code: format!("C-{customer_id}-{day}"),
            description: "item".to_string(),
            quantity,
            unit_value: 10.0,
            total_value: 10.0 * f64::from(quantity),
            sale_type: sale_type.to_string(),
            status: "COMPLETED".to_string(),
            customer_id,
            company_branch_id: 1,
            imported_spreadsheet_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 4, day, 12, 0, 0).unwrap(),
        }
    }

    fn customer(id: i64, day: u32) -> Customer {
        Customer {
            id,
            name: format!("customer {id}"),
            tax_id: None,
            status: "ACTIVE".to_string(),
            company_branch_id: 1,
            imported_spreadsheet_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 4, day, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn served_counts_distinct_buyers() {
        let sales = vec![
            sale(1, SALE_TYPE_PRODUCT, 1, 3),
            sale(1, SALE_TYPE_SERVICE, 1, 4),
            sale(2, SALE_TYPE_PRODUCT, 1, 5),
        ];
        assert_eq!(customers_served(&sales), 2);
    }

    #[test]
    fn per_customer_ratio_rounds_and_handles_empty() {
        let sales = vec![
            sale(1, SALE_TYPE_PRODUCT, 2, 3),
            sale(2, SALE_TYPE_PRODUCT, 3, 4),
            sale(3, SALE_TYPE_SERVICE, 9, 5),
        ];
        assert_eq!(quantity_per_customer(&sales, SALE_TYPE_PRODUCT), 2.5);
        assert_eq!(quantity_per_customer(&sales, SALE_TYPE_SERVICE), 9.0);
        assert_eq!(quantity_per_customer(&[], SALE_TYPE_PRODUCT), 0.0);
    }

    #[test]
    fn missing_goal_zeroes_goal_figures() {
        let weeks = weeks_in_month(2025, 4).unwrap();
        let prev_weeks = weeks_in_month(2025, 3).unwrap();
        let report = build_report(&[], &[], &[], &[], None, &weeks, &prev_weeks);
        assert_eq!(report.customers_served.selected_period_goal, 0.0);
        for point in &report.products_per_customer.weekly_data.goal {
            assert_eq!(point.value, 0.0);
        }
    }

    #[test]
    fn weekly_buckets_split_by_sale_date() {
        // April 2025 weeks: 1-8, 9-16, 17-24, 25-30.
        let sales = vec![
            sale(1, SALE_TYPE_PRODUCT, 1, 2),
            sale(2, SALE_TYPE_PRODUCT, 1, 10),
            sale(3, SALE_TYPE_PRODUCT, 1, 10),
            sale(4, SALE_TYPE_PRODUCT, 1, 30),
        ];
        let customers = vec![customer(1, 2), customer(2, 10)];
        let weeks = weeks_in_month(2025, 4).unwrap();
        let prev_weeks = weeks_in_month(2025, 3).unwrap();
        let report = build_report(&sales, &[], &customers, &[], None, &weeks, &prev_weeks);

        let current = &report.customers_served.weekly_data.current;
        assert_eq!(current[0].value, 1.0);
        assert_eq!(current[1].value, 2.0);
        assert_eq!(current[2].value, 0.0);
        assert_eq!(current[3].value, 1.0);

        let fresh = &report.new_customers.weekly_data.current;
        assert_eq!(fresh[0].value, 1.0);
        assert_eq!(fresh[1].value, 1.0);
        assert_eq!(report.new_customers.selected_period, 2.0);
    }
}
