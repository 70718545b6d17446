use serde::Serialize;
use sqlx::PgPool;
use tokio::try_join;

use crate::error::AppResult;
use crate::models::{Goal, Sale, SALE_TYPE_PRODUCT, SALE_TYPE_SERVICE};
use crate::period::{
    month_range, parse_month_and_year, previous_month, round2, weeks_in_month, DateRange,
    GoalSplit,
};
use crate::repository::{goals, sales};
use crate::services::report::MetricFigure;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesMetricsReport {
    pub total_revenue: MetricFigure,
    pub product_revenue: MetricFigure,
    pub service_revenue: MetricFigure,
    pub average_ticket: MetricFigure,
}

// Revenue figures count COMPLETED sales only; cancelled rows are invisible
// to reporting.
pub async fn sales_metrics(
    pool: &PgPool,
    month_and_year: &str,
    company_branch_id: i64,
) -> AppResult<SalesMetricsReport> {
    let (year, month) = parse_month_and_year(month_and_year)?;
    let (prev_year, prev_month) = previous_month(year, month);

    let current_range = month_range(year, month)?;
    let previous_range = month_range(prev_year, prev_month)?;
    let current_weeks = weeks_in_month(year, month)?;
    let previous_weeks = weeks_in_month(prev_year, prev_month)?;

    let (current_sales, previous_sales, goal) = try_join!(
        sales::completed_in_range(pool, company_branch_id, &current_range),
        sales::completed_in_range(pool, company_branch_id, &previous_range),
        goals::get_by_branch_and_period(pool, company_branch_id, year, month as i32),
    )?;

    Ok(build_report(
        &current_sales,
        &previous_sales,
        goal.as_ref(),
        &current_weeks,
        &previous_weeks,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PeriodFigures {
    total_revenue: f64,
    product_revenue: f64,
    service_revenue: f64,
    average_ticket: f64,
}

fn compute(sales: &[Sale]) -> PeriodFigures {
    let mut product_revenue = 0.0;
    let mut service_revenue = 0.0;
    for sale in sales {
        match sale.sale_type.as_str() {
            SALE_TYPE_PRODUCT => product_revenue += sale.total_value,
            SALE_TYPE_SERVICE => service_revenue += sale.total_value,
            _ => {}
        }
    }
    let total_revenue = product_revenue + service_revenue;
    let average_ticket = if sales.is_empty() {
        0.0
    } else {
        round2(total_revenue / sales.len() as f64)
    };
    PeriodFigures {
        total_revenue: round2(total_revenue),
        product_revenue: round2(product_revenue),
        service_revenue: round2(service_revenue),
        average_ticket,
    }
}

fn weekly(sales: &[Sale], weeks: &[DateRange; 4]) -> [PeriodFigures; 4] {
    let mut out = [compute(&[]); 4];
    for (slot, week) in out.iter_mut().zip(weeks) {
        let bucket: Vec<Sale> = sales
            .iter()
            .filter(|sale| week.contains(sale.sale_date))
            .cloned()
            .collect();
        *slot = compute(&bucket);
    }
    out
}

fn build_report(
    current_sales: &[Sale],
    previous_sales: &[Sale],
    goal: Option<&Goal>,
    current_weeks: &[DateRange; 4],
    previous_weeks: &[DateRange; 4],
) -> SalesMetricsReport {
    let current = compute(current_sales);
    let previous = compute(previous_sales);
    let current_weekly = weekly(current_sales, current_weeks);
    let previous_weekly = weekly(previous_sales, previous_weeks);

    let product_goal = goal.map_or(0.0, |g| g.product_revenue);
    let service_goal = goal.map_or(0.0, |g| g.service_revenue);
    let ticket_goal = goal.map_or(0.0, |g| g.ticket_average);

    let series = |pick: fn(&PeriodFigures) -> f64, weekly: &[PeriodFigures; 4]| {
        let mut values = [0.0; 4];
        for (slot, figures) in values.iter_mut().zip(weekly) {
            *slot = pick(figures);
        }
        values
    };

    SalesMetricsReport {
        total_revenue: MetricFigure::build(
            current.total_revenue,
            previous.total_revenue,
            product_goal + service_goal,
            series(|f| f.total_revenue, &current_weekly),
            series(|f| f.total_revenue, &previous_weekly),
            GoalSplit::DivideEvenly,
        ),
        product_revenue: MetricFigure::build(
            current.product_revenue,
            previous.product_revenue,
            product_goal,
            series(|f| f.product_revenue, &current_weekly),
            series(|f| f.product_revenue, &previous_weekly),
            GoalSplit::DivideEvenly,
        ),
        service_revenue: MetricFigure::build(
            current.service_revenue,
            previous.service_revenue,
            service_goal,
            series(|f| f.service_revenue, &current_weekly),
            series(|f| f.service_revenue, &previous_weekly),
            GoalSplit::DivideEvenly,
        ),
        average_ticket: MetricFigure::build(
            current.average_ticket,
            previous.average_ticket,
            ticket_goal,
            series(|f| f.average_ticket, &current_weekly),
            series(|f| f.average_ticket, &previous_weekly),
            GoalSplit::RepeatUnchanged,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sale(sale_type: &str, total_value: f64, day: u32) -> Sale {
        Sale {
            id: i64::from(day),
            sale_date: Utc.with_ymd_and_hms(2025, 4, day, 10, 0, 0).unwrap(),
            code: format!("S-{day}-{total_value}"),
            description: "item".to_string(),
            quantity: 1,
            unit_value: total_value,
            total_value,
            sale_type: sale_type.to_string(),
            status: "COMPLETED".to_string(),
            customer_id: 1,
            company_branch_id: 1,
            imported_spreadsheet_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 4, day, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn revenue_partitions_by_type() {
        let sales = vec![
            sale(SALE_TYPE_PRODUCT, 100.0, 2),
            sale(SALE_TYPE_PRODUCT, 50.0, 3),
            sale(SALE_TYPE_SERVICE, 30.0, 4),
        ];
        let figures = compute(&sales);
        assert_eq!(figures.total_revenue, 180.0);
        assert_eq!(figures.product_revenue, 150.0);
        assert_eq!(figures.service_revenue, 30.0);
        assert_eq!(figures.average_ticket, 60.0);
    }

    #[test]
    fn empty_period_is_all_zero() {
        let figures = compute(&[]);
        assert_eq!(figures.total_revenue, 0.0);
        assert_eq!(figures.average_ticket, 0.0);
    }

    #[test]
    fn goal_maps_and_splits() {
        let weeks = weeks_in_month(2025, 4).unwrap();
        let prev_weeks = weeks_in_month(2025, 3).unwrap();
        let goal = Goal {
            id: 1,
            company_branch_id: 1,
            year: 2025,
            month: 4,
            product_revenue: 600.0,
            service_revenue: 400.0,
            ticket_average: 75.0,
            customers: 0,
            new_customers: 0,
            products_per_client: 0.0,
            services_per_client: 0.0,
            marketing: 0.0,
            leads_generated: 0,
            leads_meetings: 0,
            marketing_sales: 0,
            cpl: 0.0,
            lead_to_meeting_rate: 0.0,
            meeting_to_sale_rate: 0.0,
            roas: 0.0,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        };
        let report = build_report(&[], &[], Some(&goal), &weeks, &prev_weeks);
        assert_eq!(report.total_revenue.selected_period_goal, 1000.0);
        assert_eq!(report.total_revenue.weekly_data.goal[0].value, 250.0);
        assert_eq!(report.product_revenue.weekly_data.goal[0].value, 150.0);
        // ticket goal repeats, it is a rate not a quantity
        assert_eq!(report.average_ticket.weekly_data.goal[3].value, 75.0);
    }

    #[test]
    fn weekly_buckets_follow_sale_dates() {
        let sales = vec![
            sale(SALE_TYPE_PRODUCT, 100.0, 1),
            sale(SALE_TYPE_SERVICE, 40.0, 9),
            sale(SALE_TYPE_PRODUCT, 60.0, 30),
        ];
        let weeks = weeks_in_month(2025, 4).unwrap();
        let prev_weeks = weeks_in_month(2025, 3).unwrap();
        let report = build_report(&sales, &[], None, &weeks, &prev_weeks);
        let current = &report.total_revenue.weekly_data.current;
        assert_eq!(current[0].value, 100.0);
        assert_eq!(current[1].value, 40.0);
        assert_eq!(current[2].value, 0.0);
        assert_eq!(current[3].value, 60.0);
    }
}
