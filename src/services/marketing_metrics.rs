use serde::Serialize;
use sqlx::PgPool;
use tokio::try_join;

use crate::error::AppResult;
use crate::models::{Goal, MarketingMetric};
use crate::period::{
    month_range, parse_month_and_year, previous_month, round2, weeks_in_month, DateRange,
    GoalSplit,
};
use crate::repository::{goals, marketing, sales};
use crate::services::report::MetricFigure;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingMetricsReport {
    pub total_investment: MetricFigure,
    pub total_leads: MetricFigure,
    pub total_sales: MetricFigure,
    pub average_cpl: MetricFigure,
    pub average_meeting_to_sale_rate: MetricFigure,
    pub average_roas: MetricFigure,
}

pub async fn average_metrics(
    pool: &PgPool,
    month_and_year: &str,
    company_branch_id: i64,
) -> AppResult<MarketingMetricsReport> {
    let (year, month) = parse_month_and_year(month_and_year)?;
    let (prev_year, prev_month) = previous_month(year, month);

    let current_range = month_range(year, month)?;
    let previous_range = month_range(prev_year, prev_month)?;
    let current_weeks = weeks_in_month(year, month)?;
    let previous_weeks = weeks_in_month(prev_year, prev_month)?;

    let (current_rows, previous_rows, goal, current_revenue, previous_revenue) = try_join!(
        marketing::by_range_and_branch(pool, company_branch_id, &current_range),
        marketing::by_range_and_branch(pool, company_branch_id, &previous_range),
        goals::get_by_branch_and_period(pool, company_branch_id, year, month as i32),
        sales::completed_revenue_in_range(pool, company_branch_id, &current_range),
        sales::completed_revenue_in_range(pool, company_branch_id, &previous_range),
    )?;

    // ROAS numerators are period-level revenue totals, fetched per week.
    let current_week_revenue =
        weekly_revenue(pool, company_branch_id, &current_weeks).await?;
    let previous_week_revenue =
        weekly_revenue(pool, company_branch_id, &previous_weeks).await?;

    Ok(build_report(
        &current_rows,
        &previous_rows,
        goal.as_ref(),
        current_revenue,
        previous_revenue,
        current_week_revenue,
        previous_week_revenue,
        &current_weeks,
        &previous_weeks,
    ))
}

async fn weekly_revenue(
    pool: &PgPool,
    company_branch_id: i64,
    weeks: &[DateRange; 4],
) -> AppResult<[f64; 4]> {
    let (first, second, third, fourth) = try_join!(
        sales::completed_revenue_in_range(pool, company_branch_id, &weeks[0]),
        sales::completed_revenue_in_range(pool, company_branch_id, &weeks[1]),
        sales::completed_revenue_in_range(pool, company_branch_id, &weeks[2]),
        sales::completed_revenue_in_range(pool, company_branch_id, &weeks[3]),
    )?;
    Ok([first, second, third, fourth])
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PeriodFigures {
    total_investment: f64,
    total_leads: f64,
    total_sales: f64,
    average_cpl: f64,
    average_meeting_to_sale_rate: f64,
    average_roas: f64,
}

/// `revenue` is the period's completed-sale total; ROAS divides it by the
/// period investment total once, it is not a mean of per-row ratios.
fn compute(rows: &[MarketingMetric], revenue: f64) -> PeriodFigures {
    let total_investment: f64 = rows.iter().map(|row| row.investment).sum();
    let total_leads: i64 = rows.iter().map(|row| row.leads_generated).sum();
    let total_sales: i64 = rows.iter().map(|row| row.sales).sum();

    let average_cpl = if total_leads == 0 {
        0.0
    } else {
        round2(total_investment / total_leads as f64)
    };
    let average_meeting_to_sale_rate = if total_leads == 0 {
        0.0
    } else {
        round2(total_sales as f64 / total_leads as f64 * 100.0)
    };
    let average_roas = if total_investment == 0.0 {
        0.0
    } else {
        round2(revenue / total_investment)
    };

    PeriodFigures {
        total_investment: round2(total_investment),
        total_leads: total_leads as f64,
        total_sales: total_sales as f64,
        average_cpl,
        average_meeting_to_sale_rate,
        average_roas,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_report(
    current_rows: &[MarketingMetric],
    previous_rows: &[MarketingMetric],
    goal: Option<&Goal>,
    current_revenue: f64,
    previous_revenue: f64,
    current_week_revenue: [f64; 4],
    previous_week_revenue: [f64; 4],
    current_weeks: &[DateRange; 4],
    previous_weeks: &[DateRange; 4],
) -> MarketingMetricsReport {
    let current = compute(current_rows, current_revenue);
    let previous = compute(previous_rows, previous_revenue);

    let weekly = |rows: &[MarketingMetric], weeks: &[DateRange; 4], revenue: [f64; 4]| {
        let mut out = [compute(&[], 0.0); 4];
        for (i, week) in weeks.iter().enumerate() {
            let bucket: Vec<MarketingMetric> = rows
                .iter()
                .filter(|row| week.contains(row.date))
                .cloned()
                .collect();
            out[i] = compute(&bucket, revenue[i]);
        }
        out
    };
    let current_weekly = weekly(current_rows, current_weeks, current_week_revenue);
    let previous_weekly = weekly(previous_rows, previous_weeks, previous_week_revenue);

    let investment_goal = goal.map_or(0.0, |g| g.marketing);
    let leads_goal = goal.map_or(0.0, |g| g.leads_generated as f64);
    let sales_goal = goal.map_or(0.0, |g| g.marketing_sales as f64);
    let cpl_goal = goal.map_or(0.0, |g| g.cpl);
    let rate_goal = goal.map_or(0.0, |g| g.meeting_to_sale_rate);
    let roas_goal = goal.map_or(0.0, |g| g.roas);

    let series = |pick: fn(&PeriodFigures) -> f64, weekly: &[PeriodFigures; 4]| {
        let mut values = [0.0; 4];
        for (slot, figures) in values.iter_mut().zip(weekly) {
            *slot = pick(figures);
        }
        values
    };

    MarketingMetricsReport {
        total_investment: MetricFigure::build(
            current.total_investment,
            previous.total_investment,
            investment_goal,
            series(|f| f.total_investment, &current_weekly),
            series(|f| f.total_investment, &previous_weekly),
            GoalSplit::DivideEvenly,
        ),
        total_leads: MetricFigure::build(
            current.total_leads,
            previous.total_leads,
            leads_goal,
            series(|f| f.total_leads, &current_weekly),
            series(|f| f.total_leads, &previous_weekly),
            GoalSplit::DivideEvenly,
        ),
        total_sales: MetricFigure::build(
            current.total_sales,
            previous.total_sales,
            sales_goal,
            series(|f| f.total_sales, &current_weekly),
            series(|f| f.total_sales, &previous_weekly),
            GoalSplit::DivideEvenly,
        ),
        average_cpl: MetricFigure::build(
            current.average_cpl,
            previous.average_cpl,
            cpl_goal,
            series(|f| f.average_cpl, &current_weekly),
            series(|f| f.average_cpl, &previous_weekly),
            GoalSplit::RepeatUnchanged,
        ),
        average_meeting_to_sale_rate: MetricFigure::build(
            current.average_meeting_to_sale_rate,
            previous.average_meeting_to_sale_rate,
            rate_goal,
            series(|f| f.average_meeting_to_sale_rate, &current_weekly),
            series(|f| f.average_meeting_to_sale_rate, &previous_weekly),
            GoalSplit::RepeatUnchanged,
        ),
        average_roas: MetricFigure::build(
            current.average_roas,
            previous.average_roas,
            roas_goal,
            series(|f| f.average_roas, &current_weekly),
            series(|f| f.average_roas, &previous_weekly),
            GoalSplit::RepeatUnchanged,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn metric(investment: f64, leads: i64, sales: i64, day: u32) -> MarketingMetric {
        MarketingMetric {
            id: i64::from(day),
            date: Utc.with_ymd_and_hms(2025, 4, day, 0, 0, 0).unwrap(),
            source: "GOOGLE".to_string(),
            investment,
            leads_generated: leads,
            sales,
            cpl: 0.0,
            meeting_to_sale_rate: 0.0,
            roas: 0.0,
            impressions: None,
            clicks: None,
            ctr: None,
            cpc: None,
            company_branch_id: 1,
            created_at: Utc.with_ymd_and_hms(2025, 4, day, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn roas_divides_period_revenue_by_period_investment() {
        // Two rows at 100 each; revenue 400 gives 2.0, not an average of
        // per-row ratios.
        let rows = vec![metric(100.0, 10, 2, 3), metric(100.0, 30, 4, 9)];
        let figures = compute(&rows, 400.0);
        assert_eq!(figures.average_roas, 2.0);
        assert_eq!(figures.total_investment, 200.0);
        assert_eq!(figures.total_leads, 40.0);
        assert_eq!(figures.average_cpl, 5.0);
        assert_eq!(figures.average_meeting_to_sale_rate, 15.0);
    }

    #[test]
    fn zero_denominators_yield_zero() {
        let figures = compute(&[], 500.0);
        assert_eq!(figures.average_cpl, 0.0);
        assert_eq!(figures.average_meeting_to_sale_rate, 0.0);
        assert_eq!(figures.average_roas, 0.0);

        let rows = vec![metric(0.0, 0, 0, 3)];
        let figures = compute(&rows, 500.0);
        assert_eq!(figures.average_roas, 0.0);
    }

    #[test]
    fn weekly_buckets_use_their_own_revenue() {
        let rows = vec![metric(50.0, 5, 1, 2), metric(50.0, 5, 1, 10)];
        let weeks = weeks_in_month(2025, 4).unwrap();
        let prev_weeks = weeks_in_month(2025, 3).unwrap();
        let report = build_report(
            &rows,
            &[],
            None,
            1000.0,
            0.0,
            [100.0, 200.0, 0.0, 0.0],
            [0.0; 4],
            &weeks,
            &prev_weeks,
        );
        let roas = &report.average_roas.weekly_data.current;
        assert_eq!(roas[0].value, 2.0);
        assert_eq!(roas[1].value, 4.0);
        assert_eq!(roas[2].value, 0.0);
        assert_eq!(report.average_roas.selected_period, 10.0);
    }

    #[test]
    fn goal_split_mirrors_figure_kind() {
        let goal = Goal {
            id: 1,
            company_branch_id: 1,
            year: 2025,
            month: 4,
            product_revenue: 0.0,
            service_revenue: 0.0,
            ticket_average: 0.0,
            customers: 0,
            new_customers: 0,
            products_per_client: 0.0,
            services_per_client: 0.0,
            marketing: 2000.0,
            leads_generated: 100,
            leads_meetings: 0,
            marketing_sales: 20,
            cpl: 12.5,
            lead_to_meeting_rate: 0.0,
            meeting_to_sale_rate: 30.0,
            roas: 4.0,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        };
        let weeks = weeks_in_month(2025, 4).unwrap();
        let prev_weeks = weeks_in_month(2025, 3).unwrap();
        let report = build_report(
            &[],
            &[],
            Some(&goal),
            0.0,
            0.0,
            [0.0; 4],
            [0.0; 4],
            &weeks,
            &prev_weeks,
        );
        assert_eq!(report.total_investment.weekly_data.goal[0].value, 500.0);
        assert_eq!(report.total_leads.weekly_data.goal[0].value, 25.0);
        assert_eq!(report.average_cpl.weekly_data.goal[2].value, 12.5);
        assert_eq!(report.average_roas.weekly_data.goal[3].value, 4.0);
    }
}
