use serde::Serialize;

use crate::period::{weekly_goal_values, GoalSplit, WEEK_LABELS};

/// One weekly bucket of a report series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekPoint {
    pub week: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySeries {
    pub current: Vec<WeekPoint>,
    pub previous: Vec<WeekPoint>,
    pub goal: Vec<WeekPoint>,
}

/// The month-over-month comparison shape every reporting figure uses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFigure {
    pub selected_period: f64,
    pub previous_month: f64,
    pub selected_period_goal: f64,
    pub weekly_data: WeeklySeries,
}

pub fn week_points(values: [f64; 4]) -> Vec<WeekPoint> {
    WEEK_LABELS
        .into_iter()
        .zip(values)
        .map(|(week, value)| WeekPoint { week, value })
        .collect()
}

impl MetricFigure {
    pub fn build(
        selected_period: f64,
        previous_month: f64,
        goal: f64,
        current: [f64; 4],
        previous: [f64; 4],
        split: GoalSplit,
    ) -> Self {
        Self {
            selected_period,
            previous_month,
            selected_period_goal: goal,
            weekly_data: WeeklySeries {
                current: week_points(current),
                previous: week_points(previous),
                goal: week_points(weekly_goal_values(goal, split)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn figure_carries_labeled_weeks() {
        let figure = MetricFigure::build(
            10.0,
            8.0,
            12.0,
            [1.0, 2.0, 3.0, 4.0],
            [2.0, 2.0, 2.0, 2.0],
            GoalSplit::DivideEvenly,
        );
        assert_eq!(figure.weekly_data.current[0].week, "Sem 1");
        assert_eq!(figure.weekly_data.current[3].week, "Sem 4");
        assert_eq!(figure.weekly_data.current[2].value, 3.0);
        assert_eq!(figure.weekly_data.goal[1].value, 3.0);
    }

    #[test]
    fn rate_goals_repeat_instead_of_dividing() {
        let figure = MetricFigure::build(
            0.0,
            0.0,
            7.5,
            [0.0; 4],
            [0.0; 4],
            GoalSplit::RepeatUnchanged,
        );
        for point in &figure.weekly_data.goal {
            assert_eq!(point.value, 7.5);
        }
    }
}
