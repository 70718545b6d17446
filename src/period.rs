use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

use crate::error::{AppError, AppResult};

/// Weekly bucket labels, by position within the month.
pub const WEEK_LABELS: [&str; 4] = ["Sem 1", "Sem 2", "Sem 3", "Sem 4"];

/// Inclusive instant range: start-of-day on the first date through
/// end-of-day (23:59:59.999) on the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn of_days(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: start_of_day(first),
            end: end_of_day(last),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// How a monthly goal is distributed across the 4 weekly buckets.
/// Count- and revenue-like goals split evenly; rate-like goals repeat
/// the full monthly value in every bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalSplit {
    DivideEvenly,
    RepeatUnchanged,
}

pub fn weekly_goal_values(goal: f64, split: GoalSplit) -> [f64; 4] {
    let value = match split {
        GoalSplit::DivideEvenly => (goal / 4.0).round(),
        GoalSplit::RepeatUnchanged => goal,
    };
    [value; 4]
}

/// Round half away from zero at 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn month_range(year: i32, month: u32) -> AppResult<DateRange> {
    let first = first_day(year, month)?;
    Ok(DateRange::of_days(first, last_day_of_month(first)))
}

pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Split a month into exactly 4 contiguous weekly sub-ranges.
///
/// `days_per_week = ceil(total_days / 4)`; week i covers days
/// `1 + i*days_per_week ..= min(total_days, (i+1)*days_per_week)`, and the
/// fourth week always ends on the month's last day, absorbing the
/// remainder. This is a positional split, not a calendar-week split.
pub fn weeks_in_month(year: i32, month: u32) -> AppResult<[DateRange; 4]> {
    let first = first_day(year, month)?;
    let total_days = last_day_of_month(first).day() as i64;
    let days_per_week = (total_days + 3) / 4;

    let mut weeks = [DateRange::of_days(first, first); 4];
    for (i, week) in weeks.iter_mut().enumerate() {
        let index = i as i64;
        let start_day = 1 + index * days_per_week;
        let end_day = if i == 3 {
            total_days
        } else {
            total_days.min((index + 1) * days_per_week)
        };
        let start = first + chrono::Duration::days(start_day - 1);
        let end = first + chrono::Duration::days(end_day - 1);
        *week = DateRange::of_days(start, end);
    }
    Ok(weeks)
}

/// Parse the `monthAndYear=YYYY-MM` query literal.
pub fn parse_month_and_year(raw: &str) -> AppResult<(i32, u32)> {
    let invalid = || AppError::BadRequest("monthAndYear must match YYYY-MM.".to_string());

    let (year_part, month_part) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year = year_part.parse::<i32>().map_err(|_| invalid())?;
    let month = month_part.parse::<u32>().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBound {
    Start,
    End,
}

/// Parse a `YYYY-MM-DD` literal into a start-of-day or end-of-day instant
/// for inclusive range filtering.
pub fn parse_day(raw: &str, bound: DayBound) -> AppResult<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("Invalid ISO date.".to_string()))?;
    Ok(match bound {
        DayBound::Start => start_of_day(date),
        DayBound::End => end_of_day(date),
    })
}

fn first_day(year: i32, month: u32) -> AppResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::BadRequest("Invalid year/month.".to_string()))
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .map(|next_first| next_first - chrono::Duration::days(1))
        .unwrap_or(first)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(end).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day_span(range: &DateRange) -> (u32, u32) {
        (range.start.day(), range.end.day())
    }

    #[test]
    fn four_weeks_cover_every_month_without_gaps() {
        for (year, month) in (1..=12).map(|m| (2025, m)).chain([(2024, 2)]) {
            let weeks = weeks_in_month(year, month).unwrap();
            let month_bounds = month_range(year, month).unwrap();

            assert_eq!(weeks[0].start, month_bounds.start);
            assert_eq!(weeks[3].end, month_bounds.end);

            let mut covered = 0_i64;
            for (i, week) in weeks.iter().enumerate() {
                assert!(week.start <= week.end);
                covered += (week.end.date_naive() - week.start.date_naive()).num_days() + 1;
                if i > 0 {
                    let previous_end = weeks[i - 1].end.date_naive();
                    assert_eq!(
                        week.start.date_naive(),
                        previous_end + chrono::Duration::days(1),
                        "gap or overlap at week {} of {}-{:02}",
                        i + 1,
                        year,
                        month
                    );
                }
            }
            let total_days =
                (month_bounds.end.date_naive() - month_bounds.start.date_naive()).num_days() + 1;
            assert_eq!(covered, total_days);
        }
    }

    #[test]
    fn thirty_day_month_buckets() {
        let weeks = weeks_in_month(2025, 4).unwrap();
        let spans: Vec<(u32, u32)> = weeks.iter().map(day_span).collect();
        assert_eq!(spans, vec![(1, 8), (9, 16), (17, 24), (25, 30)]);
    }

    #[test]
    fn short_and_long_month_buckets() {
        let february = weeks_in_month(2025, 2).unwrap();
        let spans: Vec<(u32, u32)> = february.iter().map(day_span).collect();
        assert_eq!(spans, vec![(1, 7), (8, 14), (15, 21), (22, 28)]);

        let january = weeks_in_month(2025, 1).unwrap();
        let spans: Vec<(u32, u32)> = january.iter().map(day_span).collect();
        assert_eq!(spans, vec![(1, 8), (9, 16), (17, 24), (25, 31)]);
    }

    #[test]
    fn previous_month_wraps_january() {
        assert_eq!(previous_month(2025, 1), (2024, 12));
        assert_eq!(previous_month(2025, 6), (2025, 5));
    }

    #[test]
    fn month_literal_parses_or_rejects() {
        assert_eq!(parse_month_and_year("2025-03").unwrap(), (2025, 3));
        assert!(parse_month_and_year("2025").is_err());
        assert!(parse_month_and_year("2025-13").is_err());
        assert!(parse_month_and_year("abc-04").is_err());
    }

    #[test]
    fn day_literal_bounds() {
        let start = parse_day("2025-04-10", DayBound::Start).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-04-10T00:00:00+00:00");

        let end = parse_day("2025-04-10", DayBound::End).unwrap();
        assert_eq!(end.to_rfc3339(), "2025-04-10T23:59:59.999+00:00");

        assert!(parse_day("10/04/2025", DayBound::Start).is_err());
        assert!(parse_day("2025-04", DayBound::Start).is_err());
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 0.125 and 12.5 are exactly representable, so these pin the
        // tie-breaking direction rather than float noise.
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(1.004), 1.0);
        assert_eq!(round2(201.0 / 100.0 / 2.0 + 0.0001), 1.01);
    }

    #[test]
    fn goal_split_policies() {
        assert_eq!(weekly_goal_values(100.0, GoalSplit::DivideEvenly), [25.0; 4]);
        // round half away from zero on the per-week share
        assert_eq!(weekly_goal_values(10.0, GoalSplit::DivideEvenly), [3.0; 4]);
        assert_eq!(
            weekly_goal_values(7.5, GoalSplit::RepeatUnchanged),
            [7.5; 4]
        );
        assert_eq!(weekly_goal_values(0.0, GoalSplit::DivideEvenly), [0.0; 4]);
    }
}
