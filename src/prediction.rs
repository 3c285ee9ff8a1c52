use chrono::{Duration, NaiveDate};

use crate::date_key;
use crate::models::{CalendarDay, CycleStats, DayLog, MonthData, PeriodSummary, PredictionMap};

/// Longest period run that is followed forward from its start day.
pub const MAX_PERIOD_SCAN_DAYS: u32 = 10;
/// Number of future cycles that get projected.
pub const PROJECTED_CYCLES: i64 = 3;
/// Days marked for each predicted period, starting on the predicted day.
pub const PREDICTED_PERIOD_DAYS: i64 = 5;
/// Ovulation is placed this many days before a predicted period.
pub const LUTEAL_PHASE_DAYS: i64 = 14;
/// Days before ovulation included in the fertile window.
pub const FERTILE_DAYS_BEFORE_OVULATION: i64 = 5;
/// Cycle length assumed when there is not enough history.
pub const DEFAULT_CYCLE_LENGTH: i64 = 28;

/// First day of every contiguous run of period days, oldest first.
pub fn period_starts(log: &DayLog) -> Vec<NaiveDate> {
    log.period_days()
        .filter(|day| !log.is_period(*day - Duration::days(1)))
        .collect()
}

/// Mean gap in days between consecutive starts, rounded to a whole day.
/// Requires at least two starts.
pub fn cycle_length(starts: &[NaiveDate]) -> Option<i64> {
    let gaps = cycle_gaps(starts);
    if gaps.is_empty() {
        return None;
    }
    let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
    Some(mean.round() as i64)
}

fn cycle_gaps(starts: &[NaiveDate]) -> Vec<i64> {
    starts
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect()
}

/// Average cycle length of the whole log.
pub fn average_cycle_length(log: &DayLog) -> Option<i64> {
    cycle_length(&period_starts(log))
}

/// Project the next cycles forward from the most recent start.
pub fn project(starts: &[NaiveDate], cycle_length: i64) -> PredictionMap {
    let mut predictions = PredictionMap::default();
    let Some(&last_start) = starts.last() else {
        return predictions;
    };

    for i in 1..=PROJECTED_CYCLES {
        let predicted = last_start + Duration::days(cycle_length * i);
        for offset in 0..PREDICTED_PERIOD_DAYS {
            predictions.mark(predicted + Duration::days(offset), |p| {
                p.predicted_period = true
            });
        }

        let ovulation = predicted - Duration::days(LUTEAL_PHASE_DAYS);
        predictions.mark(ovulation, |p| p.predicted_ovulation = true);

        let fertile_start = ovulation - Duration::days(FERTILE_DAYS_BEFORE_OVULATION);
        for day in date_key::days_inclusive(fertile_start, ovulation) {
            predictions.mark(day, |p| p.fertile_window = true);
        }
    }

    predictions
}

/// Predicted periods, ovulation days and fertile windows for the next cycles.
/// Empty when fewer than two periods have been logged.
pub fn predict(log: &DayLog) -> PredictionMap {
    let starts = period_starts(log);
    match cycle_length(&starts) {
        Some(length) => project(&starts, length),
        None => PredictionMap::default(),
    }
}

/// Number of consecutive period days beginning at `start`, at least 1 and
/// at most [`MAX_PERIOD_SCAN_DAYS`].
pub fn period_length(log: &DayLog, start: NaiveDate) -> u32 {
    let following = (1..MAX_PERIOD_SCAN_DAYS)
        .take_while(|i| log.is_period(start + Duration::days(i64::from(*i))))
        .count() as u32;
    1 + following
}

/// The most recent logged period day.
pub fn last_period_end(log: &DayLog) -> Option<NaiveDate> {
    log.period_days().next_back()
}

/// Where the next period is expected to begin, for pre-filling a date input.
pub fn suggested_next_start(log: &DayLog, today: NaiveDate) -> NaiveDate {
    match last_period_end(log) {
        Some(end) => {
            let cycle = average_cycle_length(log).unwrap_or(DEFAULT_CYCLE_LENGTH);
            end + Duration::days(cycle)
        }
        None => today,
    }
}

/// The last `count` periods, newest first.
pub fn recent_periods(log: &DayLog, count: usize) -> Vec<PeriodSummary> {
    period_starts(log)
        .into_iter()
        .rev()
        .take(count)
        .map(|start| PeriodSummary {
            start,
            length: period_length(log, start),
        })
        .collect()
}

/// Compute cycle statistics for the stats view.
pub fn cycle_stats(log: &DayLog) -> CycleStats {
    let starts = period_starts(log);
    let Some(&last_start) = starts.last() else {
        return CycleStats::default();
    };

    let period_lengths: Vec<u32> = starts.iter().map(|s| period_length(log, *s)).collect();
    let gaps = cycle_gaps(&starts);

    CycleStats {
        total_periods: starts.len(),
        avg_cycle_length: cycle_length(&starts),
        avg_period_length: Some(
            period_lengths.iter().sum::<u32>() as f32 / period_lengths.len() as f32,
        ),
        shortest_cycle: gaps.iter().copied().min(),
        longest_cycle: gaps.iter().copied().max(),
        last_period_start: Some(last_start),
        last_period_end: last_period_end(log),
    }
}

/// Every day of a month with what was logged and what is predicted.
pub fn month_view(
    log: &DayLog,
    predictions: &PredictionMap,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Option<MonthData> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    let last_day = next_month - Duration::days(1);

    let days = date_key::days_inclusive(first_day, last_day)
        .map(|date| CalendarDay {
            date,
            is_today: date == today,
            record: log.get(date).cloned(),
            prediction: predictions.get(date).copied(),
        })
        .collect();

    Some(MonthData { year, month, days })
}
