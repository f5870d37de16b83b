// Period rollups: rows → days → ISO weeks, and rows → month.
//
// Missing values are left out of every aggregate instead of counting as
// zero. The fleet cost rule differs by level: summed per day (and the week
// averages those daily totals) but averaged over rows for the month.
use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::types::{DailyAggregate, Kpi, KpiRow, KpiValues, WeeklyAggregate};
use crate::util::{mean_present, sum_present};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollup {
    Sum,
    Mean,
}

impl Rollup {
    pub fn apply<I>(self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        match self {
            Rollup::Sum => sum_present(values),
            Rollup::Mean => mean_present(values),
        }
    }
}

/// How site rows of one date combine into the daily value.
pub fn daily_rule(kpi: Kpi) -> Rollup {
    match kpi {
        Kpi::Vehicles | Kpi::Stops | Kpi::FleetCost => Rollup::Sum,
        Kpi::StopAverage | Kpi::UnplannedStops | Kpi::StopCost => Rollup::Mean,
    }
}

/// How all rows of a month combine into the monthly value.
pub fn monthly_rule(kpi: Kpi) -> Rollup {
    match kpi {
        Kpi::Vehicles | Kpi::Stops => Rollup::Sum,
        Kpi::StopAverage | Kpi::UnplannedStops | Kpi::FleetCost | Kpi::StopCost => Rollup::Mean,
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn rollup_rows(rows: &[&KpiRow], rule: fn(Kpi) -> Rollup) -> KpiValues {
    KpiValues::from_fn(|kpi| rule(kpi).apply(rows.iter().map(|r| r.value(kpi))))
}

/// One entry per date, ascending.
pub fn aggregate_daily(rows: &[KpiRow]) -> Vec<DailyAggregate> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&KpiRow>> = BTreeMap::new();
    for r in rows {
        by_date.entry(r.date).or_default().push(r);
    }
    let daily: Vec<DailyAggregate> = by_date
        .into_iter()
        .map(|(date, group)| DailyAggregate {
            date,
            values: rollup_rows(&group, daily_rule),
        })
        .collect();
    debug!(rows = rows.len(), days = daily.len(), "aggregated daily");
    daily
}

/// One entry per ISO week, ordered by the week's Monday. Each value is the
/// mean of that week's daily values ("average daily total" for sums).
pub fn aggregate_weekly(daily: &[DailyAggregate]) -> Vec<WeeklyAggregate> {
    let mut by_week: BTreeMap<NaiveDate, Vec<&DailyAggregate>> = BTreeMap::new();
    for day in daily {
        by_week.entry(week_start(day.date)).or_default().push(day);
    }
    by_week
        .into_iter()
        .map(|(start, days)| {
            let iso = start.iso_week();
            WeeklyAggregate {
                iso_year: iso.year(),
                week: iso.week(),
                start,
                values: KpiValues::from_fn(|kpi| mean_present(days.iter().map(|d| d.values.get(kpi)))),
            }
        })
        .collect()
}

/// Single rollup over every row of the period.
pub fn aggregate_monthly(rows: &[KpiRow]) -> KpiValues {
    let refs: Vec<&KpiRow> = rows.iter().collect();
    rollup_rows(&refs, monthly_rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn row(date: NaiveDate, site: &str, vehicles: u32, stops: u32, cost: f64) -> KpiRow {
        KpiRow::with_inputs(date, site, Some(vehicles), Some(stops), None, Some(cost))
    }

    #[test]
    fn daily_sums_counts_and_averages_ratios() {
        let rows = vec![
            row(day(12, 1), "A", 2, 20, 100.0),
            row(day(12, 1), "B", 4, 20, 300.0),
            KpiRow::empty(day(12, 1), "C"),
        ];
        let daily = aggregate_daily(&rows);
        assert_eq!(daily.len(), 1);
        let v = daily[0].values;
        assert_eq!(v.vehicles, Some(6.0));
        assert_eq!(v.stops, Some(40.0));
        assert_eq!(v.stop_average, Some(7.5));
        assert_eq!(v.fleet_cost, Some(400.0));
        assert_eq!(v.stop_cost, Some(10.0));
        assert_eq!(v.unplanned_stops, None);
    }

    #[test]
    fn weekly_mean_is_over_daily_totals() {
        let rows = vec![
            row(day(12, 1), "A", 1, 10, 10.0),
            row(day(12, 1), "B", 1, 20, 10.0),
            row(day(12, 2), "A", 1, 30, 10.0),
        ];
        let weekly = aggregate_weekly(&aggregate_daily(&rows));
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].values.stops, Some(30.0));
        assert_eq!(weekly[0].label(), "KW 49");
    }

    #[test]
    fn empty_seeded_days_do_not_drag_weekly_means() {
        let rows = vec![
            row(day(12, 1), "A", 2, 20, 50.0),
            KpiRow::empty(day(12, 2), "A"),
            KpiRow::empty(day(12, 3), "A"),
        ];
        let weekly = aggregate_weekly(&aggregate_daily(&rows));
        assert_eq!(weekly[0].values.stops, Some(20.0));
        assert_eq!(weekly[0].values.vehicles, Some(2.0));
    }

    #[test]
    fn weeks_order_by_start_date_across_year_boundary() {
        let rows = vec![
            row(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(), "A", 1, 10, 10.0),
            row(day(12, 29), "A", 1, 10, 10.0),
            row(day(12, 22), "A", 1, 10, 10.0),
        ];
        let weekly = aggregate_weekly(&aggregate_daily(&rows));
        let labels: Vec<String> = weekly.iter().map(|w| w.label()).collect();
        assert_eq!(labels, ["KW 52", "KW 1", "KW 2"]);
        assert_eq!(weekly[1].iso_year, 2026);
        assert_eq!(weekly[1].start, day(12, 29));
    }

    #[test]
    fn fleet_cost_is_summed_per_day() {
        let rows = vec![
            row(day(12, 1), "A", 1, 10, 100.0),
            row(day(12, 1), "B", 1, 10, 200.0),
            row(day(12, 2), "A", 1, 10, 500.0),
        ];
        let daily = aggregate_daily(&rows);
        assert_eq!(daily[0].values.fleet_cost, Some(300.0));
        let weekly = aggregate_weekly(&daily);
        assert_eq!(weekly[0].values.fleet_cost, Some(400.0));
    }

    #[test]
    fn fleet_cost_is_averaged_per_month() {
        let rows = vec![
            row(day(12, 1), "A", 1, 10, 100.0),
            row(day(12, 1), "B", 1, 10, 200.0),
            row(day(12, 2), "A", 1, 10, 600.0),
        ];
        let month = aggregate_monthly(&rows);
        assert_eq!(month.fleet_cost, Some(300.0));
        assert_eq!(month.vehicles, Some(3.0));
        assert_eq!(month.stops, Some(30.0));
        assert_eq!(month.stop_cost, Some(30.0));
    }

    #[test]
    fn monthly_of_unfilled_period_is_all_missing() {
        let rows = vec![KpiRow::empty(day(12, 1), "A"), KpiRow::empty(day(12, 2), "B")];
        assert_eq!(aggregate_monthly(&rows), KpiValues::default());
    }
}
