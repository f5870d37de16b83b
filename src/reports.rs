use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::{aggregate_daily, aggregate_monthly, aggregate_weekly};
use crate::delta::{compare, kpi_series, Delta, KpiDeltas};
use crate::period::PeriodId;
use crate::types::{Kpi, KpiRow, KpiValues, SiteCostRow, WeeklyAggregate};
use crate::util::{
    format_date, format_int, format_money, format_number, format_opt, format_pct, format_signed,
    mean_present, sum_present,
};

/// A computed table ready for display or export: named columns and rows of
/// already formatted cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, columns: Vec<String>) -> Self {
        ReportTable {
            title: title.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }
}

/// Display form of a KPI value: counts as whole numbers, ratios with one
/// decimal (trailing `,0` dropped), money with two decimals and `€`.
pub fn format_kpi(kpi: Kpi, value: Option<f64>) -> String {
    match kpi {
        Kpi::Vehicles | Kpi::Stops => format_opt(value, 0),
        Kpi::StopAverage | Kpi::UnplannedStops => {
            let s = format_opt(value, 1);
            s.strip_suffix(",0").map(str::to_string).unwrap_or(s)
        }
        Kpi::FleetCost | Kpi::StopCost => format_money(value),
    }
}

fn short(kpi: Kpi) -> &'static str {
    match kpi {
        Kpi::Vehicles => "Vehicles",
        Kpi::Stops => "Stops",
        Kpi::StopAverage => "Average",
        Kpi::UnplannedStops => "Unplanned",
        Kpi::FleetCost => "Fleet",
        Kpi::StopCost => "Stop cost",
    }
}

fn weekly_heading(kpi: Kpi) -> &'static str {
    match kpi {
        Kpi::Vehicles => "Ø Vehicles/day",
        Kpi::Stops => "Ø Stops/day",
        Kpi::StopAverage => "Ø Average",
        Kpi::UnplannedStops => "Ø Unplanned",
        Kpi::FleetCost => "Ø Fleet",
        Kpi::StopCost => "Ø Stop cost",
    }
}

fn delta_cells(d: Delta) -> [String; 2] {
    [format_signed(d.delta, 1), format_pct(d.delta_pct)]
}

// ---------------------------------------------------------------- weekly

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub weeks: Vec<WeeklyAggregate>,
    pub deltas: Vec<KpiDeltas>,
}

/// Week-over-week comparison of one period's rows.
pub fn weekly_report(rows: &[KpiRow]) -> WeeklyReport {
    let weeks = aggregate_weekly(&aggregate_daily(rows));
    let values: Vec<KpiValues> = weeks.iter().map(|w| w.values).collect();
    let deltas = kpi_series(&values);
    debug!(weeks = weeks.len(), "weekly report");
    WeeklyReport { weeks, deltas }
}

pub fn weekly_table(title: &str, report: &WeeklyReport) -> ReportTable {
    let mut columns = vec!["Week".to_string()];
    for kpi in Kpi::ALL {
        columns.push(weekly_heading(kpi).to_string());
        columns.push(format!("{} Δ", short(kpi)));
        columns.push(format!("{} Δ%", short(kpi)));
    }
    let mut table = ReportTable::new(title, columns);
    for (week, deltas) in report.weeks.iter().zip(&report.deltas) {
        let mut row = vec![week.label()];
        for kpi in Kpi::ALL {
            row.push(format_kpi(kpi, week.values.get(kpi)));
            row.extend(delta_cells(deltas.get(kpi)));
        }
        table.push(row);
    }
    table
}

// ---------------------------------------------------------------- months

#[derive(Debug, Clone, PartialEq)]
pub struct MonthComparison {
    pub first: PeriodId,
    pub second: PeriodId,
    pub first_values: KpiValues,
    pub second_values: KpiValues,
    pub deltas: KpiDeltas,
}

/// Compare two arbitrary periods; `first` plays the role of the earlier one.
pub fn compare_months(
    first: (PeriodId, &[KpiRow]),
    second: (PeriodId, &[KpiRow]),
) -> MonthComparison {
    let first_values = aggregate_monthly(first.1);
    let second_values = aggregate_monthly(second.1);
    MonthComparison {
        first: first.0,
        second: second.0,
        first_values,
        second_values,
        deltas: KpiDeltas::between(&first_values, &second_values),
    }
}

pub fn comparison_table(cmp: &MonthComparison) -> ReportTable {
    let columns = vec![
        "KPI".to_string(),
        cmp.first.to_string(),
        cmp.second.to_string(),
        "Delta".to_string(),
        "Delta %".to_string(),
    ];
    let mut table = ReportTable::new(format!("Comparison: {} vs {}", cmp.first, cmp.second), columns);
    for kpi in Kpi::ALL {
        let d = cmp.deltas.get(kpi);
        table.push(vec![
            kpi.label().to_string(),
            format_opt(cmp.first_values.get(kpi), 2),
            format_opt(cmp.second_values.get(kpi), 2),
            format_signed(d.delta, 2),
            format_pct(d.delta_pct),
        ]);
    }
    table
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTrend {
    pub months: Vec<(PeriodId, KpiValues)>,
    pub deltas: Vec<KpiDeltas>,
}

/// Monthly rollups of several periods in chronological order, with
/// month-over-month deltas.
pub fn monthly_trend(periods: &[(PeriodId, Vec<KpiRow>)]) -> MonthlyTrend {
    let mut months: Vec<(PeriodId, KpiValues)> = periods
        .iter()
        .map(|(id, rows)| (*id, aggregate_monthly(rows)))
        .collect();
    months.sort_by_key(|(id, _)| *id);
    months.dedup_by_key(|(id, _)| *id);
    let values: Vec<KpiValues> = months.iter().map(|(_, v)| *v).collect();
    let deltas = kpi_series(&values);
    MonthlyTrend { months, deltas }
}

pub fn trend_table(trend: &MonthlyTrend) -> ReportTable {
    let mut columns = vec!["Month".to_string()];
    for kpi in Kpi::ALL {
        columns.push(kpi.label().to_string());
        columns.push(format!("{} Δ", short(kpi)));
        columns.push(format!("{} Δ%", short(kpi)));
    }
    let mut table = ReportTable::new(format!("Trend over {} months", trend.months.len()), columns);
    for ((id, values), deltas) in trend.months.iter().zip(&trend.deltas) {
        let mut row = vec![id.to_string()];
        for kpi in Kpi::ALL {
            row.push(format_kpi(kpi, values.get(kpi)));
            row.extend(delta_cells(deltas.get(kpi)));
        }
        table.push(row);
    }
    table
}

// ---------------------------------------------------------------- daily

#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub previous: Option<NaiveDate>,
    pub avg_stop_cost: Option<f64>,
    pub total_stops: f64,
    pub total_vehicles: f64,
    pub avg_stop_average: Option<f64>,
    pub avg_unplanned: Option<f64>,
    /// Stops per vehicle over the day; 0 without vehicles.
    pub efficiency: f64,
    pub active_sites: usize,
    pub delta_stop_cost: Option<f64>,
    pub delta_stops: Option<f64>,
    pub delta_vehicles: Option<f64>,
    pub sites: Vec<KpiRow>,
}

/// Report on the latest date that has reported rows, compared with the
/// previous such date. `None` if nothing has been reported yet.
pub fn daily_report(rows: &[KpiRow]) -> Option<DailyReport> {
    let reported: Vec<&KpiRow> = rows.iter().filter(|r| r.is_reported()).collect();
    let mut dates: Vec<NaiveDate> = reported.iter().map(|r| r.date).collect();
    dates.sort();
    dates.dedup();
    let date = *dates.last()?;
    let previous = dates.len().checked_sub(2).map(|i| dates[i]);

    let on = |d: NaiveDate| {
        reported
            .iter()
            .copied()
            .filter(|r| r.date == d)
            .collect::<Vec<_>>()
    };
    let latest = on(date);
    let stop_cost = |rs: &[&KpiRow]| mean_present(rs.iter().map(|r| r.stop_cost()));
    let stops = |rs: &[&KpiRow]| sum_present(rs.iter().map(|r| r.value(Kpi::Stops))).unwrap_or(0.0);
    let vehicles =
        |rs: &[&KpiRow]| sum_present(rs.iter().map(|r| r.value(Kpi::Vehicles))).unwrap_or(0.0);

    let avg_stop_cost = stop_cost(&latest);
    let total_stops = stops(&latest);
    let total_vehicles = vehicles(&latest);

    let (delta_stop_cost, delta_stops, delta_vehicles) = match previous.map(on) {
        Some(prev) => (
            compare(stop_cost(&prev), avg_stop_cost).delta,
            Some(total_stops - stops(&prev)),
            Some(total_vehicles - vehicles(&prev)),
        ),
        None => (None, None, None),
    };

    Some(DailyReport {
        date,
        previous,
        avg_stop_cost,
        total_stops,
        total_vehicles,
        avg_stop_average: mean_present(latest.iter().map(|r| r.stop_average())),
        avg_unplanned: mean_present(latest.iter().map(|r| r.unplanned_stops)),
        efficiency: if total_vehicles > 0.0 {
            total_stops / total_vehicles
        } else {
            0.0
        },
        active_sites: latest.len(),
        delta_stop_cost,
        delta_stops,
        delta_vehicles,
        sites: latest.into_iter().cloned().collect(),
    })
}

impl DailyReport {
    pub fn summary_table(&self) -> ReportTable {
        let title = match self.previous {
            Some(p) => format!(
                "Daily report {} (compared to {})",
                format_date(self.date),
                format_date(p)
            ),
            None => format!("Daily report {}", format_date(self.date)),
        };
        let columns = vec!["KPI".to_string(), "Value".to_string(), "Δ previous day".to_string()];
        let mut table = ReportTable::new(title, columns);
        let money_delta = |d: Option<f64>| d.map(|v| format!("{} €", format_signed(Some(v), 2))).unwrap_or_default();
        table.push(vec![
            "Ø Stop cost".into(),
            format_money(self.avg_stop_cost),
            money_delta(self.delta_stop_cost),
        ]);
        table.push(vec![
            "Total stops".into(),
            format_number(self.total_stops, 0),
            format_signed(self.delta_stops, 0),
        ]);
        table.push(vec![
            "Vehicles".into(),
            format_number(self.total_vehicles, 0),
            format_signed(self.delta_vehicles, 0),
        ]);
        table.push(vec![
            "Ø Stop average".into(),
            format_opt(self.avg_stop_average, 1),
            String::new(),
        ]);
        table.push(vec![
            "Ø Unplanned stops".into(),
            format_opt(self.avg_unplanned, 1),
            String::new(),
        ]);
        table.push(vec![
            "Efficiency (stops/vehicle)".into(),
            format_number(self.efficiency, 1),
            String::new(),
        ]);
        table.push(vec![
            "Active sites".into(),
            format_int(self.active_sites as u64),
            String::new(),
        ]);
        table
    }

    /// Sites with the lowest (`cheapest = true`) or highest stop cost. Sites
    /// without a stop cost are left out.
    pub fn ranking(&self, n: usize, cheapest: bool) -> Vec<SiteCostRow> {
        let mut priced: Vec<&KpiRow> = self.sites.iter().filter(|r| r.stop_cost().is_some()).collect();
        priced.sort_by(|a, b| {
            let ord = a
                .stop_cost()
                .partial_cmp(&b.stop_cost())
                .unwrap_or(Ordering::Equal);
            if cheapest {
                ord
            } else {
                ord.reverse()
            }
        });
        priced
            .into_iter()
            .take(n)
            .map(|r| SiteCostRow {
                site: r.site.clone(),
                stop_cost: format_money(r.stop_cost()),
                stops: format_opt(r.value(Kpi::Stops), 0),
                vehicles: format_opt(r.value(Kpi::Vehicles), 0),
            })
            .collect()
    }
}

// ---------------------------------------------------------------- rows

fn row_cells(r: &KpiRow) -> Vec<String> {
    vec![
        format_date(r.date),
        r.site.clone(),
        r.dispatcher.clone().unwrap_or_default(),
        format_kpi(Kpi::Vehicles, r.value(Kpi::Vehicles)),
        format_kpi(Kpi::Stops, r.value(Kpi::Stops)),
        format_opt(r.unplanned_stops, 1),
        format_money(r.fleet_cost),
        format_opt(r.stop_average(), 1),
        format_money(r.stop_cost()),
    ]
}

fn row_columns() -> Vec<String> {
    [
        "Date",
        "Site",
        "Dispatcher",
        "Vehicles",
        "Stops",
        "Unplanned stops",
        "Fleet cost",
        "Stop average",
        "Stop cost",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// All rows as entered, with the derived fields.
pub fn rows_table(title: &str, rows: &[KpiRow]) -> ReportTable {
    let mut table = ReportTable::new(title, row_columns());
    for r in rows {
        table.push(row_cells(r));
    }
    table
}

/// One site's rows over time, ascending by date.
pub fn site_history(rows: &[KpiRow], site: &str) -> ReportTable {
    let mut own: Vec<&KpiRow> = rows.iter().filter(|r| r.site == site).collect();
    own.sort_by_key(|r| r.date);
    let mut table = ReportTable::new(format!("History: {}", site), row_columns());
    for r in own {
        table.push(row_cells(r));
    }
    table
}
