use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::derive;
use crate::util::{format_date, parse_count, parse_date, parse_number, to_cell};

/// Column headers of a period file, in storage order.
pub const HEADERS: [&str; 9] = [
    "Datum",
    "Standort",
    "Disponent",
    "Fahrzeuge",
    "Stopps",
    "Unverplante Stopps",
    "Kosten Fuhrpark",
    "Stoppschnitt",
    "Stoppkosten",
];

/// One row of a period file exactly as it is stored or typed in: every cell is
/// text and any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawRow {
    #[serde(rename = "Datum")]
    pub date: Option<String>,
    #[serde(rename = "Standort")]
    pub site: Option<String>,
    #[serde(rename = "Disponent")]
    pub dispatcher: Option<String>,
    #[serde(rename = "Fahrzeuge")]
    pub vehicles: Option<String>,
    #[serde(rename = "Stopps")]
    pub stops: Option<String>,
    #[serde(rename = "Unverplante Stopps")]
    pub unplanned_stops: Option<String>,
    #[serde(rename = "Kosten Fuhrpark")]
    pub fleet_cost: Option<String>,
    #[serde(rename = "Stoppschnitt")]
    pub stop_average: Option<String>,
    #[serde(rename = "Stoppkosten")]
    pub stop_cost: Option<String>,
}

/// One measurement for one site on one date. Identity is `(date, site)`.
///
/// `stop_average` and `stop_cost` are only readable: they are recomputed by
/// [`derive::derive`] whenever the inputs change.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub date: NaiveDate,
    pub site: String,
    pub dispatcher: Option<String>,
    pub vehicles: Option<u32>,
    pub stops: Option<u32>,
    pub unplanned_stops: Option<f64>,
    pub fleet_cost: Option<f64>,
    pub(crate) stop_average: Option<f64>,
    pub(crate) stop_cost: Option<f64>,
}

impl KpiRow {
    pub fn empty(date: NaiveDate, site: impl Into<String>) -> Self {
        KpiRow {
            date,
            site: site.into(),
            dispatcher: None,
            vehicles: None,
            stops: None,
            unplanned_stops: None,
            fleet_cost: None,
            stop_average: None,
            stop_cost: None,
        }
    }

    /// Builds a derived row from raw inputs.
    pub fn with_inputs(
        date: NaiveDate,
        site: impl Into<String>,
        vehicles: Option<u32>,
        stops: Option<u32>,
        unplanned_stops: Option<f64>,
        fleet_cost: Option<f64>,
    ) -> Self {
        let mut row = KpiRow::empty(date, site);
        row.vehicles = vehicles;
        row.stops = stops;
        row.unplanned_stops = unplanned_stops;
        row.fleet_cost = fleet_cost;
        derive::derive(row)
    }

    pub fn stop_average(&self) -> Option<f64> {
        self.stop_average
    }

    pub fn stop_cost(&self) -> Option<f64> {
        self.stop_cost
    }

    pub fn key(&self) -> (NaiveDate, &str) {
        (self.date, self.site.as_str())
    }

    /// True when any user-entered KPI value is present.
    pub fn has_data(&self) -> bool {
        self.vehicles.is_some()
            || self.stops.is_some()
            || self.unplanned_stops.is_some()
            || self.fleet_cost.is_some()
    }

    /// True when the row counts as "reported" for the daily report.
    pub fn is_reported(&self) -> bool {
        self.stops.is_some_and(|s| s > 0) || self.vehicles.is_some_and(|v| v > 0)
    }

    pub fn value(&self, kpi: Kpi) -> Option<f64> {
        match kpi {
            Kpi::Vehicles => self.vehicles.map(f64::from),
            Kpi::Stops => self.stops.map(f64::from),
            Kpi::StopAverage => self.stop_average,
            Kpi::UnplannedStops => self.unplanned_stops,
            Kpi::FleetCost => self.fleet_cost,
            Kpi::StopCost => self.stop_cost,
        }
    }

    /// Lenient conversion used on bulk read paths. Rows without a usable date
    /// are dropped; malformed or negative numbers become missing.
    pub fn from_raw(raw: &RawRow) -> Option<KpiRow> {
        let date = parse_date(raw.date.as_deref()?)?;
        let site = raw.site.as_deref().unwrap_or("").trim().to_string();
        let dispatcher = raw
            .dispatcher
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let amount = |s: &Option<String>| parse_number(s.as_deref()?).filter(|v| *v >= 0.0);

        let mut row = KpiRow::empty(date, site);
        row.dispatcher = dispatcher;
        row.vehicles = raw.vehicles.as_deref().and_then(parse_count);
        row.stops = raw.stops.as_deref().and_then(parse_count);
        row.unplanned_stops = amount(&raw.unplanned_stops);
        row.fleet_cost = amount(&raw.fleet_cost);
        Some(derive::derive(row))
    }

    pub fn to_raw(&self) -> RawRow {
        RawRow {
            date: Some(format_date(self.date)),
            site: Some(self.site.clone()),
            dispatcher: self.dispatcher.clone(),
            vehicles: self.vehicles.map(|v| v.to_string()),
            stops: self.stops.map(|v| v.to_string()),
            unplanned_stops: self.unplanned_stops.map(to_cell),
            fleet_cost: self.fleet_cost.map(to_cell),
            stop_average: self.stop_average.map(to_cell),
            stop_cost: self.stop_cost.map(to_cell),
        }
    }
}

/// The six reported KPIs, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Kpi {
    Vehicles,
    Stops,
    StopAverage,
    UnplannedStops,
    FleetCost,
    StopCost,
}

impl Kpi {
    pub const ALL: [Kpi; 6] = [
        Kpi::Vehicles,
        Kpi::Stops,
        Kpi::StopAverage,
        Kpi::UnplannedStops,
        Kpi::FleetCost,
        Kpi::StopCost,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Kpi::Vehicles => "Vehicles",
            Kpi::Stops => "Stops",
            Kpi::StopAverage => "Stop average",
            Kpi::UnplannedStops => "Unplanned stops",
            Kpi::FleetCost => "Fleet cost",
            Kpi::StopCost => "Stop cost",
        }
    }

    pub fn is_count(self) -> bool {
        matches!(self, Kpi::Vehicles | Kpi::Stops)
    }
}

/// Daily rollup across all sites reporting a date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub values: KpiValues,
}

/// Weekly rollup: mean of the daily rollups of one ISO week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyAggregate {
    pub iso_year: i32,
    pub week: u32,
    pub start: NaiveDate,
    pub values: KpiValues,
}

impl WeeklyAggregate {
    pub fn label(&self) -> String {
        format!("KW {}", self.week)
    }
}

/// One value per KPI; `None` when no row contributed a value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KpiValues {
    pub vehicles: Option<f64>,
    pub stops: Option<f64>,
    pub stop_average: Option<f64>,
    pub unplanned_stops: Option<f64>,
    pub fleet_cost: Option<f64>,
    pub stop_cost: Option<f64>,
}

impl KpiValues {
    pub fn from_fn(mut f: impl FnMut(Kpi) -> Option<f64>) -> Self {
        KpiValues {
            vehicles: f(Kpi::Vehicles),
            stops: f(Kpi::Stops),
            stop_average: f(Kpi::StopAverage),
            unplanned_stops: f(Kpi::UnplannedStops),
            fleet_cost: f(Kpi::FleetCost),
            stop_cost: f(Kpi::StopCost),
        }
    }

    pub fn get(&self, kpi: Kpi) -> Option<f64> {
        match kpi {
            Kpi::Vehicles => self.vehicles,
            Kpi::Stops => self.stops,
            Kpi::StopAverage => self.stop_average,
            Kpi::UnplannedStops => self.unplanned_stops,
            Kpi::FleetCost => self.fleet_cost,
            Kpi::StopCost => self.stop_cost,
        }
    }
}

/// One line of the daily stop-cost ranking.
#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct SiteCostRow {
    #[serde(rename = "Site")]
    #[tabled(rename = "Site")]
    pub site: String,
    #[serde(rename = "StopCost")]
    #[tabled(rename = "StopCost")]
    pub stop_cost: String,
    #[serde(rename = "Stops")]
    #[tabled(rename = "Stops")]
    pub stops: String,
    #[serde(rename = "Vehicles")]
    #[tabled(rename = "Vehicles")]
    pub vehicles: String,
}
