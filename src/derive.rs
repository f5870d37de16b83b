// Derived per-row fields.
//
// `stop_average` and `stop_cost` are pure functions of the row inputs. A
// missing operand or a zero divisor clears the field instead of failing.
use crate::types::KpiRow;
use crate::util::round_to;

/// Recompute both derived fields. Total and idempotent.
pub fn derive(mut row: KpiRow) -> KpiRow {
    derive_in_place(&mut row);
    row
}

/// In-place variant for callers holding a mutable row.
pub fn derive_in_place(row: &mut KpiRow) {
    row.stop_average = stop_average(row.vehicles, row.stops);
    row.stop_cost = stop_cost(row.stops, row.fleet_cost);
}

/// `stops / vehicles`, one decimal.
pub fn stop_average(vehicles: Option<u32>, stops: Option<u32>) -> Option<f64> {
    match (vehicles, stops) {
        (Some(v), Some(s)) if v > 0 => Some(round_to(f64::from(s) / f64::from(v), 1)),
        _ => None,
    }
}

/// `fleet_cost / stops`, two decimals.
pub fn stop_cost(stops: Option<u32>, fleet_cost: Option<f64>) -> Option<f64> {
    match (stops, fleet_cost) {
        (Some(s), Some(c)) if s > 0 => {
            let v = round_to(c / f64::from(s), 2);
            v.is_finite().then_some(v)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(vehicles: Option<u32>, stops: Option<u32>, cost: Option<f64>) -> KpiRow {
        let mut r = KpiRow::empty(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(), "Kassel");
        r.vehicles = vehicles;
        r.stops = stops;
        r.fleet_cost = cost;
        r
    }

    #[test]
    fn computes_both_fields() {
        let cost = crate::util::parse_number("250,00€");
        let r = derive(row(Some(5), Some(50), cost));
        assert_eq!(r.stop_average(), Some(10.0));
        assert_eq!(r.stop_cost(), Some(5.0));
    }

    #[test]
    fn rounds_to_field_precision() {
        let r = derive(row(Some(3), Some(10), Some(100.0)));
        assert_eq!(r.stop_average(), Some(3.3));
        assert_eq!(r.stop_cost(), Some(10.0));
        let r = derive(row(Some(7), Some(3), Some(10.0)));
        assert_eq!(r.stop_average(), Some(0.4));
        assert_eq!(r.stop_cost(), Some(3.33));
    }

    #[test]
    fn stop_average_cleared_without_vehicles() {
        for vehicles in [None, Some(0)] {
            for stops in [None, Some(0), Some(40)] {
                assert_eq!(derive(row(vehicles, stops, Some(10.0))).stop_average(), None);
            }
        }
    }

    #[test]
    fn stop_cost_cleared_without_stops() {
        for stops in [None, Some(0)] {
            for cost in [None, Some(0.0), Some(99.5)] {
                assert_eq!(derive(row(Some(4), stops, cost)).stop_cost(), None);
            }
        }
    }

    #[test]
    fn stale_values_are_cleared_on_recompute() {
        let mut r = derive(row(Some(5), Some(50), Some(250.0)));
        r.vehicles = Some(0);
        r.fleet_cost = None;
        derive_in_place(&mut r);
        assert_eq!(r.stop_average(), None);
        assert_eq!(r.stop_cost(), None);
    }

    #[test]
    fn derive_is_idempotent() {
        let cases = [
            row(None, None, None),
            row(Some(0), Some(12), Some(30.0)),
            row(Some(3), Some(0), Some(30.0)),
            row(Some(9), Some(101), Some(1234.56)),
            row(Some(1), Some(1), None),
        ];
        for r in cases {
            let once = derive(r);
            assert_eq!(derive(once.clone()), once);
        }
    }
}
