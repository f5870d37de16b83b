// Change between consecutive periods.
use crate::types::{Kpi, KpiValues};
use crate::util::round_to;

/// Absolute and percent change of one value against its predecessor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Delta {
    pub delta: Option<f64>,
    pub delta_pct: Option<f64>,
}

/// Compare `current` against `previous`. The percent change is `None` when
/// the previous value is missing or zero, and never carries inf/NaN.
pub fn compare(previous: Option<f64>, current: Option<f64>) -> Delta {
    let (Some(prev), Some(cur)) = (previous, current) else {
        return Delta::default();
    };
    let delta = Some(cur - prev).filter(|d| d.is_finite());
    let delta_pct = if prev == 0.0 {
        None
    } else {
        let ratio = cur / prev;
        ratio
            .is_finite()
            .then(|| round_to((ratio - 1.0) * 100.0, 1))
    };
    Delta { delta, delta_pct }
}

/// Deltas along an ordered series; the first entry has no predecessor.
pub fn series(values: &[Option<f64>]) -> Vec<Delta> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(Delta::default());
    out.extend(values.windows(2).map(|w| compare(w[0], w[1])));
    out
}

/// One delta per KPI for a pair of rollups.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KpiDeltas {
    deltas: [Delta; 6],
}

impl KpiDeltas {
    pub fn between(previous: &KpiValues, current: &KpiValues) -> Self {
        let mut deltas = [Delta::default(); 6];
        for (slot, kpi) in deltas.iter_mut().zip(Kpi::ALL) {
            *slot = compare(previous.get(kpi), current.get(kpi));
        }
        KpiDeltas { deltas }
    }

    pub fn get(&self, kpi: Kpi) -> Delta {
        let idx = Kpi::ALL.iter().position(|k| *k == kpi).unwrap_or(0);
        self.deltas[idx]
    }
}

/// Per-KPI deltas along an ordered sequence of rollups.
pub fn kpi_series(values: &[KpiValues]) -> Vec<KpiDeltas> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(KpiDeltas::default());
    out.extend(values.windows(2).map(|w| KpiDeltas::between(&w[0], &w[1])));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_previous_has_no_percent() {
        let d = compare(Some(0.0), Some(50.0));
        assert_eq!(d.delta, Some(50.0));
        assert_eq!(d.delta_pct, None);
    }

    #[test]
    fn percent_is_rounded_to_one_decimal() {
        let d = compare(Some(3.0), Some(4.0));
        assert_eq!(d.delta, Some(1.0));
        assert_eq!(d.delta_pct, Some(33.3));
        assert_eq!(compare(Some(200.0), Some(150.0)).delta_pct, Some(-25.0));
    }

    #[test]
    fn missing_side_yields_nothing() {
        assert_eq!(compare(None, Some(1.0)), Delta::default());
        assert_eq!(compare(Some(1.0), None), Delta::default());
    }

    #[test]
    fn series_starts_undefined() {
        let out = series(&[Some(10.0), Some(0.0), Some(5.0), None, Some(7.0)]);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], Delta::default());
        assert_eq!(out[1], Delta { delta: Some(-10.0), delta_pct: Some(-100.0) });
        assert_eq!(out[2], Delta { delta: Some(5.0), delta_pct: None });
        assert_eq!(out[3], Delta::default());
        assert_eq!(out[4], Delta::default());
        assert!(series(&[]).is_empty());
    }

    #[test]
    fn extreme_ratios_do_not_leak_infinity() {
        let d = compare(Some(f64::MIN_POSITIVE), Some(f64::MAX));
        assert_eq!(d.delta_pct, None);
    }

    #[test]
    fn kpi_deltas_follow_each_kpi() {
        let a = KpiValues { stops: Some(100.0), stop_cost: Some(0.0), ..Default::default() };
        let b = KpiValues { stops: Some(110.0), stop_cost: Some(4.0), ..Default::default() };
        let all = kpi_series(&[a, b]);
        assert_eq!(all[0].get(Kpi::Stops), Delta::default());
        assert_eq!(all[1].get(Kpi::Stops).delta_pct, Some(10.0));
        assert_eq!(all[1].get(Kpi::StopCost).delta_pct, None);
        assert_eq!(all[1].get(Kpi::Vehicles), Delta::default());
    }
}
