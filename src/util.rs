// Numeric normalizer and small helpers shared by every stage.
//
// Values are entered and displayed in German notation (`1.234,56 €`). Inside
// the crate they are plain `f64`/`u32` wrapped in `Option`; the empty string
// only exists at the text boundary.
use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

use crate::error::{KpiError, Result};

pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Parse a locale-formatted number, returning `None` for anything that cannot
/// be read. Never fails; used on bulk read paths.
///
/// - Strips whitespace and the `€` / `EUR` currency marker.
/// - With a decimal comma present, periods are thousands separators.
/// - Without a comma, a single period is a decimal point and several periods
///   are thousands separators (`1.234.567`).
/// - Rejects values containing letters, and non-finite results.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€')
        .collect();
    let cleaned = cleaned.strip_suffix("EUR").unwrap_or(&cleaned);
    if cleaned.is_empty() || cleaned.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let canonical = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if cleaned.matches('.').count() > 1 {
        cleaned.replace('.', "")
    } else {
        cleaned.to_string()
    };
    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Same rules as [`parse_number`], but unreadable input is an error so the
/// caller can tie it to a row and field.
pub fn parse_strict(raw: &str) -> Result<f64> {
    parse_number(raw).ok_or_else(|| KpiError::InvalidNumber(raw.to_string()))
}

/// Parse a non-negative whole count (`"12"`, `"12,0"`, `"1.200,0"`).
pub fn parse_count(raw: &str) -> Option<u32> {
    let v = parse_number(raw)?;
    if v < 0.0 || v.fract() != 0.0 || v > f64::from(u32::MAX) {
        return None;
    }
    Some(v as u32)
}

/// Dates cross the boundary as `DD.MM.YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn round_to(n: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (n * factor).round() / factor
}

/// Render with `decimals` digits, comma as decimal separator and period as
/// thousands separator. NaN and infinities render as the empty string.
pub fn format_number(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return String::new();
    }
    // Round half away from zero first, like `round_to`; `{:.*}` alone would
    // round exact halves to even.
    let rounded = Some(round_to(n, decimals as i32)).filter(|r| r.is_finite()).unwrap_or(n);
    let s = format!("{:.*}", decimals, rounded.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let mut res = group_thousands(int_part);
    if let Some(frac) = frac_part {
        res.push(',');
        res.push_str(frac);
    }
    // "-0,00" is not a useful rendering of a tiny negative value.
    let neg = n < 0.0 && s.chars().any(|c| c.is_ascii_digit() && c != '0');
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

// Insert `.` every three digits from the right. Works on the digit string
// so values beyond any integer type still render.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

/// [`format_number`] for optional values; missing renders as the empty string.
pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals)).unwrap_or_default()
}

pub fn format_money(n: Option<f64>) -> String {
    match n {
        Some(v) if v.is_finite() => format!("{} €", format_number(v, 2)),
        _ => String::new(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::de)
}

/// Signed delta with a trailing all-zero fraction dropped (`+501`, `-2,5`).
pub fn format_signed(n: Option<f64>, decimals: usize) -> String {
    let Some(v) = n.filter(|v| v.is_finite()) else {
        return String::new();
    };
    let body = strip_zero_fraction(format_number(v.abs(), decimals));
    let zero = body.chars().all(|c| !c.is_ascii_digit() || c == '0');
    if v < 0.0 && !zero {
        format!("-{}", body)
    } else {
        format!("+{}", body)
    }
}

/// Signed percent change with one decimal, `N/A` when not applicable.
pub fn format_pct(n: Option<f64>) -> String {
    match n {
        Some(v) if v.is_finite() => format!("{}%", format_signed(Some(v), 1)),
        _ => "N/A".to_string(),
    }
}

fn strip_zero_fraction(s: String) -> String {
    match s.split_once(',') {
        Some((int, frac)) if frac.chars().all(|c| c == '0') => int.to_string(),
        _ => s,
    }
}

/// Storage form of a number: comma decimal, no grouping, shortest digits.
pub fn to_cell(n: f64) -> String {
    n.to_string().replace('.', ",")
}

/// Sum of the present values; `None` when nothing is present.
pub fn sum_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

/// Arithmetic mean of the present values; `None` when nothing is present.
pub fn mean_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_handles_currency_and_decimal_comma() {
        assert_eq!(parse_number("250,00€"), Some(250.0));
        assert_eq!(parse_number(" 1.234,5 € "), Some(1234.5));
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("1.234.567"), Some(1234567.0));
        assert_eq!(parse_number("99 EUR"), Some(99.0));
        assert_eq!(parse_number("-3,5"), Some(-3.5));
    }

    #[test]
    fn parse_degrades_to_missing() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("1,2,3"), None);
    }

    #[test]
    fn parse_strict_reports_input() {
        let err = parse_strict("zwölf").unwrap_err();
        assert!(err.to_string().contains("zwölf"));
        assert_eq!(parse_strict("7,25").unwrap(), 7.25);
    }

    #[test]
    fn parse_count_rejects_fractions_and_negatives() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("12,0"), Some(12));
        assert_eq!(parse_count("2,5"), None);
        assert_eq!(parse_count("-1"), None);
    }

    #[test]
    fn format_uses_german_separators() {
        assert_eq!(format_number(1234.5, 1), "1.234,5");
        assert_eq!(format_number(1234567.891, 2), "1.234.567,89");
        assert_eq!(format_number(-1234.5, 2), "-1.234,50");
        assert_eq!(format_number(-0.001, 2), "0,00");
        assert_eq!(format_number(5.0, 0), "5");
        assert_eq!(format_number(f64::NAN, 2), "");
        assert_eq!(format_opt(None, 2), "");
        assert_eq!(format_money(Some(5.0)), "5,00 €");
    }

    #[test]
    fn parse_reads_back_two_decimal_format() {
        for x in [0.0, 0.004, 0.125, 12.344, 999.999, 1234.125, 1234.5, 98765.4321, -42.424] {
            let back = parse_number(&format_number(x, 2)).unwrap();
            assert!((back - round_to(x, 2)).abs() < 1e-9, "{x} -> {back}");
        }
    }

    #[test]
    fn exact_halves_round_away_from_zero() {
        assert_eq!(format_number(0.125, 2), "0,13");
        assert_eq!(format_number(1234.125, 2), "1.234,13");
        assert_eq!(format_number(-0.125, 2), "-0,13");
        assert_eq!(format_number(2.5, 0), "3");
    }

    #[test]
    fn values_beyond_u64_keep_their_digits() {
        assert_eq!(format_number(2e19, 2), "20.000.000.000.000.000.000,00");
        assert_eq!(format_number(-2e19, 0), "-20.000.000.000.000.000.000");
        let huge = format_number(1e300, 0);
        assert!(huge.starts_with("1.000.000"));
        assert_eq!(huge.chars().filter(|c| c.is_ascii_digit()).count(), 301);
    }

    #[test]
    fn signed_and_percent_formatting() {
        assert_eq!(format_signed(Some(501.0), 1), "+501");
        assert_eq!(format_signed(Some(-2.5), 1), "-2,5");
        assert_eq!(format_signed(Some(-0.01), 1), "+0");
        assert_eq!(format_signed(None, 1), "");
        assert_eq!(format_pct(Some(100.0)), "+100%");
        assert_eq!(format_pct(Some(-12.3)), "-12,3%");
        assert_eq!(format_pct(None), "N/A");
    }

    #[test]
    fn present_value_helpers_skip_missing() {
        assert_eq!(sum_present([Some(1.0), None, Some(2.0)]), Some(3.0));
        assert_eq!(sum_present([None, None]), None);
        assert_eq!(mean_present([Some(1.0), None, Some(2.0)]), Some(1.5));
        assert_eq!(mean_present(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn dates_are_day_first() {
        let d = parse_date("05.12.2025").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 5).unwrap());
        assert_eq!(format_date(d), "05.12.2025");
        assert!(parse_date("2025-12-05").is_none());
        assert!(parse_date("31.02.2025").is_none());
    }
}
