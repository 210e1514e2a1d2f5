/// Placeholder printed for missing or non-finite numbers
pub const MISSING: &str = "--";

/// Signed percentage with two decimals, e.g. `+1.25%`
pub fn fmt_pct(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{}{:.2}%", if v >= 0.0 { "+" } else { "" }, v),
        None => MISSING.to_string(),
    }
}

/// Up to three decimals with trailing zeros trimmed, e.g. `320.5`
pub fn fmt_num(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => {
            let s = format!("{:.3}", v);
            let s = s.trim_end_matches('0').trim_end_matches('.');
            if s == "-0" {
                "0".to_string()
            } else {
                s.to_string()
            }
        }
        None => MISSING.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_pct() {
        assert_eq!(fmt_pct(Some(1.254)), "+1.25%");
        assert_eq!(fmt_pct(Some(0.0)), "+0.00%");
        assert_eq!(fmt_pct(Some(-3.1)), "-3.10%");
        assert_eq!(fmt_pct(None), "--");
        assert_eq!(fmt_pct(Some(f64::NAN)), "--");
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(Some(320.5)), "320.5");
        assert_eq!(fmt_num(Some(320.0)), "320");
        assert_eq!(fmt_num(Some(0.12345)), "0.123");
        assert_eq!(fmt_num(Some(-0.0001)), "0");
        assert_eq!(fmt_num(None), "--");
    }
}
