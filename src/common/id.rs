use std::cmp::Ordering;

/// Normalize a precinct identifier for joins: trim surrounding whitespace and upper-case.
pub fn normalize_id(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Render a numeric identifier the way it is usually written (no trailing `.0`).
pub(crate) fn format_numeric_id(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Order election years numerically when both parse as integers, otherwise lexically.
pub(crate) fn compare_years(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_id("  p1a "), "P1A");
        assert_eq!(normalize_id("\tward 3-b\n"), "WARD 3-B");
        assert_eq!(normalize_id("0042"), "0042");
        assert_eq!(normalize_id(""), "");
    }

    #[test]
    fn numeric_ids_drop_trailing_zero_fraction() {
        assert_eq!(format_numeric_id(123.0), "123");
        assert_eq!(format_numeric_id(-7.0), "-7");
        assert_eq!(format_numeric_id(1.5), "1.5");
    }

    #[test]
    fn years_sort_numerically() {
        let mut years = vec!["2024", "998", "2008", "2020"];
        years.sort_by(|a, b| compare_years(a, b));
        assert_eq!(years, vec!["998", "2008", "2020", "2024"]);
    }
}
