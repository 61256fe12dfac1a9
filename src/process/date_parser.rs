use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a calendar date in any of the layouts seen in housing exports
/// (`2013-04-09`, `04/09/2013`, `April 9, 2013`, `April 9 2013`, `2013-04-09 00:00:00`).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // cheap reject: every accepted layout has a digit and is at least 8 chars
    if s.len() < 8 || !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_layouts() {
        let want = NaiveDate::from_ymd_opt(2013, 4, 9).unwrap();
        for s in [
            "2013-04-09",
            "2013/04/09",
            "04/09/2013",
            "April 9, 2013",
            "Apr 9, 2013",
            "April 9 2013",
            "2013-04-09 00:00:00",
            " 2013-04-09T13:45:00 ",
        ] {
            assert_eq!(parse_date(s), Some(want), "layout {s}");
        }
    }

    #[test]
    fn rejects_non_dates() {
        for s in ["", "Yes", "12", "1808 FOX CHASE DR", "2013-13-40", "12345678"] {
            assert_eq!(parse_date(s), None, "input {s}");
        }
    }
}
