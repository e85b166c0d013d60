use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::NormalizedPeriod;

static FY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)FY\s*(\d{4})[/\-](\d{2,4})").unwrap(),
        Regex::new(r"(?i)(\d{4})[/\-](\d{2,4})\s*FY").unwrap(),
        Regex::new(r"(?i)Financial\s+Year\s+(\d{4})[/\-](\d{2,4})").unwrap(),
    ]
});

static BARE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").unwrap());

pub(super) fn normalize(raw: &str) -> Option<NormalizedPeriod> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }

    for pattern in FY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(cleaned) {
            let year1: i32 = caps[1].parse().ok()?;
            let second = &caps[2];
            // Two-digit second year expands via the century of the first.
            let year2: i32 = if second.len() == 2 {
                (year1 / 100) * 100 + second.parse::<i32>().ok()?
            } else {
                second.parse().ok()?
            };

            return Some(NormalizedPeriod {
                label: format!("FY{}/{:02}", year1, year2.rem_euclid(100)),
                start_date: NaiveDate::from_ymd_opt(year1, 7, 1)?,
                end_date: NaiveDate::from_ymd_opt(year2, 6, 30)?,
                confidence: 0.9,
                raw_period: Some(cleaned.to_string()),
            });
        }
    }

    // A lone four-digit year implies the fiscal year starting that July.
    if let Some(caps) = BARE_YEAR.captures(cleaned) {
        let year: i32 = caps[1].parse().ok()?;
        return Some(
            NormalizedPeriod::fiscal_year(year)
                .with_confidence(0.5)
                .with_raw(cleaned),
        );
    }

    None
}
