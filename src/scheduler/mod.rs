//! Calendar-aware scheduling. Government publishers release on fiscal
//! rhythms, not fixed intervals: budget season, post-quarter windows, audit
//! season, survey months. `should_run` is a pure function of the source key
//! and the clock; an external driver ticks and consults it. The scheduler
//! never sleeps or launches jobs itself.
//!
//! The first calendar period matching the date claims the decision: when a
//! special window covers today but its frequency gate says no, the source
//! does not fall through to its default cadence.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Africa::Nairobi;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::warn;

const SOURCES: [&str; 6] = ["treasury", "cob", "oag", "knbs", "opendata", "cra"];

/// How far ahead `next_run` searches before giving up.
const NEXT_RUN_HORIZON_DAYS: i64 = 120;

const QUARTER_CACHE_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone, Serialize)]
pub struct SourceSchedule {
    pub should_run_now: bool,
    pub reason: String,
    pub next_run: Option<String>,
    pub next_reason: String,
    pub current_period: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    pub generated_at: String,
    pub sources: BTreeMap<String, SourceSchedule>,
    pub running: usize,
    pub skipping: usize,
    pub skip_percentage: f64,
}

struct Decision {
    run: bool,
    reason: String,
    period: &'static str,
}

pub struct Scheduler {
    quarter_cache: Mutex<Option<(Instant, Vec<NaiveDate>)>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            quarter_cache: Mutex::new(None),
        }
    }

    pub fn sources() -> impl Iterator<Item = &'static str> {
        SOURCES.into_iter()
    }

    /// Decide for "today" in Africa/Nairobi.
    pub fn should_run(&self, source: &str) -> (bool, String) {
        self.should_run_on(source, today_nairobi())
    }

    /// Pure decision for an arbitrary date; tests drive this directly.
    pub fn should_run_on(&self, source: &str, date: NaiveDate) -> (bool, String) {
        let decision = self.decide(source, date);
        (decision.run, decision.reason)
    }

    pub fn get_next_run(&self, source: &str) -> (Option<DateTime<Utc>>, String) {
        let (date, reason) = self.next_run_after(source, today_nairobi());
        let timestamp = date.and_then(|d| {
            d.and_hms_opt(6, 0, 0)
                .and_then(|naive| naive.and_local_timezone(Nairobi).single())
                .map(|t| t.with_timezone(&Utc))
        });
        (timestamp, reason)
    }

    /// First date strictly after `from` on which the source runs.
    pub fn next_run_after(&self, source: &str, from: NaiveDate) -> (Option<NaiveDate>, String) {
        for offset in 1..=NEXT_RUN_HORIZON_DAYS {
            let date = from + Duration::days(offset);
            let decision = self.decide(source, date);
            if decision.run {
                return (Some(date), decision.reason);
            }
        }
        (None, "no run scheduled within the horizon".to_string())
    }

    pub fn current_period(&self, source: &str, date: NaiveDate) -> String {
        self.decide(source, date).period.to_string()
    }

    /// Per-source status for the admin surface, plus efficiency counts.
    pub fn generate_schedule_report(&self) -> ScheduleReport {
        let today = today_nairobi();
        let mut sources = BTreeMap::new();
        let mut running = 0usize;

        for source in SOURCES {
            let decision = self.decide(source, today);
            if decision.run {
                running += 1;
            }
            let (next_run, next_reason) = self.next_run_after(source, today);
            sources.insert(
                source.to_string(),
                SourceSchedule {
                    should_run_now: decision.run,
                    reason: decision.reason,
                    next_run: next_run.map(|d| d.to_string()),
                    next_reason,
                    current_period: decision.period.to_string(),
                },
            );
        }

        let total = SOURCES.len();
        let skipping = total - running;
        ScheduleReport {
            generated_at: Utc::now().to_rfc3339(),
            sources,
            running,
            skipping,
            skip_percentage: (skipping as f64 / total as f64 * 100.0 * 10.0).round() / 10.0,
        }
    }

    fn decide(&self, source: &str, date: NaiveDate) -> Decision {
        match source {
            "treasury" => self.decide_treasury(date),
            "cob" => self.decide_cob(date),
            "oag" => self.decide_oag(date),
            "knbs" => self.decide_knbs(date),
            "opendata" => Decision {
                run: date.weekday() == Weekday::Fri,
                reason: "Continuous dataset updates via API".to_string(),
                period: "default",
            },
            "cra" => self.decide_cra(date),
            other => {
                warn!(source = other, "unknown source, defaulting to weekly");
                Decision {
                    run: true,
                    reason: "Unknown source - default weekly schedule".to_string(),
                    period: "default",
                }
            }
        }
    }

    fn decide_treasury(&self, date: NaiveDate) -> Decision {
        if (5..=7).contains(&date.month()) {
            return Decision {
                run: true,
                reason: "Budget statement preparation and approval season".to_string(),
                period: "budget_season",
            };
        }
        if let Some(days) = self.days_since_quarter_end(date) {
            if (0..=7).contains(&days) {
                return Decision {
                    run: true,
                    reason: "Quarterly expenditure reports expected".to_string(),
                    period: "post_quarter",
                };
            }
        }
        weekly(date, Weekday::Mon, "Routine weekly check")
    }

    fn decide_cob(&self, date: NaiveDate) -> Decision {
        if let Some(days) = self.days_since_quarter_end(date) {
            if (45..=59).contains(&days) {
                let run = date.ordinal() % 2 == 0;
                return Decision {
                    run,
                    reason: if run {
                        "Quarterly Budget Implementation Review Reports expected".to_string()
                    } else {
                        "BIRR window, off day of the 2-day cycle".to_string()
                    },
                    period: "post_quarter",
                };
            }
        }
        let run = date.weekday() == Weekday::Mon && date.iso_week().week() % 2 == 0;
        Decision {
            run,
            reason: "Routine biweekly check".to_string(),
            period: "default",
        }
    }

    fn decide_oag(&self, date: NaiveDate) -> Decision {
        if matches!(date.month(), 11 | 12 | 1) {
            return Decision {
                run: date.weekday() == Weekday::Wed,
                reason: "Annual audit report publication season".to_string(),
                period: "audit_season",
            };
        }
        if let Some(days) = self.days_since_quarter_end(date) {
            if days >= 30 {
                let run = date.weekday() == Weekday::Wed && date.iso_week().week() % 2 == 0;
                return Decision {
                    run,
                    reason: if run {
                        "Special and performance audits publication".to_string()
                    } else {
                        "Post-quarter audit window, not a biweekly Wednesday".to_string()
                    },
                    period: "post_quarter",
                };
            }
        }
        monthly(date, 15, "Routine monthly check")
    }

    fn decide_knbs(&self, date: NaiveDate) -> Decision {
        if date.month() == 5 {
            return Decision {
                run: date.weekday() == Weekday::Tue,
                reason: "Economic Survey annual publication".to_string(),
                period: "economic_survey",
            };
        }
        if date.month() == 12 {
            return Decision {
                run: date.weekday() == Weekday::Thu,
                reason: "Statistical Abstract annual publication".to_string(),
                period: "statistical_abstract",
            };
        }
        if let Some(days) = self.days_since_quarter_end(date) {
            if (14..=35).contains(&days) {
                let run = date.iso_week().week() % 2 == 0;
                return Decision {
                    run,
                    reason: if run {
                        "Quarterly GDP and economic indicators".to_string()
                    } else {
                        "Quarterly statistics window, off week".to_string()
                    },
                    period: "quarterly_data",
                };
            }
        }
        monthly(date, 1, "Routine monthly statistical updates")
    }

    fn decide_cra(&self, date: NaiveDate) -> Decision {
        if date.month() == 2 {
            return Decision {
                run: date.weekday() == Weekday::Mon,
                reason: "Annual revenue allocation to counties".to_string(),
                period: "allocation_season",
            };
        }
        monthly(date, 1, "Routine monthly check")
    }

    /// Days since the most recent quarter-end on or before `date`.
    fn days_since_quarter_end(&self, date: NaiveDate) -> Option<i64> {
        self.quarter_end_dates(date)
            .into_iter()
            .filter(|q| *q <= date)
            .map(|q| (date - q).num_days())
            .min()
    }

    /// Quarter-end dates for the previous, current and next calendar year,
    /// cached for 24 hours.
    fn quarter_end_dates(&self, date: NaiveDate) -> Vec<NaiveDate> {
        let mut cache = self.quarter_cache.lock().unwrap();
        if let Some((stamp, dates)) = cache.as_ref() {
            let covers_year = dates
                .iter()
                .any(|d| d.year() == date.year());
            if stamp.elapsed().as_secs() < QUARTER_CACHE_TTL_SECS && covers_year {
                return dates.clone();
            }
        }

        let mut dates = Vec::with_capacity(12);
        for year in [date.year() - 1, date.year(), date.year() + 1] {
            for (month, day) in [(3, 31), (6, 30), (9, 30), (12, 31)] {
                if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
                    dates.push(d);
                }
            }
        }
        *cache = Some((Instant::now(), dates.clone()));
        dates
    }
}

fn weekly(date: NaiveDate, day: Weekday, reason: &str) -> Decision {
    Decision {
        run: date.weekday() == day,
        reason: reason.to_string(),
        period: "default",
    }
}

fn monthly(date: NaiveDate, day_of_month: u32, reason: &str) -> Decision {
    Decision {
        run: date.day() == day_of_month,
        reason: reason.to_string(),
        period: "default",
    }
}

fn today_nairobi() -> NaiveDate {
    Utc::now().with_timezone(&Nairobi).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_treasury_budget_season_every_day() {
        let scheduler = Scheduler::new();
        for day in 1..=31 {
            for month in [5u32, 6, 7] {
                let Some(d) = NaiveDate::from_ymd_opt(2025, month, day) else {
                    continue;
                };
                let (run, reason) = scheduler.should_run_on("treasury", d);
                assert!(run, "expected run on {d}");
                assert!(reason.to_lowercase().contains("budget"));
            }
        }
    }

    #[test]
    fn test_treasury_outside_season_weekly_monday() {
        let scheduler = Scheduler::new();
        // Mid-February, far from any quarter-end window.
        let monday = date(2025, 2, 17);
        assert_eq!(monday.weekday(), Weekday::Mon);
        assert!(scheduler.should_run_on("treasury", monday).0);

        let tuesday = date(2025, 2, 18);
        assert!(!scheduler.should_run_on("treasury", tuesday).0);
    }

    #[test]
    fn test_treasury_post_quarter_daily() {
        let scheduler = Scheduler::new();
        // Oct 3rd: 3 days past the Sep 30 quarter-end.
        assert!(scheduler.should_run_on("treasury", date(2025, 10, 3)).0);
    }

    #[test]
    fn test_cob_birr_window_even_days_only() {
        let scheduler = Scheduler::new();
        // 45..=59 days after 2025-03-31 is 2025-05-15 .. 2025-05-29.
        for day in 15..=29 {
            let d = date(2025, 5, day);
            let (run, _) = scheduler.should_run_on("cob", d);
            assert_eq!(run, d.ordinal() % 2 == 0, "day {d}");
        }
    }

    #[test]
    fn test_cob_default_biweekly_monday() {
        let scheduler = Scheduler::new();
        // 2025-04-14 is a Monday in ISO week 16 (even), two weeks past the
        // March quarter-end and well before the BIRR window opens.
        let d = date(2025, 4, 14);
        assert_eq!(d.weekday(), Weekday::Mon);
        assert_eq!(d.iso_week().week(), 16);
        assert!(scheduler.should_run_on("cob", d).0);

        // Odd-week Monday.
        let odd = date(2025, 4, 7);
        assert_eq!(odd.iso_week().week() % 2, 1);
        assert!(!scheduler.should_run_on("cob", odd).0);
    }

    #[test]
    fn test_oag_audit_season_wednesdays() {
        let scheduler = Scheduler::new();
        let wednesday = date(2025, 11, 12);
        assert_eq!(wednesday.weekday(), Weekday::Wed);
        let (run, reason) = scheduler.should_run_on("oag", wednesday);
        assert!(run);
        assert!(reason.to_lowercase().contains("audit"));

        assert!(!scheduler.should_run_on("oag", date(2025, 11, 13)).0);
    }

    #[test]
    fn test_schedule_report_2025_06_15() {
        let scheduler = Scheduler::new();
        let sunday = date(2025, 6, 15);
        assert_eq!(sunday.weekday(), Weekday::Sun);

        let (treasury, reason) = scheduler.should_run_on("treasury", sunday);
        assert!(treasury);
        assert!(reason.to_lowercase().contains("budget"));

        // Not a Wednesday, not audit season: the post-quarter window claims
        // the day and says no.
        let (oag, _) = scheduler.should_run_on("oag", sunday);
        assert!(!oag);

        let report = scheduler.generate_schedule_report();
        assert_eq!(report.sources.len(), 6);
        for key in ["treasury", "cob", "oag", "knbs", "opendata", "cra"] {
            assert!(report.sources.contains_key(key));
        }
    }

    #[test]
    fn test_knbs_survey_month_tuesdays() {
        let scheduler = Scheduler::new();
        let tuesday = date(2025, 5, 13);
        assert_eq!(tuesday.weekday(), Weekday::Tue);
        assert!(scheduler.should_run_on("knbs", tuesday).0);
        assert!(!scheduler.should_run_on("knbs", date(2025, 5, 14)).0);
    }

    #[test]
    fn test_cra_allocation_season() {
        let scheduler = Scheduler::new();
        let monday = date(2025, 2, 3);
        assert_eq!(monday.weekday(), Weekday::Mon);
        let (run, reason) = scheduler.should_run_on("cra", monday);
        assert!(run);
        assert!(reason.to_lowercase().contains("allocation"));
        // Day 1 falls in February too, but allocation season owns the month.
        assert!(!scheduler.should_run_on("cra", date(2025, 2, 1)).0);
    }

    #[test]
    fn test_next_run_finds_future_date() {
        let scheduler = Scheduler::new();
        let (next, _) = scheduler.next_run_after("opendata", date(2025, 2, 17));
        let next = next.unwrap();
        assert_eq!(next.weekday(), Weekday::Fri);
        assert!(next > date(2025, 2, 17));
    }

    #[test]
    fn test_unknown_source_defaults_to_run() {
        let scheduler = Scheduler::new();
        let (run, reason) = scheduler.should_run_on("nonexistent", date(2025, 3, 3));
        assert!(run);
        assert!(reason.contains("Unknown source"));
    }
}
