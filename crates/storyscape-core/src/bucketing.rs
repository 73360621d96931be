//! Time-bucketing of stories for display
//!
//! [`bucket_records`] is a pure function of `(records, now)`. Elapsed time is
//! measured in whole calendar days between start-of-day boundaries in the
//! time zone of `now`, so a story written at 23:59 yesterday is "Yesterday"
//! even one minute later. Each record's date is resolved with the offset the
//! zone had at that instant, so daylight-saving changes between a story and
//! `now` do not shift it onto a neighbouring day.
//!
//! | days  | bucket         | rank |
//! |-------|----------------|------|
//! | 0     | `Today`        | 0    |
//! | 1     | `Yesterday`    | 1    |
//! | 2–6   | `Last 7 Days`  | 2    |
//! | 7–29  | `Last 30 Days` | 3    |
//! | ≥30   | `<Month> <year>` per calendar month | 4 |

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::story::StoryRecord;

/// Fixed ordering of the bucket kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BucketRank {
    Today = 0,
    Yesterday = 1,
    LastSevenDays = 2,
    LastThirtyDays = 3,
    Month = 4,
}

impl BucketRank {
    /// Integer rank (0–4)
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Rank for a day delta
    pub fn for_days(days: i64) -> Self {
        match days {
            i64::MIN..=0 => BucketRank::Today,
            1 => BucketRank::Yesterday,
            2..=6 => BucketRank::LastSevenDays,
            7..=29 => BucketRank::LastThirtyDays,
            _ => BucketRank::Month,
        }
    }

    /// Label of a fixed bucket; month buckets are labeled per month
    pub fn fixed_label(&self) -> Option<&'static str> {
        match self {
            BucketRank::Today => Some("Today"),
            BucketRank::Yesterday => Some("Yesterday"),
            BucketRank::LastSevenDays => Some("Last 7 Days"),
            BucketRank::LastThirtyDays => Some("Last 30 Days"),
            BucketRank::Month => None,
        }
    }
}

/// A labeled group of stories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub label: String,
    /// Stories in their input (remote) order
    pub records: Vec<StoryRecord>,
    pub rank: BucketRank,
    /// First day of the month, only for month buckets
    pub bucket_date: Option<NaiveDate>,
}

impl Section {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Calendar that instants are placed on before bucketing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarZone {
    /// The process's local zone, including its daylight-saving rules
    Local,
    /// A constant offset from UTC
    Fixed(FixedOffset),
}

impl CalendarZone {
    pub fn utc() -> Self {
        CalendarZone::Fixed(Utc.fix())
    }

    /// Group stories as seen at `now` on this calendar
    pub fn bucket(&self, records: &[StoryRecord], now: DateTime<Utc>) -> Vec<Section> {
        match self {
            CalendarZone::Local => bucket_records(records, &now.with_timezone(&Local)),
            CalendarZone::Fixed(offset) => bucket_records(records, &now.with_timezone(offset)),
        }
    }
}

/// Whole calendar days from `created` to `now`, clamped at zero.
pub fn day_delta<Tz: TimeZone>(created: &DateTime<Utc>, now: &DateTime<Tz>) -> i64 {
    let today = now.date_naive();
    let created_day = created.with_timezone(&now.timezone()).date_naive();
    (today - created_day).num_days().max(0)
}

fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// Group stories into display sections.
///
/// Empty buckets are omitted. Sections come out ordered by rank, with month
/// buckets most-recent first. Every input record lands in exactly one section.
pub fn bucket_records<Tz: TimeZone>(records: &[StoryRecord], now: &DateTime<Tz>) -> Vec<Section> {
    let mut fixed: [Vec<StoryRecord>; 4] = Default::default();
    let mut months: Vec<(NaiveDate, Vec<StoryRecord>)> = Vec::new();

    for record in records {
        let rank = BucketRank::for_days(day_delta(&record.created_at, now));
        if rank == BucketRank::Month {
            let local = record.created_at.with_timezone(&now.timezone());
            let Some(first_of_month) = NaiveDate::from_ymd_opt(local.year(), local.month(), 1)
            else {
                continue;
            };
            match months.iter_mut().find(|(date, _)| *date == first_of_month) {
                Some((_, group)) => group.push(record.clone()),
                None => months.push((first_of_month, vec![record.clone()])),
            }
        } else {
            fixed[rank.value() as usize].push(record.clone());
        }
    }

    let ranks = [
        BucketRank::Today,
        BucketRank::Yesterday,
        BucketRank::LastSevenDays,
        BucketRank::LastThirtyDays,
    ];

    let mut sections: Vec<Section> = ranks
        .into_iter()
        .zip(fixed)
        .filter(|(_, group)| !group.is_empty())
        .filter_map(|(rank, group)| {
            rank.fixed_label().map(|label| Section {
                label: label.to_string(),
                records: group,
                rank,
                bucket_date: None,
            })
        })
        .collect();

    months.sort_by(|(a, _), (b, _)| b.cmp(a));
    sections.extend(months.into_iter().map(|(date, group)| Section {
        label: month_label(date),
        records: group,
        rank: BucketRank::Month,
        bucket_date: Some(date),
    }));

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, LocalResult, NaiveDateTime};

    /// US Eastern time for 2024: EDT from 10 March 07:00Z to 3 November 06:00Z
    #[derive(Debug, Clone, Copy)]
    struct Eastern2024;

    impl Eastern2024 {
        fn offset_at(utc: &NaiveDateTime) -> FixedOffset {
            let edt_start = NaiveDate::from_ymd_opt(2024, 3, 10)
                .and_then(|d| d.and_hms_opt(7, 0, 0))
                .unwrap();
            let edt_end = NaiveDate::from_ymd_opt(2024, 11, 3)
                .and_then(|d| d.and_hms_opt(6, 0, 0))
                .unwrap();
            let hours = if (edt_start..edt_end).contains(utc) { -4 } else { -5 };
            FixedOffset::east_opt(hours * 3600).unwrap()
        }
    }

    impl TimeZone for Eastern2024 {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            Eastern2024
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(12, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            // Only used away from the transitions
            LocalResult::Single(Self::offset_at(&(*local + Duration::hours(5))))
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            Self::offset_at(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            Self::offset_at(utc)
        }
    }

    fn at(now: &DateTime<FixedOffset>, ago: Duration, title: &str) -> StoryRecord {
        StoryRecord::new(title, "i", "m", "c")
            .with_id(title)
            .with_created_at((*now - ago).with_timezone(&Utc))
    }

    fn noon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 20, 12, 0, 0)
            .unwrap()
    }

    fn labels(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn test_reference_scenario() {
        let now = noon();
        let records = vec![
            at(&now, Duration::hours(1), "A"),
            at(&now, Duration::days(1), "B"),
            at(&now, Duration::days(3), "C"),
            at(&now, Duration::days(45), "D"),
        ];

        let sections = bucket_records(&records, &now);
        assert_eq!(
            labels(&sections),
            vec!["Today", "Yesterday", "Last 7 Days", "March 2024"]
        );
        for (section, title) in sections.iter().zip(["A", "B", "C", "D"]) {
            assert_eq!(section.records.len(), 1);
            assert_eq!(section.records[0].title, title);
        }
        assert_eq!(
            sections[3].bucket_date,
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn test_boundary_day_deltas() {
        // Late in the day so that fractional offsets stay on the intended calendar day
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 20, 23, 59, 0)
            .unwrap();
        let cases = [
            (Duration::zero(), BucketRank::Today),
            (Duration::days(1), BucketRank::Yesterday),
            (Duration::minutes((1.999 * 24.0 * 60.0) as i64), BucketRank::Yesterday),
            (Duration::days(2), BucketRank::LastSevenDays),
            (Duration::days(6), BucketRank::LastSevenDays),
            (Duration::days(7), BucketRank::LastThirtyDays),
            (Duration::days(29), BucketRank::LastThirtyDays),
            (Duration::days(30), BucketRank::Month),
        ];

        for (ago, expected) in cases {
            let record = at(&now, ago, "r");
            let sections = bucket_records(std::slice::from_ref(&record), &now);
            assert_eq!(sections.len(), 1);
            assert_eq!(sections[0].rank, expected, "offset {ago:?}");
        }
    }

    #[test]
    fn test_start_of_day_not_absolute_hours() {
        // 00:30 today vs 23:30 yesterday: one hour apart, one calendar day apart
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 20, 0, 30, 0)
            .unwrap();
        let record = at(&now, Duration::hours(1), "late");
        let sections = bucket_records(&[record], &now);
        assert_eq!(sections[0].label, "Yesterday");
    }

    #[test]
    fn test_days_measured_in_now_time_zone() {
        // 2024-04-19T23:00Z is already the 20th in UTC+2
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = plus_two.with_ymd_and_hms(2024, 4, 20, 9, 0, 0).unwrap();
        let record = StoryRecord::new("tz", "i", "m", "c")
            .with_created_at(Utc.with_ymd_and_hms(2024, 4, 19, 23, 0, 0).unwrap());
        let sections = bucket_records(&[record], &now);
        assert_eq!(sections[0].rank, BucketRank::Today);
    }

    #[test]
    fn test_month_uses_offset_of_the_story_date() {
        // 2024-01-31 23:30 EST; in June the zone is on EDT (-4)
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 4, 30, 0).unwrap();
        let record = StoryRecord::new("winter", "i", "m", "c").with_created_at(created);
        let now = Utc
            .with_ymd_and_hms(2024, 6, 15, 16, 0, 0)
            .unwrap()
            .with_timezone(&Eastern2024);

        let sections = bucket_records(std::slice::from_ref(&record), &now);
        assert_eq!(labels(&sections), vec!["January 2024"]);

        // A frozen summer offset would misfile it
        let frozen = now.fixed_offset();
        assert_eq!(labels(&bucket_records(&[record], &frozen)), vec!["February 2024"]);
    }

    #[test]
    fn test_day_delta_across_spring_forward() {
        // 2024-03-09 23:45 EST, then 2024-03-11 00:30 EDT
        let created = Utc.with_ymd_and_hms(2024, 3, 10, 4, 45, 0).unwrap();
        let now = Utc
            .with_ymd_and_hms(2024, 3, 11, 4, 30, 0)
            .unwrap()
            .with_timezone(&Eastern2024);

        assert_eq!(day_delta(&created, &now), 2);
        assert_eq!(day_delta(&created, &now.fixed_offset()), 1);
    }

    #[test]
    fn test_calendar_zone_dispatch() {
        let now = Utc.with_ymd_and_hms(2024, 4, 20, 12, 0, 0).unwrap();
        let records: Vec<_> = (0..40)
            .map(|i| {
                StoryRecord::new(format!("s{i}"), "i", "m", "c")
                    .with_id(format!("s{i}"))
                    .with_created_at(now - Duration::hours(i * 17))
            })
            .collect();

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            CalendarZone::Fixed(plus_two).bucket(&records, now),
            bucket_records(&records, &now.with_timezone(&plus_two))
        );
        assert_eq!(
            CalendarZone::Local.bucket(&records, now),
            bucket_records(&records, &now.with_timezone(&Local))
        );
        assert_eq!(CalendarZone::utc(), CalendarZone::Fixed(FixedOffset::east_opt(0).unwrap()));
    }

    #[test]
    fn test_future_record_is_today() {
        let now = noon();
        let record = StoryRecord::new("future", "i", "m", "c")
            .with_created_at((now + Duration::days(3)).with_timezone(&Utc));
        let sections = bucket_records(&[record], &now);
        assert_eq!(labels(&sections), vec!["Today"]);
    }

    #[test]
    fn test_empty_input_yields_no_sections() {
        assert!(bucket_records(&[], &noon()).is_empty());
    }

    #[test]
    fn test_months_descending_and_order_preserved() {
        let now = noon();
        let records = vec![
            at(&now, Duration::days(40), "mar-1"),
            at(&now, Duration::days(100), "jan-1"),
            at(&now, Duration::days(45), "mar-2"),
            at(&now, Duration::days(75), "feb-1"),
            at(&now, Duration::days(420), "2023"),
        ];

        let sections = bucket_records(&records, &now);
        assert_eq!(
            labels(&sections),
            vec!["March 2024", "February 2024", "January 2024", "February 2023"]
        );
        let march: Vec<_> = sections[0].records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(march, vec!["mar-1", "mar-2"]);
    }

    #[test]
    fn test_no_loss_no_duplication() {
        let now = noon();
        let records: Vec<_> = (0..200)
            .map(|i| at(&now, Duration::hours(i * 7), &format!("story-{i}")))
            .collect();

        let sections = bucket_records(&records, &now);
        assert!(sections.iter().all(|s| !s.is_empty()));

        let mut seen: Vec<_> = sections
            .iter()
            .flat_map(|s| s.records.iter().map(|r| r.id.clone()))
            .collect();
        assert_eq!(seen.len(), records.len());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), records.len());

        let ranks: Vec<_> = sections.iter().map(|s| s.rank).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn test_deterministic_for_fixed_input() {
        let now = noon();
        let records: Vec<_> = (0..50)
            .map(|i| at(&now, Duration::days(i * 3), &format!("s{i}")))
            .collect();
        assert_eq!(bucket_records(&records, &now), bucket_records(&records, &now));
    }
}
