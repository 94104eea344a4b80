use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{LocationInfo, WeatherCondition, WeatherSample};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("no forecast samples to aggregate")]
    NoSamples,
}

/// Calendar-date identity of a day bucket in the aggregation timezone.
///
/// Buckets are keyed by this structural tuple rather than a formatted
/// date string, so grouping is independent of locale and display format.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DateKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DateKey {
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
        }
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Aggregated statistics for all samples sharing one calendar date.
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date_key: DateKey,
    pub display_date: String,
    pub current_temp: i32,
    pub max_temp: i32,
    pub min_temp: i32,
    pub avg_temp: i32,
    pub primary_condition: WeatherCondition,
    pub all_conditions: Vec<WeatherCondition>,
    pub avg_humidity: i32,
    pub avg_wind_speed: f64,
    pub avg_pressure: i32,
}

/// Day-level summary forecast for overview display.
#[derive(Debug, Clone, Serialize)]
pub struct BriefForecast {
    pub location: LocationInfo,
    pub days: Vec<DaySummary>,
}

/// One normalized forecast slot in the detailed view.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedSample {
    pub timestamp: DateTime<Utc>,
    pub date_key: DateKey,
    pub date: String,
    pub time: String,
    pub temp: i32,
    pub feels_like: i32,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction_deg: f64,
    pub precipitation_probability: f64,
    pub condition: WeatherCondition,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedDayGroup {
    pub date_key: DateKey,
    pub samples: Vec<DetailedSample>,
}

/// Full-resolution forecast retaining every sample, grouped by day.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedForecast {
    pub location: LocationInfo,
    pub samples: Vec<DetailedSample>,
    pub days: Vec<DetailedDayGroup>,
}

impl DetailedForecast {
    pub fn day(&self, key: &DateKey) -> Option<&DetailedDayGroup> {
        self.days.iter().find(|group| group.date_key == *key)
    }

    pub fn first_day_key(&self) -> Option<DateKey> {
        self.days.first().map(|group| group.date_key)
    }
}

/// Group samples by calendar date in `tz` and summarize the first
/// `max_days` day buckets in first-seen order.
pub fn aggregate_brief<Tz>(
    samples: &[WeatherSample],
    location: LocationInfo,
    max_days: usize,
    tz: &Tz,
) -> Result<BriefForecast, AggregateError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    if samples.is_empty() {
        return Err(AggregateError::NoSamples);
    }

    let mut buckets: Vec<(DateKey, Vec<&WeatherSample>)> = Vec::new();
    for sample in samples {
        let key = DateKey::from_datetime(&sample.timestamp.with_timezone(tz));
        match buckets.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, members)) => members.push(sample),
            None => buckets.push((key, vec![sample])),
        }
    }
    buckets.truncate(max_days);

    let days = buckets
        .into_iter()
        .map(|(key, members)| summarize_day(key, &members, tz))
        .collect();

    Ok(BriefForecast { location, days })
}

/// Retain every sample up to and including `now + horizon_days`, normalize
/// it for display, and group by calendar date in `now`'s timezone.
pub fn aggregate_detailed<Tz>(
    samples: &[WeatherSample],
    location: LocationInfo,
    horizon_days: i64,
    now: DateTime<Tz>,
) -> Result<DetailedForecast, AggregateError>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let cutoff = now.clone() + Duration::days(horizon_days);
    let tz = now.timezone();

    let mut detailed: Vec<DetailedSample> = Vec::new();
    for sample in samples {
        if sample.timestamp > cutoff {
            continue;
        }
        let local = sample.timestamp.with_timezone(&tz);
        detailed.push(DetailedSample {
            timestamp: sample.timestamp,
            date_key: DateKey::from_datetime(&local),
            date: format_date(&local),
            time: format_time(&local),
            temp: round_to_i32(sample.temperature),
            feels_like: round_to_i32(sample.feels_like),
            humidity: sample.humidity,
            pressure: sample.pressure,
            wind_speed: sample.wind_speed,
            wind_direction_deg: sample.wind_direction_deg,
            precipitation_probability: sample.precipitation_probability,
            condition: sample.condition.clone(),
        });
    }

    if detailed.is_empty() {
        return Err(AggregateError::NoSamples);
    }

    let mut days: Vec<DetailedDayGroup> = Vec::new();
    for entry in &detailed {
        match days.iter_mut().find(|group| group.date_key == entry.date_key) {
            Some(group) => group.samples.push(entry.clone()),
            None => days.push(DetailedDayGroup {
                date_key: entry.date_key,
                samples: vec![entry.clone()],
            }),
        }
    }

    Ok(DetailedForecast {
        location,
        samples: detailed,
        days,
    })
}

fn summarize_day<Tz>(key: DateKey, members: &[&WeatherSample], tz: &Tz) -> DaySummary
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let first = members[0];

    let max = members
        .iter()
        .map(|s| s.temperature)
        .fold(f64::NEG_INFINITY, f64::max);
    let min = members
        .iter()
        .map(|s| s.temperature)
        .fold(f64::INFINITY, f64::min);

    DaySummary {
        date_key: key,
        display_date: format_date(&first.timestamp.with_timezone(tz)),
        current_temp: round_to_i32(first.temperature),
        max_temp: round_to_i32(max),
        min_temp: round_to_i32(min),
        avg_temp: round_to_i32(mean(members.iter().map(|s| s.temperature))),
        primary_condition: first.condition.clone(),
        all_conditions: members.iter().map(|s| s.condition.clone()).collect(),
        avg_humidity: round_to_i32(mean(members.iter().map(|s| s.humidity))),
        avg_wind_speed: round_to_1dp(mean(members.iter().map(|s| s.wind_speed))),
        avg_pressure: round_to_i32(mean(members.iter().map(|s| s.pressure))),
    }
}

// Callers guarantee a non-empty iterator (day buckets always hold at
// least the sample that created them).
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    sum / count as f64
}

/// Round to the nearest integer, ties away from zero (so -0.5 becomes -1,
/// matching the positive direction).
pub fn round_to_i32(value: f64) -> i32 {
    value.round() as i32
}

/// Round to one decimal place, ties away from zero.
pub fn round_to_1dp(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn format_date<Tz>(dt: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    dt.format("%a %-d %b").to_string()
}

fn format_time<Tz>(dt: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    dt.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(main: &str) -> WeatherCondition {
        WeatherCondition {
            main: main.to_string(),
            description: main.to_lowercase(),
            icon: "01d".to_string(),
        }
    }

    fn sample(dt: DateTime<Utc>, temp: f64) -> WeatherSample {
        WeatherSample {
            timestamp: dt,
            temperature: temp,
            feels_like: temp - 1.0,
            humidity: 50.0,
            pressure: 1000.0,
            wind_speed: 4.0,
            wind_direction_deg: 180.0,
            precipitation_probability: 0.0,
            condition: condition("Clear"),
        }
    }

    fn location() -> LocationInfo {
        LocationInfo {
            name: "Testville".to_string(),
            country: "TS".to_string(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_brief_worked_example() {
        // day1 09:00 10°, day1 15:00 20°, day2 09:00 5°, max_days = 2
        let samples = vec![
            sample(at(2025, 7, 1, 9), 10.0),
            sample(at(2025, 7, 1, 15), 20.0),
            sample(at(2025, 7, 2, 9), 5.0),
        ];

        let brief = aggregate_brief(&samples, location(), 2, &Utc).unwrap();
        assert_eq!(brief.days.len(), 2);

        let day1 = &brief.days[0];
        assert_eq!(day1.current_temp, 10);
        assert_eq!(day1.max_temp, 20);
        assert_eq!(day1.min_temp, 10);
        assert_eq!(day1.avg_temp, 15);
        assert_eq!(day1.all_conditions.len(), 2);

        let day2 = &brief.days[1];
        assert_eq!(day2.current_temp, 5);
        assert_eq!(day2.date_key, DateKey { year: 2025, month: 7, day: 2 });
    }

    #[test]
    fn test_brief_truncates_to_max_days() {
        let samples: Vec<WeatherSample> = (1..=5)
            .map(|d| sample(at(2025, 3, d, 12), 10.0 + d as f64))
            .collect();

        let brief = aggregate_brief(&samples, location(), 3, &Utc).unwrap();
        assert_eq!(brief.days.len(), 3);

        // Fewer distinct days than max_days returns them all.
        let brief = aggregate_brief(&samples, location(), 9, &Utc).unwrap();
        assert_eq!(brief.days.len(), 5);
    }

    #[test]
    fn test_brief_day_order_is_first_seen() {
        let samples = vec![
            sample(at(2025, 3, 2, 12), 1.0),
            sample(at(2025, 3, 1, 12), 2.0),
            sample(at(2025, 3, 2, 15), 3.0),
        ];

        let brief = aggregate_brief(&samples, location(), 5, &Utc).unwrap();
        assert_eq!(brief.days[0].date_key.day, 2);
        assert_eq!(brief.days[1].date_key.day, 1);
        assert_eq!(brief.days[0].all_conditions.len(), 2);
    }

    #[test]
    fn test_brief_avg_within_min_max() {
        let samples = vec![
            sample(at(2025, 6, 1, 0), -2.3),
            sample(at(2025, 6, 1, 3), 4.9),
            sample(at(2025, 6, 1, 6), 1.1),
        ];

        let day = &aggregate_brief(&samples, location(), 1, &Utc).unwrap().days[0];
        assert!(day.min_temp <= day.avg_temp && day.avg_temp <= day.max_temp);
        // Mean is 1.233.., rounded to 1.
        assert_eq!(day.avg_temp, 1);
    }

    #[test]
    fn test_brief_empty_input_is_an_error() {
        assert_eq!(
            aggregate_brief(&[], location(), 3, &Utc).unwrap_err(),
            AggregateError::NoSamples
        );
    }

    #[test]
    fn test_brief_buckets_follow_timezone() {
        // 23:00 UTC on Mar 1 is already Mar 2 in UTC+2.
        let samples = vec![
            sample(at(2025, 3, 1, 23), 1.0),
            sample(at(2025, 3, 2, 1), 2.0),
        ];

        let utc_view = aggregate_brief(&samples, location(), 5, &Utc).unwrap();
        assert_eq!(utc_view.days.len(), 2);

        let plus_two = chrono::FixedOffset::east_opt(2 * 3600).unwrap();
        let local_view = aggregate_brief(&samples, location(), 5, &plus_two).unwrap();
        assert_eq!(local_view.days.len(), 1);
        assert_eq!(
            local_view.days[0].date_key,
            DateKey { year: 2025, month: 3, day: 2 }
        );
    }

    #[test]
    fn test_rounding_ties_away_from_zero() {
        assert_eq!(round_to_i32(0.5), 1);
        assert_eq!(round_to_i32(-0.5), -1);
        assert_eq!(round_to_i32(2.5), 3);
        assert_eq!(round_to_i32(-2.5), -3);
        assert_eq!(round_to_i32(-2.4), -2);

        assert_eq!(round_to_1dp(3.14), 3.1);
        assert_eq!(round_to_1dp(3.15), 3.2);
        assert_eq!(round_to_1dp(-0.25), -0.3);
    }

    #[test]
    fn test_brief_negative_half_average() {
        // Mean of -1 and -2 is -1.5, which must round to -2.
        let samples = vec![
            sample(at(2025, 1, 5, 6), -1.0),
            sample(at(2025, 1, 5, 9), -2.0),
        ];

        let day = &aggregate_brief(&samples, location(), 1, &Utc).unwrap().days[0];
        assert_eq!(day.avg_temp, -2);
        assert_eq!(day.min_temp, -2);
        assert!(day.min_temp <= day.avg_temp && day.avg_temp <= day.max_temp);
    }

    #[test]
    fn test_detailed_cutoff_is_inclusive() {
        let now = at(2025, 7, 1, 12);
        let samples = vec![
            sample(at(2025, 7, 1, 15), 10.0),
            sample(at(2025, 7, 3, 12), 11.0), // exactly now + 2 days
            sample(at(2025, 7, 3, 15), 12.0), // past the cutoff
        ];

        let detailed = aggregate_detailed(&samples, location(), 2, now).unwrap();
        assert_eq!(detailed.samples.len(), 2);
        assert_eq!(detailed.samples[1].temp, 11);
    }

    #[test]
    fn test_detailed_groups_cover_all_retained_samples() {
        let now = at(2025, 7, 1, 0);
        let samples = vec![
            sample(at(2025, 7, 1, 9), 1.0),
            sample(at(2025, 7, 1, 12), 2.0),
            sample(at(2025, 7, 2, 9), 3.0),
            sample(at(2025, 7, 2, 12), 4.0),
            sample(at(2025, 7, 3, 9), 5.0),
        ];

        let detailed = aggregate_detailed(&samples, location(), 5, now).unwrap();
        assert_eq!(detailed.days.len(), 3);

        // Concatenating the groups reproduces the flat sample list.
        let regrouped: Vec<i32> = detailed
            .days
            .iter()
            .flat_map(|g| g.samples.iter().map(|s| s.temp))
            .collect();
        let flat: Vec<i32> = detailed.samples.iter().map(|s| s.temp).collect();
        assert_eq!(regrouped, flat);

        for group in &detailed.days {
            assert!(group.samples.iter().all(|s| s.date_key == group.date_key));
        }
    }

    #[test]
    fn test_detailed_normalizes_display_fields() {
        let now = at(2025, 7, 1, 0);
        let mut raw = sample(at(2025, 7, 1, 9), 10.6);
        raw.feels_like = 9.4;
        raw.precipitation_probability = 0.35;

        let detailed = aggregate_detailed(&[raw], location(), 5, now).unwrap();
        let slot = &detailed.samples[0];
        assert_eq!(slot.temp, 11);
        assert_eq!(slot.feels_like, 9);
        assert_eq!(slot.time, "09:00");
        assert_eq!(slot.date, "Tue 1 Jul");
        assert_eq!(slot.precipitation_probability, 0.35);
    }

    #[test]
    fn test_detailed_everything_filtered_is_an_error() {
        let now = at(2025, 7, 1, 0);
        let samples = vec![sample(at(2025, 8, 1, 0), 10.0)];
        assert_eq!(
            aggregate_detailed(&samples, location(), 5, now).unwrap_err(),
            AggregateError::NoSamples
        );
    }

    #[test]
    fn test_detailed_first_day_and_lookup() {
        let now = at(2025, 7, 1, 0);
        let samples = vec![
            sample(at(2025, 7, 1, 9), 1.0),
            sample(at(2025, 7, 2, 9), 2.0),
        ];

        let detailed = aggregate_detailed(&samples, location(), 5, now).unwrap();
        let first = detailed.first_day_key().unwrap();
        assert_eq!(first, DateKey { year: 2025, month: 7, day: 1 });
        assert_eq!(detailed.day(&first).unwrap().samples.len(), 1);

        let absent = DateKey { year: 2030, month: 1, day: 1 };
        assert!(detailed.day(&absent).is_none());
    }

    #[test]
    fn test_date_key_display() {
        let key = DateKey { year: 2025, month: 3, day: 7 };
        assert_eq!(key.to_string(), "2025-03-07");
    }
}
