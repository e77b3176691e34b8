use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use locals_types::api::EventListParams;

use crate::geo::GeoPoint;
use crate::tags::TagFilter;

/// Half-open occurrence window `[start, end)`. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn intersect(self, other: TimeWindow) -> TimeWindow {
        TimeWindow {
            start: max_opt(self.start, other.start),
            end: min_opt(self.end, other.end),
        }
    }
}

fn max_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRadius {
    pub origin: GeoPoint,
    pub radius_miles: f64,
}

impl GeoRadius {
    /// Events without coordinates are never within any radius.
    pub fn contains(&self, point: Option<GeoPoint>) -> bool {
        point.is_some_and(|p| self.origin.distance_miles(&p) <= self.radius_miles)
    }
}

/// What the post-filters need to know about a candidate event.
pub trait Discoverable {
    fn tag_names(&self) -> &[String];
    fn coordinates(&self) -> Option<GeoPoint>;
}

/// A typed discovery query. All constraints are ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub window: TimeWindow,
    /// Set when old events are hidden; events before this instant are dropped.
    pub not_before: Option<DateTime<Utc>>,
    pub available_only: bool,
    pub tags: TagFilter,
    pub geo: Option<GeoRadius>,
    pub sort_by_date: bool,
    /// Free-text location. Accepted but not used for matching.
    pub location: Option<String>,
}

impl EventFilter {
    /// Builds a filter from raw query parameters. Values that fail to parse
    /// disable their own filter and never fail the whole query.
    ///
    /// `offset` is the fixed zone in which a bare `YYYY-MM-DD` is a local day.
    pub fn from_params(params: &EventListParams, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let mut window = TimeWindow::default();

        if let Some(raw) = non_blank(&params.date) {
            match parse_day(raw, offset) {
                Some(day) => {
                    let start = local_midnight(day, offset);
                    window = window.intersect(TimeWindow {
                        start: Some(start),
                        end: Some(start + Duration::days(1)),
                    });
                }
                None => debug!("Ignoring malformed date filter '{}'", raw),
            }
        }

        if let Some(raw) = non_blank(&params.date_after) {
            match parse_instant(raw, offset) {
                Some(Instant::At(at)) => {
                    window = window.intersect(TimeWindow { start: Some(at), end: None })
                }
                Some(Instant::Day(day)) => {
                    window = window.intersect(TimeWindow {
                        start: Some(local_midnight(day, offset)),
                        end: None,
                    })
                }
                None => debug!("Ignoring malformed date_after filter '{}'", raw),
            }
        }

        if let Some(raw) = non_blank(&params.date_before) {
            match parse_instant(raw, offset) {
                Some(Instant::At(at)) => {
                    window = window.intersect(TimeWindow { start: None, end: Some(at) })
                }
                // A bare date covers that whole local day
                Some(Instant::Day(day)) => {
                    window = window.intersect(TimeWindow {
                        start: None,
                        end: Some(local_midnight(day, offset) + Duration::days(1)),
                    })
                }
                None => debug!("Ignoring malformed date_before filter '{}'", raw),
            }
        }

        let show_old = parse_flag("show_old", params.show_old.as_deref()).unwrap_or(false);

        EventFilter {
            window,
            not_before: (!show_old).then_some(now),
            available_only: parse_flag("available_only", params.available_only.as_deref())
                .unwrap_or(false),
            tags: TagFilter::parse(params.tags_include.as_deref(), params.tags_exclude.as_deref()),
            geo: parse_geo(params),
            sort_by_date: parse_flag("sort_by_date", params.sort_by_date.as_deref())
                .unwrap_or(false),
            location: non_blank(&params.location).map(str::to_string),
        }
    }

    /// Applies the tag and radius checks, preserving candidate order.
    pub fn apply_post_filters<T: Discoverable>(&self, candidates: Vec<T>) -> Vec<T> {
        if self.tags.is_empty() && self.geo.is_none() {
            return candidates;
        }

        candidates
            .into_iter()
            .filter(|event| self.tags.matches(event.tag_names().iter().map(String::as_str)))
            .filter(|event| match &self.geo {
                Some(geo) => geo.contains(event.coordinates()),
                None => true,
            })
            .collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_flag(name: &str, raw: Option<&str>) -> Option<bool> {
    let raw = raw?.trim();
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            debug!("Ignoring malformed {} flag '{}'", name, raw);
            None
        }
    }
}

fn parse_geo(params: &EventListParams) -> Option<GeoRadius> {
    let radius = non_blank(&params.radius)?;
    let radius_miles = match radius.parse::<f64>() {
        Ok(r) if r.is_finite() && r > 0.0 => r,
        _ => {
            debug!("Ignoring malformed radius '{}'", radius);
            return None;
        }
    };

    let lat = non_blank(&params.user_lat).and_then(|s| s.parse::<f64>().ok());
    let lon = non_blank(&params.user_lon).and_then(|s| s.parse::<f64>().ok());
    match GeoPoint::from_parts(lat, lon) {
        Some(origin) => Some(GeoRadius { origin, radius_miles }),
        None => {
            debug!("Radius given without usable user_lat/user_lon; skipping geo filter");
            None
        }
    }
}

enum Instant {
    At(DateTime<Utc>),
    Day(NaiveDate),
}

fn parse_instant(raw: &str, offset: FixedOffset) -> Option<Instant> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(Instant::At(at.with_timezone(&Utc)));
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Instant::Day(day));
    }
    // Zone-less timestamps are read in the configured zone
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .and_then(|naive| naive.and_local_timezone(offset).single())
        .map(|local| Instant::At(local.with_timezone(&Utc)))
}

fn parse_day(raw: &str, offset: FixedOffset) -> Option<NaiveDate> {
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(day);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&offset).date_naive())
}

fn local_midnight(day: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = day.and_time(chrono::NaiveTime::MIN);
    // A fixed offset has exactly one mapping for every local time
    match local.and_local_timezone(offset).single() {
        Some(at) => at.with_timezone(&Utc),
        None => local.and_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Candidate {
        name: &'static str,
        tags: Vec<String>,
        at: Option<GeoPoint>,
    }

    impl Discoverable for Candidate {
        fn tag_names(&self) -> &[String] {
            &self.tags
        }

        fn coordinates(&self) -> Option<GeoPoint> {
            self.at
        }
    }

    fn candidate(name: &'static str, tags: &[&str], at: Option<GeoPoint>) -> Candidate {
        Candidate {
            name,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            at,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn defaults_hide_old_events_only() {
        let filter = EventFilter::from_params(&EventListParams::default(), now(), utc());
        assert!(filter.window.is_unbounded());
        assert_eq!(filter.not_before, Some(now()));
        assert!(!filter.available_only);
        assert!(!filter.sort_by_date);
        assert!(filter.tags.is_empty());
        assert!(filter.geo.is_none());
    }

    #[test]
    fn show_old_disables_age_cutoff() {
        let params = EventListParams {
            show_old: Some("true".into()),
            ..Default::default()
        };
        let filter = EventFilter::from_params(&params, now(), utc());
        assert_eq!(filter.not_before, None);
    }

    #[test]
    fn exact_day_uses_configured_offset() {
        let params = EventListParams {
            date: Some("2025-07-04".into()),
            ..Default::default()
        };
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        let filter = EventFilter::from_params(&params, now(), eastern);
        assert_eq!(
            filter.window.start,
            Some(Utc.with_ymd_and_hms(2025, 7, 4, 5, 0, 0).unwrap())
        );
        assert_eq!(
            filter.window.end,
            Some(Utc.with_ymd_and_hms(2025, 7, 5, 5, 0, 0).unwrap())
        );
    }

    #[test]
    fn malformed_values_are_skipped() {
        let params = EventListParams {
            date: Some("next tuesday".into()),
            date_after: Some("2025-13-45".into()),
            radius: Some("far".into()),
            user_lat: Some("40.0".into()),
            user_lon: Some("-74.0".into()),
            available_only: Some("maybe".into()),
            ..Default::default()
        };
        let filter = EventFilter::from_params(&params, now(), utc());
        assert!(filter.window.is_unbounded());
        assert!(filter.geo.is_none());
        assert!(!filter.available_only);
    }

    #[test]
    fn date_range_and_day_intersect() {
        let params = EventListParams {
            date: Some("2025-07-04".into()),
            date_after: Some("2025-07-04T18:00:00Z".into()),
            date_before: Some("2025-07-10".into()),
            ..Default::default()
        };
        let filter = EventFilter::from_params(&params, now(), utc());
        assert_eq!(
            filter.window.start,
            Some(Utc.with_ymd_and_hms(2025, 7, 4, 18, 0, 0).unwrap())
        );
        assert_eq!(
            filter.window.end,
            Some(Utc.with_ymd_and_hms(2025, 7, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn bare_date_before_covers_whole_day() {
        let params = EventListParams {
            date_before: Some("2025-07-10".into()),
            ..Default::default()
        };
        let filter = EventFilter::from_params(&params, now(), utc());
        assert_eq!(
            filter.window.end,
            Some(Utc.with_ymd_and_hms(2025, 7, 11, 0, 0, 0).unwrap())
        );

        let params = EventListParams {
            date_before: Some("2025-07-10T09:30:00.000Z".into()),
            ..Default::default()
        };
        let filter = EventFilter::from_params(&params, now(), utc());
        assert_eq!(
            filter.window.end,
            Some(Utc.with_ymd_and_hms(2025, 7, 10, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn radius_boundary() {
        let origin = GeoPoint::new(40.0, -74.0).unwrap();
        let radius = 10.0;
        let eps = 0.01;
        let miles_per_degree = crate::geo::EARTH_RADIUS_MILES * std::f64::consts::PI / 180.0;
        let north = |miles: f64| GeoPoint::new(40.0 + miles / miles_per_degree, -74.0);

        let params = EventListParams {
            radius: Some(radius.to_string()),
            user_lat: Some("40.0".into()),
            user_lon: Some("-74.0".into()),
            ..Default::default()
        };
        let filter = EventFilter::from_params(&params, now(), utc());
        assert_eq!(filter.geo.map(|g| g.origin), Some(origin));

        let kept = filter.apply_post_filters(vec![
            candidate("here", &[], Some(origin)),
            candidate("inside", &[], north(radius - eps)),
            candidate("outside", &[], north(radius + eps)),
            candidate("nowhere", &[], None),
        ]);
        let names: Vec<_> = kept.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["here", "inside"]);
    }

    #[test]
    fn tags_and_geo_combine() {
        let params = EventListParams {
            tags_include: Some("music".into()),
            tags_exclude: Some("comedy".into()),
            user_lat: Some("40.0".into()),
            user_lon: Some("-75.0".into()),
            radius: Some("10".into()),
            ..Default::default()
        };
        let filter = EventFilter::from_params(&params, now(), utc());
        let near = GeoPoint::new(40.05, -75.0);
        let far = GeoPoint::new(41.0, -75.0);

        let kept = filter.apply_post_filters(vec![
            candidate("near music", &["music"], near),
            candidate("far music", &["music"], far),
            candidate("near music+comedy", &["music", "comedy"], near),
            candidate("near dance", &["dance"], near),
            candidate("music, no coordinates", &["music"], None),
        ]);
        let names: Vec<_> = kept.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["near music"]);
    }
}
