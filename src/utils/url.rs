// src/utils/url.rs

//! URL helpers for marketplace pages.

use chrono::NaiveDate;
use url::Url;

use crate::utils::short_hash;

/// Space id from a `/rooms/<id>` path, falling back to `unknown_<hash>`.
pub fn space_id_from_rooms_url(page_url: &str) -> String {
    Url::parse(page_url)
        .ok()
        .and_then(|u| {
            let mut segments = u.path_segments()?;
            segments.find(|s| *s == "rooms")?;
            segments
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("unknown_{}", short_hash(page_url)))
}

/// The `room_uid` query parameter, if present and non-empty.
pub fn room_uid(page_url: &str) -> Option<String> {
    Url::parse(page_url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == "room_uid")
        .map(|(_, v)| v.into_owned())
        .filter(|id| !id.is_empty())
}

/// Space id from the `room_uid` query parameter, or `"unknown"`.
pub fn space_id_from_room_uid(page_url: &str) -> String {
    room_uid(page_url).unwrap_or_else(|| "unknown".to_string())
}

/// Page URL for one date, and optionally a one-hour booking from `start_hour`.
///
/// `template` uses `{date}`, `{start_hour}` and `{end_hour}` placeholders;
/// hour placeholders render empty when no hour is given.
pub fn day_page_url(
    page_url: &str,
    template: &str,
    date: NaiveDate,
    start_hour: Option<u32>,
) -> String {
    let (start, end) = start_hour
        .map(|h| (h.to_string(), (h + 1).to_string()))
        .unwrap_or_default();
    let query = template
        .replace("{date}", &date.format("%Y-%m-%d").to_string())
        .replace("{start_hour}", &start)
        .replace("{end_hour}", &end);
    with_query(page_url, &query)
}

/// Append an encoded query string, replacing any existing one.
pub fn with_query(page_url: &str, query: &str) -> String {
    let base = page_url.split('?').next().unwrap_or(page_url);
    format!("{base}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_id_from_rooms_url() {
        assert_eq!(
            space_id_from_rooms_url("https://www.spacemarket.com/rooms/abc123/?plan=1"),
            "abc123"
        );
        let fallback = space_id_from_rooms_url("https://www.spacemarket.com/spaces/x");
        assert!(fallback.starts_with("unknown_"));
        assert_eq!(fallback.len(), "unknown_".len() + 8);
    }

    #[test]
    fn test_space_id_from_room_uid() {
        assert_eq!(
            space_id_from_room_uid(
                "https://www.spacemarket.com/spaces/x/rooms/abc/reservations/new?room_uid=r9&type=hour"
            ),
            "r9"
        );
        assert_eq!(space_id_from_room_uid("https://example.com/"), "unknown");
        assert_eq!(space_id_from_room_uid("not a url"), "unknown");
    }

    #[test]
    fn test_day_page_url() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let template = "date={date}&start_hour={start_hour}&end_hour={end_hour}";
        assert_eq!(
            day_page_url("https://example.com/r", template, date, Some(23)),
            "https://example.com/r?date=2025-06-01&start_hour=23&end_hour=24"
        );
        assert_eq!(
            day_page_url("https://example.com/r", template, date, None),
            "https://example.com/r?date=2025-06-01&start_hour=&end_hour="
        );
    }

    #[test]
    fn test_with_query() {
        assert_eq!(
            with_query("https://example.com/rooms/a?x=1", "date=2025-06-01"),
            "https://example.com/rooms/a?date=2025-06-01"
        );
    }
}
