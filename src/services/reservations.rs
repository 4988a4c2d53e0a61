//! Reservation grid of the booking page.
//!
//! The grid is a run of 15-minute cells starting at 00:00. Cells past the
//! 96th belong to the following date.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use scraper::Html;

use crate::error::Result;
use crate::models::{ReservedRange, SelectorConfig};
use crate::services::{element_text, parse_selector};

/// Minutes covered by one grid cell.
pub const SLOT_MINUTES: u32 = 15;

const UNKNOWN_PRICE: &str = "価格不明";

/// A plan as shown on the booking page, price left as displayed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ScannedPlan {
    pub name: String,
    pub price: String,
}

/// Reserved flag of every grid cell, in page order.
pub fn parse_reserved_flags(document: &Html, selectors: &SelectorConfig) -> Result<Vec<bool>> {
    let sel = parse_selector(&selectors.time_slot)?;
    Ok(document
        .select(&sel)
        .map(|cell| cell.value().attr("data-disabled") == Some("true"))
        .collect())
}

/// Plans listed on the booking page.
pub fn parse_scan_plans(document: &Html, selectors: &SelectorConfig) -> Result<Vec<ScannedPlan>> {
    let item_sel = parse_selector(&selectors.scan_plan_item)?;
    let name_sel = parse_selector(&selectors.plan_name)?;
    let price_sel = parse_selector(&selectors.plan_price)?;

    Ok(document
        .select(&item_sel)
        .map(|item| ScannedPlan {
            name: item
                .select(&name_sel)
                .next()
                .map(element_text)
                .unwrap_or_else(|| element_text(item)),
            price: item
                .select(&price_sel)
                .next()
                .map(element_text)
                .unwrap_or_else(|| UNKNOWN_PRICE.to_string()),
        })
        .collect())
}

/// Short date label used in reports, e.g. `6月1日`.
pub fn date_label(date: NaiveDate) -> String {
    format!("{}月{}日", date.month(), date.day())
}

/// Collapse consecutive reserved cells into ranges.
///
/// The end date is the date of the last reserved cell; the end time is the
/// moment that cell ends.
pub fn collapse_reserved(date: NaiveDate, reserved: &[bool]) -> Vec<ReservedRange> {
    let origin = date.and_time(NaiveTime::MIN);
    let cell_start = |index: usize| -> NaiveDateTime {
        origin + Duration::minutes(i64::from(SLOT_MINUTES) * index as i64)
    };

    let mut ranges = Vec::new();
    let mut index = 0;
    while index < reserved.len() {
        if !reserved[index] {
            index += 1;
            continue;
        }
        let start = index;
        while index < reserved.len() && reserved[index] {
            index += 1;
        }
        let end = index;

        let first = cell_start(start);
        let last = cell_start(end - 1);
        let finish = cell_start(end);
        let minutes = (end - start) as u32 * SLOT_MINUTES;

        ranges.push(ReservedRange {
            start_date: date_label(first.date()),
            end_date: date_label(last.date()),
            start_time: first.format("%H:%M").to_string(),
            end_time: finish.format("%H:%M").to_string(),
            duration_hours: minutes / 60,
            duration_minutes: minutes % 60,
        });
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn grid(reserved: &[usize], len: usize) -> Vec<bool> {
        (0..len).map(|i| reserved.contains(&i)).collect()
    }

    #[test]
    fn test_parse_reserved_flags() {
        let page = r#"
            <div class="css-1i0gn25" data-disabled="true"></div>
            <div class="css-1i0gn25" data-disabled="false"></div>
            <div class="css-1i0gn25" data-selected="true"></div>
            <div class="other" data-disabled="true"></div>
        "#;
        let flags = parse_reserved_flags(&Html::parse_document(page), &SelectorConfig::default())
            .unwrap();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_collapse_ranges() {
        // 10:00-11:30 and 23:45-00:15 across midnight
        let mut cells: Vec<usize> = (40..46).collect();
        cells.extend([95, 96]);
        let ranges = collapse_reserved(date(), &grid(&cells, 100));

        assert_eq!(ranges.len(), 2);
        assert_eq!(
            ranges[0],
            ReservedRange {
                start_date: "6月1日".into(),
                end_date: "6月1日".into(),
                start_time: "10:00".into(),
                end_time: "11:30".into(),
                duration_hours: 1,
                duration_minutes: 30,
            }
        );
        assert_eq!(ranges[1].start_date, "6月1日");
        assert_eq!(ranges[1].end_date, "6月2日");
        assert_eq!(ranges[1].start_time, "23:45");
        assert_eq!(ranges[1].end_time, "00:15");
        assert_eq!(ranges[1].duration_minutes, 30);
    }

    #[test]
    fn test_trailing_run_and_empty_grid() {
        let ranges = collapse_reserved(date(), &grid(&[94, 95], 96));
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end_time, "00:00");
        assert_eq!(ranges[0].end_date, "6月1日");

        assert!(collapse_reserved(date(), &[]).is_empty());
        assert!(collapse_reserved(date(), &grid(&[], 96)).is_empty());
    }

    #[test]
    fn test_parse_scan_plans() {
        let page = r#"
            <ul>
              <li class="css-1vwbwmt"><span class="css-k6zetj">通常</span><span class="css-1y4ezd0">¥2,200〜</span></li>
              <li class="css-1cpdoqx"><span class="css-k6zetj">深夜</span></li>
            </ul>
        "#;
        let plans = parse_scan_plans(&Html::parse_document(page), &SelectorConfig::default()).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].price, "¥2,200〜");
        assert_eq!(plans[1].price, "価格不明");
    }
}
