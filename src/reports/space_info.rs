//! Stored venue details for a set of rooms.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::Config;
use crate::storage::{Item, ItemKey, RecordStore, Table, batch_get_all};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub point: f64,
}

/// Details of one room, or a not-found marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoomReport {
    Found {
        room_id: String,
        found: bool,
        name: String,
        url: String,
        location: String,
        station: String,
        capacity: String,
        stay_capacity: String,
        floor_space: String,
        space_type: String,
        daily_points: Vec<DailyPoint>,
        total_records: usize,
    },
    Missing {
        room_id: String,
        found: bool,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub requested_rooms: usize,
    pub found_rooms: usize,
    pub not_found_rooms: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpaceInfoReport {
    pub summary: RoomSummary,
    pub rooms: Vec<RoomReport>,
}

/// Read the rows of `space_info_days` days starting today for every room.
///
/// Details come from the earliest stored day; every day contributes a point.
pub async fn space_info_report(
    store: &dyn RecordStore,
    config: &Config,
    room_ids: &[String],
    today: NaiveDate,
) -> SpaceInfoReport {
    let table = Table::space_info(&config.tables);
    let dates: Vec<String> = (0..config.collector.space_info_days)
        .map(|offset| (today + Duration::days(i64::from(offset))).to_string())
        .collect();

    let mut rooms = Vec::with_capacity(room_ids.len());
    for room_id in room_ids {
        let keys: Vec<ItemKey> = dates
            .iter()
            .map(|date| ItemKey::new(room_id.as_str(), date.as_str()))
            .collect();
        let fetch = batch_get_all(
            store,
            &table,
            &keys,
            config.aggregation.batch_size,
            config.aggregation.max_unprocessed_retries,
        )
        .await;
        if !fetch.abandoned.is_empty() {
            warn!(
                "{} space info rows of {} could not be read",
                fetch.abandoned.len(),
                room_id
            );
        }
        debug!("{} space info rows for {}", fetch.items.len(), room_id);
        rooms.push(room_report(room_id, fetch.items));
    }

    let found_rooms = rooms
        .iter()
        .filter(|r| matches!(r, RoomReport::Found { .. }))
        .count();
    SpaceInfoReport {
        summary: RoomSummary {
            requested_rooms: room_ids.len(),
            found_rooms,
            not_found_rooms: room_ids.len() - found_rooms,
        },
        rooms,
    }
}

fn room_report(room_id: &str, mut items: Vec<Item>) -> RoomReport {
    items.sort_by(|a, b| text(a, "date").cmp(&text(b, "date")));
    let Some(first) = items.first() else {
        return RoomReport::Missing {
            room_id: room_id.to_string(),
            found: false,
            error: "No data found for this room".to_string(),
        };
    };

    let daily_points = items
        .iter()
        .map(|item| DailyPoint {
            date: text(item, "date"),
            point: item.get("point").and_then(Value::as_f64).unwrap_or(0.0),
        })
        .collect();

    RoomReport::Found {
        room_id: room_id.to_string(),
        found: true,
        name: text(first, "name"),
        url: text(first, "url"),
        location: text(first, "location"),
        station: text(first, "station"),
        capacity: text(first, "capacity"),
        stay_capacity: text(first, "stay_capacity"),
        floor_space: text(first, "floor_space"),
        space_type: text(first, "space_type"),
        daily_points,
        total_records: items.len(),
    }
}

fn text(item: &Item, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
