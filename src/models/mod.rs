// src/models/mod.rs

//! Domain models for spacewatch.
//!
//! This module contains all data structures used throughout the application,
//! organized by the table or page they belong to.

mod config;
mod rate;
mod sales;
mod space;

// Re-export all public types
pub use config::{
    AggregationConfig, CalendarConfig, CollectorConfig, Config, ScraperConfig, SelectorConfig,
    Strategy, TableConfig,
};
pub use rate::{DayType, ObservedRate, RateKey, RateRecord, Slot, plan_id_for, price_from_value};
pub use sales::{ReservedRange, SalesRecord};
pub use space::{
    OptionEntry, OptionHistoryRecord, OptionInfoRecord, OptionPriceChange, SpaceInfoRecord,
};
