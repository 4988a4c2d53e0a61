//! Pipeline entry points for collector operations.
//!
//! - `run_collect_rates`: Scrape hourly plan prices into the rate table
//! - `collect_space_info`: Store a week of venue details
//! - `collect_options`: Store add-on options and their price changes
//! - `scan_reservations`: Read the reservation calendar without writing

pub mod collect_options;
pub mod collect_rates;
pub mod collect_space_info;
pub mod jobs;
pub mod scan_reservations;

pub use collect_options::{OptionSummary, collect_options};
pub use collect_rates::{CollectSummary, UrlOutcome, collect_url, run_collect_rates};
pub use collect_space_info::{SpaceInfoSummary, collect_space_info};
pub use jobs::{CollectJob, jobs_from_payload};
pub use scan_reservations::{DayReservations, ReservationScan, scan_reservations};
