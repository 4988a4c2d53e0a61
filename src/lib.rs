// src/lib.rs

//! spacewatch library
//!
//! Scrapes rental-space listings into a record store and answers price, sales,
//! venue and option queries over the collected data.

pub mod config;
pub mod error;
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod pricing;
pub mod reports;
pub mod services;
pub mod storage;
pub mod utils;
