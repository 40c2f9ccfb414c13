pub mod analytics;
pub mod clients;
pub mod codes;
pub mod config;
pub mod database;
pub mod dedupe;
pub mod error;
pub mod handlers;
pub mod models;
pub mod operative_day;
pub mod plans;
pub mod reports;
pub mod roulette;
