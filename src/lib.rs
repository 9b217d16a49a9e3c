//! Stamp catalog extraction
//!
//! Fills catalog fields (Scott number, face value, theme, dominant colors) for
//! stamp photographs by merging OCR heuristics with a vision model, and
//! drains the durable extraction job queue that schedules that work.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
pub mod telemetry;
