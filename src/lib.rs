//! lunacal - on-device period calendar
//!
//! Keeps a per-day log of period, flow, ovulation, mood and notes, and
//! projects upcoming periods, ovulation days and fertile windows from it.

pub mod cli;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod date_key;
pub mod error;
pub mod models;
pub mod notify;
pub mod prediction;
pub mod storage;

pub use commands::AppState;
pub use error::Error;
pub use models::{DayLog, DayRecord, FlowLevel, Mood, PredictedDay, PredictionMap};
