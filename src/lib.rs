//! # hunt-odds
//!
//! Draw-odds statistics for big-game license lotteries. An agency odds report
//! is normalized into typed [`HuntRecord`]s (with a precomputed `huntOdds`
//! percentage), kept in a [`HuntRecordStore`], and queried by species, weapon
//! class and eligibility tags through the [`QueryEngine`].
//!
//! Nothing is loaded implicitly: callers pick [`HuntRecordStore::open`],
//! [`HuntRecordStore::load_snapshot`] or [`normalize`] themselves.
pub mod error;
pub mod models;
pub mod normalizer;
pub mod odds;
pub mod query;
pub mod store;

pub use error::{HuntOddsError, Result};
pub use models::{Config, EligibilityTag, HuntRecord, HuntSummary, WeaponCode};
pub use normalizer::{normalize, RawTable, ReportLayout};
pub use query::{HuntQuery, QueryEngine};
pub use store::HuntRecordStore;
