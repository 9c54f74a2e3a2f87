//! Message classification and statistics aggregation

pub mod aggregate;
pub mod classify;

pub use aggregate::{
    compare_user_ids, DedupeWindow, MediaCounts, ScanStats, Totals, UserStats, WordLeader,
};
pub use classify::{tokenize, Classification, Classifier};
