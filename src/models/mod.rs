pub mod listing;
pub mod matching;
pub mod stats_models;
