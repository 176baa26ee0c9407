pub mod env;
pub mod progress_config;
pub mod rules_config;
