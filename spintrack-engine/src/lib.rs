pub mod analytics;
pub mod clock;
pub mod config;
pub mod generator;
pub mod guard;
pub mod history;
pub mod timer;
pub mod tracker;
