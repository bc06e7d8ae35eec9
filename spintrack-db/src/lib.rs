pub mod db;
pub mod models;
pub mod state;

pub use rusqlite;
