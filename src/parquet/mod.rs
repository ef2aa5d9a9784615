//! Saves and reloads the extracted climate table in the _parquet_ file format.

pub mod table;

pub use table::{load_table, save_table};
