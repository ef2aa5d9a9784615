//! Locating and reading gridded source files.

pub mod grid;
pub mod locator;
pub mod site;

pub use grid::{read_region, read_site_series, BoundingBox, GridRegion};
pub use locator::{enumerate_tasks, Task};
pub use site::extract_task;
