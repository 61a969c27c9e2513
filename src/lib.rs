//! Fetch a public data file, read it into a table, grid or feature set,
//! reshape it and render a text view.

pub mod archive;
pub mod error;
pub mod fetch;
pub mod grid;
pub mod header;
pub mod label;
pub mod recipe;
pub mod render;
pub mod table;
pub mod vector;

pub use error::{Error, Result};
