//! Data module - dataset loading and prompt previews

pub mod preview;
pub mod table;

pub use preview::render_preview;
pub use table::{Scalar, Table};
