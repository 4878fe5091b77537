pub mod layout;
pub mod table;

pub use layout::{DataLayout, GroupFiles};
pub use table::{
    CoordinateTables, ParseWarning, ShapeMismatch, TIMESTEPS, TableError, TableLoad, TableSummary,
    TimeSeriesTable,
};
