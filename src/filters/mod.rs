pub mod merge;
pub mod types;

pub use merge::merge;
pub use types::{FilterSet, PartialFilterUpdate};
