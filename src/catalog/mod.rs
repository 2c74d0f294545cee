pub mod memory;
pub mod traits;

pub use memory::InMemoryCatalog;
pub use traits::Catalog;
