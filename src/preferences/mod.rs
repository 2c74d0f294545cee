pub mod memory;
pub mod traits;

pub use memory::InMemoryPreferences;
pub use traits::PreferenceStore;
