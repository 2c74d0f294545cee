pub mod openai;
pub mod traits;

pub use openai::OpenAiNlp;
pub use traits::{FilterExtractor, ResponseContext, ResponseGenerator};
