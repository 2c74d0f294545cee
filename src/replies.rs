//! User-facing assistant texts that do not come from the language model.

pub const GREETING: &str = "Hi! I'm your real estate assistant. I can help you find properties using natural language! Try saying 'I need a 3 bedroom house under $500000' or use the filters below.";

/// Extraction failed or produced nothing usable.
pub const EXTRACTION_FALLBACK: &str =
    "I'm here to help! Try describing what you're looking for, or use the filters below.";

/// Response generation failed.
pub const GENERATION_FALLBACK: &str = "I'm here to help you find your dream property! Use the filters or describe what you're looking for.";

pub const SEARCHING: &str = "🔍 Searching for properties...";
pub const SEARCH_FAILED: &str = "Sorry, there was an error searching for properties.";
pub const MISSING_CRITERIA: &str =
    "Please provide at least one filter (budget, bedrooms, or location)";

/// User-side line logged when a search starts.
pub const SEARCH_REQUEST: &str = "Looking for properties...";

pub const COMPARISON_ADDED: &str = "Property added to comparison!";
pub const COMPARISON_REMOVED: &str = "Property removed from comparison.";
pub const COMPARISON_FULL: &str =
    "You can compare up to 4 properties at once. Remove one to add another.";
pub const COMPARISON_CLEARED: &str = "Comparison cleared.";

pub const FAVORITE_SAVED: &str = "✅ Property saved to your favorites!";
pub const FAVORITE_REMOVED: &str = "Property removed from favorites.";

/// Prompt handed to response generation after a search.
pub fn found_prompt(count: usize) -> String {
    if count == 0 {
        "No properties found".to_string()
    } else {
        format!("Found {count} properties")
    }
}
