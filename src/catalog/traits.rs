use async_trait::async_trait;

use crate::error::CatalogError;
use crate::filters::FilterSet;
use crate::models::Property;

/// Read access to the property catalog
///
/// Implementations treat absent, empty and `"any"` fields as unconstrained,
/// use inclusive numeric bounds, match location as a case-insensitive
/// substring and amenities any-of.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Properties matching `filters`, at most the implementation's limit
    async fn search(&self, filters: &FilterSet) -> Result<Vec<Property>, CatalogError>;

    /// A single property by its numeric id
    async fn get(&self, id: u64) -> Result<Property, CatalogError>;

    /// Get the name of the catalog source
    fn source_name(&self) -> &'static str;
}
