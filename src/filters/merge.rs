use super::types::{FilterSet, PartialFilterUpdate};

/// Apply `update` on top of `base`: every field the update carries wins,
/// every other field keeps the base value.
///
/// Pure and total. Values are not validated here, so a negative bedroom
/// count or `minSize > maxSize` passes through untouched; the catalog
/// decides what to do with them.
pub fn merge(base: &FilterSet, update: &PartialFilterUpdate) -> FilterSet {
    FilterSet {
        budget: pick(&base.budget, &update.budget),
        location: pick(&base.location, &update.location),
        bedrooms: pick(&base.bedrooms, &update.bedrooms),
        bathrooms: pick(&base.bathrooms, &update.bathrooms),
        min_size: pick(&base.min_size, &update.min_size),
        max_size: pick(&base.max_size, &update.max_size),
        amenities: pick(&base.amenities, &update.amenities),
    }
}

fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
    over.as_ref().or(base.as_ref()).cloned()
}

impl FilterSet {
    pub fn merged(&self, update: &PartialFilterUpdate) -> FilterSet {
        merge(self, update)
    }
}
