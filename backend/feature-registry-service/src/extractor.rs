use crate::vectorizer::{CategoricalVectorizer, HashedTextVectorizer};
use catalog_store::EntityRecord;
use feature_cache::FeatureVector;

/// Runs all four vectorizers over an entity.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    category: CategoricalVectorizer,
    subcategory: CategoricalVectorizer,
    name: HashedTextVectorizer,
    description: HashedTextVectorizer,
}

impl FeatureExtractor {
    pub fn new(
        category: CategoricalVectorizer,
        subcategory: CategoricalVectorizer,
        name: HashedTextVectorizer,
        description: HashedTextVectorizer,
    ) -> Self {
        Self {
            category,
            subcategory,
            name,
            description,
        }
    }

    /// Total row width contributed to a ranking matrix.
    pub fn dimensions(&self) -> usize {
        self.category.dimensions()
            + self.subcategory.dimensions()
            + self.name.dimensions()
            + self.description.dimensions()
    }

    pub fn extract(&self, record: &EntityRecord) -> FeatureVector {
        FeatureVector {
            category_vector: self.category.transform(record.category_id),
            subcategory_vector: self.subcategory.transform(record.subcategory_id),
            name_vector: self.name.transform(&record.name),
            description_vector: self.description.transform(&record.description),
        }
    }
}
