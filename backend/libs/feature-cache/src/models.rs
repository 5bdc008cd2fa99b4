use serde::{Deserialize, Serialize};

/// Precomputed vectors for one entity. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub category_vector: Vec<f32>,
    pub subcategory_vector: Vec<f32>,
    pub name_vector: Vec<f32>,
    pub description_vector: Vec<f32>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.category_vector.len()
            + self.subcategory_vector.len()
            + self.name_vector.len()
            + self.description_vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append all vectors to `row` in category, subcategory, name, description order.
    pub fn extend_row(&self, row: &mut Vec<f32>) {
        row.extend_from_slice(&self.category_vector);
        row.extend_from_slice(&self.subcategory_vector);
        row.extend_from_slice(&self.name_vector);
        row.extend_from_slice(&self.description_vector);
    }
}
