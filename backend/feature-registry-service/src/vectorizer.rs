//! Deterministic vectorizers
//!
//! Both vectorizers are pure: the same input always yields the same vector,
//! so a redelivered message recomputes exactly what was stored before.

/// One-hot encoder over ids `1..=cardinality`. Unknown ids encode as all zeros.
#[derive(Debug, Clone)]
pub struct CategoricalVectorizer {
    cardinality: usize,
}

impl CategoricalVectorizer {
    pub fn new(cardinality: usize) -> Self {
        Self { cardinality }
    }

    pub fn dimensions(&self) -> usize {
        self.cardinality
    }

    pub fn transform(&self, id: i32) -> Vec<f32> {
        let mut vector = vec![0.0; self.cardinality];
        if id >= 1 && (id as usize) <= self.cardinality {
            vector[id as usize - 1] = 1.0;
        }
        vector
    }
}

/// Bag-of-words embedding using the hashing trick, L2-normalized.
#[derive(Debug, Clone)]
pub struct HashedTextVectorizer {
    dimensions: usize,
    stop_words: Vec<String>,
}

impl HashedTextVectorizer {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            stop_words: Vec::new(),
        }
    }

    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words = words.into_iter().map(|w| w.into().to_lowercase()).collect();
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Lowercased alphanumeric runs, minus stop words.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .filter(|t| !self.stop_words.contains(t))
            .collect()
    }

    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }

        for token in self.tokenize(text) {
            vector[bucket(&token, self.dimensions)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

fn bucket(token: &str, dimensions: usize) -> usize {
    let digest = md5::compute(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.0[..8]);
    (u64::from_le_bytes(head) % dimensions as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot_known_and_unknown_ids() {
        let v = CategoricalVectorizer::new(3);
        assert_eq!(v.transform(2), vec![0.0, 1.0, 0.0]);
        assert_eq!(v.transform(0), vec![0.0; 3]);
        assert_eq!(v.transform(4), vec![0.0; 3]);
        assert_eq!(v.transform(-1), vec![0.0; 3]);
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_punctuation() {
        let v = HashedTextVectorizer::new(16).with_stop_words(["the", "in"]);
        assert_eq!(
            v.tokenize("Sleeping in THE sun, again!"),
            vec!["sleeping", "sun", "again"]
        );
        assert_eq!(v.tokenize("ねこ 日向ぼっこ"), vec!["ねこ", "日向ぼっこ"]);
    }

    #[test]
    fn test_text_vector_is_deterministic_and_normalized() {
        let v = HashedTextVectorizer::new(32);
        let a = v.transform("fluffy white cat");
        let b = v.transform("fluffy white cat");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashedTextVectorizer::new(8).with_stop_words(["a"]);
        assert_eq!(v.transform(""), vec![0.0; 8]);
        assert_eq!(v.transform("a a a"), vec![0.0; 8]);
    }
}
