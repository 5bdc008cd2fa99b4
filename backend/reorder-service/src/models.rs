use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderRequest {
    #[serde(alias = "ids")]
    pub candidate_ids: Vec<String>,
    #[serde(default)]
    pub query_phrases: Vec<String>,
    #[serde(default)]
    pub query_category_id: Option<i32>,
    #[serde(default)]
    pub query_subcategory_id: Option<i32>,
}

/// `ordered_ids` is always a permutation of the request's `candidate_ids`.
/// `model_name` is `null` when the ranking fell back to the input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderResponse {
    pub ordered_ids: Vec<String>,
    pub model_name: Option<String>,
}

impl ReorderResponse {
    pub fn fallback(candidate_ids: &[String]) -> Self {
        Self {
            ordered_ids: candidate_ids.to_vec(),
            model_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: ReorderRequest = serde_json::from_str(r#"{"candidate_ids":["a","b"]}"#).unwrap();
        assert_eq!(request.candidate_ids, vec!["a", "b"]);
        assert!(request.query_phrases.is_empty());
        assert_eq!(request.query_category_id, None);
    }

    #[test]
    fn test_request_accepts_legacy_ids_field() {
        let request: ReorderRequest =
            serde_json::from_str(r#"{"ids":["x"],"query_phrases":["ねこ"],"query_category_id":1}"#)
                .unwrap();
        assert_eq!(request.candidate_ids, vec!["x"]);
        assert_eq!(request.query_category_id, Some(1));
    }

    #[test]
    fn test_fallback_serializes_null_model() {
        let response = ReorderResponse::fallback(&["a".to_string()]);
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"ordered_ids":["a"],"model_name":null}"#
        );
    }
}
