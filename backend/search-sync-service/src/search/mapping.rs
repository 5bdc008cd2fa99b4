use serde_json::{json, Value};

/// Index settings and mappings for entity documents.
///
/// `ja_analyzer` is applied to the Japanese display fields; `kuromoji` needs
/// the analysis-kuromoji plugin on the cluster.
pub fn entity_index_mapping(ja_analyzer: &str) -> Value {
    let ja_text = json!({ "type": "text", "analyzer": ja_analyzer });

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "name": { "type": "text", "analyzer": ja_analyzer },
                "description": { "type": "text", "analyzer": ja_analyzer },
                "category_id": { "type": "integer" },
                "category_name_en": { "type": "text", "analyzer": "english" },
                "category_name_ja": ja_text,
                "subcategory_id": { "type": "integer" },
                "subcategory_name_en": { "type": "text", "analyzer": "english" },
                "subcategory_name_ja": ja_text,
                "photo_url": { "type": "keyword", "index": false },
                "user_handle_name": { "type": "keyword" },
                "like": { "type": "long" },
                "created_at": { "type": "date" }
            }
        }
    })
}
