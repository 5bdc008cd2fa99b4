use catalog_store::EntityRecord;
use chrono::Utc;

pub fn entity(id: &str) -> EntityRecord {
    let now = Utc::now();
    EntityRecord {
        id: id.to_string(),
        category_id: 2,
        category_name_en: "dog".into(),
        category_name_ja: "いぬ".into(),
        subcategory_id: 7,
        subcategory_name_en: "shiba".into(),
        subcategory_name_ja: "柴犬".into(),
        user_id: "u1".into(),
        user_handle_name: "walker".into(),
        name: "Hachi".into(),
        description: "waiting at the station".into(),
        photo_url: format!("https://cdn.example.com/{}.jpg", id),
        deactivated: false,
        created_at: now,
        updated_at: now,
    }
}
