use serde_json::Value;

/// Fields tried, in order, to name a category served as an object.
const NAME_FIELDS: [&str; 3] = ["name", "slug", "url"];

/// Turn the category list as served into display names.
///
/// Upstream has served both plain strings and objects over time.
/// Anything that isn't an array yields no categories.
pub fn normalize_categories(value: &Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items.iter().map(category_name).collect()
}

fn category_name(item: &Value) -> String {
    match item {
        Value::String(name) => name.clone(),
        Value::Object(fields) => NAME_FIELDS
            .iter()
            .find_map(|field| match fields.get(*field) {
                Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
                _ => None,
            })
            .unwrap_or_else(|| item.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn strings_and_objects_mix() {
        let served = json!([{ "name": "phones" }, "laptops"]);
        assert_eq!(normalize_categories(&served), vec!["phones", "laptops"]);
    }

    #[test]
    fn objects_fall_back_through_name_fields() {
        let served = json!([
            { "slug": "beauty", "name": "Beauty", "url": "https://dummyjson.com/products/category/beauty" },
            { "slug": "fragrances", "url": "https://dummyjson.com/products/category/fragrances" },
            { "url": "https://dummyjson.com/products/category/groceries" },
            { "name": "", "slug": "furniture" },
        ]);
        assert_eq!(normalize_categories(&served), vec![
            "Beauty",
            "fragrances",
            "https://dummyjson.com/products/category/groceries",
            "furniture",
        ]);
    }

    #[test]
    fn unnamed_values_are_shown_as_json() {
        let served = json!([{ "id": 1 }, 42, null]);
        assert_eq!(normalize_categories(&served), vec![r#"{"id":1}"#, "42", "null"]);
    }

    #[test]
    fn non_array_yields_nothing() {
        assert!(normalize_categories(&json!({ "categories": ["a"] })).is_empty());
        assert!(normalize_categories(&json!("phones")).is_empty());
    }
}
