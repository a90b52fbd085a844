/// Closed mapping from canonical `doc_class` to the `kind` a canonical upsert infers when the
/// caller doesn't supply one explicitly.
pub fn kind_for_doc_class(doc_class: &str) -> Option<&'static str> {
    match doc_class {
        "app_spec" => Some("specification"),
        "feature_spec" => Some("specification"),
        "implementation_plan" => Some("plan"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_doc_classes_map_to_a_kind() {
        assert_eq!(kind_for_doc_class("app_spec"), Some("specification"));
        assert_eq!(kind_for_doc_class("implementation_plan"), Some("plan"));
    }

    #[test]
    fn unknown_doc_class_has_no_inferred_kind() {
        assert_eq!(kind_for_doc_class("note"), None);
    }
}
