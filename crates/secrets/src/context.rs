//! Flat key/value context built from resolved secrets

use crate::SecureSecret;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flattened secret values keyed by template placeholder name.
///
/// Values are held as [`SecureSecret`] and zeroed on drop. Each key remembers
/// which secret last wrote it, so collisions can be reported.
#[derive(Default, Clone)]
pub struct TemplateContext {
    /// Placeholder key -> secure value
    values: BTreeMap<String, SecureSecret>,
    /// Placeholder key -> name of the secret that supplied it
    origins: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the origin of the value it replaced.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: String,
        origin: impl Into<String>,
    ) -> Option<String> {
        let key = key.into();
        self.values.insert(key.clone(), SecureSecret::new(value));
        self.origins.insert(key, origin.into())
    }

    /// Merge one secret's raw value into the context.
    ///
    /// A JSON object contributes each top-level key; string members are taken
    /// verbatim and any other member is stored as compact JSON. Anything else
    /// is stored whole under `secret_name`. Later merges overwrite earlier
    /// ones. Returns the number of keys written.
    pub fn merge_secret(&mut self, secret_name: &str, raw: &str) -> usize {
        let Ok(Value::Object(members)) = serde_json::from_str::<Value>(raw) else {
            self.insert_logged(secret_name.to_string(), raw.to_string(), secret_name);
            return 1;
        };

        let written = members.len();
        for (key, member) in members {
            let value = match member {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.insert_logged(key, value, secret_name);
        }
        written
    }

    fn insert_logged(&mut self, key: String, value: String, origin: &str) {
        if let Some(previous) = self.insert(key.clone(), value, origin) {
            tracing::debug!(
                key = %key,
                previous_secret = %previous,
                secret = %origin,
                "Context key overwritten"
            );
        }
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(SecureSecret::expose)
    }

    /// Name of the secret that supplied `key`.
    #[must_use]
    pub fn origin(&self, key: &str) -> Option<&str> {
        self.origins.get(key).map(String::as_str)
    }

    /// Check if the context contains a key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of keys in the context.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (key, value) in iter {
            let key = key.into();
            context.insert(key.clone(), value.into(), key);
        }
        context
    }
}

impl std::fmt::Debug for TemplateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateContext")
            .field("count", &self.values.len())
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object_keys_are_merged() {
        let mut context = TemplateContext::new();
        let written =
            context.merge_secret("app-secrets", r#"{"PerfectSecret":"value1","FooBar":"value2"}"#);

        assert_eq!(written, 2);
        assert_eq!(context.get("PerfectSecret"), Some("value1"));
        assert_eq!(context.get("FooBar"), Some("value2"));
        assert!(!context.contains("app-secrets"));
        assert_eq!(context.origin("FooBar"), Some("app-secrets"));
    }

    #[test]
    fn test_non_string_members_are_stringified() {
        let mut context = TemplateContext::new();
        context.merge_secret(
            "mixed",
            r#"{"port":5432,"ratio":0.5,"enabled":true,"empty":null,"hosts":["a","b"]}"#,
        );

        assert_eq!(context.get("port"), Some("5432"));
        assert_eq!(context.get("ratio"), Some("0.5"));
        assert_eq!(context.get("enabled"), Some("true"));
        assert_eq!(context.get("empty"), Some("null"));
        assert_eq!(context.get("hosts"), Some(r#"["a","b"]"#));
    }

    #[test]
    fn test_nested_objects_are_not_flattened() {
        let mut context = TemplateContext::new();
        context.merge_secret("nested", r#"{"db":{"user":"admin","pass":"pw"}}"#);

        assert_eq!(context.len(), 1);
        assert_eq!(context.get("db"), Some(r#"{"pass":"pw","user":"admin"}"#));
        assert!(!context.contains("user"));
        assert!(!context.contains("db.user"));
    }

    #[test]
    fn test_non_object_values_stored_under_secret_name() {
        let cases = [
            ("plain", "just-a-password"),
            ("number", "42"),
            ("quoted", r#""a json string""#),
            ("array", r#"["a","b"]"#),
            ("broken", r#"{"unterminated": "#),
            ("blank", ""),
        ];

        for (name, raw) in cases {
            let mut context = TemplateContext::new();
            let written = context.merge_secret(name, raw);
            assert_eq!(written, 1, "case {name}");
            assert_eq!(context.len(), 1, "case {name}");
            assert_eq!(context.get(name), Some(raw), "case {name}");
        }
    }

    #[test]
    fn test_later_secret_overwrites_earlier_key() {
        let mut context = TemplateContext::new();
        context.merge_secret("a-shared", r#"{"DB_HOST":"first","ONLY_A":"a"}"#);
        context.merge_secret("b-override", r#"{"DB_HOST":"second"}"#);

        assert_eq!(context.get("DB_HOST"), Some("second"));
        assert_eq!(context.origin("DB_HOST"), Some("b-override"));
        assert_eq!(context.get("ONLY_A"), Some("a"));
    }

    #[test]
    fn test_plain_secret_can_overwrite_json_key() {
        let mut context = TemplateContext::new();
        context.merge_secret("first", r#"{"token":"from-json"}"#);
        context.merge_secret("token", "raw-token");

        assert_eq!(context.get("token"), Some("raw-token"));
    }

    #[test]
    fn test_empty_object_contributes_nothing() {
        let mut context = TemplateContext::new();
        assert_eq!(context.merge_secret("empty", "{}"), 0);
        assert!(context.is_empty());
    }

    #[test]
    fn test_debug_lists_keys_only() {
        let context: TemplateContext = [("API_KEY", "hunter2")].into_iter().collect();
        let debug = format!("{context:?}");
        assert!(debug.contains("API_KEY"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_keys_are_sorted() {
        let context: TemplateContext = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
        assert_eq!(context.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }
}
