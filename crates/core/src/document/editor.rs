//! In-memory edit buffers for the admin forms.
//!
//! Edits are applied locally with [`update`] and only reach the store on
//! `save`, which forwards the whole document as one upsert.

use serde_json::{Map, Value};

use super::model::{
    default_site_settings, SiteContentRow, SITE_CONTENT_PARTITION, SITE_SETTINGS_ID,
    SITE_SETTINGS_PARTITION,
};
use super::path::{update, Path};
use crate::store::{PartitionStore, StoreError};

/// Settings fields managed by the database, never by the form.
const PROTECTED_SETTINGS: &[&str] = &["id", "updated_at"];

/// Edit buffer for one language's content tree.
#[derive(Debug, Clone)]
pub struct ContentEditor {
    language: String,
    content: Value,
    dirty: bool,
}

impl ContentEditor {
    pub fn new(language: impl Into<String>, content: Value) -> Self {
        Self {
            language: language.into(),
            content,
            dirty: false,
        }
    }

    /// Load the stored tree for `language`, starting empty if there is none.
    pub async fn load(store: &dyn PartitionStore, language: &str) -> Result<Self, StoreError> {
        let rows = store.select_all(SITE_CONTENT_PARTITION).await?;
        let content = rows
            .into_iter()
            .filter(|row| row.get("language").and_then(Value::as_str) == Some(language))
            .find_map(|row| serde_json::from_value::<SiteContentRow>(row).ok())
            .map(|row| row.content)
            .filter(|content| !content.is_null())
            .unwrap_or_else(|| Value::Object(Map::new()));
        if content.as_object().is_some_and(Map::is_empty) {
            tracing::debug!(%language, "No stored content, starting from an empty tree");
        }
        Ok(Self::new(language, content))
    }

    /// Set `value` at `path`. A path that does not fit the tree is logged and
    /// dropped, leaving the buffer as it was; returns whether the edit applied.
    pub fn apply(&mut self, path: &Path, value: Value) -> bool {
        if path.is_empty() {
            return false;
        }
        match update(&self.content, path, value) {
            Ok(updated) => {
                self.content = updated;
                self.dirty = true;
                true
            }
            Err(err) => {
                tracing::warn!(language = %self.language, path = %path, error = %err, "Edit rejected");
                false
            }
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the whole tree.
    pub async fn save(&mut self, store: &dyn PartitionStore) -> Result<(), StoreError> {
        let record = serde_json::to_value(SiteContentRow {
            language: self.language.clone(),
            content: self.content.clone(),
        })
        .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        store
            .upsert(SITE_CONTENT_PARTITION, &record, "language")
            .await?;
        self.dirty = false;
        tracing::info!(language = %self.language, "Site content saved");
        Ok(())
    }
}

/// Edit buffer for the flat site settings row.
#[derive(Debug, Clone)]
pub struct SettingsEditor {
    settings: Map<String, Value>,
    dirty: bool,
}

impl SettingsEditor {
    pub fn new(settings: Map<String, Value>) -> Self {
        Self {
            settings,
            dirty: false,
        }
    }

    /// Load the settings row, falling back to defaults when it is missing.
    pub async fn load(store: &dyn PartitionStore) -> Result<Self, StoreError> {
        let rows = store.select_all(SITE_SETTINGS_PARTITION).await?;
        let settings = rows
            .into_iter()
            .find(|row| row.get("id").and_then(Value::as_i64) == Some(SITE_SETTINGS_ID))
            .unwrap_or_else(|| {
                tracing::info!("No site settings row, using defaults");
                default_site_settings()
            });
        match settings {
            Value::Object(map) => Ok(Self::new(map)),
            _ => Err(StoreError::InvalidRecord(
                "site settings row is not an object".into(),
            )),
        }
    }

    /// Set one field. Protected fields are ignored; returns whether the
    /// field was set.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if PROTECTED_SETTINGS.contains(&key) {
            tracing::debug!(%key, "Ignoring edit of protected settings field");
            return false;
        }
        self.settings.insert(key.to_string(), value);
        self.dirty = true;
        true
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The record written on save: the row id forced, `updated_at` left to the database.
    pub fn to_record(&self) -> Value {
        let mut record = self.settings.clone();
        record.insert("id".into(), Value::from(SITE_SETTINGS_ID));
        record.remove("updated_at");
        Value::Object(record)
    }

    pub async fn save(&mut self, store: &dyn PartitionStore) -> Result<(), StoreError> {
        store
            .upsert(SITE_SETTINGS_PARTITION, &self.to_record(), "id")
            .await?;
        self.dirty = false;
        tracing::info!("Site settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryPartitionStore;
    use serde_json::json;

    fn store() -> MemoryPartitionStore {
        MemoryPartitionStore::new([SITE_CONTENT_PARTITION, SITE_SETTINGS_PARTITION])
    }

    #[tokio::test]
    async fn edits_reach_store_only_on_save() {
        let store = store();
        store
            .seed(
                SITE_CONTENT_PARTITION,
                vec![json!({"language": "en", "content": {"hero": {"title": "Hi"}}})],
            )
            .await;

        let mut editor = ContentEditor::load(&store, "en").await.unwrap();
        assert!(editor.apply(&Path::parse("hero.title"), json!("Hello")));
        assert!(editor.is_dirty());
        assert_eq!(
            store.records(SITE_CONTENT_PARTITION).await.unwrap()[0]["content"]["hero"]["title"],
            json!("Hi")
        );

        editor.save(&store).await.unwrap();
        assert!(!editor.is_dirty());
        assert_eq!(
            store.records(SITE_CONTENT_PARTITION).await.unwrap()[0]["content"]["hero"]["title"],
            json!("Hello")
        );
    }

    #[tokio::test]
    async fn missing_language_starts_empty() {
        let editor = ContentEditor::load(&store(), "fr").await.unwrap();
        assert_eq!(editor.content(), &json!({}));
        assert_eq!(editor.language(), "fr");
    }

    #[test]
    fn conflicting_edit_keeps_previous_state() {
        let mut editor = ContentEditor::new("en", json!({"footer": "text"}));
        assert!(!editor.apply(&Path::parse("footer.copyright"), json!("x")));
        assert_eq!(editor.content(), &json!({"footer": "text"}));
        assert!(!editor.is_dirty());
    }

    #[tokio::test]
    async fn database_columns_are_ignored_on_load_and_save() {
        let store = store();
        store
            .seed(
                SITE_CONTENT_PARTITION,
                vec![
                    json!({"id": 3, "language": "de", "content": null, "updated_at": "2024-01-01"}),
                    json!({"id": 4, "language": "en", "content": {"a": 1}, "updated_at": "2024-01-01"}),
                ],
            )
            .await;

        let de = ContentEditor::load(&store, "de").await.unwrap();
        assert_eq!(de.content(), &json!({}));

        let mut en = ContentEditor::load(&store, "en").await.unwrap();
        assert_eq!(en.content(), &json!({"a": 1}));
        assert!(en.apply(&Path::parse("a"), json!(2)));
        en.save(&store).await.unwrap();
        let rows = store.records(SITE_CONTENT_PARTITION).await.unwrap();
        assert_eq!(rows[1]["content"], json!({"a": 2}));
        assert_eq!(rows[1]["id"], json!(4));
    }

    #[test]
    fn out_of_range_index_is_dropped() {
        let mut editor = ContentEditor::new("en", json!({"items": ["a"]}));
        let path: Path = serde_json::from_value(json!(["items", u64::MAX])).unwrap();
        assert!(!editor.apply(&path, json!("x")));
        assert_eq!(editor.content(), &json!({"items": ["a"]}));
        assert!(!editor.is_dirty());
    }

    #[test]
    fn empty_path_is_ignored() {
        let mut editor = ContentEditor::new("en", json!({"a": 1}));
        assert!(!editor.apply(&Path::default(), json!(2)));
        assert_eq!(editor.content(), &json!({"a": 1}));
    }

    #[tokio::test]
    async fn settings_default_when_row_missing() {
        let editor = SettingsEditor::load(&store()).await.unwrap();
        assert_eq!(editor.get("site_title"), Some(&json!("Default Site Title")));
    }

    #[tokio::test]
    async fn settings_protect_managed_fields() {
        let store = store();
        store
            .seed(
                SITE_SETTINGS_PARTITION,
                vec![json!({"id": 1, "site_title": "Old", "updated_at": "2024-01-01T00:00:00Z"})],
            )
            .await;

        let mut editor = SettingsEditor::load(&store).await.unwrap();
        assert!(!editor.set("id", json!(7)));
        assert!(!editor.set("updated_at", json!("now")));
        assert!(editor.set("site_title", json!("New")));
        assert_eq!(editor.to_record(), json!({"id": 1, "site_title": "New"}));

        editor.save(&store).await.unwrap();
        let rows = store.records(SITE_SETTINGS_PARTITION).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["site_title"], json!("New"));
    }
}
