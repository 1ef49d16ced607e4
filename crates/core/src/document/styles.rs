//! Site theme stored under `styles` in a language's content tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{DEFAULT_LANGUAGE, SITE_CONTENT_PARTITION};
use crate::store::{PartitionStore, StoreError};

/// Theme colours and font. Only the first three are mandatory; the rest
/// fall back as described on [`ThemeStyles::css_variables`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeStyles {
    pub primary_color: String,
    pub secondary_color: String,
    pub font_family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h3_title_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_from_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_to_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_bg_color: Option<String>,
}

fn or_default(value: &Option<String>, fallback: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

impl ThemeStyles {
    /// Read the `styles` entry of a content tree. A missing or malformed
    /// entry yields `None`.
    pub fn from_content(content: &Value) -> Option<Self> {
        let styles = content.get("styles")?;
        match serde_json::from_value(styles.clone()) {
            Ok(styles) => Some(styles),
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed site styles");
                None
            }
        }
    }

    /// Load the theme from the default language's content row.
    pub async fn load(store: &dyn PartitionStore) -> Result<Option<Self>, StoreError> {
        let rows = store.select_all(SITE_CONTENT_PARTITION).await?;
        let styles = rows
            .iter()
            .find(|row| row.get("language").and_then(Value::as_str) == Some(DEFAULT_LANGUAGE))
            .and_then(|row| row.get("content"))
            .and_then(Self::from_content);
        if styles.is_none() {
            tracing::debug!(language = DEFAULT_LANGUAGE, "No site styles stored");
        }
        Ok(styles)
    }

    /// CSS custom properties for the theme, with fallbacks filled in.
    pub fn css_variables(&self) -> Vec<(&'static str, String)> {
        let title = self
            .title_color
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(Some(self.primary_color.as_str()).filter(|v| !v.is_empty()))
            .unwrap_or("#FFFFFF")
            .to_string();
        let h3_title = self
            .h3_title_color
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.text_color.as_deref().filter(|v| !v.is_empty()))
            .unwrap_or("#E5E7EB")
            .to_string();
        vec![
            ("--color-primary", self.primary_color.clone()),
            ("--color-secondary", self.secondary_color.clone()),
            ("--font-family", self.font_family.clone()),
            ("--color-text", or_default(&self.text_color, "#c6d3e2")),
            ("--title-color", title),
            ("--h3-title-color", h3_title),
            ("--color-background", or_default(&self.background_from_color, "#111827")),
            (
                "--color-background-secondary",
                or_default(&self.background_to_color, "#1F2937"),
            ),
            ("--section-bg-color", or_default(&self.section_bg_color, "#374151")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryPartitionStore;
    use serde_json::json;

    #[test]
    fn fallbacks_fill_missing_colours() {
        let styles = ThemeStyles::from_content(&json!({
            "styles": {"primaryColor": "#ff0000", "secondaryColor": "#00ff00", "fontFamily": "Inter", "textColor": "#eee"}
        }))
        .unwrap();
        let vars: std::collections::HashMap<_, _> = styles.css_variables().into_iter().collect();
        assert_eq!(vars["--title-color"], "#ff0000");
        assert_eq!(vars["--h3-title-color"], "#eee");
        assert_eq!(vars["--color-text"], "#eee");
        assert_eq!(vars["--color-background"], "#111827");
        assert_eq!(vars["--font-family"], "Inter");
    }

    #[test]
    fn missing_or_malformed_styles_are_none() {
        assert_eq!(ThemeStyles::from_content(&json!({"hero": {}})), None);
        assert_eq!(ThemeStyles::from_content(&json!({"styles": {"primaryColor": 3}})), None);
    }

    #[tokio::test]
    async fn loads_from_default_language() {
        let store = MemoryPartitionStore::new([SITE_CONTENT_PARTITION]);
        store
            .seed(
                SITE_CONTENT_PARTITION,
                vec![
                    json!({"language": "fr", "content": {"styles": {"primaryColor": "#1", "secondaryColor": "#2", "fontFamily": "A"}}}),
                    json!({"language": "en", "content": {"styles": {"primaryColor": "#3", "secondaryColor": "#4", "fontFamily": "B"}}}),
                ],
            )
            .await;
        let styles = ThemeStyles::load(&store).await.unwrap().unwrap();
        assert_eq!(styles.primary_color, "#3");
    }
}
