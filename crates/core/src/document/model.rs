use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Per-language content tree, one row per language keyed by `language`.
pub const SITE_CONTENT_PARTITION: &str = "site_content";
/// The single site settings row, keyed by `id`.
pub const SITE_SETTINGS_PARTITION: &str = "site_settings";
pub const SOCIAL_LINKS_PARTITION: &str = "social_links";
pub const PAGES_PARTITION: &str = "pages";
pub const PROJECTS_PARTITION: &str = "projects";
pub const SERVICES_PARTITION: &str = "services";

/// Partitions that make up a full site backup unless configured otherwise.
pub const DEFAULT_PARTITIONS: &[&str] = &[
    SITE_CONTENT_PARTITION,
    SITE_SETTINGS_PARTITION,
    SOCIAL_LINKS_PARTITION,
    PAGES_PARTITION,
    PROJECTS_PARTITION,
    SERVICES_PARTITION,
];

/// Id of the only row in `site_settings`.
pub const SITE_SETTINGS_ID: i64 = 1;

/// Language edited when none is specified.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A `site_content` row. Database-managed columns such as `id` and
/// `updated_at` are ignored on read and left out on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteContentRow {
    pub language: String,
    /// Arbitrary content tree edited through paths.
    #[serde(default)]
    pub content: Value,
}

/// Fallback settings used when the row does not exist yet.
pub fn default_site_settings() -> Value {
    json!({
        "id": SITE_SETTINGS_ID,
        "site_title": "Default Site Title",
        "site_role": "Default Role",
        "logo_url": "",
        "hero_title": "Default Hero Title",
        "hero_title2": "",
        "hero_subtitle": "Default hero subtitle.",
        "hero_cta_button_text": "Get Started",
        "about_description": "Default about description.",
        "footer_copyright": format!("© {} Default Copyright", chrono::Utc::now().format("%Y")),
        "contact_phone": "",
        "contact_address": "",
        "contact_mail": "",
    })
}
