use serde::{Deserialize, Serialize};

/// Class used by placeholder events that carry no widget at all.
pub const EMPTY_CLASS: &str = "EMPTY_EVENT";

const SIGNATURE_SEPARATOR: &str = "!";

/// A UI widget, either statically extracted from app resources or observed
/// on a live screen.
///
/// `clickable`, `password` and `naf` are only known for live observations;
/// a statically extracted widget leaves them `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Widget {
    pub class: String,

    /// Short resource id (the part after `/`)
    #[serde(rename = "resource-id", default)]
    pub resource_id: String,

    #[serde(default)]
    pub text: String,

    #[serde(rename = "content-desc", default)]
    pub content_desc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clickable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<bool>,

    /// "Not accessibility friendly": no textual info at all on screen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naf: Option<bool>,

    /// Package part of the resource id, e.g. `com.app:id/`
    #[serde(rename = "id-prefix", default, skip_serializing_if = "Option::is_none")]
    pub id_prefix: Option<String>,

    #[serde(default)]
    pub parent_text: String,

    #[serde(default)]
    pub sibling_text: String,

    #[serde(default)]
    pub package: String,

    /// Owning screen identifier
    #[serde(default)]
    pub screen: String,

    /// Present only on statically extracted menu entries; `true` when the
    /// entry lives inside a menu group (reached through the overflow menu)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_group: Option<bool>,
}

impl Widget {
    pub fn new(class: &str) -> Self {
        Self {
            class: class.to_string(),
            ..Self::default()
        }
    }

    /// Placeholder widget used by empty target events.
    pub fn empty() -> Self {
        Self::new(EMPTY_CLASS)
    }

    pub fn with_id(mut self, resource_id: &str) -> Self {
        self.resource_id = resource_id.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_desc(mut self, content_desc: &str) -> Self {
        self.content_desc = content_desc.to_string();
        self
    }

    pub fn with_clickable(mut self, clickable: bool) -> Self {
        self.clickable = Some(clickable);
        self
    }

    pub fn with_parent_text(mut self, text: &str) -> Self {
        self.parent_text = text.to_string();
        self
    }

    pub fn with_sibling_text(mut self, text: &str) -> Self {
        self.sibling_text = text.to_string();
        self
    }

    pub fn on_screen(mut self, package: &str, screen: &str) -> Self {
        self.package = package.to_string();
        self.screen = screen.to_string();
        self
    }

    pub fn is_empty_placeholder(&self) -> bool {
        self.class == EMPTY_CLASS
    }

    /// Statically extracted widgets carry no clickability observation.
    pub fn is_static(&self) -> bool {
        self.clickable.is_none()
    }

    pub fn is_clickable(&self) -> bool {
        self.clickable == Some(true)
    }

    /// Last segment of the class name, lowercased (`android.widget.Button` -> `button`).
    pub fn short_class(&self) -> String {
        self.class.rsplit('.').next().unwrap_or("").to_lowercase()
    }

    /// Resource id including its package prefix when one was observed.
    pub fn full_resource_id(&self) -> String {
        match &self.id_prefix {
            Some(prefix) if !self.resource_id.contains('/') => {
                format!("{}{}", prefix, self.resource_id)
            }
            _ => self.resource_id.clone(),
        }
    }

    /// Canonical key over the fixed attributes, package and screen.
    pub fn signature(&self) -> String {
        [
            self.class.as_str(),
            self.resource_id.as_str(),
            self.text.as_str(),
            self.content_desc.as_str(),
            flag(self.clickable),
            flag(self.password),
            flag(self.naf),
            self.package.as_str(),
            self.screen.as_str(),
        ]
        .join(SIGNATURE_SEPARATOR)
    }

    /// Signature this widget would have had if it came from static
    /// extraction: observation-only flags are blanked.
    pub fn static_signature(&self) -> String {
        [
            self.class.as_str(),
            self.resource_id.as_str(),
            self.text.as_str(),
            self.content_desc.as_str(),
            "",
            "",
            "",
            self.package.as_str(),
            self.screen.as_str(),
        ]
        .join(SIGNATURE_SEPARATOR)
    }

    /// Attribute equality used for invalid-event bookkeeping: every fixed
    /// attribute except NAF, plus the owning screen.
    pub fn is_equal(&self, other: &Widget) -> bool {
        self.class == other.class
            && self.full_resource_id() == other.full_resource_id()
            && self.text == other.text
            && self.content_desc == other.content_desc
            && self.clickable == other.clickable
            && self.password == other.password
            && self.screen == other.screen
    }

    /// Whether the widget carries any textual information usable for ranking.
    pub fn has_textual_info(&self) -> bool {
        [
            &self.resource_id,
            &self.text,
            &self.content_desc,
            &self.parent_text,
            &self.sibling_text,
        ]
        .iter()
        .any(|v| !v.is_empty())
    }
}

fn flag(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "true",
        Some(false) => "false",
        None => "",
    }
}
