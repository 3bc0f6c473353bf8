use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TransferError;
use crate::widget::widget_model::{EMPTY_CLASS, Widget};

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Web tests navigate by URL; on the target that becomes a tap
    #[serde(alias = "jump_with_url")]
    Click,
    SendKeys,
    Clear,
    TextPresent,
    TextNotPresent,
    IsDisplayed,
    IsAttrEqual,
    MoveToElement,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Click => "click",
            EventAction::SendKeys => "send_keys",
            EventAction::Clear => "clear",
            EventAction::TextPresent => "text_present",
            EventAction::TextNotPresent => "text_not_present",
            EventAction::IsDisplayed => "is_displayed",
            EventAction::IsAttrEqual => "is_attr_equal",
            EventAction::MoveToElement => "move_to_element",
        }
    }

    /// Assertions rather than interactions.
    pub fn is_oracle(&self) -> bool {
        matches!(
            self,
            EventAction::TextPresent
                | EventAction::TextNotPresent
                | EventAction::IsDisplayed
                | EventAction::IsAttrEqual
        )
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Source events
// ============================================================================

/// One recorded action of the source test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    #[serde(default)]
    pub class: String,

    /// Declared element tag on the source platform (`button`, `input`, ...)
    #[serde(default)]
    pub tag: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "resource-id", default, skip_serializing_if = "String::is_empty")]
    pub resource_id: String,

    #[serde(default, deserialize_with = "text_or_list")]
    pub text: String,

    #[serde(rename = "content-desc", default)]
    pub content_desc: String,

    #[serde(default)]
    pub parent_text: String,

    #[serde(default)]
    pub sibling_text: String,

    pub action: EventAction,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_args: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextField {
    One(String),
    Many(Vec<String>),
}

fn text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextField>::deserialize(deserializer)? {
        Some(TextField::One(s)) => s,
        Some(TextField::Many(parts)) => parts.join(" "),
        None => String::new(),
    })
}

impl SourceEvent {
    pub fn new(action: EventAction) -> Self {
        Self {
            class: String::new(),
            tag: String::new(),
            id: String::new(),
            resource_id: String::new(),
            text: String::new(),
            content_desc: String::new(),
            parent_text: String::new(),
            sibling_text: String::new(),
            action,
            action_args: Vec::new(),
        }
    }

    /// An intentionally empty event that keeps its slot in the sequence.
    pub fn placeholder(action: EventAction) -> Self {
        Self {
            class: EMPTY_CLASS.to_string(),
            ..Self::new(action)
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.content_desc = desc.to_string();
        self
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.action_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.class == EMPTY_CLASS
    }

    /// Same element description, ignoring what is done to it.
    pub fn same_target_as(&self, other: &SourceEvent) -> bool {
        self.class == other.class
            && self.tag == other.tag
            && self.id == other.id
            && self.resource_id == other.resource_id
            && self.text == other.text
            && self.content_desc == other.content_desc
            && self.parent_text == other.parent_text
            && self.sibling_text == other.sibling_text
    }

    /// Resource id, falling back to the source platform's plain `id`.
    pub fn effective_resource_id(&self) -> &str {
        if self.resource_id.is_empty() {
            &self.id
        } else {
            &self.resource_id
        }
    }

    fn validate(&self, index: usize) -> Result<(), TransferError> {
        if self.is_placeholder() {
            return Ok(());
        }
        let malformed = |reason: &str| TransferError::MalformedEvent {
            index,
            reason: reason.to_string(),
        };

        match self.action {
            EventAction::SendKeys if self.action_args.is_empty() => {
                Err(malformed("send_keys requires the text to type in action_args"))
            }
            EventAction::IsAttrEqual
                if self.action_args.first().map(String::as_str) != Some("text") =>
            {
                Err(malformed("is_attr_equal only supports the 'text' attribute"))
            }
            EventAction::TextPresent | EventAction::TextNotPresent
                if self.text.trim().is_empty() =>
            {
                Err(malformed("text assertions require a text payload"))
            }
            _ => Ok(()),
        }
    }
}

/// Parse and validate a source test document (a JSON array of events).
pub fn parse_events(raw: &str) -> Result<Vec<SourceEvent>, TransferError> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| TransferError::json("source events", e))?;

    if values.is_empty() {
        return Err(TransferError::MalformedEvent {
            index: 0,
            reason: "source test contains no events".into(),
        });
    }

    let mut events = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let event: SourceEvent =
            serde_json::from_value(value).map_err(|e| TransferError::MalformedEvent {
                index,
                reason: e.to_string(),
            })?;
        event.validate(index)?;
        events.push(event);
    }

    Ok(merge_mouseover(events))
}

pub fn load_events(path: &Path) -> Result<Vec<SourceEvent>, TransferError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| TransferError::io(path.display().to_string(), e))?;
    parse_events(&raw)
}

/// Hover actions have no target counterpart: each becomes a placeholder and
/// its text is carried into the following event.
pub fn merge_mouseover(events: Vec<SourceEvent>) -> Vec<SourceEvent> {
    let mut merged = Vec::with_capacity(events.len());
    let mut hovered: Option<String> = None;

    for event in events {
        if event.action == EventAction::MoveToElement {
            hovered = Some(event.text.clone());
            merged.push(SourceEvent::placeholder(event.action));
            continue;
        }

        let mut event = event;
        if let Some(text) = hovered.take() {
            if !text.is_empty() {
                if !event.text.is_empty() {
                    event.text.push(' ');
                }
                event.text.push_str(&text);
            }
        }
        merged.push(event);
    }

    merged
}

// ============================================================================
// Target events
// ============================================================================

/// A resolved action on the target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEvent {
    #[serde(flatten)]
    pub widget: Widget,

    pub action: EventAction,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_args: Vec<String>,

    #[serde(default)]
    pub sim_score: f64,

    /// Navigation actions executed before this one to reach its screen
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steppings: Vec<TargetEvent>,
}

impl TargetEvent {
    pub fn new(widget: Widget, action: EventAction) -> Self {
        Self {
            widget,
            action,
            action_args: Vec::new(),
            sim_score: 0.0,
            steppings: Vec::new(),
        }
    }

    /// Placeholder for a source event that found no counterpart.
    pub fn empty(action: EventAction) -> Self {
        Self::new(Widget::empty(), action)
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.action_args = args;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.sim_score = score;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.widget.is_empty_placeholder()
    }

    pub fn is_oracle(&self) -> bool {
        self.action.is_oracle()
    }
}
