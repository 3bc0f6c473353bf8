use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;

use crate::widget::clickability::ClickabilityRules;
use crate::widget::widget_model::Widget;

// ============================================================================
// Supported widget classes
// ============================================================================

pub const WIDGET_CLASSES: &[&str] = &[
    "android.widget.EditText",
    "android.widget.MultiAutoCompleteTextView",
    "android.widget.TextView",
    "android.widget.Button",
    "android.widget.ImageButton",
    "android.view.View",
    "android.widget.ImageView",
    "android.widget.FrameLayout",
    "androidx.appcompat.app.ActionBar.Tab",
    "android.widget.CheckedTextView",
];

const FRAME_LAYOUT: &str = "android.widget.FrameLayout";
const IMAGE_BUTTON: &str = "android.widget.ImageButton";
const LINEAR_LAYOUT: &str = "android.widget.LinearLayout";
const TEXT_VIEW: &str = "android.widget.TextView";

// ============================================================================
// Parsed document
// ============================================================================

/// One node of a UI Automator hierarchy dump.
#[derive(Debug, Clone)]
pub struct UiNode {
    pub tag: String,
    /// Attributes with lowercased keys
    pub attrs: BTreeMap<String, String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl UiNode {
    pub fn attr(&self, key: &str) -> &str {
        self.attrs.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn flag(&self, key: &str) -> bool {
        self.attr(key) == "true"
    }

    /// First class token, falling back to the element name for dumps that
    /// encode the class as the tag.
    pub fn class(&self) -> &str {
        self.attr("class")
            .split_whitespace()
            .next()
            .unwrap_or(self.tag.as_str())
    }
}

/// Which attribute a document lookup constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorAttr {
    ResourceId,
    Text,
    ContentDesc,
    Class,
}

impl LocatorAttr {
    pub fn key(&self) -> &'static str {
        match self {
            LocatorAttr::ResourceId => "resource-id",
            LocatorAttr::Text => "text",
            LocatorAttr::ContentDesc => "content-desc",
            LocatorAttr::Class => "class",
        }
    }
}

/// A parsed hierarchy document, nodes stored in document order.
#[derive(Debug, Clone, Default)]
pub struct UiHierarchy {
    nodes: Vec<UiNode>,
}

impl UiHierarchy {
    pub fn parse(xml: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        let mut nodes: Vec<UiNode> = Vec::new();
        let mut open: Vec<usize> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let idx = push_node(&mut nodes, &e, open.last().copied())?;
                    open.push(idx);
                }
                Ok(Event::Empty(e)) => {
                    push_node(&mut nodes, &e, open.last().copied())?;
                }
                Ok(Event::End(_)) => {
                    open.pop();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(format!(
                        "malformed hierarchy at position {}: {}",
                        reader.buffer_position(),
                        e
                    ));
                }
                _ => {}
            }
        }

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &UiNode {
        &self.nodes[idx]
    }

    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.nodes.get(idx).and_then(|n| n.parent)
    }

    /// Whether any node shows `text` in its (unescaped) text or description.
    pub fn contains_text(&self, text: &str) -> bool {
        self.nodes
            .iter()
            .any(|n| n.attr("text").contains(text) || n.attr("content-desc").contains(text))
    }

    /// All widgets of supported classes, in document order.
    pub fn widgets(&self, package: &str, screen: &str, rules: &ClickabilityRules) -> Vec<Widget> {
        (0..self.nodes.len())
            .filter(|&idx| WIDGET_CLASSES.contains(&self.nodes[idx].class()))
            .filter_map(|idx| self.widget_at(idx, rules))
            .map(|w| w.on_screen(package, screen))
            .collect()
    }

    /// First node whose attributes each contain the given literal value,
    /// converted to a widget. A disabled match yields `None`.
    pub fn locate(
        &self,
        locators: &[(LocatorAttr, String)],
        rules: &ClickabilityRules,
    ) -> Option<Widget> {
        let patterns: Vec<(&'static str, Regex)> = locators
            .iter()
            .filter_map(|(attr, value)| {
                Regex::new(&regex::escape(value))
                    .ok()
                    .map(|re| (attr.key(), re))
            })
            .collect();

        let idx = (0..self.nodes.len()).find(|&idx| {
            let node = &self.nodes[idx];
            patterns.iter().all(|(key, re)| {
                node.attrs.get(*key).is_some_and(|v| re.is_match(v))
            })
        })?;

        self.widget_at(idx, rules)
    }

    fn widget_at(&self, idx: usize, rules: &ClickabilityRules) -> Option<Widget> {
        let node = &self.nodes[idx];
        if !node.flag("enabled") {
            return None;
        }

        let class = node.class();
        let full_id = node.attr("resource-id");
        let desc = node.attr("content-desc");
        if class == FRAME_LAYOUT && (full_id.is_empty() || desc.is_empty()) {
            return None;
        }

        let (prefix, short_id) = match full_id.rfind('/') {
            Some(pos) => (&full_id[..=pos], &full_id[pos + 1..]),
            None => ("", full_id),
        };

        let clickable = match node.attr("clickable") {
            "true" => true,
            _ => rules.infer(self, idx),
        };

        let mut widget = Widget::new(class)
            .with_id(short_id)
            .with_text(node.attr("text"))
            .with_desc(desc)
            .with_clickable(clickable);

        widget.password = Some(node.flag("password"));
        if node.flag("naf") {
            widget.naf = Some(true);
        }
        if !prefix.is_empty() {
            widget.id_prefix = Some(prefix.to_string());
        }
        if let Some(parent) = node.parent {
            widget.parent_text = self.nodes[parent].attr("text").to_string();
        }
        widget.sibling_text = self.sibling_text(idx);

        Some(widget)
    }

    /// Label of an icon button: the text of a lone TextView that follows it
    /// inside the same LinearLayout.
    fn sibling_text(&self, idx: usize) -> String {
        let node = &self.nodes[idx];
        if node.class() != IMAGE_BUTTON {
            return String::new();
        }
        let Some(parent) = node.parent else {
            return String::new();
        };
        if self.nodes[parent].class() != LINEAR_LAYOUT {
            return String::new();
        }

        let siblings = &self.nodes[parent].children;
        let following: Vec<usize> = siblings
            .iter()
            .skip_while(|&&s| s != idx)
            .skip(1)
            .copied()
            .collect();

        match following.as_slice() {
            [only] if self.nodes[*only].class() == TEXT_VIEW => {
                self.nodes[*only].attr("text").to_string()
            }
            _ => String::new(),
        }
    }
}

fn push_node(
    nodes: &mut Vec<UiNode>,
    start: &BytesStart<'_>,
    parent: Option<usize>,
) -> Result<usize, String> {
    let mut attrs = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {}", e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value for '{}': {}", key, e))?
            .into_owned();
        attrs.insert(key, value);
    }

    let idx = nodes.len();
    nodes.push(UiNode {
        tag: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attrs,
        parent,
        children: Vec::new(),
    });
    if let Some(p) = parent {
        nodes[p].children.push(idx);
    }
    Ok(idx)
}
