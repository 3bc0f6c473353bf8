use serde::{Deserialize, Serialize};

use crate::widget::hierarchy::UiHierarchy;

/// Table-driven inference of "clickable through an ancestor".
///
/// Many toolkits report a label as non-clickable while a wrapping layout
/// receives the tap. Rather than hardcoding per-app layouts, the engine
/// consults this table (loaded from config, with a generic default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickabilityRules {
    /// Ancestor class chains starting at the direct parent. A chain matches
    /// when every class matches in order; the last ancestor must be
    /// clickable (or be a pass-through container).
    #[serde(default = "default_chains")]
    pub ancestor_chains: Vec<Vec<String>>,

    /// Containers that forward taps to their children regardless of flags
    #[serde(default = "default_pass_through")]
    pub pass_through_classes: Vec<String>,

    /// List containers whose clickability is inherited from a distance
    #[serde(default = "default_list_classes")]
    pub list_classes: Vec<String>,

    /// How many levels above the widget a list container may sit
    #[serde(default = "default_list_depth")]
    pub list_depth: usize,
}

impl Default for ClickabilityRules {
    fn default() -> Self {
        Self {
            ancestor_chains: default_chains(),
            pass_through_classes: default_pass_through(),
            list_classes: default_list_classes(),
            list_depth: default_list_depth(),
        }
    }
}

fn default_chains() -> Vec<Vec<String>> {
    let chains: &[&[&str]] = &[
        &["android.widget.RelativeLayout", "android.widget.LinearLayout", "android.widget.LinearLayout"],
        &["android.widget.LinearLayout", "android.widget.RelativeLayout", "android.widget.FrameLayout"],
        &["android.widget.FrameLayout", "android.widget.FrameLayout"],
        &["android.view.ViewGroup", "android.view.ViewGroup"],
        &["android.widget.RelativeLayout", "androidx.viewpager.widget.ViewPager"],
        &["android.widget.LinearLayout", "android.widget.LinearLayout"],
        &["android.widget.LinearLayout", "android.widget.LinearLayout", "android.widget.FrameLayout"],
    ];
    chains
        .iter()
        .map(|chain| chain.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn default_pass_through() -> Vec<String> {
    vec!["androidx.viewpager.widget.ViewPager".to_string()]
}

fn default_list_classes() -> Vec<String> {
    vec!["android.widget.ListView".to_string()]
}

fn default_list_depth() -> usize {
    3
}

impl ClickabilityRules {
    /// Rules with no ancestor chains: only the direct parent and list
    /// containers are consulted.
    pub fn parent_only() -> Self {
        Self {
            ancestor_chains: Vec::new(),
            ..Self::default()
        }
    }

    /// Whether a node reported as non-clickable receives taps via an ancestor.
    pub fn infer(&self, tree: &UiHierarchy, idx: usize) -> bool {
        let Some(parent) = tree.parent(idx) else {
            return false;
        };

        if tree.node(parent).flag("clickable") {
            return true;
        }

        if self
            .ancestor_chains
            .iter()
            .any(|chain| self.chain_matches(tree, parent, chain))
        {
            return true;
        }

        let mut current = Some(parent);
        for _ in 2..=self.list_depth {
            current = current.and_then(|c| tree.parent(c));
            if let Some(c) = current {
                let node = tree.node(c);
                if self.list_classes.iter().any(|l| l == node.class()) && node.flag("clickable") {
                    return true;
                }
            }
        }

        false
    }

    fn chain_matches(&self, tree: &UiHierarchy, start: usize, chain: &[String]) -> bool {
        let mut current = Some(start);
        for (i, class) in chain.iter().enumerate() {
            let Some(idx) = current else {
                return false;
            };
            let node = tree.node(idx);
            if node.class() != class {
                return false;
            }
            if i == chain.len() - 1 {
                return node.flag("clickable")
                    || self.pass_through_classes.iter().any(|p| p == node.class());
            }
            current = tree.parent(idx);
        }
        false
    }
}
