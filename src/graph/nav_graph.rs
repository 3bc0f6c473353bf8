use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TransferError;

/// Resource id of the toolbar home/up button, absent from app resource maps.
const HOME_RESOURCE_ID: &str = "16908332";
const HOME_RESOURCE_NAME: &str = "android.R.id.home";

// ============================================================================
// Edge labels
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Gui,
    OptionMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Id,
    Text,
    ContentDesc,
}

/// Parsed form of `{kind}:{locator-type}:{locator-value}:{action}`.
///
/// The locator value may itself contain `:`; kind and locator type are the
/// first two segments and the action is the last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLabel {
    pub kind: EdgeKind,
    pub locator: LocatorKind,
    pub value: String,
    pub action: String,
}

impl EdgeLabel {
    pub fn new(kind: EdgeKind, locator: LocatorKind, value: &str, action: &str) -> Self {
        Self {
            kind,
            locator,
            value: value.to_string(),
            action: action.to_string(),
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        let (kind, rest) = label.split_once(':')?;
        let (locator, rest) = rest.split_once(':')?;
        let (value, action) = rest.rsplit_once(':')?;

        let kind = match kind {
            "GUI" => EdgeKind::Gui,
            "OPTION_MENU" => EdgeKind::OptionMenu,
            _ => return None,
        };
        let locator = match locator {
            "ID" => LocatorKind::Id,
            "TEXT" => LocatorKind::Text,
            "CONTENT-DESC" => LocatorKind::ContentDesc,
            _ => return None,
        };

        Some(Self {
            kind,
            locator,
            value: value.to_string(),
            action: action.to_lowercase(),
        })
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EdgeKind::Gui => "GUI",
            EdgeKind::OptionMenu => "OPTION_MENU",
        };
        let locator = match self.locator {
            LocatorKind::Id => "ID",
            LocatorKind::Text => "TEXT",
            LocatorKind::ContentDesc => "CONTENT-DESC",
        };
        write!(
            f,
            "{}:{}:{}:{}",
            kind,
            locator,
            self.value,
            self.action.to_uppercase()
        )
    }
}

/// Priority tier of a label: stable ids first, option-menu entries last.
fn label_tier(label: &str) -> usize {
    const TIERS: [&str; 4] = ["GUI:ID:", "GUI:TEXT:", "GUI:CONTENT-DESC:", "OPTION_MENU:ID:"];
    TIERS
        .iter()
        .position(|prefix| label.starts_with(prefix))
        .unwrap_or(TIERS.len())
}

/// Representative label among parallel edges: lowest tier, then
/// lexicographically smallest.
pub fn top_label<'a>(labels: impl IntoIterator<Item = &'a String>) -> Option<&'a String> {
    labels
        .into_iter()
        .min_by(|a, b| (label_tier(a), a.as_str()).cmp(&(label_tier(b), b.as_str())))
}

// ============================================================================
// Paths
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub node: String,
    /// Action leaving `node`; `None` on the final step
    pub label: Option<String>,
}

impl PathStep {
    fn new(node: &str, label: Option<&str>) -> Self {
        Self {
            node: node.to_string(),
            label: label.map(str::to_string),
        }
    }

    fn signature(&self) -> String {
        format!("{}+{}", self.node, self.label.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub steps: Vec<PathStep>,
}

impl Path {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn signature(&self) -> String {
        Self::signature_of(&self.steps)
    }

    /// Signature of the first `len` steps.
    pub fn prefix_signature(&self, len: usize) -> String {
        Self::signature_of(&self.steps[..len.min(self.steps.len())])
    }

    /// Whether following the path performs any action at all.
    pub fn has_actions(&self) -> bool {
        self.steps.iter().any(|s| s.label.is_some())
    }

    fn signature_of(steps: &[PathStep]) -> String {
        steps
            .iter()
            .map(PathStep::signature)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            match &step.label {
                Some(label) => write!(f, "{} [{}]", step.node, label)?,
                None => write!(f, "{}", step.node)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Navigation graph
// ============================================================================

/// Directed multigraph over screen identifiers. Parallel edges are kept as a
/// label set per ordered pair; edges are never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavGraph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: &str) -> bool {
        let added = self.nodes.insert(node.to_string());
        if added {
            info!("Graph node added: {}", node);
        }
        added
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of labeled edges, counting parallel edges separately.
    pub fn edge_count(&self) -> usize {
        self.edges
            .values()
            .flat_map(|targets| targets.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn labels_between(&self, from: &str, to: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(from).and_then(|targets| targets.get(to))
    }

    /// Append an edge. Returns `true` only if the label was new for the pair.
    pub fn add_edge(&mut self, from: &str, to: &str, label: &str) -> bool {
        let added = self.insert_edge(from, to, label);
        if added {
            info!("New edge added: {} -> {} ({})", from, to, label);
        }
        added
    }

    fn insert_edge(&mut self, from: &str, to: &str, label: &str) -> bool {
        self.nodes.insert(from.to_string());
        self.nodes.insert(to.to_string());
        self.edges
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_default()
            .insert(label.to_string())
    }

    /// All candidate navigation paths from `from` to `to`, shortest first.
    ///
    /// One path per simple node sequence, each hop represented by its
    /// top-priority label. Self-loops on the destination add variants ending
    /// in that in-screen action. Unknown nodes yield no paths.
    pub fn paths_between(&self, from: &str, to: &str) -> Vec<Path> {
        if !self.contains_node(from) || !self.contains_node(to) {
            return Vec::new();
        }

        let mut paths = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |path: Path, paths: &mut Vec<Path>| {
            if seen.insert(path.signature()) {
                paths.push(path);
            }
        };

        let self_loops: Vec<&String> = self
            .labels_between(to, to)
            .map(|labels| labels.iter().collect())
            .unwrap_or_default();

        if from == to {
            push(
                Path {
                    steps: vec![PathStep::new(from, None), PathStep::new(to, None)],
                },
                &mut paths,
            );
            for label in self_loops {
                push(
                    Path {
                        steps: vec![
                            PathStep::new(from, Some(label.as_str())),
                            PathStep::new(to, None),
                        ],
                    },
                    &mut paths,
                );
            }
            return paths;
        }

        let mut node_sequences = Vec::new();
        let mut trail = vec![from.to_string()];
        self.extend_simple_paths(to, &mut trail, &mut node_sequences);

        for nodes in node_sequences {
            let mut steps = Vec::with_capacity(nodes.len());
            for pair in nodes.windows(2) {
                let label = self
                    .labels_between(&pair[0], &pair[1])
                    .and_then(|labels| top_label(labels.iter()));
                steps.push(PathStep::new(&pair[0], label.map(String::as_str)));
            }
            steps.push(PathStep::new(to, None));
            let path = Path { steps };

            push(path.clone(), &mut paths);
            for label in &self_loops {
                let mut repeated = path.clone();
                repeated.steps.pop();
                repeated.steps.push(PathStep::new(to, Some(label.as_str())));
                push(repeated, &mut paths);
            }
        }

        paths.sort_by_key(Path::len);
        debug!("{} path(s) from {} to {}", paths.len(), from, to);
        paths
    }

    fn extend_simple_paths(&self, to: &str, trail: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        let Some(last) = trail.last() else {
            return;
        };
        let Some(targets) = self.edges.get(last) else {
            return;
        };

        for next in targets.keys() {
            if next == to {
                let mut complete = trail.clone();
                complete.push(next.clone());
                out.push(complete);
            } else if !trail.contains(next) {
                trail.push(next.clone());
                self.extend_simple_paths(to, trail, out);
                trail.pop();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Static transition model
    // ------------------------------------------------------------------------

    /// Build a graph from a static transition model.
    ///
    /// ```text
    /// Nodes:
    /// com.app.MainActivity (Activity)
    /// Edges:
    /// com.app.MainActivity -> com.app.DetailActivity (GUI:ID 2131230800)
    /// ```
    ///
    /// Only Activity nodes and id-based GUI/option-menu edges are kept;
    /// numeric ids are resolved through `rid_names`.
    pub fn from_model(model: &str, rid_names: &HashMap<String, String>) -> Self {
        enum Section {
            None,
            Nodes,
            Edges,
        }

        let mut graph = Self::new();
        let mut activities = BTreeSet::new();
        let mut section = Section::None;

        for line in model.lines() {
            let line = line.trim();
            if line.starts_with("Nodes:") {
                section = Section::Nodes;
                continue;
            }
            if line.starts_with("Edges:") {
                section = Section::Edges;
                continue;
            }
            if line.is_empty() {
                continue;
            }

            match section {
                Section::None => {}
                Section::Nodes => {
                    let mut parts = line.split_whitespace();
                    if let (Some(name), Some("(Activity)")) = (parts.next(), parts.next()) {
                        activities.insert(name.to_string());
                        graph.nodes.insert(name.to_string());
                    }
                }
                Section::Edges => {
                    if let Some((from, to, label)) = parse_model_edge(line, &activities, rid_names)
                    {
                        graph.insert_edge(&from, &to, &label);
                    }
                }
            }
        }

        info!(
            "Navigation model loaded: {} node(s), {} edge(s)",
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    pub fn load_model(model_path: &FsPath, rid_names_path: &FsPath) -> Result<Self, TransferError> {
        let model = fs::read_to_string(model_path)
            .map_err(|e| TransferError::io(model_path.display().to_string(), e))?;
        let raw_names = fs::read_to_string(rid_names_path)
            .map_err(|e| TransferError::io(rid_names_path.display().to_string(), e))?;
        let mut rid_names: HashMap<String, String> = serde_json::from_str(&raw_names)
            .map_err(|e| TransferError::json(rid_names_path.display().to_string(), e))?;
        rid_names.insert(HOME_RESOURCE_ID.into(), HOME_RESOURCE_NAME.into());
        Ok(Self::from_model(&model, &rid_names))
    }
}

fn parse_model_edge(
    line: &str,
    activities: &BTreeSet<String>,
    rid_names: &HashMap<String, String>,
) -> Option<(String, String, String)> {
    let (from, rest) = line.split_once("->")?;
    let from = from.trim();
    let to = rest.split_whitespace().next()?;
    if !activities.contains(from) || !activities.contains(to) {
        return None;
    }

    let edge = rest.split_once('(')?.1.trim_end_matches(')');
    let (kind, id_part) = edge.split_once(':')?;
    let kind = match kind {
        "GUI" => EdgeKind::Gui,
        "OPTION_MENU" => EdgeKind::OptionMenu,
        _ => return None,
    };
    let mut id_parts = id_part.split_whitespace();
    if id_parts.next() != Some("ID") {
        return None;
    }
    let rid = id_parts.next()?;
    if rid == "null" {
        return None;
    }

    let Some(name) = rid_names.get(rid) else {
        warn!("Unknown resource id {} in navigation model; edge skipped", rid);
        return None;
    };

    let label = EdgeLabel::new(kind, LocatorKind::Id, name, "click");
    Some((from.to_string(), to.to_string(), label.to_string()))
}
