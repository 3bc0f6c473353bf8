use std::collections::{HashMap, HashSet};
use std::fs;

use proptest::prelude::*;

use ui_transfer::graph::nav_graph::{EdgeKind, EdgeLabel, LocatorKind, NavGraph, top_label};

const S1: &str = "com.demo.S1";
const S2: &str = "com.demo.S2";
const S3: &str = "com.demo.S3";

fn labels(path: &ui_transfer::graph::nav_graph::Path) -> Vec<Option<&str>> {
    path.steps.iter().map(|s| s.label.as_deref()).collect()
}

// ============================================================================
// Edge labels
// ============================================================================

#[test]
fn edge_label_parses_and_prints() {
    let label = EdgeLabel::parse("GUI:ID:next_btn:CLICK").unwrap();
    assert_eq!(label.kind, EdgeKind::Gui);
    assert_eq!(label.locator, LocatorKind::Id);
    assert_eq!(label.value, "next_btn");
    assert_eq!(label.action, "click");
    assert_eq!(label.to_string(), "GUI:ID:next_btn:CLICK");
}

#[test]
fn edge_label_value_may_contain_colons() {
    let label = EdgeLabel::parse("GUI:TEXT:Time: 10:30:CLICK").unwrap();
    assert_eq!(label.locator, LocatorKind::Text);
    assert_eq!(label.value, "Time: 10:30");

    let menu = EdgeLabel::parse("OPTION_MENU:CONTENT-DESC:More:CLICK").unwrap();
    assert_eq!(menu.kind, EdgeKind::OptionMenu);
    assert_eq!(menu.locator, LocatorKind::ContentDesc);
}

#[test]
fn unknown_label_parts_are_rejected() {
    assert!(EdgeLabel::parse("SWIPE:ID:x:LEFT").is_none());
    assert!(EdgeLabel::parse("GUI:XPATH:x:CLICK").is_none());
    assert!(EdgeLabel::parse("GUI:ID").is_none());
}

#[test]
fn top_label_prefers_ids_then_text() {
    let labels = vec![
        "OPTION_MENU:ID:settings:CLICK".to_string(),
        "GUI:TEXT:Next:CLICK".to_string(),
        "GUI:ID:zeta:CLICK".to_string(),
        "GUI:ID:alpha:CLICK".to_string(),
    ];
    assert_eq!(top_label(&labels).unwrap(), "GUI:ID:alpha:CLICK");
    assert_eq!(top_label(&labels[..2]).unwrap(), "GUI:TEXT:Next:CLICK");
}

// ============================================================================
// Graph construction
// ============================================================================

#[test]
fn duplicate_edges_are_ignored() {
    let mut graph = NavGraph::new();
    assert!(graph.add_edge(S1, S2, "GUI:ID:next:CLICK"));
    assert!(!graph.add_edge(S1, S2, "GUI:ID:next:CLICK"));
    assert!(graph.add_edge(S1, S2, "GUI:TEXT:Next:CLICK"));
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.node_count(), 2);
}

#[test]
fn add_node_reports_novelty() {
    let mut graph = NavGraph::new();
    assert!(graph.add_node(S1));
    assert!(!graph.add_node(S1));
    assert!(graph.contains_node(S1));
}

// ============================================================================
// Path search
// ============================================================================

#[test]
fn single_edge_gives_single_path() {
    let mut graph = NavGraph::new();
    graph.add_node(S1);
    graph.add_node(S2);
    graph.add_edge(S1, S2, "GUI:ID:next_btn:CLICK");

    let paths = graph.paths_between(S1, S2);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].len(), 2);
    assert_eq!(labels(&paths[0]), vec![Some("GUI:ID:next_btn:CLICK"), None]);
    assert_eq!(paths[0].steps[1].node, S2);
}

#[test]
fn same_screen_has_trivial_path_first() {
    let mut graph = NavGraph::new();
    graph.add_edge(S1, S1, "GUI:ID:tab:CLICK");

    let paths = graph.paths_between(S1, S1);
    assert_eq!(paths.len(), 2);
    assert!(!paths[0].has_actions());
    assert_eq!(labels(&paths[1]), vec![Some("GUI:ID:tab:CLICK"), None]);
}

#[test]
fn paths_are_shortest_first() {
    let mut graph = NavGraph::new();
    graph.add_edge(S1, S2, "GUI:ID:a:CLICK");
    graph.add_edge(S2, S3, "GUI:ID:b:CLICK");
    graph.add_edge(S1, S3, "GUI:ID:c:CLICK");

    let paths = graph.paths_between(S1, S3);
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].len(), 2);
    assert_eq!(paths[1].len(), 3);
    assert_eq!(
        paths[1].to_string(),
        format!("{} [GUI:ID:a:CLICK] -> {} [GUI:ID:b:CLICK] -> {}", S1, S2, S3)
    );
}

#[test]
fn destination_self_loops_add_variants() {
    let mut graph = NavGraph::new();
    graph.add_edge(S1, S2, "GUI:ID:next:CLICK");
    graph.add_edge(S2, S2, "GUI:ID:tab:CLICK");

    let paths = graph.paths_between(S1, S2);
    assert_eq!(paths.len(), 2);
    assert_eq!(
        labels(&paths[1]),
        vec![Some("GUI:ID:next:CLICK"), Some("GUI:ID:tab:CLICK")]
    );
}

#[test]
fn cycles_do_not_loop_forever() {
    let mut graph = NavGraph::new();
    graph.add_edge(S1, S2, "GUI:ID:a:CLICK");
    graph.add_edge(S2, S1, "GUI:ID:back:CLICK");
    graph.add_edge(S2, S3, "GUI:ID:b:CLICK");

    let paths = graph.paths_between(S1, S3);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].len(), 3);
}

#[test]
fn unknown_screens_have_no_paths() {
    let mut graph = NavGraph::new();
    graph.add_edge(S1, S2, "GUI:ID:a:CLICK");
    assert!(graph.paths_between(S1, S3).is_empty());
    assert!(graph.paths_between(S2, S1).is_empty());
}

#[test]
fn prefix_signature_covers_leading_steps() {
    let mut graph = NavGraph::new();
    graph.add_edge(S1, S2, "GUI:ID:a:CLICK");
    graph.add_edge(S2, S3, "GUI:ID:b:CLICK");

    let path = &graph.paths_between(S1, S3)[0];
    assert_eq!(path.prefix_signature(path.len()), path.signature());
    assert_ne!(path.prefix_signature(1), path.signature());
    assert!(path.signature().starts_with(&path.prefix_signature(2)));
}

proptest! {
    #[test]
    fn adding_edges_twice_changes_nothing(
        edges in prop::collection::vec((0..4usize, 0..4usize, 0..3usize), 0..12)
    ) {
        let screens = [S1, S2, S3, "com.demo.S4"];
        let mut once = NavGraph::new();
        for (from, to, label) in &edges {
            once.add_edge(screens[*from], screens[*to], &format!("GUI:ID:b{}:CLICK", label));
        }
        let mut twice = once.clone();
        for (from, to, label) in &edges {
            twice.add_edge(screens[*from], screens[*to], &format!("GUI:ID:b{}:CLICK", label));
        }
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn paths_are_unique_and_stable(
        edges in prop::collection::vec((0..4usize, 0..4usize, 0..3usize), 1..14),
        from in 0..4usize,
        to in 0..4usize,
    ) {
        // Parallel labels and self-loops both occur in the generated edges.
        let screens = [S1, S2, S3, "com.demo.S4"];
        let mut graph = NavGraph::new();
        for (a, b, label) in &edges {
            graph.add_edge(screens[*a], screens[*b], &format!("GUI:ID:b{}:CLICK", label));
        }

        let paths = graph.paths_between(screens[from], screens[to]);
        let signatures: HashSet<String> =
            paths.iter().map(|p| p.signature()).collect();
        prop_assert_eq!(signatures.len(), paths.len());
        prop_assert_eq!(graph.paths_between(screens[from], screens[to]), paths);
    }

    #[test]
    fn every_path_starts_and_ends_at_its_endpoints(
        edges in prop::collection::vec((0..4usize, 0..4usize), 1..10)
    ) {
        let screens = [S1, S2, S3, "com.demo.S4"];
        let mut graph = NavGraph::new();
        for (from, to) in &edges {
            graph.add_edge(screens[*from], screens[*to], "GUI:ID:go:CLICK");
        }
        let (from, to) = (screens[edges[0].0], screens[edges[0].1]);
        let paths = graph.paths_between(from, to);
        prop_assert!(!paths.is_empty());
        for path in &paths {
            prop_assert_eq!(path.steps[0].node.as_str(), from);
            prop_assert_eq!(path.steps[path.len() - 1].node.as_str(), to);
        }
    }
}

// ============================================================================
// Static transition model
// ============================================================================

const MODEL: &str = "\
Nodes:
com.demo.MainActivity (Activity)
com.demo.DetailActivity (Activity)
com.demo.SettingsFragment (Fragment)
Edges:
com.demo.MainActivity -> com.demo.DetailActivity (GUI:ID 2131230800)
com.demo.DetailActivity -> com.demo.MainActivity (GUI:ID 16908332)
com.demo.MainActivity -> com.demo.DetailActivity (OPTION_MENU:ID 2131230801)
com.demo.MainActivity -> com.demo.SettingsFragment (GUI:ID 2131230802)
com.demo.MainActivity -> com.demo.DetailActivity (GUI:ID null)
com.demo.MainActivity -> com.demo.DetailActivity (GUI:ID 999)
";

fn rid_names() -> HashMap<String, String> {
    HashMap::from([
        ("2131230800".to_string(), "open_detail".to_string()),
        ("2131230801".to_string(), "menu_detail".to_string()),
        ("2131230802".to_string(), "open_settings".to_string()),
    ])
}

#[test]
fn model_keeps_activity_id_edges() {
    let graph = NavGraph::from_model(MODEL, &rid_names());
    assert_eq!(graph.node_count(), 2);

    let labels = graph
        .labels_between("com.demo.MainActivity", "com.demo.DetailActivity")
        .unwrap();
    assert_eq!(labels.len(), 2);
    assert!(labels.contains("GUI:ID:open_detail:CLICK"));
    assert!(labels.contains("OPTION_MENU:ID:menu_detail:CLICK"));
}

#[test]
fn load_model_names_the_home_button() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("model.txt");
    let names = dir.path().join("rid_names.json");
    fs::write(&model, MODEL).unwrap();
    fs::write(&names, serde_json::to_string(&rid_names()).unwrap()).unwrap();

    let graph = NavGraph::load_model(&model, &names).unwrap();
    let back = graph
        .labels_between("com.demo.DetailActivity", "com.demo.MainActivity")
        .unwrap();
    assert!(back.contains("GUI:ID:android.R.id.home:CLICK"));
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn load_model_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.txt");
    assert!(NavGraph::load_model(&missing, &missing).is_err());
}
