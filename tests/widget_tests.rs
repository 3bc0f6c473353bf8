use std::fs;

use ui_transfer::widget::clickability::ClickabilityRules;
use ui_transfer::widget::hierarchy::{LocatorAttr, UiHierarchy};
use ui_transfer::widget::static_seed::{JsonWidgetFile, NoStaticWidgets, StaticExtractor};
use ui_transfer::widget::widget_db::WidgetDb;
use ui_transfer::widget::widget_model::Widget;

use crate::common::{button, text_view};

mod common;

const SCREEN: &str = "com.demo.AccountActivity";

const ACCOUNT_XML: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node class="android.widget.FrameLayout" resource-id="" content-desc="" text="" clickable="false" enabled="true">
    <node class="android.widget.LinearLayout" text="Account" clickable="true" enabled="true">
      <node class="android.widget.TextView" resource-id="com.demo:id/label" text="Email" clickable="false" enabled="true" />
      <node class="android.widget.EditText" resource-id="com.demo:id/email" text="" clickable="true" enabled="true" password="false" />
    </node>
    <node class="android.widget.LinearLayout" clickable="false" enabled="true">
      <node class="android.widget.ImageButton" resource-id="com.demo:id/share" clickable="true" enabled="true" NAF="true" />
      <node class="android.widget.TextView" text="Share &amp; send" clickable="false" enabled="true" />
    </node>
    <node class="android.widget.Button" resource-id="com.demo:id/off" text="Off" clickable="true" enabled="false" />
  </node>
</hierarchy>"#;

fn account() -> UiHierarchy {
    UiHierarchy::parse(ACCOUNT_XML).unwrap()
}

fn find<'a>(widgets: &'a [Widget], pred: impl Fn(&Widget) -> bool) -> &'a Widget {
    widgets.iter().find(|w| pred(w)).unwrap()
}

// ============================================================================
// Widget model
// ============================================================================

#[test]
fn signature_distinguishes_observation_flags() {
    let observed = button("ok", "OK");
    let mut other = observed.clone();
    other.clickable = Some(false);
    assert_ne!(observed.signature(), other.signature());
    assert_eq!(observed.static_signature(), other.static_signature());
}

#[test]
fn static_widgets_have_no_clickability() {
    let static_widget = Widget::new("android.widget.Button").with_id("ok");
    assert!(static_widget.is_static());
    assert!(!static_widget.is_clickable());
    assert!(!button("ok", "OK").is_static());
}

#[test]
fn short_class_is_lowercased_last_segment() {
    assert_eq!(Widget::new("android.widget.ImageButton").short_class(), "imagebutton");
}

#[test]
fn full_resource_id_adds_observed_prefix() {
    let mut w = Widget::new("android.widget.Button").with_id("ok");
    assert_eq!(w.full_resource_id(), "ok");
    w.id_prefix = Some("com.demo:id/".into());
    assert_eq!(w.full_resource_id(), "com.demo:id/ok");
}

#[test]
fn equality_ignores_naf_but_not_screen() {
    let a = button("ok", "OK").on_screen("com.demo", "com.demo.A");
    let mut b = a.clone();
    b.naf = Some(true);
    assert!(a.is_equal(&b));

    let c = a.clone().on_screen("com.demo", "com.demo.B");
    assert!(!a.is_equal(&c));
}

#[test]
fn empty_widget_has_no_textual_info() {
    assert!(!Widget::empty().has_textual_info());
    assert!(Widget::empty().is_empty_placeholder());
    assert!(text_view("Hi").has_textual_info());
}

// ============================================================================
// Widget database
// ============================================================================

#[test]
fn db_rejects_duplicate_signatures() {
    let mut db = WidgetDb::new();
    assert!(db.insert(button("ok", "OK")));
    assert!(!db.insert(button("ok", "OK")));
    assert_eq!(db.len(), 1);
}

#[test]
fn db_order_is_independent_of_insertion_order() {
    let widgets = vec![button("b", "B"), text_view("A"), button("a", "A")];
    let forward = WidgetDb::seeded(widgets.clone());
    let backward = WidgetDb::seeded(widgets.into_iter().rev());

    let f: Vec<String> = forward.iter().map(Widget::signature).collect();
    let b: Vec<String> = backward.iter().map(Widget::signature).collect();
    assert_eq!(f, b);
}

#[test]
fn observed_widget_retires_static_counterpart() {
    let static_ok = Widget::new("android.widget.Button")
        .with_id("ok")
        .with_text("OK")
        .on_screen("com.demo", SCREEN);
    let mut db = WidgetDb::seeded(vec![static_ok.clone()]);

    let mut observed = static_ok.clone().with_clickable(true);
    observed.password = Some(false);
    db.merge_observed(vec![observed.clone()]);

    assert_eq!(db.len(), 1);
    assert!(db.contains(&observed));
    assert!(!db.contains(&static_ok));
}

#[test]
fn clickables_on_filters_by_screen() {
    let db = WidgetDb::seeded(vec![
        button("a", "A").on_screen("com.demo", SCREEN),
        button("b", "B").on_screen("com.demo", "com.demo.Other"),
        text_view("T").on_screen("com.demo", SCREEN),
    ]);
    let on_screen: Vec<&Widget> = db.clickables_on(SCREEN).collect();
    assert_eq!(on_screen.len(), 1);
    assert_eq!(on_screen[0].resource_id, "a");
}

// ============================================================================
// Hierarchy parsing
// ============================================================================

#[test]
fn widgets_skip_unsupported_and_disabled_nodes() {
    let widgets = account().widgets("com.demo", SCREEN, &ClickabilityRules::default());

    // FrameLayout without id/desc, layouts and the disabled button are absent
    assert_eq!(widgets.len(), 4);
    assert!(widgets.iter().all(|w| w.screen == SCREEN && w.package == "com.demo"));
    assert!(!widgets.iter().any(|w| w.resource_id == "off"));
}

#[test]
fn widgets_carry_prefix_and_parent_text() {
    let widgets = account().widgets("com.demo", SCREEN, &ClickabilityRules::default());

    let email = find(&widgets, |w| w.resource_id == "email");
    assert_eq!(email.id_prefix.as_deref(), Some("com.demo:id/"));
    assert_eq!(email.parent_text, "Account");
    assert_eq!(email.password, Some(false));
    assert_eq!(email.full_resource_id(), "com.demo:id/email");
}

#[test]
fn label_inside_clickable_parent_is_clickable() {
    let widgets = account().widgets("com.demo", SCREEN, &ClickabilityRules::default());
    assert!(find(&widgets, |w| w.resource_id == "label").is_clickable());
    assert!(!find(&widgets, |w| w.text == "Share & send").is_clickable());
}

#[test]
fn icon_button_takes_following_label_as_sibling_text() {
    let widgets = account().widgets("com.demo", SCREEN, &ClickabilityRules::default());
    let share = find(&widgets, |w| w.resource_id == "share");
    assert_eq!(share.sibling_text, "Share & send");
    assert_eq!(share.naf, Some(true));
}

#[test]
fn malformed_hierarchy_is_an_error() {
    assert!(UiHierarchy::parse("<hierarchy><node class=\"a\"></hierarchy>").is_err());
}

// ============================================================================
// Clickability inference
// ============================================================================

const CHAIN_XML: &str = r#"<hierarchy>
  <node class="android.widget.FrameLayout" clickable="true" enabled="true">
    <node class="android.widget.FrameLayout" clickable="false" enabled="true">
      <node class="android.widget.TextView" text="Wrapped" clickable="false" enabled="true" />
    </node>
  </node>
  <node class="android.widget.ListView" clickable="true" enabled="true">
    <node class="android.widget.RelativeLayout" clickable="false" enabled="true">
      <node class="android.widget.TextView" text="Row" clickable="false" enabled="true" />
    </node>
  </node>
</hierarchy>"#;

fn chain_widget(rules: &ClickabilityRules, text: &str) -> Widget {
    let widgets = UiHierarchy::parse(CHAIN_XML)
        .unwrap()
        .widgets("com.demo", SCREEN, rules);
    find(&widgets, |w| w.text == text).clone()
}

#[test]
fn ancestor_chain_makes_label_clickable() {
    assert!(chain_widget(&ClickabilityRules::default(), "Wrapped").is_clickable());
    assert!(!chain_widget(&ClickabilityRules::parent_only(), "Wrapped").is_clickable());
}

#[test]
fn clickable_list_container_reaches_rows() {
    assert!(chain_widget(&ClickabilityRules::parent_only(), "Row").is_clickable());

    let shallow = ClickabilityRules {
        list_depth: 1,
        ..ClickabilityRules::parent_only()
    };
    assert!(!chain_widget(&shallow, "Row").is_clickable());
}

#[test]
fn rules_deserialize_with_defaults() {
    let rules: ClickabilityRules = serde_yaml::from_str("list_depth: 5").unwrap();
    assert_eq!(rules.list_depth, 5);
    assert_eq!(rules.ancestor_chains, ClickabilityRules::default().ancestor_chains);
}

// ============================================================================
// Locating
// ============================================================================

#[test]
fn locate_matches_literal_substrings() {
    let tree = account();
    let rules = ClickabilityRules::default();

    let share = tree
        .locate(&[(LocatorAttr::ResourceId, "share".into())], &rules)
        .unwrap();
    assert_eq!(share.resource_id, "share");

    let label = tree
        .locate(
            &[
                (LocatorAttr::Text, "Share &".into()),
                (LocatorAttr::Class, "android.widget.TextView".into()),
            ],
            &rules,
        )
        .unwrap();
    assert_eq!(label.text, "Share & send");
}

#[test]
fn disabled_first_match_yields_none() {
    let tree = account();
    let found = tree.locate(
        &[(LocatorAttr::Text, "Off".into())],
        &ClickabilityRules::default(),
    );
    assert!(found.is_none());
}

// ============================================================================
// Static seeding
// ============================================================================

#[test]
fn json_widget_file_seeds_static_widgets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("widgets.json");
    fs::write(
        &path,
        r#"[
          {"class": "android.widget.Button", "resource-id": "ok", "text": "OK",
           "package": "com.demo", "screen": "com.demo.MainActivity"},
          {"class": "android.widget.TextView", "text": "Settings", "menu_group": true}
        ]"#,
    )
    .unwrap();

    let widgets = JsonWidgetFile::new(&path).extract().unwrap();
    assert_eq!(widgets.len(), 2);
    assert!(widgets.iter().all(Widget::is_static));
    assert_eq!(widgets[1].menu_group, Some(true));
    assert!(NoStaticWidgets.extract().unwrap().is_empty());
}

#[test]
fn missing_widget_file_is_an_io_error() {
    let err = JsonWidgetFile::new("/nonexistent/widgets.json")
        .extract()
        .unwrap_err();
    assert!(err.to_string().contains("widgets.json"));
}
