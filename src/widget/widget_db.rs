use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::widget::widget_model::Widget;

/// Everything known to exist across all visited screens, keyed by signature.
///
/// Ordered by signature so that ranking ties resolve deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetDb {
    widgets: BTreeMap<String, Widget>,
}

impl WidgetDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the database from static extraction.
    pub fn seeded(widgets: impl IntoIterator<Item = Widget>) -> Self {
        let mut db = Self::new();
        for w in widgets {
            db.insert(w);
        }
        db
    }

    /// Insert a widget. Returns `false` if its signature was already present.
    pub fn insert(&mut self, widget: Widget) -> bool {
        let signature = widget.signature();
        if self.widgets.contains_key(&signature) {
            return false;
        }
        self.widgets.insert(signature, widget);
        true
    }

    pub fn remove(&mut self, widget: &Widget) -> Option<Widget> {
        self.widgets.remove(&widget.signature())
    }

    pub fn contains(&self, widget: &Widget) -> bool {
        self.widgets.contains_key(&widget.signature())
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.values()
    }

    /// Merge widgets observed on a live screen.
    ///
    /// New signatures are added; a statically extracted widget with the same
    /// class, id, text, description, package and screen as an observed one is
    /// retired, since the live observation supersedes it.
    pub fn merge_observed(&mut self, observed: Vec<Widget>) {
        let before = self.widgets.len();

        for w in observed {
            let static_signature = w.static_signature();
            if let Some(popped) = self.widgets.remove(&static_signature) {
                debug!("wDB retired static widget: {:?}", popped);
            }
            if self.insert(w.clone()) {
                debug!("wDB widget added: {:?}", w);
            }
        }

        let after = self.widgets.len();
        if before != after {
            info!("wDB updated: {} -> {}", before, after);
        }
    }

    /// Live-observed clickable widgets owned by `screen`.
    pub fn clickables_on<'a>(&'a self, screen: &'a str) -> impl Iterator<Item = &'a Widget> + 'a {
        self.widgets
            .values()
            .filter(move |w| w.is_clickable() && w.screen == screen)
    }
}
