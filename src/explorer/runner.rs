use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::driver::{Command, Driver, Locator, ResolvedBy, resolve_widget};
use crate::error::{ReplayError, TransferError};
use crate::event::event_model::{EventAction, TargetEvent};
use crate::graph::nav_graph::{EdgeKind, EdgeLabel, LocatorKind, NavGraph};
use crate::widget::hierarchy::UiHierarchy;
use crate::widget::widget_model::Widget;

/// Typed into a field to submit it through the keyboard instead.
const KEY_ENTER: &str = "KEY_ENTER";

// ============================================================================
// Post-action delays
// ============================================================================

/// Extra settle time after acting on matching widgets (e.g. a list that
/// loads lazily after its tab is opened).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayRule {
    pub class: String,

    /// Attribute name -> regex the widget's value must match
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,

    /// Milliseconds to wait; unset means the driver's default wait
    #[serde(default)]
    pub millis: Option<u64>,
}

struct CompiledDelay {
    class: String,
    attrs: Vec<(String, Regex)>,
    wait: Option<Duration>,
}

fn widget_attr<'a>(widget: &'a Widget, key: &str) -> Option<&'a str> {
    match key {
        "class" => Some(widget.class.as_str()),
        "resource-id" => Some(widget.resource_id.as_str()),
        "text" => Some(widget.text.as_str()),
        "content-desc" => Some(widget.content_desc.as_str()),
        "parent_text" => Some(widget.parent_text.as_str()),
        "sibling_text" => Some(widget.sibling_text.as_str()),
        "screen" => Some(widget.screen.as_str()),
        "package" => Some(widget.package.as_str()),
        _ => None,
    }
}

// ============================================================================
// Runner
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    /// How long element lookups wait during replay
    pub default_wait: Duration,
    pub delays: Vec<DelayRule>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_millis(7000),
            delays: Vec::new(),
        }
    }
}

/// Replays target events on a live application.
pub struct Runner {
    default_wait: Duration,
    delays: Vec<CompiledDelay>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            default_wait: RunnerSettings::default().default_wait,
            delays: Vec::new(),
        }
    }
}

impl Runner {
    pub fn new(settings: &RunnerSettings) -> Result<Self, TransferError> {
        let mut delays = Vec::with_capacity(settings.delays.len());
        for rule in &settings.delays {
            let mut attrs = Vec::with_capacity(rule.attrs.len());
            for (key, pattern) in &rule.attrs {
                let re = Regex::new(pattern).map_err(|e| {
                    TransferError::Config(format!("delay pattern '{}' for {}: {}", pattern, key, e))
                })?;
                attrs.push((key.clone(), re));
            }
            delays.push(CompiledDelay {
                class: rule.class.clone(),
                attrs,
                wait: rule.millis.map(Duration::from_millis),
            });
        }
        Ok(Self {
            default_wait: settings.default_wait,
            delays,
        })
    }

    pub fn default_wait(&self) -> Duration {
        self.default_wait
    }

    /// Execute events in order, each preceded by its stepping events.
    /// Every click records the navigation edge it caused.
    pub fn execute<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        events: &[TargetEvent],
        graph: &mut NavGraph,
    ) -> Result<(), ReplayError> {
        for event in events {
            for step in &event.steppings {
                self.execute_one(driver, step, graph)?;
            }
            self.execute_one(driver, event, graph)?;
        }
        Ok(())
    }

    /// Execute only the event itself, without its steppings.
    pub fn execute_single<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        event: &TargetEvent,
        graph: &mut NavGraph,
    ) -> Result<(), ReplayError> {
        self.execute_one(driver, event, graph)
    }

    fn execute_one<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        event: &TargetEvent,
        graph: &mut NavGraph,
    ) -> Result<(), ReplayError> {
        if event.is_placeholder() {
            return Ok(());
        }
        debug!("Executing {} on {}", event.action, event.widget.signature());
        driver.hide_keyboard()?;

        match event.action {
            EventAction::TextPresent => {
                let text = event.action_args.join(" ");
                let element = driver
                    .find_element(&Locator::text_contains(&text), self.default_wait)?
                    .ok_or_else(|| ReplayError::ElementNotFound(format!("text '{}'", text)))?;
                if !driver.is_displayed(&element)? {
                    return Err(ReplayError::AssertionFailed(format!(
                        "text '{}' is not displayed",
                        text
                    )));
                }
                return Ok(());
            }
            EventAction::TextNotPresent => {
                let text = event.action_args.join(" ");
                let source = driver.page_source()?;
                let tree = UiHierarchy::parse(&source).map_err(ReplayError::Hierarchy)?;
                if tree.contains_text(&text) {
                    return Err(ReplayError::AssertionFailed(format!(
                        "text '{}' is present",
                        text
                    )));
                }
                return Ok(());
            }
            EventAction::MoveToElement => return Ok(()),
            _ => {}
        }

        let (element, resolved_by) = resolve_widget(driver, &event.widget, self.default_wait)?
            .ok_or_else(|| ReplayError::ElementNotFound(describe(&event.widget)))?;

        match event.action {
            EventAction::IsDisplayed => {
                if !driver.is_displayed(&element)? {
                    return Err(ReplayError::AssertionFailed(format!(
                        "{} is not displayed",
                        describe(&event.widget)
                    )));
                }
                return Ok(());
            }
            EventAction::IsAttrEqual => {
                let expected = match event.action_args.as_slice() {
                    [attr, value, ..] if attr == "text" => value,
                    _ => {
                        return Err(ReplayError::AssertionFailed(
                            "is_attr_equal expects [\"text\", value]".into(),
                        ));
                    }
                };
                let actual = driver.element_text(&element)?;
                if actual != *expected {
                    return Err(ReplayError::AssertionFailed(format!(
                        "text of {} is '{}', expected '{}'",
                        describe(&event.widget),
                        actual,
                        expected
                    )));
                }
                return Ok(());
            }
            EventAction::Clear => driver.perform(&element, &Command::Clear)?,
            EventAction::Click => {
                let from = driver.current_screen()?;
                driver.perform(&element, &Command::Click)?;
                let to = driver.current_screen()?;
                if let Some(label) = click_label(&event.widget, resolved_by) {
                    graph.add_edge(&from, &to, &label.to_string());
                }
            }
            EventAction::SendKeys => {
                let text = event.action_args.first().ok_or_else(|| {
                    ReplayError::AssertionFailed("send_keys without text".into())
                })?;
                let command = if text == KEY_ENTER {
                    Command::PressEnter
                } else {
                    Command::SendKeys(text.clone())
                };
                driver.perform(&element, &command)?;
            }
            _ => {}
        }

        self.settle(&event.widget);
        Ok(())
    }

    fn settle(&self, widget: &Widget) {
        let rule = self.delays.iter().find(|rule| {
            rule.class == widget.class
                && rule.attrs.iter().all(|(key, re)| {
                    widget_attr(widget, key).is_some_and(|value| re.is_match(value))
                })
        });
        if let Some(rule) = rule {
            let wait = rule.wait.unwrap_or(self.default_wait);
            info!("Waiting {:?} for {} to settle", wait, describe(widget));
            thread::sleep(wait);
        }
    }
}

/// Edge label for a click on `widget`, by the attribute that found it.
pub fn click_label(widget: &Widget, resolved_by: ResolvedBy) -> Option<EdgeLabel> {
    if !widget.resource_id.is_empty() && resolved_by == ResolvedBy::ResourceId {
        Some(EdgeLabel::new(EdgeKind::Gui, LocatorKind::Id, &widget.resource_id, "click"))
    } else if !widget.text.is_empty() {
        Some(EdgeLabel::new(EdgeKind::Gui, LocatorKind::Text, &widget.text, "click"))
    } else if !widget.content_desc.is_empty() {
        Some(EdgeLabel::new(
            EdgeKind::Gui,
            LocatorKind::ContentDesc,
            &widget.content_desc,
            "click",
        ))
    } else {
        None
    }
}

pub fn describe(widget: &Widget) -> String {
    let mut parts = vec![widget.class.clone()];
    for value in [&widget.resource_id, &widget.text, &widget.content_desc] {
        if !value.is_empty() {
            parts.push(format!("'{}'", value));
        }
    }
    parts.join(" ")
}
