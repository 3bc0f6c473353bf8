use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::TransferError;
use crate::event::event_model::{EventAction, SourceEvent, TargetEvent};
use crate::graph::nav_graph::{EdgeKind, EdgeLabel, LocatorKind, Path};
use crate::rank::oracle::SimilarityOracle;
use crate::rank::similarity::similarity;
use crate::widget::hierarchy::{LocatorAttr, UiHierarchy};
use crate::widget::widget_model::Widget;

use super::explorer::Explorer;

/// Description of the overflow ("three dots") menu button.
const MORE_OPTIONS: &str = "More options";

/// Outcome of following one path towards a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    /// The candidate was resolved on the reached screen
    Found(TargetEvent),
    /// The path was followed but the candidate is not on the reached screen
    NotFound,
    /// A step could not be taken; the path (or a prefix of it) is bad
    Invalid,
}

/// A path outcome plus how many steps actually touched the application.
#[derive(Debug)]
pub(crate) struct PathOutcome {
    pub result: MatchResult,
    pub executed: usize,
}

impl PathOutcome {
    fn pruned() -> Self {
        Self {
            result: MatchResult::Invalid,
            executed: 0,
        }
    }
}

fn locator_attr(kind: LocatorKind) -> LocatorAttr {
    match kind {
        LocatorKind::Id => LocatorAttr::ResourceId,
        LocatorKind::Text => LocatorAttr::Text,
        LocatorKind::ContentDesc => LocatorAttr::ContentDesc,
    }
}

/// Locators for the candidate itself. A text-present check looks for the
/// literal source text rather than whatever the candidate happened to show.
fn candidate_locators(target: &Widget, src: &SourceEvent) -> Vec<(LocatorAttr, String)> {
    let text = if src.action == EventAction::TextPresent {
        &src.text
    } else {
        &target.text
    };
    [
        (LocatorAttr::ResourceId, &target.resource_id),
        (LocatorAttr::Text, text),
        (LocatorAttr::ContentDesc, &target.content_desc),
        (LocatorAttr::Class, &target.class),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(attr, value)| (attr, value.clone()))
    .collect()
}

impl<D: Driver, O: SimilarityOracle> Explorer<D, O> {
    /// Try the shortest paths from `current_screen` to the candidate's screen
    /// until one of them ends with the candidate on screen.
    pub(crate) fn check_reachability(
        &mut self,
        target: &Widget,
        src: &SourceEvent,
        current_screen: &str,
    ) -> Result<Option<TargetEvent>, TransferError> {
        let paths = self.ctx.graph.paths_between(current_screen, &target.screen);
        debug!(
            "{} path(s) from {} to {}",
            paths.len(),
            current_screen,
            target.screen
        );

        for path in paths.iter().take(self.settings.max_paths) {
            info!("Validating path: {}", path);
            let outcome = self.validate_path(path, target, src)?;
            match outcome.result {
                MatchResult::Found(event) => return Ok(Some(event)),
                MatchResult::NotFound | MatchResult::Invalid => {
                    if outcome.executed > 0 {
                        self.replay_all()?;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Follow `path` on the live application and look for `target` at its
    /// end. Bad prefixes are remembered so later candidates skip them.
    pub(crate) fn validate_path(
        &mut self,
        path: &Path,
        target: &Widget,
        src: &SourceEvent,
    ) -> Result<PathOutcome, TransferError> {
        let signature = path.signature();
        if self.ctx.run.invalid_paths.contains(&signature) {
            debug!("Path already known to be invalid: {}", path);
            return Ok(PathOutcome::pruned());
        }
        if (1..path.len()).any(|n| self.ctx.run.invalid_paths.contains(&path.prefix_signature(n))) {
            debug!("Path has an invalid prefix: {}", path);
            self.ctx.run.invalid_paths.insert(signature);
            return Ok(PathOutcome::pruned());
        }

        let mut steppings = Vec::new();
        let mut executed = 0;

        for (i, step) in path.steps.iter().enumerate() {
            let Some(label) = &step.label else {
                continue;
            };
            let taken = match EdgeLabel::parse(label) {
                Some(edge) => self.take_step(&edge, &mut steppings, &mut executed)?,
                None => false,
            };
            if !taken {
                info!("Step {} of path could not be taken: {}", i, label);
                self.ctx.run.invalid_paths.insert(path.prefix_signature(i + 1));
                return Ok(PathOutcome {
                    result: MatchResult::Invalid,
                    executed,
                });
            }
        }

        if target.menu_group == Some(true) {
            self.open_overflow(&mut steppings, &mut executed)?;
        }

        let locators = candidate_locators(target, src);
        if locators.is_empty() {
            return Ok(PathOutcome {
                result: MatchResult::NotFound,
                executed,
            });
        }

        let source = self.driver.page_source()?;
        let tree = UiHierarchy::parse(&source).map_err(TransferError::Hierarchy)?;
        let Some(found) = tree.locate(&locators, &self.rules) else {
            return Ok(PathOutcome {
                result: MatchResult::NotFound,
                executed,
            });
        };

        let package = self.driver.current_package()?;
        let screen = self.driver.current_screen()?;
        let found = found.on_screen(&package, &screen);
        let score = similarity(src, &found, &self.oracle, self.settings.use_stopwords);

        let mut event = TargetEvent::new(found, src.action).with_score(score);
        event.steppings = steppings;
        Ok(PathOutcome {
            result: MatchResult::Found(event),
            executed,
        })
    }

    /// Resolve and perform one labeled edge. `false` when its widget is not
    /// on screen or the action is not replayable.
    fn take_step(
        &mut self,
        edge: &EdgeLabel,
        steppings: &mut Vec<TargetEvent>,
        executed: &mut usize,
    ) -> Result<bool, TransferError> {
        let action = match edge.action.as_str() {
            "click" => EventAction::Click,
            other => {
                debug!("Unsupported edge action '{}'", other);
                return Ok(false);
            }
        };
        if edge.kind == EdgeKind::OptionMenu {
            self.open_overflow(steppings, executed)?;
        }

        let source = self.driver.page_source()?;
        let tree = UiHierarchy::parse(&source).map_err(TransferError::Hierarchy)?;
        let locators = [(locator_attr(edge.locator), edge.value.clone())];
        let Some(widget) = tree.locate(&locators, &self.rules) else {
            return Ok(false);
        };
        self.run_stepping(widget, action, steppings, executed)
    }

    /// Open the overflow menu if its button is on screen.
    fn open_overflow(
        &mut self,
        steppings: &mut Vec<TargetEvent>,
        executed: &mut usize,
    ) -> Result<(), TransferError> {
        let source = self.driver.page_source()?;
        let tree = UiHierarchy::parse(&source).map_err(TransferError::Hierarchy)?;
        let locators = [(LocatorAttr::ContentDesc, MORE_OPTIONS.to_string())];
        if let Some(button) = tree.locate(&locators, &self.rules) {
            self.run_stepping(button, EventAction::Click, steppings, executed)?;
        }
        Ok(())
    }

    /// Perform `action` on `widget` as a stepping event and absorb the
    /// screen it leads to.
    fn run_stepping(
        &mut self,
        widget: Widget,
        action: EventAction,
        steppings: &mut Vec<TargetEvent>,
        executed: &mut usize,
    ) -> Result<bool, TransferError> {
        let package = self.driver.current_package()?;
        let screen = self.driver.current_screen()?;
        let event = TargetEvent::new(widget.on_screen(&package, &screen), action);

        *executed += 1;
        if let Err(e) = self
            .runner
            .execute_single(&mut self.driver, &event, &mut self.ctx.graph)
        {
            info!("Stepping failed: {}", e);
            return Ok(false);
        }
        steppings.push(event);
        self.update_widgets()?;
        Ok(true)
    }
}
