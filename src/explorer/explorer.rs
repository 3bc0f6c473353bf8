use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info};

use crate::driver::{Driver, resolve_widget};
use crate::error::{ReplayError, TransferError};
use crate::event::event_model::{EventAction, SourceEvent, TargetEvent};
use crate::rank::oracle::SimilarityOracle;
use crate::rank::ranker::{Candidate, DEFAULT_TOP, sort_candidates};
use crate::trace::logger::TraceLogger;
use crate::trace::trace::TraceEvent;
use crate::widget::clickability::ClickabilityRules;
use crate::widget::hierarchy::UiHierarchy;
use crate::widget::widget_model::Widget;

use super::runner::Runner;
use super::session::{SessionContext, Termination};

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorerState {
    Matching,
    Backtrack,
    Lookahead,
    RoundDone,
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferSettings {
    pub use_stopwords: bool,
    pub top_candidates: usize,
    /// Paths tried per candidate
    pub max_paths: usize,
    /// Minimum fitness gain for another round
    pub fitness_threshold: f64,
    pub time_budget: Duration,
    /// Wait used when probing whether a widget is on screen right now
    pub probe_wait: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            use_stopwords: true,
            top_candidates: DEFAULT_TOP,
            max_paths: 10,
            fitness_threshold: 0.005,
            time_budget: Duration::from_secs(30 * 60),
            probe_wait: Duration::from_millis(500),
        }
    }
}

/// Which screens belong to the application under transfer.
#[derive(Debug, Clone)]
pub struct AppScope {
    pub package: String,
    excluded_screens: Vec<Regex>,
}

impl AppScope {
    pub fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            excluded_screens: Vec::new(),
        }
    }

    /// Screens matching any of `patterns` are treated as outside the app
    /// even when the package matches.
    pub fn excluding(mut self, patterns: &[String]) -> Result<Self, TransferError> {
        for pattern in patterns {
            let re = Regex::new(pattern).map_err(|e| {
                TransferError::Config(format!("out-of-scope pattern '{}': {}", pattern, e))
            })?;
            self.excluded_screens.push(re);
        }
        Ok(self)
    }

    pub fn contains(&self, package: &str, screen: &str) -> bool {
        package == self.package && !self.excluded_screens.iter().any(|re| re.is_match(screen))
    }
}

struct Observation {
    package: String,
    screen: String,
    in_scope: bool,
}

// ============================================================================
// Explorer
// ============================================================================

/// Transfers a source test to the target application, one source event at
/// a time, over repeated rounds until fitness stops improving.
pub struct Explorer<D: Driver, O: SimilarityOracle> {
    pub(crate) driver: D,
    pub(crate) oracle: O,
    pub(crate) runner: Runner,
    pub(crate) settings: TransferSettings,
    pub(crate) rules: ClickabilityRules,
    pub(crate) ctx: SessionContext,
    scope: AppScope,
    src_events: Vec<SourceEvent>,
    trace: TraceLogger,
    snapshot_path: Option<PathBuf>,
    state: ExplorerState,
}

impl<D: Driver, O: SimilarityOracle> Explorer<D, O> {
    pub fn new(driver: D, oracle: O, src_events: Vec<SourceEvent>, scope: AppScope) -> Self {
        Self {
            driver,
            oracle,
            runner: Runner::default(),
            settings: TransferSettings::default(),
            rules: ClickabilityRules::default(),
            ctx: SessionContext::default(),
            scope,
            src_events,
            trace: TraceLogger::disabled(),
            snapshot_path: None,
            state: ExplorerState::Matching,
        }
    }

    pub fn with_context(mut self, ctx: SessionContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn with_settings(mut self, settings: TransferSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_rules(mut self, rules: ClickabilityRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_trace(mut self, trace: TraceLogger) -> Self {
        self.trace = trace;
        self
    }

    /// Write a session snapshot to `path` after every round.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn state(&self) -> ExplorerState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn target_events(&self) -> &[TargetEvent] {
        &self.ctx.run.tgt_events
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_context(self) -> SessionContext {
        self.ctx
    }

    /// Run rounds until termination.
    pub fn run(&mut self) -> Result<Termination, TransferError> {
        let started = Instant::now();
        loop {
            let termination = self.ctx.run.check_termination(
                started.elapsed(),
                self.settings.time_budget,
                self.settings.fitness_threshold,
            );
            if let Some(termination) = termination {
                self.state = ExplorerState::Terminated;
                self.trace_decision(format!("{:?}", termination), None, None);
                return Ok(termination);
            }

            info!("** Start round {} **", self.ctx.run.rounds + 1);
            self.ctx.run.begin_round();
            self.driver.restart()?;
            self.run_round()?;
            self.ctx.run.finish_round();

            self.state = ExplorerState::RoundDone;
            self.trace_decision(
                "round finished",
                Some(self.ctx.run.fitness),
                Some(format!("{} target events", self.ctx.run.tgt_events.len())),
            );
            if let Some(path) = &self.snapshot_path {
                self.ctx.snapshot().save(path)?;
            }
        }
    }

    fn run_round(&mut self) -> Result<(), TransferError> {
        let mut after_lookahead = false;

        while self.ctx.run.src_index < self.src_events.len() {
            self.state = ExplorerState::Matching;
            let idx = self.ctx.run.src_index;

            let outcome = match self.match_current(after_lookahead) {
                Ok(Some(event)) => {
                    self.trace_decision(
                        "matched",
                        Some(event.sim_score),
                        Some(event.widget.signature()),
                    );
                    self.ctx.run.commit(event);
                    after_lookahead = false;
                    Ok(())
                }
                Ok(None) if !after_lookahead => {
                    self.state = ExplorerState::Lookahead;
                    self.trace_decision("lookahead", None, None);
                    after_lookahead = true;
                    self.lookahead()
                }
                Ok(None) => {
                    info!("No match for source event #{}; emitting an empty event", idx);
                    self.trace_suppressed("no reachable candidate");
                    self.ctx
                        .run
                        .commit(TargetEvent::empty(self.src_events[idx].action));
                    after_lookahead = false;
                    Ok(())
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {}
                Err(TransferError::Replay(e)) => {
                    info!("Replay failed: {}", e);
                    self.state = ExplorerState::Backtrack;
                    self.trace_decision("backtrack", None, Some(e.to_string()));
                    self.ctx.run.backtrack()?;
                    after_lookahead = false;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Steps 1-4 for the current source event: sync the app, observe,
    /// and pick a target event.
    fn match_current(&mut self, after_lookahead: bool) -> Result<Option<TargetEvent>, TransferError> {
        let idx = self.ctx.run.src_index;
        let src = self.src_events[idx].clone();
        info!(
            "Source event ({}/{}): {} {}",
            idx + 1,
            self.src_events.len(),
            src.action,
            src.text
        );

        if self.ctx.run.is_backtrack || after_lookahead {
            self.replay_all()?;
            self.ctx.run.is_backtrack = false;
        } else {
            self.replay_last()?;
        }

        let seen = self.observe()?;
        if !seen.in_scope {
            return Err(ReplayError::OutOfScope(format!("{} ({})", seen.screen, seen.package)).into());
        }

        if src.is_placeholder() {
            return Ok(Some(TargetEvent::empty(src.action)));
        }
        if let Some(event) = self.reuse_previous(idx) {
            info!("Reusing the previous is_displayed target for this click");
            return Ok(Some(event));
        }
        if src.action == EventAction::TextNotPresent {
            let absent = TargetEvent::new(Widget::default(), src.action);
            if self.ctx.run.is_invalid(idx, &absent.widget) {
                debug!("Absence check already failed for source event #{}", idx);
                return Ok(None);
            }
            return Ok(Some(generate_event(absent, &src)));
        }

        let candidates = sort_candidates(
            &src,
            self.ctx.widgets.iter(),
            &self.oracle,
            self.settings.use_stopwords,
            self.settings.top_candidates,
        );
        let candidates = self.prioritize(candidates, &src, &seen.screen)?;

        self.ctx.run.invalid_paths.clear();
        for candidate in candidates {
            if self.ctx.run.is_invalid(idx, &candidate.widget) {
                debug!("Skipping invalid candidate {}", candidate.widget.signature());
                continue;
            }
            info!(
                "Trying candidate ({:.3}): {}",
                candidate.score,
                candidate.widget.signature()
            );
            let Some(found) = self.check_reachability(&candidate.widget, &src, &seen.screen)?
            else {
                continue;
            };
            if candidate.widget.is_static() {
                self.ctx.widgets.remove(&candidate.widget);
            }
            return Ok(Some(generate_event(found, &src)));
        }
        Ok(None)
    }

    /// A click on the element a preceding is_displayed check already found,
    /// unless that click was already rejected here.
    fn reuse_previous(&self, idx: usize) -> Option<TargetEvent> {
        let prev_idx = idx.checked_sub(1)?;
        let src = &self.src_events[idx];
        let prev = &self.src_events[prev_idx];
        if prev.is_placeholder()
            || prev.action != EventAction::IsDisplayed
            || src.action != EventAction::Click
            || !src.same_target_as(prev)
        {
            return None;
        }
        let previous = self.ctx.run.tgt_events.get(prev_idx)?;
        if previous.is_placeholder() || self.ctx.run.is_invalid(idx, &previous.widget) {
            return None;
        }
        let mut event = previous.clone();
        event.action = src.action;
        event.action_args = src.action_args.clone();
        // The check already brought the element on screen.
        event.steppings.clear();
        Some(event)
    }

    /// Among candidates tied at the top score, put the ones on screen now
    /// first, and among those the ones whose class matches the source tag.
    fn prioritize(
        &mut self,
        mut candidates: Vec<Candidate>,
        src: &SourceEvent,
        current_screen: &str,
    ) -> Result<Vec<Candidate>, TransferError> {
        let Some(top) = candidates.first().map(|c| c.score) else {
            return Ok(candidates);
        };
        let tied = candidates.iter().take_while(|c| c.score == top).count();
        if tied <= 1 {
            return Ok(candidates);
        }

        let rest = candidates.split_off(tied);
        let mut on_screen = Vec::new();
        let mut off_screen = Vec::new();
        for candidate in candidates {
            let present = candidate.widget.screen == current_screen
                && resolve_widget(&mut self.driver, &candidate.widget, self.settings.probe_wait)?
                    .is_some();
            if present {
                on_screen.push(candidate);
            } else {
                off_screen.push(candidate);
            }
        }

        if !src.tag.is_empty() {
            let tag = src.tag.to_lowercase();
            let (same, other): (Vec<Candidate>, Vec<Candidate>) = on_screen
                .into_iter()
                .partition(|c| c.widget.short_class().to_lowercase() == tag);
            on_screen = same;
            on_screen.extend(other);
        }

        on_screen.extend(off_screen);
        on_screen.extend(rest);
        Ok(on_screen)
    }

    /// Click every clickable widget on the current screen once, replaying
    /// back to the committed state in between, to grow the widget database
    /// and the navigation graph.
    fn lookahead(&mut self) -> Result<(), TransferError> {
        self.replay_all()?;
        let screen = self.driver.current_screen()?;

        let known: Vec<Widget> = self.ctx.widgets.clickables_on(&screen).cloned().collect();
        let mut clickables = Vec::new();
        for widget in known {
            if resolve_widget(&mut self.driver, &widget, self.settings.probe_wait)?.is_some() {
                clickables.push(widget);
            }
        }
        info!("Lookahead: {} clickable widget(s) on {}", clickables.len(), screen);

        for widget in clickables {
            self.replay_all()?;
            let event = TargetEvent::new(widget, EventAction::Click);
            match self
                .runner
                .execute_single(&mut self.driver, &event, &mut self.ctx.graph)
            {
                Ok(()) => {
                    self.update_widgets()?;
                }
                Err(ReplayError::ElementNotFound(what)) => {
                    debug!("Lookahead skipped {}: not found", what);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    // ========================================================================
    // Live application helpers
    // ========================================================================

    /// Read the foreground screen and merge its widgets into the database.
    fn observe(&mut self) -> Result<Observation, TransferError> {
        let package = self.driver.current_package()?;
        let screen = self.driver.current_screen()?;
        self.ctx.graph.add_node(&screen);

        let in_scope = self.scope.contains(&package, &screen);
        if in_scope {
            let source = self.driver.page_source()?;
            let tree = UiHierarchy::parse(&source).map_err(TransferError::Hierarchy)?;
            self.ctx
                .widgets
                .merge_observed(tree.widgets(&package, &screen, &self.rules));
        } else {
            debug!("{} ({}) is out of scope", screen, package);
        }
        Ok(Observation {
            package,
            screen,
            in_scope,
        })
    }

    pub(crate) fn update_widgets(&mut self) -> Result<(), TransferError> {
        self.observe()?;
        Ok(())
    }

    /// Restart the application and replay every committed event.
    pub(crate) fn replay_all(&mut self) -> Result<(), TransferError> {
        self.driver.restart()?;
        self.runner
            .execute(&mut self.driver, &self.ctx.run.tgt_events, &mut self.ctx.graph)?;
        Ok(())
    }

    /// Execute the latest committed event; its steppings ran while it was
    /// being validated.
    fn replay_last(&mut self) -> Result<(), TransferError> {
        if let Some(last) = self.ctx.run.tgt_events.last() {
            self.runner
                .execute_single(&mut self.driver, last, &mut self.ctx.graph)?;
        }
        Ok(())
    }

    // ========================================================================
    // Trace
    // ========================================================================

    fn trace_decision(&self, decision: impl ToString, score: Option<f64>, detail: Option<String>) {
        let mut event = TraceEvent::now(self.ctx.run.rounds, self.ctx.run.src_index, &self.state)
            .with_decision(decision);
        if let Some(score) = score {
            event = event.with_score(score);
        }
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        self.trace.log(&event);
    }

    fn trace_suppressed(&self, reason: &str) {
        let event = TraceEvent::now(self.ctx.run.rounds, self.ctx.run.src_index, &self.state)
            .with_decision("empty event")
            .with_suppression(reason);
        self.trace.log(&event);
    }
}

/// Turn a validated match into the target event for `src`.
pub fn generate_event(mut found: TargetEvent, src: &SourceEvent) -> TargetEvent {
    found.action = src.action;
    found.action_args = match src.action {
        EventAction::TextPresent | EventAction::TextNotPresent => vec![src.text.clone()],
        EventAction::IsAttrEqual => vec!["text".to_string(), found.widget.text.clone()],
        _ => src.action_args.clone(),
    };
    if src.action == EventAction::TextNotPresent {
        found.sim_score = 0.0;
    }
    found
}

/// Write the committed target events as a pretty-printed JSON array to
/// `<dir>/<test_name>.json`.
pub fn save_target_events(
    dir: &Path,
    test_name: &str,
    events: &[TargetEvent],
) -> Result<PathBuf, TransferError> {
    fs::create_dir_all(dir).map_err(|e| TransferError::io(dir.display().to_string(), e))?;
    let path = dir.join(format!("{}.json", test_name));
    let json =
        serde_json::to_string_pretty(events).map_err(|e| TransferError::json("target events", e))?;
    fs::write(&path, json).map_err(|e| TransferError::io(path.display().to_string(), e))?;
    info!("Target events saved to {}", path.display());
    Ok(path)
}
