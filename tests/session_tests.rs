use std::fs;
use std::time::Duration;

use proptest::prelude::*;

use ui_transfer::error::TransferError;
use ui_transfer::event::event_model::{EventAction, TargetEvent};
use ui_transfer::explorer::session::{
    RunState, SNAPSHOT_VERSION, SessionContext, SessionSnapshot, Termination, fitness,
};
use ui_transfer::graph::nav_graph::NavGraph;
use ui_transfer::widget::widget_db::WidgetDb;

use crate::common::{button, scored, text_view};

mod common;

const BUDGET: Duration = Duration::from_secs(1800);
const THRESHOLD: f64 = 0.005;

fn click(rid: &str, score: f64) -> TargetEvent {
    scored(button(rid, rid), EventAction::Click, score)
}

fn check(text: &str, score: f64) -> TargetEvent {
    scored(text_view(text), EventAction::TextPresent, score)
}

fn run_with(events: Vec<TargetEvent>) -> RunState {
    let mut run = RunState::new();
    for e in events {
        run.commit(e);
    }
    run
}

/// One finished round whose events score exactly `target` fitness.
fn finish_round_at(run: &mut RunState, target: f64) {
    run.begin_round();
    run.commit(click("a", target));
    run.finish_round();
}

// ============================================================================
// Backtracking
// ============================================================================

#[test]
fn backtrack_pops_last_event_as_invalid() {
    let mut run = run_with(vec![click("a", 0.9), click("b", 0.8), click("c", 0.7)]);
    run.src_index = 2;
    run.backtrack().unwrap();

    assert_eq!(run.tgt_events.len(), 2);
    assert_eq!(run.src_index, 1);
    assert!(run.is_backtrack);
    assert_eq!(run.invalid_events[&1].len(), 1);
    assert_eq!(run.invalid_events[&1][0].widget.resource_id, "c");
}

#[test]
fn backtrack_from_three_commits_keeps_two() {
    let mut run = run_with(vec![click("a", 0.9), click("b", 0.8), click("c", 0.7)]);
    run.backtrack().unwrap();

    assert_eq!(run.tgt_events.len(), 2);
    assert_eq!(run.src_index, 2);
    assert!(run.is_backtrack);
    assert_eq!(run.invalid_events[&2].len(), 1);
    assert!(run.is_invalid(2, &button("c", "c")));
    assert!(!run.is_invalid(1, &button("c", "c")));
}

#[test]
fn backtrack_at_first_event_fails() {
    let mut run = RunState::new();
    assert!(matches!(run.backtrack(), Err(TransferError::CannotBacktrack)));
}

#[test]
fn begin_round_keeps_previous_events() {
    let mut run = run_with(vec![click("a", 0.9)]);
    run.is_backtrack = true;
    run.begin_round();

    assert!(run.tgt_events.is_empty());
    assert_eq!(run.prev_tgt_events.len(), 1);
    assert_eq!(run.src_index, 0);
    assert!(!run.is_backtrack);
}

// ============================================================================
// Fitness and termination
// ============================================================================

#[test]
fn fitness_averages_gui_and_oracle_means() {
    let events = vec![click("a", 1.0), click("b", 0.5), check("Done", 0.25)];
    assert_eq!(fitness(&events), Some(0.5));

    assert_eq!(fitness(&[click("a", 0.4)]), Some(0.4));
    assert_eq!(fitness(&[]), None);
}

#[test]
fn small_gain_reverts_to_previous_round() {
    let mut run = RunState::new();
    finish_round_at(&mut run, 0.80);
    assert_eq!(run.check_termination(Duration::ZERO, BUDGET, THRESHOLD), None);
    let first_round = run.tgt_events.clone();

    finish_round_at(&mut run, 0.803);
    let termination = run.check_termination(Duration::ZERO, BUDGET, THRESHOLD);

    assert_eq!(termination, Some(Termination::NoImprovement));
    assert_eq!(run.tgt_events, first_round);
    assert_eq!(run.fitness, 0.80);
}

#[test]
fn first_round_without_gain_keeps_its_events() {
    let mut run = RunState::new();
    run.prev_fitness = 0.5;
    run.fitness = 0.5;
    run.commit(click("a", 0.1));
    run.finish_round();

    assert_eq!(
        run.check_termination(Duration::ZERO, BUDGET, THRESHOLD),
        Some(Termination::NoImprovement)
    );
    assert_eq!(run.tgt_events.len(), 1);
}

#[test]
fn budget_and_perfect_score_terminate() {
    let mut run = RunState::new();
    finish_round_at(&mut run, 0.6);
    assert_eq!(
        run.check_termination(BUDGET + Duration::from_secs(1), BUDGET, THRESHOLD),
        Some(Termination::TimeBudget)
    );

    let mut run = RunState::new();
    finish_round_at(&mut run, 1.0);
    assert_eq!(
        run.check_termination(Duration::ZERO, BUDGET, THRESHOLD),
        Some(Termination::Perfect)
    );
}

#[test]
fn empty_round_counts_as_no_progress() {
    let mut run = RunState::new();
    finish_round_at(&mut run, 0.7);
    run.begin_round();
    run.finish_round();
    assert_eq!(run.fitness, 0.7);
    assert_eq!(run.rounds, 2);
}

proptest! {
    #[test]
    fn fitness_stays_within_score_range(
        scores in prop::collection::vec((0.0f64..=1.0, any::<bool>()), 1..20)
    ) {
        let events: Vec<TargetEvent> = scores
            .iter()
            .map(|(s, oracle)| if *oracle { check("t", *s) } else { click("c", *s) })
            .collect();
        let f = fitness(&events).unwrap();
        prop_assert!((0.0..=1.0).contains(&f));
    }
}

// ============================================================================
// Snapshots
// ============================================================================

fn sample_context() -> SessionContext {
    let mut graph = NavGraph::new();
    graph.add_edge("com.demo.Main", "com.demo.Detail", "GUI:ID:open:CLICK");
    let mut ctx = SessionContext::new(WidgetDb::seeded(vec![button("open", "Open")]), graph);
    ctx.run.commit(click("open", 0.8333333333333334));
    ctx.run.commit(check("Details", 1.0 / 3.0));
    ctx.run.finish_round();
    ctx.run.backtrack().unwrap();
    ctx
}

#[test]
fn snapshot_restores_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");
    let ctx = sample_context();

    ctx.snapshot().save(&path).unwrap();
    let loaded = SessionSnapshot::load(&path).unwrap();
    assert_eq!(loaded.version, SNAPSHOT_VERSION);
    assert_eq!(loaded.checksum.len(), 40);

    let restored = SessionContext::restore(loaded);
    assert_eq!(restored.widgets, ctx.widgets);
    assert_eq!(restored.graph, ctx.graph);
    assert_eq!(restored.run.tgt_events, ctx.run.tgt_events);
    assert_eq!(restored.run.invalid_events, ctx.run.invalid_events);
    assert_eq!(restored.run.fitness, ctx.run.fitness);
    assert_eq!(restored.run.rounds, 1);
    // Per-round progress is not persisted
    assert_eq!(restored.run.src_index, 0);
    assert!(!restored.run.is_backtrack);
}

#[test]
fn tampered_snapshot_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    sample_context().snapshot().save(&path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    fs::write(&path, raw.replace("\"rounds\": 1", "\"rounds\": 7")).unwrap();

    assert!(matches!(
        SessionSnapshot::load(&path),
        Err(TransferError::Snapshot(_))
    ));
}

#[test]
fn unknown_snapshot_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    sample_context().snapshot().save(&path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    fs::write(&path, raw.replacen("\"version\": 1", "\"version\": 99", 1)).unwrap();

    let err = SessionSnapshot::load(&path).unwrap_err();
    assert!(err.to_string().contains("unsupported version 99"));
}
