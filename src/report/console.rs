use crate::event::event_model::{SourceEvent, TargetEvent};
use crate::explorer::runner::describe;
use crate::explorer::session::Termination;
use crate::graph::nav_graph::Path;
use crate::rank::ranker::Candidate;

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// What a finished transfer session produced.
#[derive(Debug, Clone)]
pub struct TransferSummary<'a> {
    pub test_name: &'a str,
    pub source: &'a [SourceEvent],
    pub target: &'a [TargetEvent],
    pub termination: Termination,
    pub fitness: f64,
    pub rounds: usize,
}

/// Format a transfer session for terminal output.
///
/// Produces output like:
/// ```text
/// === Transfer: login_test ===
///
/// ✓ #1 click        android.widget.Button 'login' (0.812)
///       via android.widget.ImageButton 'Open navigation'
/// ✗ #2 text_present  no match
///
/// === Fitness 0.4060 after 2 rounds (NoImprovement): 1 matched, 1 empty (2 total) ===
/// ```
pub fn format_transfer_report(summary: &TransferSummary<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Transfer: {} ===\n\n", summary.test_name));

    let mut matched = 0;
    for (i, event) in summary.target.iter().enumerate() {
        let action = summary
            .source
            .get(i)
            .map(|s| s.action)
            .unwrap_or(event.action);

        if event.is_placeholder() {
            out.push_str(&format!("\u{2717} #{} {:<14} no match\n", i + 1, action));
            continue;
        }
        matched += 1;
        out.push_str(&format!(
            "\u{2713} #{} {:<14} {} ({:.3})\n",
            i + 1,
            action,
            describe(&event.widget),
            event.sim_score
        ));
        for step in &event.steppings {
            out.push_str(&format!("      via {}\n", describe(&step.widget)));
        }
    }

    let total = summary.target.len();
    out.push_str(&format!(
        "\n=== Fitness {:.4} after {} rounds ({:?}): {} matched, {} empty ({} total) ===\n",
        summary.fitness,
        summary.rounds,
        summary.termination,
        matched,
        total - matched,
        total
    ));
    out
}

/// Ranked candidates for one source event.
pub fn format_ranking(src: &SourceEvent, candidates: &[Candidate]) -> String {
    let mut out = format!("=== Candidates for {} '{}' ===\n", src.action, src.text);
    if candidates.is_empty() {
        out.push_str("(none)\n");
    }
    for (i, c) in candidates.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {:.4}  {}  [{}]\n",
            i + 1,
            c.score,
            describe(&c.widget),
            c.widget.screen
        ));
    }
    out
}

pub fn format_paths(from: &str, to: &str, paths: &[Path]) -> String {
    let mut out = format!("=== {} path(s) from {} to {} ===\n", paths.len(), from, to);
    for path in paths {
        out.push_str(&format!("{}\n", path));
    }
    out
}
