use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::info;

use crate::error::TransferError;
use crate::event::event_model::TargetEvent;
use crate::graph::nav_graph::NavGraph;
use crate::widget::widget_db::WidgetDb;
use crate::widget::widget_model::Widget;

pub const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Fitness
// ============================================================================

/// Mean of the GUI-event mean and the oracle-event mean, each category
/// counted only when non-empty. `None` for an empty sequence.
pub fn fitness(events: &[TargetEvent]) -> Option<f64> {
    fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    let (oracle, gui): (Vec<&TargetEvent>, Vec<&TargetEvent>) =
        events.iter().partition(|e| e.is_oracle());
    let gui: Vec<f64> = gui.iter().map(|e| e.sim_score).collect();
    let oracle: Vec<f64> = oracle.iter().map(|e| e.sim_score).collect();

    let categories: Vec<f64> = [mean(&gui), mean(&oracle)].into_iter().flatten().collect();
    mean(&categories)
}

// ============================================================================
// Run state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Fitness improved by less than the threshold; previous round kept
    NoImprovement,
    TimeBudget,
    Perfect,
}

/// Per-session progress through the source events and across rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    pub src_index: usize,
    pub tgt_events: Vec<TargetEvent>,
    pub prev_tgt_events: Vec<TargetEvent>,
    pub prev_fitness: f64,
    pub fitness: f64,
    pub rounds: usize,
    /// Target events rejected per source index
    pub invalid_events: BTreeMap<usize, Vec<TargetEvent>>,
    /// Known-bad path signatures for the candidate list being tried
    pub invalid_paths: HashSet<String>,
    pub is_backtrack: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            src_index: 0,
            tgt_events: Vec::new(),
            prev_tgt_events: Vec::new(),
            prev_fitness: -1.0,
            fitness: 0.0,
            rounds: 0,
            invalid_events: BTreeMap::new(),
            invalid_paths: HashSet::new(),
            is_backtrack: false,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-round progress, keeping the last round's events for
    /// comparison.
    pub fn begin_round(&mut self) {
        self.prev_tgt_events = std::mem::take(&mut self.tgt_events);
        self.src_index = 0;
        self.is_backtrack = false;
    }

    pub fn commit(&mut self, event: TargetEvent) {
        self.tgt_events.push(event);
        self.src_index += 1;
    }

    /// Score the finished round.
    pub fn finish_round(&mut self) {
        self.prev_fitness = self.fitness;
        // An empty round has no defined fitness; count it as no progress.
        self.fitness = fitness(&self.tgt_events).unwrap_or(self.prev_fitness);
        self.rounds += 1;
        info!(
            "Round {} finished. Fitness: {:.4} (previous {:.4})",
            self.rounds, self.fitness, self.prev_fitness
        );
    }

    /// Decide whether another round is worth running. On
    /// `NoImprovement` the previous round's events are restored.
    pub fn check_termination(
        &mut self,
        elapsed: Duration,
        budget: Duration,
        threshold: f64,
    ) -> Option<Termination> {
        if self.fitness < self.prev_fitness || self.fitness - self.prev_fitness < threshold {
            // The first round has nothing earlier to fall back on.
            if self.rounds > 1 {
                self.fitness = self.prev_fitness;
                self.tgt_events = self.prev_tgt_events.clone();
            }
            info!("No improvement. Terminated.");
            return Some(Termination::NoImprovement);
        }
        if elapsed > budget {
            info!("Time out. Terminated.");
            return Some(Termination::TimeBudget);
        }
        if self.fitness >= 1.0 {
            info!("Reached the best result. Stop.");
            return Some(Termination::Perfect);
        }
        None
    }

    /// Undo the most recent match: step back one source event and remember
    /// the popped target event as invalid there.
    pub fn backtrack(&mut self) -> Result<(), TransferError> {
        if self.src_index == 0 {
            return Err(TransferError::CannotBacktrack);
        }
        let Some(popped) = self.tgt_events.pop() else {
            return Err(TransferError::CannotBacktrack);
        };
        self.src_index -= 1;
        info!(
            "Backtrack to source event #{}; {} marked invalid",
            self.src_index,
            popped.widget.signature()
        );
        self.invalid_events
            .entry(self.src_index)
            .or_default()
            .push(popped);
        self.is_backtrack = true;
        Ok(())
    }

    /// Whether `widget` was already rejected for source event `index`.
    pub fn is_invalid(&self, index: usize, widget: &Widget) -> bool {
        self.invalid_events
            .get(&index)
            .is_some_and(|invalid| invalid.iter().any(|e| e.widget.is_equal(widget)))
    }
}

// ============================================================================
// Session context
// ============================================================================

/// Everything one exploration session owns besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub widgets: WidgetDb,
    pub graph: NavGraph,
    pub run: RunState,
}

impl SessionContext {
    pub fn new(widgets: WidgetDb, graph: NavGraph) -> Self {
        Self {
            widgets,
            graph,
            run: RunState::new(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(SnapshotPayload {
            widgets: self.widgets.clone(),
            graph: self.graph.clone(),
            invalid_events: self.run.invalid_events.clone(),
            tgt_events: self.run.tgt_events.clone(),
            prev_tgt_events: self.run.prev_tgt_events.clone(),
            prev_fitness: self.run.prev_fitness,
            fitness: self.run.fitness,
            rounds: self.run.rounds,
        })
    }

    /// Rebuild a context from a snapshot. Source events are supplied afresh
    /// by the caller.
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        let p = snapshot.payload;
        Self {
            widgets: p.widgets,
            graph: p.graph,
            run: RunState {
                tgt_events: p.tgt_events,
                prev_tgt_events: p.prev_tgt_events,
                prev_fitness: p.prev_fitness,
                fitness: p.fitness,
                rounds: p.rounds,
                invalid_events: p.invalid_events,
                ..RunState::new()
            },
        }
    }
}

// ============================================================================
// Snapshot schema
// ============================================================================

/// The persisted fields. Driver and extractor handles, source events and
/// per-candidate path bookkeeping are deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub widgets: WidgetDb,
    pub graph: NavGraph,
    pub invalid_events: BTreeMap<usize, Vec<TargetEvent>>,
    pub tgt_events: Vec<TargetEvent>,
    pub prev_tgt_events: Vec<TargetEvent>,
    pub prev_fitness: f64,
    pub fitness: f64,
    #[serde(default)]
    pub rounds: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    /// SHA-1 of the serialized payload
    pub checksum: String,
    pub payload: SnapshotPayload,
}

fn payload_checksum(payload: &SnapshotPayload) -> Result<String, TransferError> {
    let canonical =
        serde_json::to_string(payload).map_err(|e| TransferError::json("snapshot payload", e))?;
    let mut hasher = Sha1::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

impl SessionSnapshot {
    fn new(payload: SnapshotPayload) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            checksum: String::new(),
            payload,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), TransferError> {
        let sealed = Self {
            checksum: payload_checksum(&self.payload)?,
            ..self.clone()
        };
        let json = serde_json::to_string_pretty(&sealed)
            .map_err(|e| TransferError::json("snapshot", e))?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| TransferError::io(dir.display().to_string(), e))?;
        }
        fs::write(path, json).map_err(|e| TransferError::io(path.display().to_string(), e))?;
        info!("Snapshot saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TransferError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| TransferError::io(path.display().to_string(), e))?;
        let snapshot: Self = serde_json::from_str(&raw)
            .map_err(|e| TransferError::json(path.display().to_string(), e))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TransferError::Snapshot(format!(
                "unsupported version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        let expected = payload_checksum(&snapshot.payload)?;
        if snapshot.checksum != expected {
            return Err(TransferError::Snapshot(format!(
                "checksum mismatch in {}",
                path.display()
            )));
        }
        Ok(snapshot)
    }
}
