use std::collections::VecDeque;

use crate::canvas::{Buffer, CanvasState, Layer, VirtualCanvas};

/// Default number of retained undo steps.
pub const MAX_UNDO_STEPS: usize = 100;

// ============================================================================
// SNAPSHOTS: full deep copies of the layer stack
// ============================================================================

/// A complete, independent copy of the canvas state at one point in time.
///
/// Buffers are cloned, never shared, so later edits to live layers cannot
/// reach a stored snapshot.
#[derive(Clone, Debug)]
pub struct CanvasSnapshot {
    pub description: String,
    pub geometry: VirtualCanvas,
    pub layers: Vec<LayerSnapshot>,
    pub active_layer_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerSnapshot {
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub pixels: Buffer,
}

impl CanvasSnapshot {
    pub fn capture(state: &CanvasState, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            geometry: state.geometry,
            active_layer_index: state.active_layer_index,
            layers: state
                .layers
                .iter()
                .map(|l| LayerSnapshot {
                    name: l.name.clone(),
                    visible: l.visible,
                    opacity: l.opacity,
                    pixels: l.pixels.clone(),
                })
                .collect(),
        }
    }

    /// Replace the live layer stack with a copy of this snapshot.
    pub fn restore_into(&self, state: &mut CanvasState) {
        state.geometry = self.geometry;
        state.layers = self
            .layers
            .iter()
            .map(|snap| {
                let mut layer = Layer::new(snap.name.clone(), snap.pixels.clone());
                layer.visible = snap.visible;
                layer.opacity = snap.opacity;
                layer
            })
            .collect();
        state.active_layer_index = self.active_layer_index.min(state.layers.len().saturating_sub(1));
        state.clear_preview_state();
    }

    /// Same geometry, same layer count, and every layer's name, visibility,
    /// opacity and pixels equal.  The current-layer index is ignored.
    fn matches_state(&self, state: &CanvasState) -> bool {
        self.geometry == state.geometry
            && self.layers.len() == state.layers.len()
            && self.layers.iter().zip(&state.layers).all(|(snap, layer)| {
                snap.name == layer.name
                    && snap.visible == layer.visible
                    && snap.opacity == layer.opacity
                    && snap.pixels == layer.pixels
            })
    }

    pub fn memory_size(&self) -> usize {
        self.layers.iter().map(|l| l.pixels.memory_bytes()).sum()
    }
}

// ============================================================================
// HISTORY MANAGER
// ============================================================================

/// Snapshot-based undo/redo.
///
/// Every mutating operation pushes the state it is about to change.  The
/// oldest entry is a baseline that is never undone, so the canvas is never
/// historyless.  Each snapshot's description names the operation that
/// followed it.
pub struct HistoryManager {
    undo_stack: VecDeque<CanvasSnapshot>,
    redo_stack: Vec<CanvasSnapshot>,
    max_history_size: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(MAX_UNDO_STEPS)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_history_size: max_history_size.max(1),
        }
    }

    /// Record the current state.  Call before every mutating operation.
    ///
    /// Returns `false` (and changes nothing) when the state is identical to
    /// the top of the undo stack.  Otherwise the oldest entry is evicted if
    /// the stack is full, the snapshot is appended and the redo stack is
    /// cleared.
    pub fn push(&mut self, state: &CanvasState, description: impl Into<String>) -> bool {
        if let Some(top) = self.undo_stack.back()
            && top.matches_state(state)
        {
            return false;
        }

        while self.undo_stack.len() >= self.max_history_size {
            self.undo_stack.pop_front();
        }
        self.undo_stack
            .push_back(CanvasSnapshot::capture(state, description));
        self.redo_stack.clear();
        true
    }

    /// Step back one entry, restoring the state captured before the most
    /// recent edit.  Returns `false` when only the baseline remains.
    ///
    /// Edits since the last push are recorded first so that an immediate
    /// `redo` lands on exactly the state this call started from.
    pub fn undo(&mut self, state: &mut CanvasState) -> bool {
        let redo_backup = std::mem::take(&mut self.redo_stack);
        if !self.push(state, "Current state") {
            self.redo_stack = redo_backup;
        }
        if self.undo_stack.len() <= 1 {
            return false;
        }
        let Some(top) = self.undo_stack.pop_back() else {
            return false;
        };
        self.redo_stack.push(top);
        if let Some(previous) = self.undo_stack.back() {
            previous.restore_into(state);
        }
        true
    }

    /// Reapply the most recently undone entry.  Returns `false` when the redo
    /// stack is empty.
    pub fn redo(&mut self, state: &mut CanvasState) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        snapshot.restore_into(state);
        self.undo_stack.push_back(snapshot);
        true
    }

    /// True if `undo` would change something for `state`.
    pub fn can_undo(&self, state: &CanvasState) -> bool {
        self.undo_stack.len() > 1
            || self
                .undo_stack
                .back()
                .is_some_and(|top| !top.matches_state(state))
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get all undo descriptions (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|s| s.description.clone()).collect()
    }

    /// Bytes of pixel data held by both stacks.
    pub fn memory_usage(&self) -> usize {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .map(|s| s.memory_size())
            .sum()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Change the capacity, evicting the oldest entries if necessary.
    pub fn set_max_history_size(&mut self, max: usize) {
        self.max_history_size = max.max(1);
        while self.undo_stack.len() > self.max_history_size {
            self.undo_stack.pop_front();
        }
    }
}
