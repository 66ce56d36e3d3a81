// ============================================================================
// CANVAS-LEVEL OPERATIONS: layer edits with undo snapshots
// ============================================================================
//
// Each mutating operation records a snapshot before it changes anything.
// Refused operations (bad index, last layer, too few selections) leave both
// the canvas and the history untouched.

use crate::canvas::{CanvasState, WHITE};
use crate::components::history::HistoryManager;
use crate::error::EditError;

/// Add a new transparent layer on top of the stack and make it current.
pub fn add_layer(state: &mut CanvasState, history: &mut HistoryManager, name: &str) -> usize {
    history.push(state, format!("Add Layer '{name}'"));
    let idx = state.add_layer(name);
    crate::log_info!("Added layer '{name}' at {idx}");
    idx
}

/// Delete the layer at `index` (must keep at least one layer).
pub fn remove_layer(state: &mut CanvasState, history: &mut HistoryManager, index: usize) -> bool {
    if state.layers.len() <= 1 || index >= state.layers.len() {
        return false;
    }
    history.push(state, format!("Remove Layer '{}'", state.layers[index].name));
    state.remove_layer(index)
}

/// Clear the current layer.  The background layer (index 0) gets its
/// visible window refilled with opaque white.
pub fn clear_layer(state: &mut CanvasState, history: &mut HistoryManager) {
    history.push(state, "Clear Layer");
    let window = state.geometry.visible_region();
    let is_background = state.active_layer_index == 0;
    let layer = state.active_layer_mut();
    layer.pixels.clear();
    if is_background {
        layer.pixels.fill_region(window, WHITE);
    }
}

/// Discard every layer and all history, then start over with a single
/// background layer and a fresh baseline.
pub fn reset_all(state: &mut CanvasState, history: &mut HistoryManager) {
    *state = CanvasState::new(state.grid_size());
    history.clear();
    history.push(state, "Reset");
    crate::log_info!("Canvas reset ({}×{})", state.grid_size(), state.grid_size());
}

pub fn set_visible(
    state: &mut CanvasState,
    history: &mut HistoryManager,
    index: usize,
    visible: bool,
) -> bool {
    let Some(layer) = state.layers.get(index) else {
        return false;
    };
    if layer.visible == visible {
        return true;
    }
    history.push(state, if visible { "Show Layer" } else { "Hide Layer" });
    state.set_visible(index, visible)
}

pub fn toggle_visibility(state: &mut CanvasState, history: &mut HistoryManager, index: usize) -> bool {
    match state.layers.get(index) {
        Some(layer) => {
            let visible = !layer.visible;
            set_visible(state, history, index, visible)
        }
        None => false,
    }
}

/// Set a layer's opacity (clamped to `[0, 1]`).
pub fn set_opacity(
    state: &mut CanvasState,
    history: &mut HistoryManager,
    index: usize,
    opacity: f32,
) -> bool {
    if index >= state.layers.len() {
        return false;
    }
    history.push(state, "Layer Opacity");
    state.set_opacity(index, opacity)
}

pub fn rename_layer(
    state: &mut CanvasState,
    history: &mut HistoryManager,
    index: usize,
    name: &str,
) -> bool {
    if index >= state.layers.len() {
        return false;
    }
    history.push(state, "Rename Layer");
    state.rename_layer(index, name)
}

/// Merge all selected layers.  Fewer than two selections is refused with no
/// history entry.
pub fn merge_selected(state: &mut CanvasState, history: &mut HistoryManager) -> Result<usize, EditError> {
    let selected = state.selected_indices().len();
    if selected < 2 {
        crate::log_warn!("Merge refused: {selected} layer(s) selected");
        return Err(EditError::MergeNeedsTwoLayers { selected });
    }
    history.push(state, "Merge Layers");
    let idx = state.merge_selected()?;
    crate::log_info!("Merged {selected} layers into '{}'", state.layers[idx].name);
    Ok(idx)
}
