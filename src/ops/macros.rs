// ============================================================================
// MACROS: record and replay tool invocations
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canvas::{CanvasState, Point};
use crate::components::history::HistoryManager;
use crate::components::tools::Modifiers;
use crate::error::EditError;
use crate::ops::draw::{self, Brush, ShapeKind};
use crate::ops::filters::Filter;
use crate::ops::transform::{self, FlipAxis};

/// One recorded call.  Positions are visible-grid coordinates, so a macro
/// replays the same way on any grid size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MacroAction {
    Plot {
        pos: Point,
        brush: Brush,
    },
    Stroke {
        from: Point,
        to: Point,
        brush: Brush,
    },
    Shape {
        kind: ShapeKind,
        anchor: Point,
        end: Point,
        brush: Brush,
        modifiers: Modifiers,
    },
    Polygon {
        vertices: Vec<Point>,
        brush: Brush,
        filled: bool,
    },
    Fill {
        pos: Point,
        color: [u8; 4],
    },
    Erase {
        pos: Point,
        brush: Brush,
    },
    Move {
        dx: i32,
        dy: i32,
    },
    Rotate {
        angle: f32,
    },
    Flip {
        axis: FlipAxis,
    },
    Filter {
        filter: Filter,
    },
}

impl MacroAction {
    /// Apply to the current layer.  History is the caller's business.
    pub fn apply(&self, state: &mut CanvasState) {
        let geom = state.geometry;
        match self {
            MacroAction::Plot { pos, brush } => {
                draw::plot_pixel(&mut state.active_layer_mut().pixels, &geom, brush, *pos)
            }
            MacroAction::Stroke { from, to, brush } => {
                draw::draw_line(&mut state.active_layer_mut().pixels, &geom, brush, *from, *to)
            }
            MacroAction::Shape {
                kind,
                anchor,
                end,
                brush,
                modifiers,
            } => draw::draw_shape(
                &mut state.active_layer_mut().pixels,
                &geom,
                brush,
                *kind,
                *anchor,
                *end,
                modifiers.shift,
            ),
            MacroAction::Polygon {
                vertices,
                brush,
                filled,
            } => {
                let backing: Vec<Point> = vertices.iter().map(|&p| geom.to_backing(p)).collect();
                draw::draw_polygon(&mut state.active_layer_mut().pixels, brush, &backing, *filled);
            }
            MacroAction::Fill { pos, color } => {
                draw::flood_fill(
                    &mut state.active_layer_mut().pixels,
                    &geom,
                    *pos,
                    image::Rgba(*color),
                );
            }
            MacroAction::Erase { pos, brush } => {
                draw::erase(&mut state.active_layer_mut().pixels, &geom, brush, *pos)
            }
            MacroAction::Move { dx, dy } => {
                let layer = state.active_layer_mut();
                layer.pixels = transform::translated(&layer.pixels, *dx, *dy);
            }
            MacroAction::Rotate { angle } => transform::rotate_active_layer(state, *angle),
            MacroAction::Flip { axis } => transform::flip_active_layer(state, *axis),
            MacroAction::Filter { filter } => filter.apply_to_layer(state),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording {
        name: String,
        actions: Vec<MacroAction>,
    },
}

/// Named macros plus the recording state machine.  At most one macro is
/// being recorded at a time.
#[derive(Clone, Debug, Default)]
pub struct MacroRecorder {
    state: RecorderState,
    macros: BTreeMap<String, Vec<MacroAction>>,
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording under `name`.  A recording already in progress is
    /// discarded.
    pub fn start_recording(&mut self, name: impl Into<String>) {
        let name = name.into();
        if let RecorderState::Recording { name: previous, .. } = &self.state {
            crate::log_warn!("Discarding unfinished macro recording '{previous}'");
        }
        crate::log_info!("Recording macro '{name}'");
        self.state = RecorderState::Recording {
            name,
            actions: Vec::new(),
        };
    }

    /// Append an action.  Ignored unless recording.
    pub fn record(&mut self, action: MacroAction) {
        if let RecorderState::Recording { actions, .. } = &mut self.state {
            actions.push(action);
        }
    }

    /// Finish recording and store the actions under the recording's name,
    /// replacing any macro of that name.  Returns the stored name.
    pub fn stop_recording(&mut self) -> Option<String> {
        match std::mem::take(&mut self.state) {
            RecorderState::Recording { name, actions } => {
                crate::log_info!("Stored macro '{name}' ({} actions)", actions.len());
                self.macros.insert(name.clone(), actions);
                Some(name)
            }
            RecorderState::Idle => None,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    /// Replay `name` against the current layer.  One history entry covers
    /// the whole replay.  Returns the number of actions applied.
    pub fn play(
        &self,
        name: &str,
        state: &mut CanvasState,
        history: &mut HistoryManager,
    ) -> Result<usize, EditError> {
        let actions = self
            .macros
            .get(name)
            .ok_or_else(|| EditError::NoSuchMacro(name.to_string()))?;
        if !state.active_layer().visible {
            crate::log_warn!("Macro '{name}' refused: current layer is hidden");
            return Err(EditError::LayerHidden);
        }
        history.push(state, format!("Play Macro '{name}'"));
        for action in actions {
            action.apply(state);
        }
        crate::log_info!("Played macro '{name}' ({} actions)", actions.len());
        Ok(actions.len())
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.macros.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&[MacroAction]> {
        self.macros.get(name).map(Vec::as_slice)
    }

    /// Macro names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.macros.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// All macros as a pretty-printed JSON object `{name: [actions...]}`.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.macros)
    }

    /// Merge macros from JSON, replacing same-named ones.  Returns how many
    /// were imported.  Nothing changes if the document is invalid.
    pub fn import_json(&mut self, json: &str) -> Result<usize, serde_json::Error> {
        let imported: BTreeMap<String, Vec<MacroAction>> = serde_json::from_str(json)?;
        let count = imported.len();
        self.macros.extend(imported);
        Ok(count)
    }
}
