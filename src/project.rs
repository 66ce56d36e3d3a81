use std::path::{Path, PathBuf};

use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{CanvasState, DEFAULT_GRID_SIZE, Point};
use crate::components::history::{HistoryManager, MAX_UNDO_STEPS};
use crate::components::tools::{Modifiers, ToolState};
use crate::error::{EditError, ProjectError};
use crate::io::{self, Palette};
use crate::ops::canvas_ops;
use crate::ops::filters::{self, Filter};
use crate::ops::macros::{MacroAction, MacroRecorder};
use crate::ops::transform::{self, FlipAxis};

/// Single open document: the layer stack plus its history, tool state and
/// macros.  Every edit made through a `Project` marks it dirty.
pub struct Project {
    pub id: Uuid,
    pub canvas_state: CanvasState,
    pub history: HistoryManager,
    pub tools: ToolState,
    pub macros: MacroRecorder,
    pub palette: Palette,
    /// `None` for unsaved/untitled files.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Default for Project {
    fn default() -> Self {
        Self::new_untitled(1, DEFAULT_GRID_SIZE)
    }
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, grid_size: u32) -> Self {
        Self::with_canvas(
            format!("Untitled-{}", untitled_counter),
            None,
            CanvasState::new(grid_size),
        )
    }

    pub fn from_file(path: PathBuf, canvas_state: CanvasState) -> Self {
        let name = display_name(&path);
        Self::with_canvas(name, Some(path), canvas_state)
    }

    fn with_canvas(name: String, path: Option<PathBuf>, canvas_state: CanvasState) -> Self {
        let mut history = HistoryManager::new(MAX_UNDO_STEPS);
        history.push(&canvas_state, "Baseline");
        Self {
            id: Uuid::new_v4(),
            canvas_state,
            history,
            tools: ToolState::default(),
            macros: MacroRecorder::new(),
            palette: Palette::default(),
            path,
            is_dirty: false,
            name,
        }
    }

    /// Open a `.gpx` / `.json` project.
    pub fn open(path: &Path) -> Result<Self, ProjectError> {
        let state = io::load_project(path)?;
        Ok(Self::from_file(path.to_path_buf(), state))
    }

    /// Save to the current path.  Untitled projects need [`Project::save_as`].
    pub fn save(&mut self) -> Result<(), ProjectError> {
        let Some(path) = self.path.clone() else {
            return Err(ProjectError::InvalidFormat("Project has no file path".into()));
        };
        self.save_as(&path)
    }

    /// Save and adopt `path`.  The encoding follows the extension.
    pub fn save_as(&mut self, path: &Path) -> Result<(), ProjectError> {
        io::save_project(&self.canvas_state, path)?;
        self.path = Some(path.to_path_buf());
        self.update_name_from_path();
        self.mark_clean();
        Ok(())
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub fn update_name_from_path(&mut self) {
        if let Some(ref path) = self.path {
            self.name = display_name(path);
        }
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }

    // ---- pointer input ------------------------------------------------------

    pub fn press(&mut self, pos: Point, mods: Modifiers) -> Result<(), EditError> {
        self.tools.press(
            &mut self.canvas_state,
            &mut self.history,
            &mut self.macros,
            pos,
            mods,
        )?;
        self.is_dirty = true;
        Ok(())
    }

    pub fn drag(&mut self, pos: Point, mods: Modifiers) {
        self.tools
            .drag(&mut self.canvas_state, &mut self.macros, pos, mods);
    }

    pub fn release(&mut self, pos: Point, mods: Modifiers) {
        self.tools
            .release(&mut self.canvas_state, &mut self.macros, pos, mods);
    }

    /// Press, drag through `path`, release at its last point.
    pub fn stroke(&mut self, path: &[Point], mods: Modifiers) -> Result<(), EditError> {
        let Some((&first, rest)) = path.split_first() else {
            return Ok(());
        };
        self.press(first, mods)?;
        for &p in rest {
            self.drag(p, mods);
        }
        self.release(path.last().copied().unwrap_or(first), mods);
        Ok(())
    }

    pub fn finish_polygon(&mut self, mods: Modifiers) -> Result<(), EditError> {
        self.tools.finish_polygon(
            &mut self.canvas_state,
            &mut self.history,
            &mut self.macros,
            mods,
        )?;
        self.is_dirty = true;
        Ok(())
    }

    // ---- history ------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo(&mut self.canvas_state);
        self.is_dirty |= changed;
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo(&mut self.canvas_state);
        self.is_dirty |= changed;
        changed
    }

    // ---- layers -------------------------------------------------------------

    pub fn add_layer(&mut self, name: &str) -> usize {
        self.is_dirty = true;
        canvas_ops::add_layer(&mut self.canvas_state, &mut self.history, name)
    }

    pub fn remove_layer(&mut self, index: usize) -> bool {
        let removed = canvas_ops::remove_layer(&mut self.canvas_state, &mut self.history, index);
        self.is_dirty |= removed;
        removed
    }

    pub fn clear_layer(&mut self) {
        canvas_ops::clear_layer(&mut self.canvas_state, &mut self.history);
        self.is_dirty = true;
    }

    pub fn reset_all(&mut self) {
        canvas_ops::reset_all(&mut self.canvas_state, &mut self.history);
        self.tools.polygon_points.clear();
        self.is_dirty = true;
    }

    pub fn merge_selected(&mut self) -> Result<usize, EditError> {
        let idx = canvas_ops::merge_selected(&mut self.canvas_state, &mut self.history)?;
        self.is_dirty = true;
        Ok(idx)
    }

    /// Make `index` the current layer.  Not an edit, so history and the
    /// dirty flag are left alone.
    pub fn select_layer(&mut self, index: usize) -> bool {
        self.canvas_state.select_layer(index)
    }

    pub fn set_selected(&mut self, index: usize, selected: bool) -> bool {
        self.canvas_state.set_selected(index, selected)
    }

    pub fn toggle_selected(&mut self, index: usize) -> bool {
        self.canvas_state.toggle_selected(index)
    }

    pub fn set_visible(&mut self, index: usize, visible: bool) -> bool {
        let changed = self
            .canvas_state
            .layers
            .get(index)
            .is_some_and(|l| l.visible != visible);
        let ok = canvas_ops::set_visible(&mut self.canvas_state, &mut self.history, index, visible);
        self.is_dirty |= changed;
        ok
    }

    pub fn toggle_visibility(&mut self, index: usize) -> bool {
        let toggled = canvas_ops::toggle_visibility(&mut self.canvas_state, &mut self.history, index);
        self.is_dirty |= toggled;
        toggled
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> bool {
        let ok = canvas_ops::set_opacity(&mut self.canvas_state, &mut self.history, index, opacity);
        self.is_dirty |= ok;
        ok
    }

    pub fn rename_layer(&mut self, index: usize, name: &str) -> bool {
        let ok = canvas_ops::rename_layer(&mut self.canvas_state, &mut self.history, index, name);
        self.is_dirty |= ok;
        ok
    }

    // ---- transforms / filters -----------------------------------------------

    pub fn flip(&mut self, axis: FlipAxis) {
        transform::flip(&mut self.canvas_state, &mut self.history, axis);
        self.macros.record(MacroAction::Flip { axis });
        self.is_dirty = true;
    }

    pub fn preview_rotation(&mut self, angle: f32, mods: Modifiers) {
        self.tools
            .preview_rotation(&mut self.canvas_state, angle, mods);
    }

    pub fn commit_rotation(&mut self) -> bool {
        let applied = self.tools.commit_rotation(
            &mut self.canvas_state,
            &mut self.history,
            &mut self.macros,
        );
        self.is_dirty |= applied;
        applied
    }

    pub fn cancel_rotation(&mut self) {
        self.tools.cancel_rotation(&mut self.canvas_state);
    }

    pub fn quick_rotate(&mut self, angle: f32) -> bool {
        let applied = self.tools.quick_rotate(
            &mut self.canvas_state,
            &mut self.history,
            &mut self.macros,
            angle,
        );
        self.is_dirty |= applied;
        applied
    }

    pub fn resize_grid(&mut self, grid_size: u32) -> bool {
        let resized = transform::resize_grid(&mut self.canvas_state, &mut self.history, grid_size);
        if resized {
            self.tools.polygon_points.clear();
            self.is_dirty = true;
        }
        resized
    }

    pub fn apply_filter(&mut self, filter: Filter) {
        filters::apply_filter(&mut self.canvas_state, &mut self.history, filter);
        self.macros.record(MacroAction::Filter { filter });
        self.is_dirty = true;
    }

    // ---- macros -------------------------------------------------------------

    pub fn play_macro(&mut self, name: &str) -> Result<usize, EditError> {
        let applied = self
            .macros
            .play(name, &mut self.canvas_state, &mut self.history)?;
        self.is_dirty = true;
        Ok(applied)
    }

    // ---- images -------------------------------------------------------------

    pub fn import_image(&mut self, img: &RgbaImage) {
        io::import_image(&mut self.canvas_state, &mut self.history, img);
        self.is_dirty = true;
    }

    pub fn export_png_image(&self, transparent: bool, size: u32) -> RgbaImage {
        io::export_png_image(&self.canvas_state, transparent, size)
    }

    pub fn export_icon_image(&self) -> RgbaImage {
        io::export_icon_image(&self.canvas_state)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
