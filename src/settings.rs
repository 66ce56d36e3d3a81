// ============================================================================
// APP SETTINGS: persisted user preferences
// ============================================================================

use std::path::{Path, PathBuf};

use crate::canvas::{BLACK, DEFAULT_GRID_SIZE, MAX_GRID_SIZE, MIN_GRID_SIZE, Pixel, WHITE};
use crate::components::history::MAX_UNDO_STEPS;
use crate::components::tools::{MAX_PEN_WIDTH, MIN_PEN_WIDTH};
use crate::io::{Palette, parse_hex_color};
use crate::project::Project;

/// Saved window position and size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// User preferences, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub grid_size: u32,
    pub show_grid: bool,
    pub blur_mode: bool,
    pub pen_width: u32,
    pub primary_color: Pixel,
    pub secondary_color: Pixel,
    pub max_undo_steps: usize,
    pub window_geometry: Option<WindowGeometry>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            show_grid: true,
            blur_mode: false,
            pen_width: 1,
            primary_color: BLACK,
            secondary_color: WHITE,
            max_undo_steps: MAX_UNDO_STEPS,
            window_geometry: None,
        }
    }
}

impl AppSettings {
    /// Directory holding the settings and palette files.
    /// On Linux:   ~/.config/gridpaint  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\GridPaint
    /// On macOS:   ~/Library/Application Support/GridPaint
    /// Fallback:   same directory as the executable.
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("gridpaint");
            return Some(dir);
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("GridPaint"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("GridPaint"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(Path::to_path_buf))
        }
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("gridpaint_settings.cfg"))
    }

    pub fn palette_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("gridpaint_palette.json"))
    }

    // ---- project bridge -----------------------------------------------------

    /// Push these preferences into an open project.  A different grid size
    /// resizes the canvas (an undoable step).
    pub fn apply_to(&self, project: &mut Project) {
        let tools = &mut project.tools;
        tools.soft = self.blur_mode;
        tools.set_pen_width(self.pen_width);
        tools.primary_color = self.primary_color;
        tools.secondary_color = self.secondary_color;
        project.history.set_max_history_size(self.max_undo_steps);
        if project.canvas_state.grid_size() != self.grid_size {
            project.resize_grid(self.grid_size);
        }
    }

    /// Read the current preferences back out of a project.
    pub fn capture_from(&mut self, project: &Project) {
        self.grid_size = project.canvas_state.grid_size();
        self.blur_mode = project.tools.soft;
        self.pen_width = project.tools.pen_width();
        self.primary_color = project.tools.primary_color;
        self.secondary_color = project.tools.secondary_color;
        self.max_undo_steps = project.history.max_history_size();
    }

    // ---- text form ----------------------------------------------------------

    pub fn to_config_string(&self) -> String {
        let mut content = format!(
            "grid_size={}\n\
             show_grid={}\n\
             blur_mode={}\n\
             pen_width={}\n\
             primary_color={}\n\
             secondary_color={}\n\
             max_undo_steps={}\n",
            self.grid_size,
            self.show_grid,
            self.blur_mode,
            self.pen_width,
            Self::color_to_str(self.primary_color),
            Self::color_to_str(self.secondary_color),
            self.max_undo_steps,
        );
        if let Some(g) = self.window_geometry {
            content.push_str(&format!(
                "window_geometry={},{},{},{}\n",
                g.x, g.y, g.width, g.height
            ));
        }
        content
    }

    /// Parse `key=value` lines over the defaults.  Unknown keys and bad
    /// values are ignored; numbers are clamped into their valid ranges.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "grid_size" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.grid_size = v.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
                    }
                }
                "show_grid" => s.show_grid = val == "true",
                "blur_mode" => s.blur_mode = val == "true",
                "pen_width" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.pen_width = v.clamp(MIN_PEN_WIDTH, MAX_PEN_WIDTH);
                    }
                }
                "primary_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.primary_color = c;
                    }
                }
                "secondary_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.secondary_color = c;
                    }
                }
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse::<usize>().unwrap_or(MAX_UNDO_STEPS).max(1);
                }
                "window_geometry" => s.window_geometry = Self::str_to_geometry(val),
                _ => {}
            }
        }
        s
    }

    /// `#RRGGBBAA`
    fn color_to_str(c: Pixel) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", c[0], c[1], c[2], c[3])
    }

    /// Parse `#RRGGBBAA`, falling back to the palette's hex forms.
    fn str_to_color(s: &str) -> Option<Pixel> {
        let hex = s.trim_start_matches('#');
        if hex.len() == 8 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            return Some(image::Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?]));
        }
        parse_hex_color(s).ok()
    }

    fn str_to_geometry(s: &str) -> Option<WindowGeometry> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return None;
        }
        Some(WindowGeometry {
            x: parts[0].parse().ok()?,
            y: parts[1].parse().ok()?,
            width: parts[2].parse().ok()?,
            height: parts[3].parse().ok()?,
        })
    }

    // ---- disk ---------------------------------------------------------------

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Defaults if the file is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the platform config directory.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_err!("Failed to save settings to {}: {e}", path.display());
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// The saved palette, or the default one.
    pub fn load_palette() -> Palette {
        let mut palette = Palette::default();
        if let Some(path) = Self::palette_path()
            && path.exists()
            && let Err(e) = palette.load(&path)
        {
            crate::log_warn!("Ignoring unreadable palette {}: {e}", path.display());
        }
        palette
    }

    pub fn save_palette(palette: &Palette) {
        let Some(path) = Self::palette_path() else { return };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = palette.save(&path) {
            crate::log_err!("Failed to save palette to {}: {e}", path.display());
        }
    }
}
