use gridpaint::canvas::{BLACK, DEFAULT_GRID_SIZE, MAX_GRID_SIZE, WHITE};
use gridpaint::components::history::MAX_UNDO_STEPS;
use gridpaint::project::Project;
use gridpaint::settings::{AppSettings, WindowGeometry};
use image::Rgba;
use pretty_assertions::assert_eq;
use uuid::Uuid;

#[test]
pub fn test_defaults() {
    let s = AppSettings::default();
    assert_eq!(s.grid_size, DEFAULT_GRID_SIZE);
    assert!(s.show_grid);
    assert!(!s.blur_mode);
    assert_eq!(s.pen_width, 1);
    assert_eq!(s.primary_color, BLACK);
    assert_eq!(s.secondary_color, WHITE);
    assert_eq!(s.max_undo_steps, MAX_UNDO_STEPS);
    assert_eq!(s.window_geometry, None);
}

#[test]
pub fn test_config_string_round_trip() {
    let s = AppSettings {
        grid_size: 48,
        show_grid: false,
        blur_mode: true,
        pen_width: 7,
        primary_color: Rgba([1, 2, 3, 4]),
        secondary_color: Rgba([250, 251, 252, 255]),
        max_undo_steps: 30,
        window_geometry: Some(WindowGeometry {
            x: -10,
            y: 20,
            width: 800,
            height: 600,
        }),
    };
    let text = s.to_config_string();
    assert!(text.contains("primary_color=#01020304"));
    assert_eq!(AppSettings::from_config_str(&text), s);
}

#[test]
pub fn test_parse_clamps_and_ignores_garbage() {
    let s = AppSettings::from_config_str(
        "grid_size=500\n\
         pen_width=0\n\
         primary_color=#f00\n\
         secondary_color=bogus\n\
         window_geometry=1,2,3\n\
         unknown_key=1\n\
         no equals sign here\n",
    );
    assert_eq!(s.grid_size, MAX_GRID_SIZE);
    assert_eq!(s.pen_width, 1);
    assert_eq!(s.primary_color, Rgba([255, 0, 0, 255]));
    assert_eq!(s.secondary_color, WHITE);
    assert_eq!(s.window_geometry, None);
}

#[test]
pub fn test_missing_file_gives_defaults() {
    let path = std::env::temp_dir().join(format!("gridpaint-missing-{}.cfg", Uuid::new_v4()));
    assert_eq!(AppSettings::load_from(&path), AppSettings::default());
}

#[test]
pub fn test_file_round_trip() {
    let dir = std::env::temp_dir().join(format!("gridpaint-settings-{}", Uuid::new_v4()));
    let path = dir.join("gridpaint_settings.cfg");
    let s = AppSettings {
        grid_size: 20,
        ..AppSettings::default()
    };
    s.save_to(&path).expect("save");
    assert_eq!(AppSettings::load_from(&path), s);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
pub fn test_apply_and_capture() {
    let mut project = Project::new_untitled(1, 16);
    let s = AppSettings {
        grid_size: 24,
        blur_mode: true,
        pen_width: 5,
        primary_color: Rgba([9, 9, 9, 255]),
        max_undo_steps: 12,
        ..AppSettings::default()
    };
    s.apply_to(&mut project);
    assert_eq!(project.canvas_state.grid_size(), 24);
    assert!(project.tools.soft);
    assert_eq!(project.tools.pen_width(), 5);
    assert_eq!(project.history.max_history_size(), 12);

    let mut captured = AppSettings::default();
    captured.capture_from(&project);
    assert_eq!(captured.grid_size, 24);
    assert_eq!(captured.pen_width, 5);
    assert_eq!(captured.primary_color, Rgba([9, 9, 9, 255]));
    assert_eq!(captured.max_undo_steps, 12);
}
