use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, Rgba, RgbaImage, imageops};
use serde::{Deserialize, Serialize};

use crate::canvas::{
    Buffer, CanvasState, Layer, MAX_GRID_SIZE, MIN_GRID_SIZE, Pixel, TRANSPARENT, VirtualCanvas,
    WHITE,
};
use crate::components::history::HistoryManager;
use crate::error::{ImageIoError, PaletteError, ProjectError};

// ============================================================================
// GPX PROJECT DOCUMENT
// ============================================================================

/// Magic header for binary project files.
const GPX_MAGIC: &str = "GPX1";
/// Maximum number of layers accepted from a project file.
const MAX_LAYERS: usize = 256;

/// Portable projection of a [`CanvasState`].  Layer pixels are the full
/// backing buffer (not just the visible window) as base64 of row-major RGBA.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub grid_size: u32,
    pub layers: Vec<LayerDocument>,
    pub current_layer: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerDocument {
    pub name: String,
    pub encoded_pixels: String,
    pub visible: bool,
    pub opacity: f32,
}

/// Binary file wrapper: magic + document.
#[derive(Serialize, Deserialize)]
struct GpxFile {
    magic: String,
    document: ProjectDocument,
}

/// Build the serializable document from canvas state.
pub fn serialize(state: &CanvasState) -> ProjectDocument {
    ProjectDocument {
        grid_size: state.grid_size(),
        current_layer: state.active_layer_index,
        layers: state
            .layers
            .iter()
            .map(|layer| LayerDocument {
                name: layer.name.clone(),
                encoded_pixels: BASE64.encode(layer.pixels.as_raw()),
                visible: layer.visible,
                opacity: layer.opacity,
            })
            .collect(),
    }
}

/// Rebuild canvas state from a document.
///
/// The whole document is validated and decoded before anything is
/// returned, so a failed load never leaves a half-built stack behind.
pub fn deserialize(doc: &ProjectDocument) -> Result<CanvasState, ProjectError> {
    if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&doc.grid_size) {
        return Err(ProjectError::InvalidFormat(format!(
            "Grid size {} is outside {}..={}",
            doc.grid_size, MIN_GRID_SIZE, MAX_GRID_SIZE
        )));
    }
    if doc.layers.is_empty() {
        return Err(ProjectError::InvalidFormat("Project has no layers".into()));
    }
    if doc.layers.len() > MAX_LAYERS {
        return Err(ProjectError::InvalidFormat(format!(
            "Project contains {} layers, which exceeds the maximum of {}",
            doc.layers.len(),
            MAX_LAYERS
        )));
    }

    let geometry = VirtualCanvas::new(doc.grid_size);
    let size = geometry.virtual_size();
    let expected_bytes = size as usize * size as usize * 4;

    let mut layers = Vec::with_capacity(doc.layers.len());
    for ld in &doc.layers {
        let raw = BASE64.decode(ld.encoded_pixels.as_bytes())?;
        if raw.len() != expected_bytes {
            return Err(ProjectError::InvalidFormat(format!(
                "Layer '{}' has {} bytes of pixels, expected {}",
                ld.name,
                raw.len(),
                expected_bytes
            )));
        }
        let pixels = Buffer::from_raw_rgba(size, size, raw).ok_or_else(|| {
            ProjectError::InvalidFormat(format!("Failed to rebuild layer '{}'", ld.name))
        })?;
        let mut layer = Layer::new(ld.name.clone(), pixels);
        layer.visible = ld.visible;
        layer.opacity = if ld.opacity.is_finite() {
            ld.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        layers.push(layer);
    }

    Ok(CanvasState::from_layers(geometry, layers, doc.current_layer))
}

/// Pretty-printed JSON encoding.
pub fn to_json(doc: &ProjectDocument) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(doc)?)
}

pub fn from_json(json: &str) -> Result<ProjectDocument, ProjectError> {
    Ok(serde_json::from_str(json)?)
}

/// Binary encoding with the `GPX1` magic.
pub fn to_binary(doc: &ProjectDocument) -> Result<Vec<u8>, ProjectError> {
    let file = GpxFile {
        magic: GPX_MAGIC.to_string(),
        document: doc.clone(),
    };
    Ok(bincode::serialize(&file)?)
}

pub fn from_binary(raw: &[u8]) -> Result<ProjectDocument, ProjectError> {
    if raw.len() < 12 {
        return Err(ProjectError::InvalidFormat("File too small".into()));
    }
    // bincode encodes a String as: 8-byte length prefix + UTF-8 data,
    // so bytes 8..12 hold the magic.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != GPX_MAGIC {
        return Err(ProjectError::InvalidFormat(format!("Unknown magic '{magic}'")));
    }
    let file: GpxFile = bincode::deserialize(raw)?;
    Ok(file.document)
}

/// Save a project.  `.json` paths get JSON, everything else the binary format.
pub fn save_project(state: &CanvasState, path: &Path) -> Result<(), ProjectError> {
    let doc = serialize(state);
    let bytes = if is_json_path(path) {
        to_json(&doc)?.into_bytes()
    } else {
        to_binary(&doc)?
    };
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    crate::log_info!("Saved project to {}", path.display());
    Ok(())
}

/// Load a project, detecting JSON by content.
pub fn load_project(path: &Path) -> Result<CanvasState, ProjectError> {
    let raw = std::fs::read(path)?;
    let doc = if raw.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
        let text = std::str::from_utf8(&raw)
            .map_err(|e| ProjectError::InvalidFormat(format!("Not UTF-8: {e}")))?;
        from_json(text)?
    } else {
        from_binary(&raw)?
    };
    let state = deserialize(&doc)?;
    crate::log_info!(
        "Loaded project {} ({}×{}, {} layers)",
        path.display(),
        state.grid_size(),
        state.grid_size(),
        state.layer_count()
    );
    Ok(state)
}

pub fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

// ============================================================================
// PALETTE
// ============================================================================

/// Number of user palette slots.
pub const USER_PALETTE_SLOTS: usize = 20;

/// Default material palette.
pub const MATERIAL_COLORS: [&str; 32] = [
    "#F44336", "#E91E63", "#9C27B0", "#673AB7", "#3F51B5", "#2196F3", "#03A9F4", "#00BCD4",
    "#009688", "#4CAF50", "#8BC34A", "#CDDC39", "#FFEB3B", "#FFC107", "#FF9800", "#FF5722",
    "#795548", "#9E9E9E", "#607D8B", "#000000", "#FFFFFF", "#FAFAFA", "#F5F5F5", "#EEEEEE",
    "#E0E0E0", "#BDBDBD", "#9E9E9E", "#757575", "#616161", "#424242", "#303030", "#212121",
];

/// Material colors plus user slots.  An empty user slot is transparent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    pub material: Vec<Pixel>,
    pub user: Vec<Pixel>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            material: MATERIAL_COLORS
                .iter()
                .filter_map(|hex| parse_hex_color(hex).ok())
                .collect(),
            user: vec![TRANSPARENT; USER_PALETTE_SLOTS],
        }
    }
}

/// On-disk palette: `{material, user}` or a legacy flat list of colors.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PaletteDocument {
    Legacy(Vec<String>),
    Full {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        material: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<Vec<String>>,
    },
}

impl Palette {
    /// Put `color` into the first empty user slot.  Returns the slot index,
    /// or `None` when every slot is taken.
    pub fn add_user_color(&mut self, color: Pixel) -> Option<usize> {
        let slot = self.user.iter().position(|c| c[3] == 0)?;
        self.user[slot] = color;
        Some(slot)
    }

    pub fn export_json(&self) -> Result<String, PaletteError> {
        let doc = PaletteDocument::Full {
            material: Some(self.material.iter().map(|&c| format_hex_color(c)).collect()),
            user: Some(self.user.iter().map(|&c| format_hex_color(c)).collect()),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Replace colors from a palette document.  A legacy flat array replaces
    /// the material colors only.  Nothing changes if any color is invalid.
    pub fn import_json(&mut self, json: &str) -> Result<(), PaletteError> {
        let parse_all = |list: &[String]| -> Result<Vec<Pixel>, PaletteError> {
            list.iter().map(|s| parse_hex_color(s)).collect()
        };
        match serde_json::from_str::<PaletteDocument>(json)? {
            PaletteDocument::Legacy(colors) => {
                self.material = parse_all(&colors)?;
            }
            PaletteDocument::Full { material, user } => {
                let material = material.as_deref().map(parse_all).transpose()?;
                let user = user.as_deref().map(parse_all).transpose()?;
                if let Some(material) = material {
                    self.material = material;
                }
                if let Some(user) = user {
                    self.user = user;
                }
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), PaletteError> {
        std::fs::write(path, self.export_json()?)?;
        Ok(())
    }

    pub fn load(&mut self, path: &Path) -> Result<(), PaletteError> {
        let text = std::fs::read_to_string(path)?;
        self.import_json(&text)
    }
}

/// Parse `#rgb`, `#rrggbb` or `#aarrggbb` (the leading `#` is optional).
pub fn parse_hex_color(s: &str) -> Result<Pixel, PaletteError> {
    let invalid = || PaletteError::InvalidColor(s.to_string());
    let hex = s.trim().trim_start_matches('#');
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let nib = |i: usize| {
                u8::from_str_radix(&hex[i..i + 1], 16)
                    .map(|v| v * 17)
                    .map_err(|_| invalid())
            };
            Ok(Rgba([nib(0)?, nib(1)?, nib(2)?, 255]))
        }
        6 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Ok(Rgba([byte(2)?, byte(4)?, byte(6)?, byte(0)?])),
        _ => Err(invalid()),
    }
}

/// `#rrggbb` for opaque colors, `#aarrggbb` otherwise.
pub fn format_hex_color(c: Pixel) -> String {
    if c[3] == 255 {
        format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", c[3], c[0], c[1], c[2])
    }
}

// ============================================================================
// IMAGE IMPORT / EXPORT
// ============================================================================

/// Default, smallest and largest PNG export edge.
pub const DEFAULT_EXPORT_SIZE: u32 = 256;
pub const MIN_EXPORT_SIZE: u32 = 16;
pub const MAX_EXPORT_SIZE: u32 = 2048;
/// Edge of the single bitmap written for icon export.
pub const ICON_SIZE: u32 = 32;

pub fn load_image_file(path: &Path) -> Result<RgbaImage, ImageIoError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Replace the current layer with `img`, scaled to fit the grid (aspect
/// ratio kept) and centred in the visible window.
pub fn import_image(state: &mut CanvasState, history: &mut HistoryManager, img: &RgbaImage) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    history.push(state, "Import Image");

    let grid = state.grid_size();
    let scale = (grid as f32 / img.width() as f32).min(grid as f32 / img.height() as f32);
    let new_w = ((img.width() as f32 * scale) as u32).clamp(1, grid);
    let new_h = ((img.height() as f32 * scale) as u32).clamp(1, grid);
    let scaled = imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle);

    let offset = state.geometry.offset();
    let x = offset + (grid - new_w) as i32 / 2;
    let y = offset + (grid - new_h) as i32 / 2;

    let layer = state.active_layer_mut();
    layer.pixels.clear();
    layer.pixels.paste(&Buffer::from_rgba_image(scaled), x, y);
}

/// Flattened export, optionally on white, scaled to fit `size × size`.
pub fn export_png_image(state: &CanvasState, transparent: bool, size: u32) -> RgbaImage {
    let size = size.clamp(MIN_EXPORT_SIZE, MAX_EXPORT_SIZE);
    let mut flat = state.export();
    if !transparent {
        let mut bg = Buffer::new_filled(flat.width(), flat.height(), WHITE);
        bg.draw_over(&flat, 0, 0, 1.0);
        flat = bg;
    }
    scale_to_fit(flat.as_rgba_image(), size)
}

/// The single representative icon bitmap.
pub fn export_icon_image(state: &CanvasState) -> RgbaImage {
    scale_to_fit(state.export().as_rgba_image(), ICON_SIZE)
}

/// Resize into a `size × size` box keeping the aspect ratio.
fn scale_to_fit(img: &RgbaImage, size: u32) -> RgbaImage {
    let scale = (size as f32 / img.width() as f32).min(size as f32 / img.height() as f32);
    let w = ((img.width() as f32 * scale).round() as u32).max(1);
    let h = ((img.height() as f32 * scale).round() as u32).max(1);
    imageops::resize(img, w, h, imageops::FilterType::Triangle)
}

pub fn write_png(img: &RgbaImage, path: &Path) -> Result<(), ImageIoError> {
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Write a single-image ICO.
pub fn write_ico(img: &RgbaImage, path: &Path) -> Result<(), ImageIoError> {
    img.save_with_format(path, ImageFormat::Ico)?;
    Ok(())
}
