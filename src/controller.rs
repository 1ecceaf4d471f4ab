// Overlay controller module
// Owns the ordered overlay list, keeps stacking in sync and persists layouts

use crate::layout::{Layout, LayoutError, OverlayConfig};
use crate::overlay::{InputEffect, InputEvent, Overlay, OverlayId};
use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default global opacity in percent
pub const DEFAULT_OPACITY_PERCENT: u8 = 100;

/// What changed on an overlay since the host last saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Window origin only
    Position,
    /// Content size or rotation, so the window size too
    Shape,
    /// Opacity or render quality
    Appearance,
    /// Click-through toggled
    InputMode,
}

/// User-visible message
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    LayoutSaved { count: usize, path: PathBuf },
    LayoutLoaded { count: usize },
    NoLayout(PathBuf),
    MissingSource(PathBuf),
    Error(String),
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::LayoutSaved { .. } => "Layout Saved",
            Notice::LayoutLoaded { .. } => "Layout Loaded",
            Notice::NoLayout(_) => "No Layout Found",
            Notice::MissingSource(_) => "Image Not Found",
            Notice::Error(_) => "deskpin",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::MissingSource(_) | Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LayoutSaved { count, .. } => write!(f, "Saved {} overlay(s)", count),
            Notice::LayoutLoaded { count } => write!(f, "Loaded {} overlay(s)", count),
            Notice::NoLayout(path) => write!(f, "No saved layout at {}", path.display()),
            Notice::MissingSource(path) => write!(f, "Image file not found: {}", path.display()),
            Notice::Error(message) => f.write_str(message),
        }
    }
}

/// One row of the overlay list shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationEntry {
    pub id: OverlayId,
    pub label: String,
}

/// Windowing layer the controller drives
pub trait WindowHost {
    /// Decode the media behind `source` for a new overlay and return its
    /// native pixel size
    fn open(&mut self, id: OverlayId, source: &Path) -> anyhow::Result<(u32, u32)>;

    /// Map the window of a freshly opened overlay
    fn show(&mut self, overlay: &Overlay);

    /// Destroy the window and forget its media
    fn close(&mut self, id: OverlayId);

    /// Bring each overlay to the front in order, so the last one ends up on top
    fn restack(&mut self, bottom_to_top: &[&Overlay]);

    /// Apply a state change to the window
    fn sync(&mut self, overlay: &Overlay, change: Change);

    /// Draw the current animation frame again
    fn redraw(&mut self, overlay: &Overlay);

    /// Replace the user-visible overlay list
    fn refresh_presentation(&mut self, entries: &[PresentationEntry]);

    fn notify(&mut self, notice: Notice);
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("image file not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("failed to open {}: {message}", .path.display())]
    Media { path: PathBuf, message: String },

    #[error("index {index} out of range for {len} overlay(s)")]
    InvalidIndex { index: usize, len: usize },

    #[error("new order is not a permutation of the current overlays")]
    InvalidOrder,

    #[error("no overlay {0}")]
    UnknownOverlay(OverlayId),
}

/// Outcome of a layout load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    pub missing: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

pub struct OverlayController<H: WindowHost> {
    host: H,
    overlays: Vec<Overlay>,
    next_id: u64,
    opacity_percent: u8,
    click_through: bool,
}

impl<H: WindowHost> OverlayController<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            overlays: Vec::new(),
            next_id: 1,
            opacity_percent: DEFAULT_OPACITY_PERCENT,
            click_through: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Overlays from bottom to top
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.id() == id)
    }

    pub fn index_of(&self, id: OverlayId) -> Option<usize> {
        self.overlays.iter().position(|o| o.id() == id)
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn opacity_percent(&self) -> u8 {
        self.opacity_percent
    }

    pub fn click_through(&self) -> bool {
        self.click_through
    }

    /// Add a new overlay on top of the stack using the global settings
    pub fn add_overlay(&mut self, source: &Path) -> Result<OverlayId, ControllerError> {
        let id = match self.open_overlay(source, None) {
            Ok(id) => id,
            Err(e) => {
                warn!("{}", e);
                self.host.notify(Notice::Error(e.to_string()));
                return Err(e);
            }
        };

        let opacity = self.opacity_percent;
        let click_through = self.click_through;
        if let Some(overlay) = self.overlays.iter_mut().find(|o| o.id() == id) {
            overlay.set_opacity(opacity);
            overlay.set_click_through(click_through);
            self.host.show(overlay);
        }

        info!("Added overlay {} for {}", id, source.display());
        self.restack();
        self.refresh_presentation();
        Ok(id)
    }

    /// Decode the media and append an overlay without showing it
    fn open_overlay(
        &mut self,
        source: &Path,
        config: Option<&OverlayConfig>,
    ) -> Result<OverlayId, ControllerError> {
        if !source.exists() {
            return Err(ControllerError::MissingSource(source.to_path_buf()));
        }

        let id = OverlayId(self.next_id);
        let native = self
            .host
            .open(id, source)
            .map_err(|e| ControllerError::Media {
                path: source.to_path_buf(),
                message: format!("{:#}", e),
            })?;
        self.next_id += 1;

        debug!(
            "Opened {} ({}x{}) as overlay {}",
            source.display(),
            native.0,
            native.1,
            id
        );
        self.overlays.push(Overlay::new(id, source, native, config));
        Ok(id)
    }

    /// Remove the overlay at `index`; out of range leaves everything as is
    pub fn remove_overlay(&mut self, index: usize) -> Result<(), ControllerError> {
        if index >= self.overlays.len() {
            debug!("Ignoring removal of overlay at index {}", index);
            return Err(ControllerError::InvalidIndex {
                index,
                len: self.overlays.len(),
            });
        }

        let overlay = self.overlays.remove(index);
        self.host.close(overlay.id());
        info!("Removed overlay {}", overlay.id());
        self.refresh_presentation();
        Ok(())
    }

    pub fn remove_by_id(&mut self, id: OverlayId) -> Result<(), ControllerError> {
        let index = self
            .index_of(id)
            .ok_or(ControllerError::UnknownOverlay(id))?;
        self.remove_overlay(index)
    }

    pub fn remove_all(&mut self) {
        for overlay in self.overlays.drain(..) {
            self.host.close(overlay.id());
        }
        self.refresh_presentation();
    }

    /// Reorder by a permutation of the current indices: `new_order[i]` is
    /// the current index of the overlay that ends up at position `i`
    pub fn reorder(&mut self, new_order: &[usize]) -> Result<(), ControllerError> {
        let len = self.overlays.len();
        if let Some(&index) = new_order.iter().find(|&&i| i >= len) {
            return Err(ControllerError::InvalidIndex { index, len });
        }

        let mut seen = vec![false; len];
        for &index in new_order {
            if std::mem::replace(&mut seen[index], true) {
                return Err(ControllerError::InvalidOrder);
            }
        }
        if new_order.len() != len {
            return Err(ControllerError::InvalidOrder);
        }

        let mut slots: Vec<Option<Overlay>> = self.overlays.drain(..).map(Some).collect();
        self.overlays = new_order
            .iter()
            .filter_map(|&index| slots[index].take())
            .collect();

        self.restack();
        self.refresh_presentation();
        Ok(())
    }

    /// Reorder by stable ids, bottom first
    pub fn reorder_by_id(&mut self, ids: &[OverlayId]) -> Result<(), ControllerError> {
        let order = ids
            .iter()
            .map(|&id| self.index_of(id).ok_or(ControllerError::UnknownOverlay(id)))
            .collect::<Result<Vec<_>, _>>()?;
        self.reorder(&order)
    }

    /// Move one overlay `steps` positions towards the top (negative: bottom)
    pub fn move_overlay(&mut self, id: OverlayId, steps: isize) -> Result<(), ControllerError> {
        let from = self
            .index_of(id)
            .ok_or(ControllerError::UnknownOverlay(id))?;
        let last = self.overlays.len() as isize - 1;
        let to = (from as isize + steps).clamp(0, last) as usize;
        if to == from {
            return Ok(());
        }

        let mut order: Vec<usize> = (0..self.overlays.len()).collect();
        let moved = order.remove(from);
        order.insert(to, moved);
        self.reorder(&order)
    }

    /// Re-apply the list order to the windows, bottom to top
    pub fn restack(&mut self) {
        let order: Vec<&Overlay> = self.overlays.iter().collect();
        self.host.restack(&order);
    }

    pub fn refresh_presentation(&mut self) {
        let entries: Vec<PresentationEntry> = self
            .overlays
            .iter()
            .enumerate()
            .map(|(i, overlay)| PresentationEntry {
                id: overlay.id(),
                label: format!("{}. {}", i + 1, display_name(overlay.source())),
            })
            .collect();
        self.host.refresh_presentation(&entries);
    }

    /// Global opacity in percent, applied to every overlay
    pub fn set_opacity(&mut self, percent: u8) {
        self.opacity_percent = percent.clamp(10, 100);
        for overlay in &mut self.overlays {
            overlay.set_opacity(self.opacity_percent);
            self.host.sync(overlay, Change::Appearance);
        }
    }

    /// Global click-through, applied to every overlay
    pub fn set_click_through(&mut self, enabled: bool) {
        self.click_through = enabled;
        for overlay in &mut self.overlays {
            overlay.set_click_through(enabled);
            self.host.sync(overlay, Change::InputMode);
        }
    }

    /// Route pointer input to one overlay
    pub fn handle_input(&mut self, id: OverlayId, event: InputEvent) -> InputEffect {
        let Some(overlay) = self.overlays.iter_mut().find(|o| o.id() == id) else {
            return InputEffect::None;
        };

        let was_interacting = overlay.is_interacting();
        let effect = overlay.handle_input(event);
        match effect {
            InputEffect::Moved => self.host.sync(overlay, Change::Position),
            InputEffect::Reshaped => self.host.sync(overlay, Change::Shape),
            InputEffect::Released => {
                self.host.sync(overlay, Change::Appearance);
                self.restack();
            }
            InputEffect::None => {
                if was_interacting != overlay.is_interacting() {
                    self.host.sync(overlay, Change::Appearance);
                }
            }
        }
        effect
    }

    /// The host advanced an animation
    pub fn frame_ready(&mut self, id: OverlayId) {
        if let Some(overlay) = self.overlays.iter().find(|o| o.id() == id) {
            self.host.redraw(overlay);
        }
    }

    /// Persist every overlay in list order
    pub fn save_layout(&mut self, path: &Path) -> Result<usize, ControllerError> {
        let layout = Layout::new(self.overlays.iter().map(Overlay::to_config).collect());

        match layout.write(path) {
            Ok(()) => {
                let count = layout.overlays.len();
                info!("Layout saved to {}", path.display());
                self.host.notify(Notice::LayoutSaved {
                    count,
                    path: path.to_path_buf(),
                });
                Ok(count)
            }
            Err(e) => {
                warn!("Error saving layout: {}", e);
                self.host.notify(Notice::Error(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Replace the current overlays with a saved layout.
    ///
    /// Nothing changes when the file is absent or unreadable. Entries whose
    /// media is gone are skipped and reported one by one.
    pub fn load_layout(&mut self, path: &Path) -> Result<LoadReport, ControllerError> {
        let layout = match Layout::read(path) {
            Ok(layout) => layout,
            Err(LayoutError::NotFound(path)) => {
                info!("No saved layout found at {}", path.display());
                self.host.notify(Notice::NoLayout(path.clone()));
                return Err(LayoutError::NotFound(path).into());
            }
            Err(e) => {
                warn!("Error loading layout: {}", e);
                self.host.notify(Notice::Error(e.to_string()));
                return Err(e.into());
            }
        };

        self.remove_all();

        let mut report = LoadReport::default();
        for config in &layout.overlays {
            match self.open_overlay(&config.source, Some(config)) {
                Ok(id) => {
                    if let Some(overlay) = self.overlays.iter().find(|o| o.id() == id) {
                        self.host.show(overlay);
                    }
                    report.loaded += 1;
                }
                Err(ControllerError::MissingSource(source)) => {
                    warn!("Image file not found: {}", source.display());
                    self.host.notify(Notice::MissingSource(source.clone()));
                    report.missing.push(source);
                }
                Err(e) => {
                    warn!("{}", e);
                    self.host.notify(Notice::Error(e.to_string()));
                    report.failed.push(config.source.clone());
                }
            }
        }

        self.restack();
        self.refresh_presentation();
        info!(
            "Layout loaded: {} overlay(s) from {}",
            report.loaded,
            path.display()
        );
        if report.loaded > 0 {
            self.host.notify(Notice::LayoutLoaded {
                count: report.loaded,
            });
        }
        Ok(report)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
