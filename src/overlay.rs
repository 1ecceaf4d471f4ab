// Overlay module
// Per-overlay transform state and the pointer interaction state machine

use crate::geometry::{self, MIN_SIDE};
use crate::layout::OverlayConfig;
use std::fmt;
use std::path::{Path, PathBuf};

/// Window origin used when no position is known
pub const DEFAULT_POSITION: (i32, i32) = (100, 100);

/// Lowest allowed opacity; a fully transparent overlay could never be found again
pub const MIN_OPACITY: f64 = 0.1;

/// Stable identifier of an overlay, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Secondary,
}

/// Input delivered by the windowing layer, in global (screen) coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { button: Button, x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp { button: Button },
    /// Wheel movement, 120 units per notch, positive away from the user
    Scroll { delta: f64 },
    /// Pointer left the window
    Leave,
}

/// What an input event did to the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEffect {
    None,
    /// Only the window origin changed
    Moved,
    /// Size or rotation changed, the bounding box must be recomputed
    Reshaped,
    /// A drag ended; stacking order should be restored
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Idle,
    Dragging { offset: (i32, i32) },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HeldButtons {
    primary: bool,
    secondary: bool,
}

/// One pinned image or animation
#[derive(Debug, Clone)]
pub struct Overlay {
    id: OverlayId,
    source: PathBuf,
    base_width: u32,
    base_height: u32,
    aspect_ratio: f64,
    rotation: f64,
    opacity: f64,
    click_through: bool,
    position: (i32, i32),
    interaction: Interaction,
    held: HeldButtons,
}

impl Overlay {
    /// Create an overlay for media of the given native size.
    ///
    /// Without a saved config the overlay gets the default sizing policy and
    /// settings. A saved config replaces them wholesale.
    pub fn new(
        id: OverlayId,
        source: impl Into<PathBuf>,
        native: (u32, u32),
        config: Option<&OverlayConfig>,
    ) -> Self {
        let (native_w, native_h) = (native.0.max(1), native.1.max(1));
        let (width, height) = geometry::initial_size(native_w, native_h);

        let mut overlay = Self {
            id,
            source: source.into(),
            base_width: width,
            base_height: height,
            aspect_ratio: native_w as f64 / native_h as f64,
            rotation: 0.0,
            opacity: 1.0,
            click_through: false,
            position: DEFAULT_POSITION,
            interaction: Interaction::Idle,
            held: HeldButtons::default(),
        };

        if let Some(cfg) = config {
            overlay.base_width = cfg.width.max(1);
            overlay.base_height = cfg.height.max(1);
            overlay.rotation = geometry::normalize_degrees(cfg.rotation);
            overlay.opacity = clamp_opacity(cfg.opacity);
            overlay.click_through = cfg.click_through;
            if let Some(position) = cfg.position {
                overlay.position = position;
            }
        }

        overlay
    }

    pub fn id(&self) -> OverlayId {
        self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Un-rotated content size
    pub fn size(&self) -> (u32, u32) {
        (self.base_width, self.base_height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn click_through(&self) -> bool {
        self.click_through
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    /// True while any button is held on the overlay
    pub fn is_interacting(&self) -> bool {
        self.held.primary || self.held.secondary
    }

    /// Window size needed to show the rotated content without clipping
    pub fn bounds(&self) -> (u32, u32) {
        geometry::rotated_bounds(self.base_width, self.base_height, self.rotation)
    }

    /// Set opacity from a percentage (10 - 100)
    pub fn set_opacity(&mut self, percent: u8) {
        self.opacity = clamp_opacity(percent as f64 / 100.0);
    }

    pub fn set_click_through(&mut self, enabled: bool) {
        self.click_through = enabled;
        if enabled {
            self.cancel_interaction();
        }
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.position = (x, y);
    }

    /// Rescale by a wheel delta, keeping the native aspect ratio.
    ///
    /// Growth stops once the window could no longer hold the content at
    /// every rotation.
    pub fn scale_by(&mut self, delta: f64) {
        let factor = 1.0 + delta / 1000.0;
        let largest = geometry::max_width(self.aspect_ratio).max(MIN_SIDE) as f64;
        let width = (self.base_width as f64 * factor)
            .round()
            .min(largest)
            .max(MIN_SIDE as f64) as u32;
        self.base_width = width;
        self.base_height = ((width as f64 / self.aspect_ratio).round() as u32).max(1);
    }

    /// Rotate by a wheel delta, one degree per 10 units
    pub fn rotate_by(&mut self, delta: f64) {
        self.rotation = geometry::normalize_degrees(self.rotation + delta / 10.0);
    }

    /// Feed one input event through the state machine
    pub fn handle_input(&mut self, event: InputEvent) -> InputEffect {
        if self.click_through {
            return InputEffect::None;
        }

        match event {
            InputEvent::PointerDown { button, x, y } => {
                match button {
                    Button::Primary => {
                        self.held.primary = true;
                        let (ox, oy) = self.position;
                        self.interaction = Interaction::Dragging {
                            offset: (x - ox, y - oy),
                        };
                    }
                    Button::Secondary => self.held.secondary = true,
                }
                InputEffect::None
            }
            InputEvent::PointerMove { x, y } => match self.interaction {
                Interaction::Dragging { offset } => {
                    let next = (x - offset.0, y - offset.1);
                    if next == self.position {
                        return InputEffect::None;
                    }
                    self.position = next;
                    InputEffect::Moved
                }
                Interaction::Idle => InputEffect::None,
            },
            InputEvent::PointerUp { button } => match button {
                Button::Primary => {
                    self.held.primary = false;
                    self.interaction = Interaction::Idle;
                    InputEffect::Released
                }
                Button::Secondary => {
                    self.held.secondary = false;
                    InputEffect::None
                }
            },
            InputEvent::Scroll { delta } => {
                if delta == 0.0 {
                    return InputEffect::None;
                }
                let before = (self.base_width, self.base_height, self.rotation);
                if self.held.primary {
                    self.scale_by(delta);
                } else if self.held.secondary {
                    self.rotate_by(delta);
                } else {
                    return InputEffect::None;
                }
                if before == (self.base_width, self.base_height, self.rotation) {
                    InputEffect::None
                } else {
                    InputEffect::Reshaped
                }
            }
            InputEvent::Leave => {
                self.cancel_interaction();
                InputEffect::None
            }
        }
    }

    fn cancel_interaction(&mut self) {
        self.interaction = Interaction::Idle;
        self.held = HeldButtons::default();
    }

    /// Snapshot for persistence
    pub fn to_config(&self) -> OverlayConfig {
        OverlayConfig {
            source: self.source.clone(),
            width: self.base_width,
            height: self.base_height,
            rotation: self.rotation,
            opacity: self.opacity,
            click_through: self.click_through,
            position: Some(self.position),
        }
    }
}

fn clamp_opacity(value: f64) -> f64 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(MIN_OPACITY, 1.0)
}
