// Wayland integration module
// Hosts every overlay as a layer-shell surface using smithay-client-toolkit

use crate::control::{self, Command, ControlListener};
use crate::controller::{Change, Notice, OverlayController, PresentationEntry, WindowHost};
use crate::geometry::MAX_BOUND;
use crate::media::{self, Media};
use crate::notify::Notifier;
use crate::overlay::{Button, InputEvent, Overlay, OverlayId};
use crate::render::{self, Filter, RenderParams};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, error, info, warn};
use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState, Region},
    delegate_compositor, delegate_keyboard, delegate_layer, delegate_output, delegate_pointer,
    delegate_registry, delegate_seat, delegate_shm,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop::{
            generic::Generic,
            timer::{TimeoutAction, Timer},
            EventLoop, Interest, Mode, PostAction,
        },
        calloop_wayland_source::WaylandSource,
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        keyboard::{KeyEvent, KeyboardHandler, Keysym, Modifiers},
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        Capability, SeatHandler, SeatState,
    },
    shell::{
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
        WaylandSurface,
    },
    shm::{
        slot::{Buffer, SlotPool},
        Shm, ShmHandler,
    },
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use wayland_client::{
    globals::registry_queue_init,
    protocol::{wl_keyboard, wl_output, wl_pointer, wl_seat, wl_shm, wl_surface},
    Connection, QueueHandle,
};

/// Mouse button constants
const BTN_LEFT: u32 = 272;
const BTN_RIGHT: u32 = 273;

/// Wheel units (120 per notch) per unit of Wayland axis motion
const WHEEL_UNITS_PER_AXIS: f64 = 8.0;

/// Global opacity step for the keyboard shortcuts, in percent
const OPACITY_STEP: u8 = 10;

/// Timer period when nothing is animating
const IDLE_TICK: Duration = Duration::from_millis(250);

const LAYER_NAMESPACE: &str = "deskpin";

/// Everything needed to draw and place one overlay window
#[derive(Debug, Clone, Copy)]
struct View {
    position: (i32, i32),
    bounds: (u32, u32),
    click_through: bool,
    params: RenderParams,
}

impl View {
    fn of(overlay: &Overlay) -> Self {
        let filter = if overlay.is_interacting() {
            Filter::Nearest
        } else {
            Filter::Bilinear
        };
        Self {
            position: overlay.position(),
            bounds: overlay.bounds(),
            click_through: overlay.click_through(),
            params: RenderParams {
                content: overlay.size(),
                rotation: overlay.rotation(),
                opacity: overlay.opacity(),
                filter,
            },
        }
    }

    fn buffer_size(&self) -> (u32, u32) {
        (
            self.bounds.0.clamp(1, MAX_BOUND),
            self.bounds.1.clamp(1, MAX_BOUND),
        )
    }
}

/// Layer surface and media of one overlay
struct OverlaySurface {
    id: OverlayId,
    media: Media,
    layer: LayerSurface,
    buffer: Option<Buffer>,
    configured: bool,
    frame_index: usize,
    next_frame_at: Instant,
    view: View,
}

/// Window host backed by wlr-layer-shell overlay surfaces
pub struct WaylandHost {
    compositor_state: CompositorState,
    layer_shell: LayerShell,
    shm: Shm,
    qh: QueueHandle<WaylandApp>,
    pool: Option<SlotPool>,
    // Decoded but not yet shown
    pending: Vec<(OverlayId, Media)>,
    // Host stacking order, bottom first
    surfaces: Vec<OverlaySurface>,
    notifier: Notifier,
}

impl WaylandHost {
    fn index_of(&self, id: OverlayId) -> Option<usize> {
        self.surfaces.iter().position(|s| s.id == id)
    }

    fn index_for(&self, surface: &wl_surface::WlSurface) -> Option<usize> {
        self.surfaces
            .iter()
            .position(|s| s.layer.wl_surface() == surface)
    }

    /// Overlay shown on a Wayland surface
    fn overlay_for(&self, surface: &wl_surface::WlSurface) -> Option<OverlayId> {
        self.index_for(surface).map(|i| self.surfaces[i].id)
    }

    /// Create a layer surface for a view; newer surfaces stack above older ones
    fn create_layer(&self, view: &View) -> LayerSurface {
        let surface = self.compositor_state.create_surface(&self.qh);
        let layer = self.layer_shell.create_layer_surface(
            &self.qh,
            surface,
            Layer::Overlay,
            Some(LAYER_NAMESPACE),
            None,
        );

        let (width, height) = view.buffer_size();
        layer.set_anchor(Anchor::TOP | Anchor::LEFT);
        layer.set_margin(view.position.1, 0, 0, view.position.0);
        layer.set_size(width, height);
        layer.set_keyboard_interactivity(KeyboardInteractivity::OnDemand);
        self.apply_input_region(layer.wl_surface(), view.click_through);

        // Commit the surface to trigger configure
        layer.commit();
        layer
    }

    /// An empty input region lets pointer events fall through to whatever is below
    fn apply_input_region(&self, surface: &wl_surface::WlSurface, click_through: bool) {
        if !click_through {
            surface.set_input_region(None);
            return;
        }
        match Region::new(&self.compositor_state) {
            Ok(region) => surface.set_input_region(Some(region.wl_region())),
            Err(e) => warn!("Failed to create empty input region: {}", e),
        }
    }

    fn recreate(&mut self, index: usize) {
        let layer = self.create_layer(&self.surfaces[index].view);
        let surface = &mut self.surfaces[index];
        // Dropping the old layer surface destroys it
        surface.layer = layer;
        surface.buffer = None;
        surface.configured = false;
    }

    fn on_configure(&mut self, surface: &wl_surface::WlSurface) {
        if let Some(index) = self.index_for(surface) {
            self.surfaces[index].configured = true;
            self.draw(index);
        }
    }

    /// Render the current frame into a fresh shm buffer and commit it
    fn draw(&mut self, index: usize) {
        let shm = &self.shm;
        let pool = &mut self.pool;
        let Some(surface) = self.surfaces.get_mut(index) else {
            return;
        };
        if !surface.configured {
            return;
        }

        let (width, height) = surface.view.buffer_size();
        if (width, height) != surface.view.bounds {
            debug!(
                "Overlay {} clipped from {:?} to {}x{}",
                surface.id, surface.view.bounds, width, height
            );
        }
        let stride = width as i32 * 4;
        let buffer_size = (stride * height as i32) as usize;

        if pool.is_none() {
            match SlotPool::new(buffer_size, shm) {
                Ok(p) => *pool = Some(p),
                Err(e) => {
                    error!(
                        "Failed to create slot pool: {}. Buffer size: {} bytes",
                        e, buffer_size
                    );
                    return;
                }
            }
        }
        let Some(pool) = pool.as_mut() else {
            return;
        };

        let (buffer, canvas) = match pool.create_buffer(
            width as i32,
            height as i32,
            stride,
            wl_shm::Format::Argb8888,
        ) {
            Ok(buf) => buf,
            Err(e) => {
                error!("Failed to create buffer {}x{}: {}", width, height, e);
                return;
            }
        };

        let frame = surface.media.frame(surface.frame_index);
        render::render(frame, &surface.view.params, canvas, width, height);

        let wl = surface.layer.wl_surface();
        if let Err(e) = buffer.attach_to(wl) {
            error!("Failed to attach buffer: {}", e);
            return;
        }
        wl.damage_buffer(0, 0, width as i32, height as i32);
        wl.commit();

        surface.buffer = Some(buffer);
    }

    /// Step every animation whose next frame is due
    pub fn advance_animations(&mut self, now: Instant) -> Vec<OverlayId> {
        self.notifier.reap();
        let mut due = Vec::new();
        for surface in &mut self.surfaces {
            if !surface.media.is_animated() || now < surface.next_frame_at {
                continue;
            }
            surface.frame_index = (surface.frame_index + 1) % surface.media.frame_count();
            surface.next_frame_at = now + surface.media.frame(surface.frame_index).delay;
            due.push(surface.id);
        }
        due
    }

    /// Time until the next animation frame is due
    pub fn next_deadline(&self, now: Instant) -> Duration {
        self.surfaces
            .iter()
            .filter(|s| s.media.is_animated())
            .map(|s| s.next_frame_at.saturating_duration_since(now))
            .min()
            .unwrap_or(IDLE_TICK)
    }
}

impl WindowHost for WaylandHost {
    fn open(&mut self, id: OverlayId, source: &Path) -> Result<(u32, u32)> {
        let media = media::load_media(source)?;
        let size = media.size();
        info!(
            "Image loaded: {}x{} pixels, {} frame(s)",
            size.0,
            size.1,
            media.frame_count()
        );
        self.pending.push((id, media));
        Ok(size)
    }

    fn show(&mut self, overlay: &Overlay) {
        let id = overlay.id();
        let Some(pos) = self.pending.iter().position(|(p, _)| *p == id) else {
            warn!("Overlay {} shown without media", id);
            return;
        };
        let (_, media) = self.pending.swap_remove(pos);

        let view = View::of(overlay);
        let layer = self.create_layer(&view);
        let next_frame_at = Instant::now() + media.frame(0).delay;
        self.surfaces.push(OverlaySurface {
            id,
            media,
            layer,
            buffer: None,
            configured: false,
            frame_index: 0,
            next_frame_at,
            view,
        });
    }

    fn close(&mut self, id: OverlayId) {
        self.pending.retain(|(p, _)| *p != id);
        if let Some(index) = self.index_of(id) {
            self.surfaces.remove(index);
            debug!("Closed overlay {}", id);
        }
    }

    fn restack(&mut self, bottom_to_top: &[&Overlay]) {
        for overlay in bottom_to_top {
            if let Some(index) = self.index_of(overlay.id()) {
                self.surfaces[index].view = View::of(overlay);
            }
        }

        let wanted: Vec<OverlayId> = bottom_to_top
            .iter()
            .map(|o| o.id())
            .filter(|&id| self.index_of(id).is_some())
            .collect();

        // Surfaces that are already in place at the bottom stay untouched
        let settled = self
            .surfaces
            .iter()
            .zip(&wanted)
            .take_while(|(surface, id)| surface.id == **id)
            .count();
        if settled == self.surfaces.len() {
            return;
        }

        let mut reordered = Vec::with_capacity(self.surfaces.len());
        for id in &wanted {
            if let Some(index) = self.index_of(*id) {
                reordered.push(self.surfaces.remove(index));
            }
        }
        reordered.append(&mut self.surfaces);
        self.surfaces = reordered;

        // Layer shell has no raise request; a new surface goes on top
        for index in settled..self.surfaces.len() {
            self.recreate(index);
        }
        debug!("Restacked {} overlay(s)", self.surfaces.len() - settled);
    }

    fn sync(&mut self, overlay: &Overlay, change: Change) {
        let Some(index) = self.index_of(overlay.id()) else {
            return;
        };
        let view = View::of(overlay);
        self.surfaces[index].view = view;

        match change {
            Change::Position => {
                let layer = &self.surfaces[index].layer;
                layer.set_margin(view.position.1, 0, 0, view.position.0);
                layer.commit();
            }
            Change::Shape => {
                let (width, height) = view.buffer_size();
                let layer = &self.surfaces[index].layer;
                layer.set_margin(view.position.1, 0, 0, view.position.0);
                layer.set_size(width, height);
                // The compositor answers with a configure, which redraws
                layer.commit();
            }
            Change::Appearance => self.draw(index),
            Change::InputMode => {
                let layer = &self.surfaces[index].layer;
                self.apply_input_region(layer.wl_surface(), view.click_through);
                layer.commit();
            }
        }
    }

    fn redraw(&mut self, overlay: &Overlay) {
        if let Some(index) = self.index_of(overlay.id()) {
            self.surfaces[index].view = View::of(overlay);
            self.draw(index);
        }
    }

    fn refresh_presentation(&mut self, entries: &[PresentationEntry]) {
        if entries.is_empty() {
            info!("Active overlays: none");
            return;
        }
        info!("Active overlays (bottom first):");
        for entry in entries {
            info!("  {}", entry.label);
        }
    }

    fn notify(&mut self, notice: Notice) {
        if notice.is_error() {
            warn!("{}: {}", notice.title(), notice);
        } else {
            info!("{}: {}", notice.title(), notice);
        }
        self.notifier.send(notice.title(), &notice.to_string());
    }
}

/// Main Wayland application state
pub struct WaylandApp {
    // Registry state
    registry_state: RegistryState,
    // Seat state for input handling
    seat_state: SeatState,
    // Output state for display info
    output_state: OutputState,

    controller: OverlayController<WaylandHost>,
    layout_path: PathBuf,

    keyboard_focus: Option<OverlayId>,
    ctrl_held: bool,
    should_exit: bool,
}

impl WaylandApp {
    /// Surface-local pointer position to screen coordinates
    fn to_global(&self, id: OverlayId, local: (f64, f64)) -> (i32, i32) {
        let (ox, oy) = self
            .controller
            .overlay(id)
            .map(|o| o.position())
            .unwrap_or_default();
        (ox + local.0.round() as i32, oy + local.1.round() as i32)
    }

    fn run_command(&mut self, command: Command) {
        if control::apply(&mut self.controller, command, &self.layout_path).is_break() {
            self.should_exit = true;
        }
    }

    /// Explicitly closing the last overlay ends the application
    fn remove(&mut self, id: OverlayId) {
        if self.controller.remove_by_id(id).is_ok() && self.controller.is_empty() {
            info!("Last overlay closed");
            self.should_exit = true;
        }
    }

    fn handle_key(&mut self, id: OverlayId, keysym: Keysym) {
        let opacity = self.controller.opacity_percent();
        let command = match keysym {
            Keysym::Escape | Keysym::Delete => return self.remove(id),
            Keysym::Page_Up => {
                let _ = self.controller.move_overlay(id, 1);
                return;
            }
            Keysym::Page_Down => {
                let _ = self.controller.move_overlay(id, -1);
                return;
            }
            Keysym::q => Command::Quit,
            Keysym::s if self.ctrl_held => Command::SaveLayout,
            Keysym::l if self.ctrl_held => Command::LoadLayout,
            Keysym::plus | Keysym::equal | Keysym::KP_Add => Command::Opacity {
                percent: opacity.saturating_add(OPACITY_STEP),
            },
            Keysym::minus | Keysym::KP_Subtract => Command::Opacity {
                percent: opacity.saturating_sub(OPACITY_STEP),
            },
            Keysym::t => Command::ClickThrough {
                enabled: !self.controller.click_through(),
            },
            _ => return,
        };
        self.run_command(command);
    }
}

fn map_button(button: u32) -> Option<Button> {
    match button {
        BTN_LEFT => Some(Button::Primary),
        BTN_RIGHT => Some(Button::Secondary),
        _ => None,
    }
}

// Implement required traits for smithay-client-toolkit

impl CompositorHandler for WaylandApp {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
        debug!("Scale factor changed");
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
        debug!("Transform changed");
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for WaylandApp {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("New output detected");
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output updated");
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        debug!("Output destroyed");
    }
}

impl LayerShellHandler for WaylandApp {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, layer: &LayerSurface) {
        if let Some(id) = self.controller.host().overlay_for(layer.wl_surface()) {
            info!("Layer surface of overlay {} closed by compositor", id);
            self.remove(id);
        }
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        debug!("Layer surface configured: {:?}", configure);

        // Overlays always request an explicit size, so the suggested one is ignored
        self.controller.host_mut().on_configure(layer.wl_surface());
    }
}

impl SeatHandler for WaylandApp {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("New seat");
    }

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        debug!("New capability: {:?}", capability);

        if capability == Capability::Keyboard {
            if let Err(e) = self.seat_state.get_keyboard(qh, &seat, None) {
                error!("Failed to get keyboard: {}", e);
            }
        }
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                error!("Failed to get pointer: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
        debug!("Capability removed");
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {
        debug!("Seat removed");
    }
}

impl KeyboardHandler for WaylandApp {
    fn enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        surface: &wl_surface::WlSurface,
        _serial: u32,
        _raw: &[u32],
        _keysyms: &[Keysym],
    ) {
        self.keyboard_focus = self.controller.host().overlay_for(surface);
        debug!("Keyboard entered overlay {:?}", self.keyboard_focus);
    }

    fn leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _surface: &wl_surface::WlSurface,
        _serial: u32,
    ) {
        self.keyboard_focus = None;
    }

    fn press_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        event: KeyEvent,
    ) {
        debug!("Key pressed: {:?}", event.keysym);
        if let Some(id) = self.keyboard_focus {
            self.handle_key(id, event.keysym);
        }
    }

    fn release_key(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        _event: KeyEvent,
    ) {
    }

    fn update_modifiers(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _keyboard: &wl_keyboard::WlKeyboard,
        _serial: u32,
        modifiers: Modifiers,
        _layout: u32,
    ) {
        self.ctrl_held = modifiers.ctrl;
    }
}

impl PointerHandler for WaylandApp {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            let Some(id) = self.controller.host().overlay_for(&event.surface) else {
                continue;
            };

            let input = match event.kind {
                PointerEventKind::Enter { .. } => {
                    debug!("Pointer entered overlay {}", id);
                    continue;
                }
                PointerEventKind::Leave { .. } => InputEvent::Leave,
                PointerEventKind::Motion { .. } => {
                    let (x, y) = self.to_global(id, event.position);
                    InputEvent::PointerMove { x, y }
                }
                PointerEventKind::Press { button, .. } => {
                    let Some(button) = map_button(button) else {
                        continue;
                    };
                    let (x, y) = self.to_global(id, event.position);
                    InputEvent::PointerDown { button, x, y }
                }
                PointerEventKind::Release { button, .. } => {
                    let Some(button) = map_button(button) else {
                        continue;
                    };
                    InputEvent::PointerUp { button }
                }
                PointerEventKind::Axis { vertical, .. } => {
                    if vertical.absolute == 0.0 {
                        continue;
                    }
                    // Wayland scrolls down with positive values
                    InputEvent::Scroll {
                        delta: -vertical.absolute * WHEEL_UNITS_PER_AXIS,
                    }
                }
            };

            self.controller.handle_input(id, input);
        }
    }
}

impl ShmHandler for WaylandApp {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.controller.host_mut().shm
    }
}

impl ProvidesRegistryState for WaylandApp {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }

    registry_handlers![OutputState, SeatState];
}

// Delegate macros
delegate_compositor!(WaylandApp);
delegate_output!(WaylandApp);
delegate_layer!(WaylandApp);
delegate_seat!(WaylandApp);
delegate_keyboard!(WaylandApp);
delegate_pointer!(WaylandApp);
delegate_shm!(WaylandApp);
delegate_registry!(WaylandApp);

/// What to show once connected
#[derive(Debug)]
pub struct Startup {
    pub images: Vec<PathBuf>,
    pub opacity: u8,
    pub click_through: bool,
    pub load_layout: bool,
    pub layout_path: PathBuf,
    /// Commands from later invocations; without it only the keyboard controls the app
    pub control: Option<ControlListener>,
}

/// Run the Wayland application
pub fn run(startup: Startup) -> Result<()> {
    info!("Connecting to Wayland display");

    // Connect to Wayland display
    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;

    // Initialize registry and event queue
    let (globals, mut event_queue) =
        registry_queue_init(&conn).context("Failed to initialize registry")?;
    let qh = event_queue.handle();

    // Initialize required globals
    let compositor_state =
        CompositorState::bind(&globals, &qh).context("Failed to bind compositor")?;
    let layer_shell = LayerShell::bind(&globals, &qh).context("Failed to bind layer shell")?;
    let shm = Shm::bind(&globals, &qh).context("Failed to bind shm")?;

    let host = WaylandHost {
        compositor_state,
        layer_shell,
        shm,
        qh: qh.clone(),
        pool: None,
        pending: Vec::new(),
        surfaces: Vec::new(),
        notifier: Notifier::default(),
    };
    let mut controller = OverlayController::new(host);
    controller.set_opacity(startup.opacity);
    controller.set_click_through(startup.click_through);

    // Create application state
    let mut app = WaylandApp {
        registry_state: RegistryState::new(&globals),
        seat_state: SeatState::new(&globals, &qh),
        output_state: OutputState::new(&globals, &qh),
        controller,
        layout_path: startup.layout_path,
        keyboard_focus: None,
        ctrl_held: false,
        should_exit: false,
    };

    // Dispatch once to get seat and output info
    event_queue.roundtrip(&mut app)?;

    if startup.load_layout {
        let _ = app.controller.load_layout(&app.layout_path);
    }
    for image in &startup.images {
        let _ = app.controller.add_overlay(image);
    }
    if app.controller.is_empty() {
        bail!("No overlays to show");
    }

    let mut event_loop: EventLoop<WaylandApp> =
        EventLoop::try_new().context("Failed to create event loop")?;
    WaylandSource::new(conn, event_queue)
        .insert(event_loop.handle())
        .map_err(|e| anyhow!("Failed to insert Wayland source: {}", e.error))?;

    // Animation clock: advances GIF frames as they become due
    event_loop
        .handle()
        .insert_source(
            Timer::from_duration(IDLE_TICK),
            |_, _, app: &mut WaylandApp| {
                let now = Instant::now();
                for id in app.controller.host_mut().advance_animations(now) {
                    app.controller.frame_ready(id);
                }
                TimeoutAction::ToDuration(app.controller.host().next_deadline(now))
            },
        )
        .map_err(|e| anyhow!("Failed to insert animation timer: {}", e.error))?;

    if let Some(listener) = startup.control {
        event_loop
            .handle()
            .insert_source(
                Generic::new(listener, Interest::READ, Mode::Level),
                |_, listener, app: &mut WaylandApp| {
                    for command in listener.accept_pending() {
                        app.run_command(command);
                    }
                    Ok(PostAction::Continue)
                },
            )
            .map_err(|e| anyhow!("Failed to insert control socket: {}", e.error))?;
    }

    info!("Starting event loop");
    info!("Controls: drag to move, hold left + scroll to scale, hold right + scroll to rotate");
    info!("Keys: Esc remove, q quit, Ctrl+S/Ctrl+L save/load, +/- opacity, t click-through");

    // Main event loop
    loop {
        event_loop
            .dispatch(None, &mut app)
            .context("Event loop dispatch failed")?;

        if app.should_exit {
            info!("Exiting application");
            break;
        }
    }

    app.controller.remove_all();
    Ok(())
}
