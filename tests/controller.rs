use deskpin::control::{self, Command};
use deskpin::controller::{
    Change, ControllerError, Notice, OverlayController, PresentationEntry, WindowHost,
};
use deskpin::layout::{Layout, LayoutError, OverlayConfig};
use deskpin::overlay::{Button, InputEffect, InputEvent, Overlay, OverlayId};
use std::collections::HashMap;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Open(OverlayId),
    Show(OverlayId),
    Close(OverlayId),
    Restack(Vec<OverlayId>),
    Sync(OverlayId, Change),
    Redraw(OverlayId),
}

/// In-memory window host: media sizes come from a table instead of decoding
#[derive(Default)]
struct RecordingHost {
    sizes: HashMap<PathBuf, (u32, u32)>,
    calls: Vec<Call>,
    notices: Vec<Notice>,
    presentation: Vec<PresentationEntry>,
    open_windows: Vec<OverlayId>,
}

impl RecordingHost {
    fn restacks(&self) -> Vec<Vec<OverlayId>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Restack(order) => Some(order.clone()),
                _ => None,
            })
            .collect()
    }

    fn labels(&self) -> Vec<&str> {
        self.presentation.iter().map(|e| e.label.as_str()).collect()
    }
}

impl WindowHost for RecordingHost {
    fn open(&mut self, id: OverlayId, source: &Path) -> anyhow::Result<(u32, u32)> {
        let size = self
            .sizes
            .get(source)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("cannot decode {}", source.display()))?;
        self.calls.push(Call::Open(id));
        Ok(size)
    }

    fn show(&mut self, overlay: &Overlay) {
        self.open_windows.push(overlay.id());
        self.calls.push(Call::Show(overlay.id()));
    }

    fn close(&mut self, id: OverlayId) {
        self.open_windows.retain(|&w| w != id);
        self.calls.push(Call::Close(id));
    }

    fn restack(&mut self, bottom_to_top: &[&Overlay]) {
        self.calls
            .push(Call::Restack(bottom_to_top.iter().map(|o| o.id()).collect()));
    }

    fn sync(&mut self, overlay: &Overlay, change: Change) {
        self.calls.push(Call::Sync(overlay.id(), change));
    }

    fn redraw(&mut self, overlay: &Overlay) {
        self.calls.push(Call::Redraw(overlay.id()));
    }

    fn refresh_presentation(&mut self, entries: &[PresentationEntry]) {
        self.presentation = entries.to_vec();
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

struct Fixture {
    dir: TempDir,
    controller: OverlayController<RecordingHost>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            controller: OverlayController::new(RecordingHost::default()),
        }
    }

    /// Create a media file on disk and register its native size with the host
    fn media(&mut self, name: &str, size: (u32, u32)) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, b"stand-in").unwrap();
        self.controller
            .host_mut()
            .sizes
            .insert(path.clone(), size);
        path
    }

    fn layout_path(&self) -> PathBuf {
        self.dir.path().join("overlay_config.json")
    }

    fn host(&self) -> &RecordingHost {
        self.controller.host()
    }

    fn ids(&self) -> Vec<OverlayId> {
        self.controller.overlays().iter().map(|o| o.id()).collect()
    }
}

fn snapshot(overlay: &Overlay) -> OverlayConfig {
    overlay.to_config()
}

#[test]
fn add_uses_default_sizing_and_global_settings() {
    let mut fx = Fixture::new();
    let wide = fx.media("wide.png", (1000, 500));
    fx.controller.set_opacity(60);
    fx.controller.set_click_through(true);

    let id = fx.controller.add_overlay(&wide).unwrap();

    let overlay = fx.controller.overlay(id).unwrap();
    assert_eq!(overlay.size(), (350, 175));
    assert_eq!(overlay.aspect_ratio(), 2.0);
    assert!((overlay.opacity() - 0.6).abs() < 1e-9);
    assert!(overlay.click_through());
    assert_eq!(fx.host().open_windows, vec![id]);
    assert_eq!(fx.host().restacks(), vec![vec![id]]);
    assert_eq!(fx.host().labels(), vec!["1. wide.png"]);
}

#[test]
fn add_missing_file_reports_and_keeps_list() {
    let mut fx = Fixture::new();
    let ghost = fx.dir.path().join("ghost.png");

    let err = fx.controller.add_overlay(&ghost).unwrap_err();
    assert!(matches!(err, ControllerError::MissingSource(_)));
    assert!(fx.controller.is_empty());
    assert_eq!(fx.host().notices.len(), 1);
    assert!(fx.host().notices[0].is_error());
}

#[test]
fn add_undecodable_file_is_a_media_error() {
    let mut fx = Fixture::new();
    let junk = fx.dir.path().join("junk.png");
    fs::write(&junk, b"junk").unwrap();

    let err = fx.controller.add_overlay(&junk).unwrap_err();
    assert!(matches!(err, ControllerError::Media { .. }));
    assert!(fx.controller.is_empty());
}

#[test]
fn later_overlays_stack_on_top() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 100));
    let b = fx.media("b.png", (100, 100));
    let id_a = fx.controller.add_overlay(&a).unwrap();
    let id_b = fx.controller.add_overlay(&b).unwrap();

    assert_eq!(fx.ids(), vec![id_a, id_b]);
    assert_eq!(fx.host().restacks().last().unwrap(), &vec![id_a, id_b]);
    assert_eq!(fx.host().labels(), vec!["1. a.png", "2. b.png"]);
}

#[test]
fn remove_at_invalid_index_is_a_no_op() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 100));
    let b = fx.media("b.png", (100, 100));
    fx.controller.add_overlay(&a).unwrap();
    fx.controller.add_overlay(&b).unwrap();
    let before = fx.ids();
    let calls = fx.host().calls.len();

    let err = fx.controller.remove_overlay(2).unwrap_err();
    assert!(matches!(err, ControllerError::InvalidIndex { index: 2, len: 2 }));
    assert_eq!(fx.ids(), before);
    assert_eq!(fx.host().calls.len(), calls);
}

#[test]
fn remove_closes_window_and_renumbers_list() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 100));
    let b = fx.media("b.png", (100, 100));
    let id_a = fx.controller.add_overlay(&a).unwrap();
    let id_b = fx.controller.add_overlay(&b).unwrap();

    fx.controller.remove_overlay(0).unwrap();
    assert_eq!(fx.ids(), vec![id_b]);
    assert!(fx.host().calls.contains(&Call::Close(id_a)));
    assert_eq!(fx.host().labels(), vec!["1. b.png"]);

    fx.controller.remove_all();
    assert!(fx.controller.is_empty());
    assert!(fx.host().open_windows.is_empty());
    assert!(fx.host().presentation.is_empty());
}

#[test]
fn reorder_applies_permutation_and_restacks() {
    let mut fx = Fixture::new();
    let paths: Vec<PathBuf> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|n| fx.media(n, (64, 64)))
        .collect();
    let ids: Vec<OverlayId> = paths
        .iter()
        .map(|p| fx.controller.add_overlay(p).unwrap())
        .collect();

    fx.controller.reorder(&[2, 0, 1]).unwrap();
    assert_eq!(fx.ids(), vec![ids[2], ids[0], ids[1]]);
    assert_eq!(
        fx.host().restacks().last().unwrap(),
        &vec![ids[2], ids[0], ids[1]]
    );
    assert_eq!(fx.host().labels(), vec!["1. c.png", "2. a.png", "3. b.png"]);
}

#[test]
fn reorder_rejects_non_permutations() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (64, 64));
    let b = fx.media("b.png", (64, 64));
    fx.controller.add_overlay(&a).unwrap();
    fx.controller.add_overlay(&b).unwrap();
    let before = fx.ids();

    assert!(matches!(
        fx.controller.reorder(&[0, 0]),
        Err(ControllerError::InvalidOrder)
    ));
    assert!(matches!(
        fx.controller.reorder(&[1]),
        Err(ControllerError::InvalidOrder)
    ));
    assert!(matches!(
        fx.controller.reorder(&[1, 5]),
        Err(ControllerError::InvalidIndex { index: 5, len: 2 })
    ));
    assert_eq!(fx.ids(), before);
}

#[test]
fn same_file_twice_reorders_by_id() {
    let mut fx = Fixture::new();
    let a = fx.media("same.png", (64, 64));
    let first = fx.controller.add_overlay(&a).unwrap();
    let second = fx.controller.add_overlay(&a).unwrap();
    assert_ne!(first, second);

    fx.controller.reorder_by_id(&[second, first]).unwrap();
    assert_eq!(fx.ids(), vec![second, first]);
}

#[test]
fn move_overlay_clamps_at_the_ends() {
    let mut fx = Fixture::new();
    let paths: Vec<PathBuf> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|n| fx.media(n, (64, 64)))
        .collect();
    let ids: Vec<OverlayId> = paths
        .iter()
        .map(|p| fx.controller.add_overlay(p).unwrap())
        .collect();

    fx.controller.move_overlay(ids[0], 1).unwrap();
    assert_eq!(fx.ids(), vec![ids[1], ids[0], ids[2]]);

    fx.controller.move_overlay(ids[0], 10).unwrap();
    assert_eq!(fx.ids(), vec![ids[1], ids[2], ids[0]]);

    fx.controller.move_overlay(ids[2], -10).unwrap();
    assert_eq!(fx.ids(), vec![ids[2], ids[1], ids[0]]);
}

#[test]
fn global_controls_reach_every_overlay() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (64, 64));
    let b = fx.media("b.png", (64, 64));
    let id_a = fx.controller.add_overlay(&a).unwrap();
    let id_b = fx.controller.add_overlay(&b).unwrap();

    fx.controller.set_opacity(5);
    assert_eq!(fx.controller.opacity_percent(), 10);
    for overlay in fx.controller.overlays() {
        assert!((overlay.opacity() - 0.1).abs() < 1e-9);
    }

    fx.controller.set_click_through(true);
    assert!(fx.controller.overlays().iter().all(|o| o.click_through()));
    for id in [id_a, id_b] {
        assert!(fx
            .host()
            .calls
            .contains(&Call::Sync(id, Change::InputMode)));
    }
}

#[test]
fn drag_release_moves_window_and_restacks() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 100));
    let b = fx.media("b.png", (100, 100));
    let id_a = fx.controller.add_overlay(&a).unwrap();
    let id_b = fx.controller.add_overlay(&b).unwrap();
    let restacks = fx.host().restacks().len();

    fx.controller.handle_input(
        id_a,
        InputEvent::PointerDown {
            button: Button::Primary,
            x: 110,
            y: 120,
        },
    );
    let moved = fx
        .controller
        .handle_input(id_a, InputEvent::PointerMove { x: 310, y: 20 });
    assert_eq!(moved, InputEffect::Moved);
    assert_eq!(fx.controller.overlay(id_a).unwrap().position(), (300, 0));
    assert!(fx.host().calls.contains(&Call::Sync(id_a, Change::Position)));

    let released = fx.controller.handle_input(
        id_a,
        InputEvent::PointerUp {
            button: Button::Primary,
        },
    );
    assert_eq!(released, InputEffect::Released);

    // the dragged overlay goes back to its list position, not to the top
    let all = fx.host().restacks();
    assert_eq!(all.len(), restacks + 1);
    assert_eq!(all.last().unwrap(), &vec![id_a, id_b]);
}

#[test]
fn wheel_reshape_is_forwarded_to_host() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (200, 100));
    let id = fx.controller.add_overlay(&a).unwrap();

    fx.controller.handle_input(
        id,
        InputEvent::PointerDown {
            button: Button::Primary,
            x: 0,
            y: 0,
        },
    );
    let effect = fx
        .controller
        .handle_input(id, InputEvent::Scroll { delta: -500.0 });
    assert_eq!(effect, InputEffect::Reshaped);
    assert_eq!(fx.controller.overlay(id).unwrap().size(), (100, 50));
    assert!(fx.host().calls.contains(&Call::Sync(id, Change::Shape)));
}

#[test]
fn input_for_unknown_overlay_is_ignored() {
    let mut fx = Fixture::new();
    let effect = fx
        .controller
        .handle_input(OverlayId(42), InputEvent::Scroll { delta: 120.0 });
    assert_eq!(effect, InputEffect::None);
    assert!(fx.host().calls.is_empty());
}

#[test]
fn frame_ready_redraws_only_known_overlays() {
    let mut fx = Fixture::new();
    let a = fx.media("a.gif", (64, 64));
    let id = fx.controller.add_overlay(&a).unwrap();

    fx.controller.frame_ready(id);
    fx.controller.frame_ready(OverlayId(999));
    let redraws: Vec<&Call> = fx
        .host()
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Redraw(_)))
        .collect();
    assert_eq!(redraws, vec![&Call::Redraw(id)]);
}

#[test]
fn save_remove_all_load_restores_layout() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (1000, 500));
    let b = fx.media("b.gif", (120, 240));
    let id_a = fx.controller.add_overlay(&a).unwrap();
    let id_b = fx.controller.add_overlay(&b).unwrap();

    // give both overlays distinct state
    fx.controller.handle_input(
        id_a,
        InputEvent::PointerDown {
            button: Button::Secondary,
            x: 0,
            y: 0,
        },
    );
    fx.controller
        .handle_input(id_a, InputEvent::Scroll { delta: 450.0 });
    fx.controller.handle_input(
        id_a,
        InputEvent::PointerUp {
            button: Button::Secondary,
        },
    );
    fx.controller.handle_input(
        id_b,
        InputEvent::PointerDown {
            button: Button::Primary,
            x: 100,
            y: 100,
        },
    );
    fx.controller
        .handle_input(id_b, InputEvent::PointerMove { x: 640, y: 480 });
    fx.controller.handle_input(
        id_b,
        InputEvent::PointerUp {
            button: Button::Primary,
        },
    );
    fx.controller.set_opacity(70);

    let before: Vec<OverlayConfig> = fx.controller.overlays().iter().map(snapshot).collect();
    let path = fx.layout_path();
    assert_eq!(fx.controller.save_layout(&path).unwrap(), 2);

    fx.controller.remove_all();
    assert!(fx.controller.is_empty());

    let report = fx.controller.load_layout(&path).unwrap();
    assert_eq!(report.loaded, 2);
    assert!(report.missing.is_empty());

    let after: Vec<OverlayConfig> = fx.controller.overlays().iter().map(snapshot).collect();
    assert_eq!(after, before);
    assert_eq!(fx.host().labels(), vec!["1. a.png", "2. b.gif"]);
    assert_eq!(
        fx.host().notices.last(),
        Some(&Notice::LayoutLoaded { count: 2 })
    );
}

#[test]
fn load_skips_missing_source_and_keeps_going() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 50));
    let c = fx.media("c.png", (80, 80));
    let gone = fx.dir.path().join("gone.png");

    let entry = |source: &Path, x: i32| OverlayConfig {
        source: source.to_path_buf(),
        width: 90,
        height: 45,
        rotation: 30.0,
        opacity: 0.5,
        click_through: false,
        position: Some((x, 10)),
    };
    let path = fx.layout_path();
    Layout::new(vec![entry(&a, 1), entry(&gone, 2), entry(&c, 3)])
        .write(&path)
        .unwrap();

    let report = fx.controller.load_layout(&path).unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(report.missing, vec![gone.clone()]);

    let positions: Vec<(i32, i32)> = fx
        .controller
        .overlays()
        .iter()
        .map(|o| o.position())
        .collect();
    assert_eq!(positions, vec![(1, 10), (3, 10)]);

    let missing: Vec<&Notice> = fx
        .host()
        .notices
        .iter()
        .filter(|n| matches!(n, Notice::MissingSource(_)))
        .collect();
    assert_eq!(missing, vec![&Notice::MissingSource(gone)]);
}

#[test]
fn load_skips_undecodable_source_and_keeps_going() {
    let mut fx = Fixture::new();
    let good = fx.media("good.png", (120, 60));
    // exists on disk, but the host cannot decode it
    let bad = fx.dir.path().join("bad.png");
    fs::write(&bad, b"garbage").unwrap();

    let entry = |source: &Path| OverlayConfig {
        source: source.to_path_buf(),
        width: 120,
        height: 60,
        rotation: 0.0,
        opacity: 1.0,
        click_through: false,
        position: None,
    };
    let path = fx.layout_path();
    Layout::new(vec![entry(&bad), entry(&good)])
        .write(&path)
        .unwrap();

    let report = fx.controller.load_layout(&path).unwrap();
    assert_eq!(report.loaded, 1);
    assert!(report.missing.is_empty());
    assert_eq!(report.failed, vec![bad]);

    let sources: Vec<&Path> = fx.controller.overlays().iter().map(|o| o.source()).collect();
    assert_eq!(sources, vec![good.as_path()]);

    let errors = fx
        .host()
        .notices
        .iter()
        .filter(|n| matches!(n, Notice::Error(_)))
        .count();
    assert_eq!(errors, 1);
    assert_eq!(
        fx.host().notices.last(),
        Some(&Notice::LayoutLoaded { count: 1 })
    );
}

#[test]
fn forwarded_commands_drive_the_controller() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 50));
    let layout = fx.layout_path();
    fx.controller.set_click_through(true);

    let flow = control::apply(
        &mut fx.controller,
        Command::Add { path: a.clone() },
        &layout,
    );
    assert_eq!(flow, ControlFlow::Continue(()));
    assert!(fx.controller.overlays()[0].click_through());

    control::apply(
        &mut fx.controller,
        Command::ClickThrough { enabled: false },
        &layout,
    );
    control::apply(&mut fx.controller, Command::Opacity { percent: 40 }, &layout);
    let overlay = &fx.controller.overlays()[0];
    assert!(!overlay.click_through());
    assert!((overlay.opacity() - 0.4).abs() < 1e-9);

    control::apply(&mut fx.controller, Command::SaveLayout, &layout);
    assert_eq!(Layout::read(&layout).unwrap().overlays.len(), 1);

    assert_eq!(
        control::apply(&mut fx.controller, Command::Quit, &layout),
        ControlFlow::Break(())
    );
}

#[test]
fn loading_a_layout_of_moved_files_does_not_quit() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 50));
    fx.controller.add_overlay(&a).unwrap();

    let path = fx.layout_path();
    Layout::new(vec![OverlayConfig {
        source: fx.dir.path().join("moved.png"),
        width: 10,
        height: 10,
        rotation: 0.0,
        opacity: 1.0,
        click_through: false,
        position: None,
    }])
    .write(&path)
    .unwrap();

    let flow = control::apply(&mut fx.controller, Command::LoadLayout, &path);
    assert_eq!(flow, ControlFlow::Continue(()));
    assert!(fx.controller.is_empty());

    // still reachable: a later command brings an overlay back
    control::apply(&mut fx.controller, Command::Add { path: a }, &path);
    assert_eq!(fx.controller.len(), 1);
}

#[test]
fn load_without_layout_leaves_overlays_alone() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 50));
    let id = fx.controller.add_overlay(&a).unwrap();
    let path = fx.layout_path();

    let err = fx.controller.load_layout(&path).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Layout(LayoutError::NotFound(_))
    ));
    assert_eq!(fx.ids(), vec![id]);
    assert_eq!(fx.host().notices, vec![Notice::NoLayout(path)]);
}

#[test]
fn malformed_layout_leaves_overlays_alone() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 50));
    let id = fx.controller.add_overlay(&a).unwrap();
    let path = fx.layout_path();
    fs::write(&path, "{\"overlays\": [{\"source\": 3}]}").unwrap();

    let err = fx.controller.load_layout(&path).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Layout(LayoutError::Parse { .. })
    ));
    assert_eq!(fx.ids(), vec![id]);
    assert!(fx.host().open_windows.contains(&id));
}

#[test]
fn failed_save_keeps_state_and_reports() {
    let mut fx = Fixture::new();
    let a = fx.media("a.png", (100, 50));
    fx.controller.add_overlay(&a).unwrap();
    let before = fx.ids();

    // a directory cannot be replaced by the layout file
    let target = fx.dir.path().to_path_buf();
    let err = fx.controller.save_layout(&target).unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Layout(LayoutError::Write { .. })
    ));
    assert_eq!(fx.ids(), before);
    assert!(fx.host().notices.last().unwrap().is_error());
}
