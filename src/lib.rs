// deskpin - pin images and GIFs to the Wayland desktop
// Overlay model, persistence and the layer-shell frontend

pub mod autostart;
pub mod cli;
pub mod control;
pub mod controller;
pub mod geometry;
pub mod instance;
pub mod layout;
pub mod media;
pub mod notify;
pub mod overlay;
pub mod paths;
pub mod render;
pub mod settings;
pub mod wayland;
