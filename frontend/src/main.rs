//! Plate viewer entry point

use std::sync::OnceLock;
use zoon::*;

/// Keeps the main application task alive.
static MAIN_TASK: OnceLock<TaskHandle> = OnceLock::new();

mod animation;
mod app;
mod config;
mod connection;
mod dataflow;
mod error_display;
mod image_loader;
mod image_viewer;
mod plate_grid;
mod plate_session;
mod routing;
mod sidebar;
mod toolbar;
mod widgets;

pub fn main() {
    error_display::install_error_hooks();

    let handle = Task::start_droppable(async {
        let app = app::PlateApp::new();
        let root_element = app.root();
        // The element owns the app so its background tasks live as long as the page.
        start_app("app", move || {
            El::new()
                .s(Width::fill())
                .s(Height::fill())
                .child(root_element)
                .after_remove(move |_| drop(app))
        });
    });
    let _ = MAIN_TASK.set(handle);
}
