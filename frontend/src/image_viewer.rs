//! Full-size viewer for one well position.
//!
//! Every acquisition of the plate gets its own stacked `<img>` layer at the
//! same (well, site, depth). Switching acquisitions, whether by hand or by
//! the animation timer, only changes which layer is opaque.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use shared::channels::PLACEHOLDER_IMAGE_URL;
use shared::viewer::{LayerRequest, ViewerKey, ViewerSynchronizer, brightness_filter};
use shared::{SelectionEdit, resolve_image_url};
use web_sys::HtmlImageElement;
use zoon::*;

use crate::config::ConfigStore;
use crate::image_loader::load_image;
use crate::plate_session::PlateSession;
use crate::widgets::{MUTED_TEXT_COLOR, TEXT_COLOR, tool_button};

const STACK_ID: &str = "viewer-stack";

/// Layer bookkeeping shared by the revision task and the UI callbacks.
#[derive(Clone)]
struct ViewerLayers {
    session: PlateSession,
    config: ConfigStore,
    sync: Rc<RefCell<ViewerSynchronizer>>,
    images: Rc<RefCell<IndexMap<String, HtmlImageElement>>>,
    /// `(finished, total)` layer loads.
    progress: Mutable<(usize, usize)>,
}

/// Lives for the whole session; the element itself exists only while a
/// well is open.
#[derive(Clone)]
pub struct ImageViewer {
    layers: ViewerLayers,
    _revision_task: Rc<TaskHandle>,
}

impl ImageViewer {
    pub fn new(session: PlateSession, config: ConfigStore) -> Self {
        let layers = ViewerLayers {
            session: session.clone(),
            config,
            sync: Rc::new(RefCell::new(ViewerSynchronizer::new())),
            images: Rc::new(RefCell::new(IndexMap::new())),
            progress: Mutable::new((0, 0)),
        };
        let revision_task = Task::start_droppable(session.revisions.viewer.signal().for_each({
            let layers = layers.clone();
            move |_| {
                let layers = layers.clone();
                async move {
                    // The viewer element mounts on the same selection change.
                    Timer::sleep(0).await;
                    layers.refresh();
                }
            }
        }));
        Self { layers, _revision_task: Rc::new(revision_task) }
    }

    pub fn root(&self) -> impl Element + use<> {
        self.layers.root()
    }
}

impl ViewerLayers {
    fn refresh(&self) {
        let selection = self.session.selection.get_cloned();
        let plate = self.session.current_plate();
        let (Some(plate), Some((acquisition_id, well, site, depth)), Some(channels)) =
            (plate, selection.viewer_position(), selection.channels.clone())
        else {
            self.close();
            return;
        };
        let key = ViewerKey {
            well: well.to_string(),
            site: site.to_string(),
            depth: depth.to_string(),
            channels,
        };
        if self.sync.borrow().key() != Some(&key) {
            self.remove_images();
        }
        let requests = self.sync.borrow_mut().enter(&plate, key, acquisition_id);
        let image_base_url = self.config.image_base_url();
        for request in requests {
            Task::start(self.clone().load_layer(request, image_base_url.clone()));
        }
        self.apply_opacity();
        self.update_progress();
    }

    fn close(&self) {
        self.sync.borrow_mut().close();
        self.remove_images();
        self.update_progress();
    }

    fn remove_images(&self) {
        for (_, image) in self.images.borrow_mut().drain(..) {
            image.remove();
        }
    }

    async fn load_layer(self, request: LayerRequest, image_base_url: String) {
        let url = resolve_image_url(&image_base_url, &request.url);
        let (image, loaded) = match load_image(&url).await {
            Ok(image) => (Some(image), true),
            Err(_) => (load_image(PLACEHOLDER_IMAGE_URL).await.ok(), false),
        };
        let accepted = {
            let mut sync = self.sync.borrow_mut();
            if loaded {
                sync.load_completed(&request.acquisition_id, request.generation)
            } else {
                sync.load_failed(&request.acquisition_id, request.generation)
            }
        };
        if !accepted {
            return;
        }
        if let Some(image) = image {
            self.mount_image(&request.acquisition_id, image);
        }
        self.apply_opacity();
        self.update_progress();
    }

    fn mount_image(&self, acquisition_id: &str, image: HtmlImageElement) {
        let Some(stack) = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(STACK_ID))
        else {
            return;
        };
        image.set_alt(acquisition_id);
        let style = image.style();
        for (name, value) in [
            ("position", "absolute"),
            ("inset", "0"),
            ("width", "100%"),
            ("height", "100%"),
            ("object-fit", "contain"),
            ("opacity", "0"),
        ] {
            let _ = style.set_property(name, value);
        }
        if stack.append_child(&image).is_err() {
            return;
        }
        if let Some(previous) = self.images.borrow_mut().insert(acquisition_id.to_string(), image) {
            previous.remove();
        }
    }

    fn apply_opacity(&self) {
        let sync = self.sync.borrow();
        let images = self.images.borrow();
        for (acquisition_id, layer) in sync.layers() {
            if let Some(image) = images.get(acquisition_id) {
                let _ = image.style().set_property("opacity", &layer.opacity.to_string());
            }
        }
    }

    fn update_progress(&self) {
        self.progress.set_neq(self.sync.borrow().progress());
    }

    /// Neighbouring acquisition id, wrapping at both ends.
    fn step_acquisition(&self, forward: bool) {
        let Some(plate) = self.session.current_plate() else {
            return;
        };
        let ids = plate.acquisition_ids();
        if ids.is_empty() {
            return;
        }
        let current = self
            .session
            .selection
            .lock_ref()
            .acquisition_id
            .as_deref()
            .and_then(|id| plate.acquisition_index(id));
        let next = match (current, forward) {
            (None, _) => 0,
            (Some(index), true) => (index + 1) % ids.len(),
            (Some(index), false) => (index + ids.len() - 1) % ids.len(),
        };
        if let Some(id) = ids.get(next) {
            self.session.edit(SelectionEdit::Acquisition(id.clone()));
        }
    }

    fn root(&self) -> impl Element + use<> {
        let session = self.session.clone();
        Column::new()
            .s(Width::fill())
            .s(Height::fill())
            .s(Background::new().color("rgba(0, 0, 0, 0.92)"))
            .s(Padding::all(12))
            .s(Gap::new().y(8))
            .item(self.header())
            .item(
                El::new()
                    .s(Width::fill())
                    .s(Height::fill())
                    .s(Scrollbars::both())
                    .update_raw_el(|raw_el| {
                        raw_el.style_signal(
                            "filter",
                            session.selection_signal(|selection| brightness_filter(selection.brightness_percent)),
                        )
                    })
                    .child(
                        RawHtmlEl::new("div")
                            .attr("id", STACK_ID)
                            .style("position", "relative")
                            .style("width", "100%")
                            .style("height", "100%")
                            .style("transform-origin", "top left")
                            .style_signal(
                                "transform",
                                session.selection_signal(|selection| {
                                    format!("scale({})", f64::from(selection.zoom_percent) / 100.0)
                                }),
                            ),
                    ),
            )
    }

    fn header(&self) -> impl Element + use<> {
        let session = self.session.clone();
        let title = session.selection_signal(|selection| match selection.viewer_position() {
            Some((acquisition_id, well, site, depth)) => {
                format!("Acquisition {acquisition_id} · {well} · site {site} · depth {depth}")
            }
            None => String::new(),
        });
        let progress = self.progress.signal().map(|(finished, total)| {
            if finished < total {
                format!("Loading {finished}/{total}")
            } else {
                format!("{total} acquisitions")
            }
        });

        Row::new()
            .s(Width::fill())
            .s(Gap::new().x(8))
            .item(tool_button("◀", "Previous acquisition", {
                let viewer = self.clone();
                move || viewer.step_acquisition(false)
            }))
            .item(tool_button("▶", "Next acquisition", {
                let viewer = self.clone();
                move || viewer.step_acquisition(true)
            }))
            .item(
                El::new()
                    .s(Font::new().size(14).color(TEXT_COLOR).no_wrap())
                    .child_signal(title),
            )
            .item(
                El::new()
                    .s(Font::new().size(12).color(MUTED_TEXT_COLOR))
                    .child_signal(progress),
            )
            .item(
                El::new().s(Align::new().right()).child(tool_button("✕", "Close viewer", move || {
                    session.edit(SelectionEdit::CloseViewer)
                })),
            )
    }
}
