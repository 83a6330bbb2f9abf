//! Plate grid: one table cell per well, one persistent `<canvas>` per
//! (well, site, depth) inside it.
//!
//! The table is rebuilt only when a different plate is loaded. Redraws reuse
//! the canvases the [`GridRenderer`] already owns and only replace their
//! pixels, so stepping through acquisitions does not flicker.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use shared::channels::PLACEHOLDER_IMAGE_URL;
use shared::grid::{CellKey, GridRenderer, PaintJob, SurfaceFactory};
use shared::overlay::LayoutOverlay;
use shared::viewer::brightness_filter;
use shared::well_name::{row_letter, well_name};
use shared::{Plate, PlateGeometry, SelectionEdit, plate_size, resolve_image_url};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement};
use zoon::*;

use crate::config::ConfigStore;
use crate::dataflow::Relay;
use crate::image_loader::load_image;
use crate::plate_session::PlateSession;

const LABEL_SIZE_PX: u32 = 24;

pub struct GridSurface {
    canvas: HtmlCanvasElement,
    _on_click: Closure<dyn FnMut()>,
}

fn well_container_id(well: &str) -> String {
    format!("well-{well}")
}

/// Creates canvases inside the well containers of the current table.
struct DomSurfaceFactory {
    document: Document,
    selection_edited_relay: Relay<SelectionEdit>,
}

impl SurfaceFactory<GridSurface> for DomSurfaceFactory {
    fn create(&mut self, key: &CellKey, cell_size_px: u32) -> Option<GridSurface> {
        let container = self.document.get_element_by_id(&well_container_id(&key.well))?;
        let canvas: HtmlCanvasElement = self.document.create_element("canvas").ok()?.dyn_into().ok()?;
        canvas.set_id(&key.element_id());
        canvas.set_title(&format!("{} site {} depth {}", key.well, key.site, key.depth));
        canvas.set_width(cell_size_px);
        canvas.set_height(cell_size_px);

        let on_click = Closure::<dyn FnMut()>::new({
            let relay = self.selection_edited_relay.clone();
            let key = key.clone();
            move || {
                relay.send(SelectionEdit::OpenViewer {
                    well: key.well.clone(),
                    site: key.site.clone(),
                    depth: key.depth.clone(),
                })
            }
        });
        canvas
            .add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
            .ok()?;
        container.append_child(&canvas).ok()?;
        Some(GridSurface { canvas, _on_click: on_click })
    }
}

type SharedRenderer = Rc<RefCell<GridRenderer<GridSurface>>>;

pub fn plate_grid(session: PlateSession, config: ConfigStore) -> impl Element {
    let renderer: SharedRenderer = Rc::new(RefCell::new(GridRenderer::new()));

    let redraw_task = Task::start_droppable({
        let session = session.clone();
        let renderer = renderer.clone();
        session.revisions.grid.signal().for_each(move |_| {
            let session = session.clone();
            let renderer = renderer.clone();
            let image_base_url = config.image_base_url();
            async move {
                // Let the table for a newly loaded plate reach the DOM first.
                Timer::sleep(0).await;
                redraw(&session, &renderer, image_base_url);
            }
        })
    });

    El::new()
        .s(Width::fill())
        .s(Height::fill())
        .s(Scrollbars::both())
        .s(Padding::all(8))
        .child_signal(
            session
                .plate
                .signal_ref(|plate| plate.as_ref().map(|plate| plate.barcode.clone()))
                .dedupe_cloned()
                .map({
                    let session = session.clone();
                    move |barcode| {
                        let plate = session.current_plate().filter(|_| barcode.is_some())?;
                        Some(plate_table(&plate, &session))
                    }
                }),
        )
        .after_remove(move |_| drop(redraw_task))
}

fn redraw(session: &PlateSession, renderer: &SharedRenderer, image_base_url: String) {
    let Some(plate) = session.current_plate() else {
        return;
    };
    let Some(document) = web_sys::window().and_then(|window| window.document()) else {
        return;
    };
    let selection = session.selection.get_cloned();
    let mut factory = DomSurfaceFactory {
        document,
        selection_edited_relay: session.selection_edited_relay.clone(),
    };
    let plan = renderer.borrow_mut().redraw(&plate, &selection, &mut factory);

    let size = format!("{}px", plan.cell_size_px);
    let painted: HashSet<&CellKey> = plan.jobs.iter().map(|job| &job.key).collect();
    for (key, surface) in renderer.borrow().surfaces() {
        let style = surface.canvas.style();
        let display = if painted.contains(key) { "block" } else { "none" };
        let _ = style.set_property("display", display);
        let _ = style.set_property("width", &size);
        let _ = style.set_property("height", &size);
    }

    for job in plan.jobs {
        Task::start(paint(renderer.clone(), job, plan.cell_size_px, image_base_url.clone()));
    }
}

async fn paint(renderer: SharedRenderer, job: PaintJob, cell_size_px: u32, image_base_url: String) {
    let url = resolve_image_url(&image_base_url, &job.url);
    let image = match load_image(&url).await {
        Ok(image) => image,
        Err(_) => match load_image(PLACEHOLDER_IMAGE_URL).await {
            Ok(image) => image,
            Err(error) => {
                zoon::println!("Placeholder image failed to load: {error:?}");
                return;
            }
        },
    };
    let mut renderer = renderer.borrow_mut();
    // A newer paint for this cell was issued while this one loaded.
    let Some(surface) = renderer.complete(&job.key, job.generation) else {
        return;
    };
    if let Err(error) = draw(&surface.canvas, &image, cell_size_px, job.brightness_percent) {
        zoon::println!("Failed to paint {}: {error:?}", job.key.element_id());
    }
}

fn draw(canvas: &HtmlCanvasElement, image: &HtmlImageElement, size: u32, brightness_percent: u32) -> Result<(), JsValue> {
    canvas.set_width(size);
    canvas.set_height(size);
    let context: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("canvas has no 2d context"))?
        .dyn_into()?;
    context.set_filter(&brightness_filter(brightness_percent));
    context.draw_image_with_html_image_element_and_dw_and_dh(image, 0.0, 0.0, f64::from(size), f64::from(size))
}

/// Compound highlight state shared by every indicator of one table.
#[derive(Clone)]
struct OverlayView {
    overlay: Rc<RefCell<LayoutOverlay>>,
    lit: Rc<Vec<Mutable<bool>>>,
}

impl OverlayView {
    fn new(plate: &Plate) -> Self {
        let overlay = LayoutOverlay::build(plate);
        let lit = (0..overlay.len()).map(|_| Mutable::new(false)).collect();
        Self { overlay: Rc::new(RefCell::new(overlay)), lit: Rc::new(lit) }
    }

    fn hover(&self, compound: Option<&str>) {
        for (index, lit) in self.overlay.borrow_mut().hover(compound) {
            if let Some(state) = self.lit.get(index) {
                state.set_neq(lit);
            }
        }
    }
}

fn plate_table(plate: &Plate, session: &PlateSession) -> impl Element {
    let geometry = plate_size(plate);
    let overlay = OverlayView::new(plate);

    Column::new()
        .s(Gap::new().x(2).y(2))
        .item(
            Row::new()
                .s(Gap::new().x(2))
                .item(El::new().s(Width::exact(LABEL_SIZE_PX)))
                .items((1..=geometry.cols).map(|col| axis_label(format!("{col:02}")))),
        )
        .items((0..geometry.rows).map(|row| {
            Row::new()
                .s(Gap::new().x(2))
                .s(Align::new().top())
                .item(axis_label(row_letter(row).map(String::from).unwrap_or_default()))
                .items((1..=geometry.cols).filter_map(|col| well_name(row, col)).map(|well| {
                    well_cell(well, plate, geometry, &overlay, session)
                }))
        }))
}

fn axis_label(text: String) -> impl Element {
    El::new()
        .s(Width::exact(LABEL_SIZE_PX))
        .s(Font::new().size(11).color("rgb(150, 150, 150)").center())
        .child(text)
}

fn well_cell(well: String, plate: &Plate, geometry: PlateGeometry, overlay: &OverlayView, session: &PlateSession) -> impl Element {
    let layout_tooltip: Vec<String> = plate.well_layout_meta(&well).iter().map(|record| record.tooltip()).collect();
    let title = if layout_tooltip.is_empty() {
        well.clone()
    } else {
        format!("{well}\n{}", layout_tooltip.join("\n\n"))
    };

    Stack::new()
        .s(Borders::all(Border::new().width(1).color("rgb(60, 60, 66)")))
        .s(Background::new().color("rgb(20, 20, 22)"))
        .update_raw_el(|raw_el| raw_el.attr("title", &title))
        .layer(
            RawHtmlEl::new("div")
                .attr("id", &well_container_id(&well))
                .style("display", "grid")
                .style("grid-template-columns", &format!("repeat({}, auto)", geometry.site_columns()))
                .style("gap", "1px")
                .style("min-width", "12px")
                .style("min-height", "12px"),
        )
        .layer_signal(session.selection_signal(|selection| selection.show_layout_overlay).map_true({
            let overlay = overlay.clone();
            move || layout_indicators(&well, &overlay)
        }))
}

fn layout_indicators(well: &str, view: &OverlayView) -> impl Element {
    let overlay = view.overlay.borrow();
    Stack::new().layers(overlay.for_well(well).map(|(index, indicator)| {
        let lit = view.lit.get(index).cloned().unwrap_or_default();
        let compound = indicator.compound.clone();
        let view = view.clone();
        El::new()
            .s(Width::exact(8))
            .s(Height::exact(8))
            .s(RoundedCorners::all_max())
            .s(Borders::all_signal(lit.signal().map_bool(
                || Border::new().width(2).color("rgb(255, 255, 255)"),
                || Border::new().width(1).color("rgba(0, 0, 0, 0.4)"),
            )))
            .update_raw_el(|raw_el| {
                raw_el
                    .style("position", "absolute")
                    .style("left", "2px")
                    .style("top", &format!("{}px", 2 + indicator.offset_px))
                    .style("background-color", &indicator.color)
                    .attr("title", &indicator.tooltip)
            })
            .on_hovered_change(move |hovered| view.hover(hovered.then_some(compound.as_str())))
    }))
}
