//! Renderer-agnostic engine behind the plate grid mosaic.
//!
//! One persistent surface per `(well, site, depth)` cell, created on first
//! use and reused by every later redraw. Paint completions carry the
//! generation they were issued with; a completion older than the cell's
//! latest request is dropped.

use std::collections::HashMap;

use crate::channels::{ImageKind, PLACEHOLDER_IMAGE_URL, build_image_url};
use crate::geometry::{PlateGeometry, plate_size};
use crate::plate::Plate;
use crate::selection::Selection;

/// Edge of one site cell at 100 % zoom.
pub const BASE_CELL_PX: u32 = 100;
const MIN_CELL_PX: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub well: String,
    pub site: String,
    pub depth: String,
}

impl CellKey {
    pub fn new(well: &str, site: &str, depth: &str) -> Self {
        Self { well: well.to_string(), site: site.to_string(), depth: depth.to_string() }
    }

    /// DOM id of the cell's surface.
    pub fn element_id(&self) -> String {
        format!("cell-{}-{}-{}", self.well, self.site, self.depth)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaintJob {
    pub key: CellKey,
    pub url: String,
    pub generation: u64,
    pub brightness_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RedrawPlan {
    pub jobs: Vec<PaintJob>,
    pub cell_size_px: u32,
    /// Surfaces created by this redraw.
    pub created: usize,
}

/// Creates the drawable for a cell seen for the first time.
pub trait SurfaceFactory<S> {
    fn create(&mut self, key: &CellKey, cell_size_px: u32) -> Option<S>;
}

#[derive(Debug, Clone, PartialEq)]
enum GridState {
    Uninitialized,
    Populated { barcode: String, geometry: PlateGeometry },
}

struct Cell<S> {
    surface: S,
    generation: u64,
}

pub struct GridRenderer<S> {
    state: GridState,
    cells: HashMap<CellKey, Cell<S>>,
    next_generation: u64,
}

impl<S> Default for GridRenderer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> GridRenderer<S> {
    pub fn new() -> Self {
        Self {
            state: GridState::Uninitialized,
            cells: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn is_populated(&self) -> bool {
        matches!(self.state, GridState::Populated { .. })
    }

    pub fn geometry(&self) -> Option<PlateGeometry> {
        match &self.state {
            GridState::Populated { geometry, .. } => Some(*geometry),
            GridState::Uninitialized => None,
        }
    }

    /// Builds the grid structure once per plate. Returns `true` only on the
    /// call that performed the transition; later calls for the same plate
    /// are no-ops.
    pub fn ensure_populated(&mut self, plate: &Plate) -> bool {
        if let GridState::Populated { barcode, .. } = &self.state {
            if *barcode == plate.barcode {
                return false;
            }
            self.reset();
        }
        self.state = GridState::Populated {
            barcode: plate.barcode.clone(),
            geometry: plate_size(plate),
        };
        true
    }

    /// Drops every surface; the next plate starts uninitialized.
    pub fn reset(&mut self) {
        self.state = GridState::Uninitialized;
        self.cells.clear();
    }

    pub fn surface_count(&self) -> usize {
        self.cells.len()
    }

    pub fn surface(&self, key: &CellKey) -> Option<&S> {
        self.cells.get(key).map(|cell| &cell.surface)
    }

    pub fn surfaces(&self) -> impl Iterator<Item = (&CellKey, &S)> {
        self.cells.iter().map(|(key, cell)| (key, &cell.surface))
    }

    /// Plans one paint per selected site and depth of every well in the
    /// current acquisition, creating surfaces only for unseen cells.
    pub fn redraw(
        &mut self,
        plate: &Plate,
        selection: &Selection,
        factory: &mut impl SurfaceFactory<S>,
    ) -> RedrawPlan {
        self.ensure_populated(plate);
        let cell_size_px = cell_size_px(selection.zoom_percent);
        let mut plan = RedrawPlan { cell_size_px, ..RedrawPlan::default() };

        let Some(acquisition_id) = selection.acquisition_id.as_deref() else {
            return plan;
        };

        for (well_name, well) in plate.wells(acquisition_id) {
            for site_id in &selection.sites {
                let Some(site) = well.sites.get(site_id) else {
                    continue;
                };
                for depth in &selection.depths {
                    if !site.depths.contains_key(depth) {
                        continue;
                    }
                    let key = CellKey::new(well_name, site_id, depth);
                    let url = match &selection.channels {
                        Some(channels) => build_image_url(
                            Some(plate.channels(acquisition_id, well_name, site_id, Some(depth))),
                            channels,
                            ImageKind::Thumbnail,
                        ),
                        None => PLACEHOLDER_IMAGE_URL.to_string(),
                    };
                    let Some(generation) = self.issue(&key, cell_size_px, factory, &mut plan.created) else {
                        continue;
                    };
                    plan.jobs.push(PaintJob {
                        key,
                        url,
                        generation,
                        brightness_percent: selection.brightness_percent,
                    });
                }
            }
        }
        plan
    }

    fn issue(
        &mut self,
        key: &CellKey,
        cell_size_px: u32,
        factory: &mut impl SurfaceFactory<S>,
        created: &mut usize,
    ) -> Option<u64> {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(cell) = self.cells.get_mut(key) {
            cell.generation = generation;
            return Some(generation);
        }
        let surface = factory.create(key, cell_size_px)?;
        *created += 1;
        self.cells.insert(key.clone(), Cell { surface, generation });
        Some(generation)
    }

    /// Surface to paint a finished load into, or `None` when a newer
    /// request for the same cell has been issued since.
    pub fn complete(&mut self, key: &CellKey, generation: u64) -> Option<&mut S> {
        self.cells
            .get_mut(key)
            .filter(|cell| cell.generation == generation)
            .map(|cell| &mut cell.surface)
    }
}

pub fn cell_size_px(zoom_percent: u32) -> u32 {
    (BASE_CELL_PX * zoom_percent / 100).max(MIN_CELL_PX)
}
