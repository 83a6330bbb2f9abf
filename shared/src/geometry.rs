use serde::{Deserialize, Serialize};

use crate::plate::Plate;
use crate::well_name;

/// Standard plate formats, smallest first.
const BUCKETS: [(usize, usize); 3] = [(8, 12), (16, 24), (32, 48)];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateGeometry {
    pub rows: usize,
    pub cols: usize,
    /// Largest number of sites found in any single well.
    pub sites: usize,
}

impl Default for PlateGeometry {
    fn default() -> Self {
        Self { rows: 8, cols: 12, sites: 1 }
    }
}

impl PlateGeometry {
    /// Columns of the near-square sub-grid that holds one well's sites.
    pub fn site_columns(&self) -> usize {
        (self.sites.max(1) as f64).sqrt().ceil() as usize
    }

    pub fn site_rows(&self) -> usize {
        self.sites.max(1).div_ceil(self.site_columns())
    }

    pub fn well_names(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.rows).flat_map(move |row| {
            (1..=self.cols).filter_map(move |col| well_name::well_name(row, col))
        })
    }
}

/// Smallest bucket strictly containing the zero-based `(max_row, max_col)`.
///
/// An index equal to a bucket edge escalates to the next bucket; anything
/// past 32x48 gets a custom size just large enough.
pub fn bucket_for(max_row: usize, max_col: usize) -> (usize, usize) {
    BUCKETS
        .iter()
        .copied()
        .find(|(rows, cols)| max_row < *rows && max_col < *cols)
        .unwrap_or((max_row + 1, max_col + 1))
}

/// Plate dimensions inferred from every well of every acquisition.
pub fn plate_size(plate: &Plate) -> PlateGeometry {
    let mut max_index: Option<(usize, usize)> = None;
    let mut max_sites = 0;

    for acquisition in plate.acquisitions.values() {
        for (name, well) in &acquisition.wells {
            max_sites = max_sites.max(well.sites.len());
            let Some((row, col)) = well_name::parse_well(name) else {
                continue;
            };
            let (max_row, max_col) = max_index.unwrap_or((0, 0));
            max_index = Some((max_row.max(row), max_col.max(col - 1)));
        }
    }

    let Some((max_row, max_col)) = max_index else {
        return PlateGeometry::default();
    };
    let (rows, cols) = bucket_for(max_row, max_col);
    PlateGeometry { rows, cols, sites: max_sites.max(1) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::parse_plate_response;

    fn plate_with_wells(wells: &[&str]) -> Plate {
        let wells_json: Vec<String> = wells
            .iter()
            .map(|well| format!(r#""{well}": {{"id": "{well}", "sites": {{"1": {{"channels": {{}}}}}}}}"#))
            .collect();
        let json = format!(
            r#"{{"barcode": "P1", "acquisitions": {{"7": {{"id": 7, "wells": {{{}}}}}}}}}"#,
            wells_json.join(",")
        );
        parse_plate_response(&json, "P1").unwrap()
    }

    #[test]
    fn bucket_boundaries_are_exclusive() {
        assert_eq!(bucket_for(7, 11), (8, 12));
        assert_eq!(bucket_for(8, 12), (16, 24));
        assert_eq!(bucket_for(15, 23), (16, 24));
        assert_eq!(bucket_for(16, 24), (32, 48));
        assert_eq!(bucket_for(7, 12), (16, 24));
    }

    #[test]
    fn oversized_plates_get_custom_size() {
        assert_eq!(bucket_for(33, 47), (34, 48));
        assert_eq!(bucket_for(10, 60), (11, 61));
    }

    #[test]
    fn geometry_follows_observed_wells() {
        assert_eq!(plate_size(&plate_with_wells(&["A01", "H12"])).rows, 8);
        let geometry = plate_size(&plate_with_wells(&["A01", "I13"]));
        assert_eq!((geometry.rows, geometry.cols), (16, 24));
        let geometry = plate_size(&plate_with_wells(&["P24"]));
        assert_eq!((geometry.rows, geometry.cols), (16, 24));
        let geometry = plate_size(&plate_with_wells(&["Q25"]));
        assert_eq!((geometry.rows, geometry.cols), (32, 48));
    }

    #[test]
    fn empty_plate_defaults_to_smallest_bucket() {
        let plate = Plate::default();
        assert_eq!(plate_size(&plate), PlateGeometry { rows: 8, cols: 12, sites: 1 });
    }

    #[test]
    fn site_sub_grid_is_near_square() {
        let geometry = PlateGeometry { rows: 8, cols: 12, sites: 9 };
        assert_eq!((geometry.site_columns(), geometry.site_rows()), (3, 3));
        let geometry = PlateGeometry { rows: 8, cols: 12, sites: 5 };
        assert_eq!((geometry.site_columns(), geometry.site_rows()), (3, 2));
    }
}
