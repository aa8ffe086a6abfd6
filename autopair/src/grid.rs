//! Regular 3D cell grid with a one-deep halo shell.
//!
//! The grid spans the owned box `[box_min, box_max)` with cells whose side
//! length is at least `interaction_length * cell_size_factor` along each
//! axis, surrounded by one layer of halo cells on every face. Every position
//! inside the box maps to exactly one owned cell; every position outside maps
//! to exactly one halo cell (positions beyond the halo shell are clamped into
//! the outermost layer).

use crate::utils::math::in_box;

/// Geometry and index arithmetic of a cell grid with halo.
#[derive(Debug, Clone)]
pub struct CellBlock3d {
    box_min: [f64; 3],
    box_max: [f64; 3],
    interaction_length: f64,
    /// Cells per dimension including the two halo layers.
    cells_per_dim: [usize; 3],
    cell_length: [f64; 3],
    inv_cell_length: [f64; 3],
}

impl CellBlock3d {
    /// Lay out the grid.
    ///
    /// # Arguments
    /// * `box_min` / `box_max` - Corners of the owned domain.
    /// * `interaction_length` - Cutoff plus skin; lower bound of the cell side.
    /// * `cell_size_factor` - Scales the minimum cell side.
    ///
    /// # Panics
    /// Panics if the box is empty along any axis or the lengths are not
    /// positive.
    pub fn new(
        box_min: [f64; 3],
        box_max: [f64; 3],
        interaction_length: f64,
        cell_size_factor: f64,
    ) -> Self {
        assert!(
            interaction_length > 0.0 && cell_size_factor > 0.0,
            "interaction length and cell size factor must be positive"
        );
        let mut cells_per_dim = [0usize; 3];
        let mut cell_length = [0.0f64; 3];
        let mut inv_cell_length = [0.0f64; 3];
        let min_side = interaction_length * cell_size_factor;
        for k in 0..3 {
            let len = box_max[k] - box_min[k];
            assert!(len > 0.0, "domain is empty along axis {k}");
            let interior = ((len / min_side).floor() as usize).max(1);
            cells_per_dim[k] = interior + 2;
            cell_length[k] = len / interior as f64;
            inv_cell_length[k] = 1.0 / cell_length[k];
        }
        Self {
            box_min,
            box_max,
            interaction_length,
            cells_per_dim,
            cell_length,
            inv_cell_length,
        }
    }

    /// Lower corner of the owned domain.
    pub fn box_min(&self) -> [f64; 3] {
        self.box_min
    }

    /// Upper corner of the owned domain.
    pub fn box_max(&self) -> [f64; 3] {
        self.box_max
    }

    /// Cutoff plus skin the grid was laid out for.
    pub fn interaction_length(&self) -> f64 {
        self.interaction_length
    }

    /// Cells per dimension, including the two halo layers.
    pub fn cells_per_dim(&self) -> [usize; 3] {
        self.cells_per_dim
    }

    /// Side lengths of one cell.
    pub fn cell_length(&self) -> [f64; 3] {
        self.cell_length
    }

    /// Total number of cells, halo included.
    pub fn num_cells(&self) -> usize {
        self.cells_per_dim.iter().product()
    }

    /// Map 3D cell coordinates to the 1D index, x fastest.
    pub fn three_to_one(&self, c: [usize; 3]) -> usize {
        c[0] + self.cells_per_dim[0] * (c[1] + self.cells_per_dim[1] * c[2])
    }

    /// Map a 1D cell index back to 3D coordinates.
    pub fn one_to_three(&self, index: usize) -> [usize; 3] {
        let nx = self.cells_per_dim[0];
        let ny = self.cells_per_dim[1];
        [index % nx, (index / nx) % ny, index / (nx * ny)]
    }

    /// 3D cell coordinates of a position, clamped into the grid.
    pub fn index_3d_of_position(&self, r: [f64; 3]) -> [usize; 3] {
        let mut c = [0usize; 3];
        for k in 0..3 {
            let offset = (r[k] - self.box_min[k]) * self.inv_cell_length[k];
            // +1 shifts into the interior past the lower halo layer
            let cell = offset.floor() as isize + 1;
            c[k] = cell.clamp(0, self.cells_per_dim[k] as isize - 1) as usize;
        }
        c
    }

    /// 1D cell index of a position, clamped into the grid.
    pub fn index_of_position(&self, r: [f64; 3]) -> usize {
        self.three_to_one(self.index_3d_of_position(r))
    }

    /// Whether the cell at `index` belongs to the halo shell.
    pub fn is_halo_cell(&self, index: usize) -> bool {
        let c = self.one_to_three(index);
        (0..3).any(|k| c[k] == 0 || c[k] == self.cells_per_dim[k] - 1)
    }

    /// Bounding box `[lo, hi)` of the cell at `index`.
    pub fn cell_bounding_box(&self, index: usize) -> ([f64; 3], [f64; 3]) {
        let c = self.one_to_three(index);
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for k in 0..3 {
            lo[k] = self.box_min[k] + (c[k] as f64 - 1.0) * self.cell_length[k];
            hi[k] = lo[k] + self.cell_length[k];
        }
        (lo, hi)
    }

    /// Indices of halo cells whose bounding box, grown by `tolerance`, contains
    /// `r`. Used to locate the prior copy of a halo particle that may have
    /// drifted across a cell border.
    pub fn nearby_halo_cells(&self, r: [f64; 3], tolerance: f64) -> Vec<usize> {
        let lo3 = self.index_3d_of_position([r[0] - tolerance, r[1] - tolerance, r[2] - tolerance]);
        let hi3 = self.index_3d_of_position([r[0] + tolerance, r[1] + tolerance, r[2] + tolerance]);
        let mut cells = Vec::new();
        for z in lo3[2]..=hi3[2] {
            for y in lo3[1]..=hi3[1] {
                for x in lo3[0]..=hi3[0] {
                    let index = self.three_to_one([x, y, z]);
                    if self.is_halo_cell(index) {
                        cells.push(index);
                    }
                }
            }
        }
        cells
    }

    /// Whether `r` lies in the owned box.
    pub fn position_is_owned(&self, r: [f64; 3]) -> bool {
        in_box(r, self.box_min, self.box_max)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn block() -> CellBlock3d {
        CellBlock3d::new([0.0; 3], [10.0; 3], 1.0, 1.0)
    }

    #[test]
    fn test_dimensions_include_halo() {
        let b = block();
        assert_eq!(b.cells_per_dim(), [12, 12, 12]);
        assert_eq!(b.num_cells(), 12 * 12 * 12);
        assert_eq!(b.cell_length(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_index_round_trip() {
        let b = block();
        for index in [0, 1, 143, 1000, b.num_cells() - 1] {
            assert_eq!(b.three_to_one(b.one_to_three(index)), index);
        }
    }

    #[test]
    fn test_owned_position_maps_to_owned_cell() {
        let b = block();
        let index = b.index_of_position([5.5, 0.0, 9.999]);
        assert!(!b.is_halo_cell(index));
        let (lo, hi) = b.cell_bounding_box(index);
        assert!(in_box([5.5, 0.0, 9.999], lo, hi));
    }

    #[test]
    fn test_outside_position_maps_to_halo_cell() {
        let b = block();
        for r in [
            [-0.5, 5.0, 5.0],
            [10.0, 5.0, 5.0],
            [5.0, -0.1, 5.0],
            [5.0, 5.0, 10.7],
        ] {
            let index = b.index_of_position(r);
            assert!(b.is_halo_cell(index), "expected halo cell for {r:?}");
        }
    }

    #[test]
    fn test_far_positions_clamp_into_outer_layer() {
        let b = block();
        let index = b.index_of_position([1e30, -1e30, 5.0]);
        let c = b.one_to_three(index);
        assert_eq!(c[0], 11);
        assert_eq!(c[1], 0);
    }

    #[test]
    fn test_nonuniform_box_min() {
        let b = CellBlock3d::new([-5.0, 0.0, 2.0], [5.0, 3.0, 12.0], 1.5, 1.0);
        // interiors: x: floor(10/1.5)=6, y: floor(3/1.5)=2, z: 6
        assert_eq!(b.cells_per_dim(), [8, 4, 8]);
        let index = b.index_of_position([-4.9, 0.1, 2.1]);
        assert!(!b.is_halo_cell(index));
        assert_eq!(b.one_to_three(index), [1, 1, 1]);
    }
}
