//! Spatial indexing for efficient neighbor lookup.

use std::collections::HashMap;

/// Relative widening applied to grid cells so that rounding in the cell
/// division never places two points within epsilon more than one cell apart.
const CELL_MARGIN: f64 = 1.0 + 1e-9;

/// Uniform grid over `D`-dimensional positions for 3^D-neighborhood candidate
/// queries.
///
/// Planar `[lon, lat]` data uses `D = 2`; unit-sphere positions use `D = 3`.
/// Cells are keyed sparsely, so the extent of the data does not matter.
#[derive(Debug)]
pub struct SpatialGrid<const D: usize = 2> {
    cell_size: f64,
    cells: HashMap<[i64; D], Vec<usize>>,
}

impl<const D: usize> SpatialGrid<D> {
    /// Create an empty grid whose cells are at least `cell_size` wide.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size * CELL_MARGIN,
            cells: HashMap::new(),
        }
    }

    /// Build a grid holding every index of `positions`.
    #[must_use]
    pub fn build(positions: &[[f64; D]], cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (i, &p) in positions.iter().enumerate() {
            grid.insert(p, i);
        }
        grid
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_of(&self, p: [f64; D]) -> [i64; D] {
        // `as` saturates, which keeps absurd coordinate/epsilon ratios in range.
        p.map(|v| (v / self.cell_size).floor() as i64)
    }

    /// Insert an index at the given position.
    pub fn insert(&mut self, p: [f64; D], index: usize) {
        let cell = self.cell_of(p);
        self.cells.entry(cell).or_default().push(index);
    }

    /// Collect every index stored in the 3^D cell block around `p`.
    ///
    /// The output is a candidate superset and is not sorted.
    pub fn query_neighborhood_into(&self, p: [f64; D], out: &mut Vec<usize>) {
        let center = self.cell_of(p);
        out.clear();

        let mut offset = [-1i64; D];
        loop {
            let mut key = center;
            for (k, o) in key.iter_mut().zip(offset) {
                *k = k.saturating_add(o);
            }
            if let Some(values) = self.cells.get(&key) {
                out.extend_from_slice(values);
            }

            // Odometer over {-1, 0, 1}^D.
            let mut axis = 0;
            loop {
                if axis == D {
                    return;
                }
                if offset[axis] < 1 {
                    offset[axis] += 1;
                    break;
                }
                offset[axis] = -1;
                axis += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spatial_grid() {
        let coords = [[10.0, 10.0], [10.4, 10.4], [30.0, 30.0], [-10.2, 10.0]];
        let grid = SpatialGrid::<2>::build(&coords, 1.0);

        let mut out = Vec::new();
        grid.query_neighborhood_into([10.0, 10.0], &mut out);
        assert!(out.contains(&0));
        assert!(out.contains(&1));
        assert!(!out.contains(&2));
        assert!(!out.contains(&3));
    }

    #[test]
    fn test_negative_coordinates_share_boundary_cells() {
        // -0.01 and 0.01 straddle the origin and must land in adjacent cells.
        let coords = [[-0.01, -0.01], [0.01, 0.01]];
        let grid = SpatialGrid::<2>::build(&coords, 0.05);

        let mut out = Vec::new();
        grid.query_neighborhood_into(coords[0], &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1]);
    }

    #[test]
    fn test_three_dimensional_block() {
        // Corner neighbor along every axis, and one two cells away on z.
        let positions = [[0.0, 0.0, 0.0], [0.09, -0.09, 0.09], [0.0, 0.0, 0.25]];
        let grid = SpatialGrid::<3>::build(&positions, 0.1);

        let mut out = Vec::new();
        grid.query_neighborhood_into(positions[0], &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1]);
    }
}
