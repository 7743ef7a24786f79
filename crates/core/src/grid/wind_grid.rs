//! A worker's full copy of the grid: domains, grid cells and plasma cells

use super::{PlasmaCell, WindCell};
use crate::geometry::{define_cells, CoordSystem, GeometryError, GridLayout};
use std::ops::Range;
use tracing::debug;

/// One domain and the global cell indices it occupies
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    /// Geometry of the domain
    pub layout: GridLayout,
    /// First global cell index
    pub start: usize,
    /// Number of cells
    pub count: usize,
}

impl Domain {
    /// Global indices of the domain's cells
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.count
    }
}

/// Grid cells and their plasma cells, domain after domain
#[derive(Debug, Clone)]
pub struct WindGrid {
    domains: Vec<Domain>,
    /// Geometry of every cell, replicated by the synchronizer
    pub cells: Vec<WindCell>,
    /// Estimators, one per grid cell
    pub plasma: Vec<PlasmaCell>,
}

impl WindGrid {
    /// Allocate cells for each layout, with indices set and geometry empty
    ///
    /// # Errors
    /// Returns [`GeometryError::InvalidLayout`] if any layout is inconsistent
    pub fn new(layouts: Vec<GridLayout>) -> Result<Self, GeometryError> {
        let mut domains = Vec::with_capacity(layouts.len());
        let mut cells = Vec::new();

        for (number, layout) in layouts.into_iter().enumerate() {
            layout.validate()?;
            let start = cells.len();
            let count = layout.cell_count();
            cells.extend((0..count).map(|i| WindCell::new(number, i, start + i)));
            domains.push(Domain {
                layout,
                start,
                count,
            });
        }

        let plasma = (0..cells.len()).map(|n| PlasmaCell::new(n, n)).collect();
        debug!(
            "Allocated grid with {} domains and {} cells",
            domains.len(),
            cells.len()
        );
        Ok(Self {
            domains,
            cells,
            plasma,
        })
    }

    /// Grid with a single domain
    ///
    /// # Errors
    /// Returns [`GeometryError::InvalidLayout`] if the layout is inconsistent
    pub fn single(layout: GridLayout) -> Result<Self, GeometryError> {
        Self::new(vec![layout])
    }

    /// Domains in cell order
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// Total number of grid cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Coordinate system of the domain holding `cell`
    pub fn coord_system(&self, cell: &WindCell) -> CoordSystem {
        self.domains
            .get(cell.domain)
            .map_or(CoordSystem::default(), |d| d.layout.coord_system)
    }

    /// Define geometry for the global cells in `range`, domain by domain
    ///
    /// # Errors
    /// Returns a [`GeometryError`] if `range` runs past the grid
    pub fn define_range(&mut self, range: Range<usize>) -> Result<(), GeometryError> {
        if range.end > self.cells.len() {
            return Err(GeometryError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                cells: self.cells.len(),
            });
        }

        for domain in &self.domains {
            let start = range.start.max(domain.start);
            let end = range.end.min(domain.start + domain.count);
            if start >= end {
                continue;
            }
            let slice = &mut self.cells[domain.range()];
            define_cells(
                slice,
                start - domain.start..end - domain.start,
                &domain.layout,
            )?;
        }
        Ok(())
    }

    /// Define geometry for every cell
    ///
    /// # Errors
    /// Returns a [`GeometryError`] if a layout is inconsistent
    pub fn define_all(&mut self) -> Result<(), GeometryError> {
        self.define_range(0..self.cells.len())
    }

    /// Clear every plasma cell's estimators
    pub fn reset_estimators(&mut self) {
        self.plasma.iter_mut().for_each(PlasmaCell::reset_estimators);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_domains() -> WindGrid {
        WindGrid::new(vec![
            GridLayout::spherical(4, 1.0e9, 1.0e10),
            GridLayout::cylindrical(2, 3, 1.0e10, 1.0e11),
        ])
        .unwrap()
    }

    #[test]
    fn test_indices_span_domains() {
        let grid = two_domains();
        assert_eq!(grid.cell_count(), 10);
        assert_eq!(grid.domains()[1].range(), 4..10);

        let cell = &grid.cells[5];
        assert_eq!(cell.domain, 1);
        assert_eq!(cell.domain_index, 1);
        assert_eq!(cell.plasma_index, 5);
        assert_eq!(grid.coord_system(cell), CoordSystem::Cylindrical);
        assert_eq!(grid.coord_system(&grid.cells[0]), CoordSystem::Spherical);
    }

    #[test]
    fn test_range_straddling_domains() {
        let mut grid = two_domains();
        grid.define_range(2..6).unwrap();

        assert_eq!(grid.cells[1].volume, 0.0);
        assert!(grid.cells[3].volume > 0.0);
        assert!(grid.cells[4].volume > 0.0);
        assert_eq!(grid.cells[6].volume, 0.0);
        // Local indices survive geometry definition
        assert_eq!(grid.cells[5].domain_index, 1);
    }

    #[test]
    fn test_range_past_end_rejected() {
        let mut grid = two_domains();
        assert!(grid.define_range(8..11).is_err());
        grid.define_all().unwrap();
        assert!(grid.cells.iter().all(|c| c.volume > 0.0));
    }
}
