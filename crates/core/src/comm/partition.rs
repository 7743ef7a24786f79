//! Domain decomposition of the grid into contiguous per-worker ranges

use super::CommError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Contiguous range of grid cells owned by one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Owning worker
    pub rank: usize,
    /// First owned cell
    pub start: usize,
    /// One past the last owned cell
    pub stop: usize,
}

impl Partition {
    /// Number of owned cells
    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    /// Whether the worker owns no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owned cells as a range
    pub fn range(&self) -> Range<usize> {
        self.start..self.stop
    }

    /// Whether `cell` belongs to this partition
    pub fn contains(&self, cell: usize) -> bool {
        self.range().contains(&cell)
    }
}

/// Cell count of the largest partition when `total_cells` are split over `workers`
///
/// Returns 0 for an empty group.
pub fn max_cells_per_rank(total_cells: usize, workers: usize) -> usize {
    if workers == 0 {
        0
    } else {
        total_cells.div_ceil(workers)
    }
}

/// Assignment of every grid cell to exactly one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionPlan {
    total_cells: usize,
    partitions: Vec<Partition>,
}

impl PartitionPlan {
    /// Split `total_cells` into `workers` contiguous ranges
    ///
    /// Each worker gets `total / workers` cells and the first
    /// `total % workers` workers get one more, so sizes differ by at most one.
    ///
    /// # Errors
    /// Returns [`CommError::Partition`] when `workers` is zero
    pub fn balanced(total_cells: usize, workers: usize) -> Result<Self, CommError> {
        if workers == 0 {
            return Err(CommError::Partition(
                "cannot partition a grid over zero workers".to_string(),
            ));
        }

        let base = total_cells / workers;
        let extra = total_cells % workers;

        let partitions = (0..workers)
            .map(|rank| {
                let start = if rank < extra {
                    rank * (base + 1)
                } else {
                    extra * (base + 1) + (rank - extra) * base
                };
                let len = if rank < extra { base + 1 } else { base };
                Partition {
                    rank,
                    start,
                    stop: start + len,
                }
            })
            .collect();

        Ok(Self {
            total_cells,
            partitions,
        })
    }

    /// Build a plan from explicit ranges, one per worker in rank order
    ///
    /// The ranges are taken as given; call [`PartitionPlan::validate`] to
    /// check them.
    pub fn from_ranges(total_cells: usize, ranges: &[Range<usize>]) -> Self {
        let partitions = ranges
            .iter()
            .enumerate()
            .map(|(rank, r)| Partition {
                rank,
                start: r.start,
                stop: r.end,
            })
            .collect();
        Self {
            total_cells,
            partitions,
        }
    }

    /// Total number of grid cells
    pub fn total_cells(&self) -> usize {
        self.total_cells
    }

    /// Number of workers
    pub fn workers(&self) -> usize {
        self.partitions.len()
    }

    /// All partitions in rank order
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Partition of one worker
    ///
    /// # Errors
    /// Returns [`CommError::InvalidRank`] if `rank` is not in the plan
    pub fn partition(&self, rank: usize) -> Result<&Partition, CommError> {
        self.partitions.get(rank).ok_or(CommError::InvalidRank {
            rank,
            size: self.partitions.len(),
        })
    }

    /// Size of the largest partition
    pub fn max_cells_per_rank(&self) -> usize {
        self.partitions.iter().map(Partition::len).max().unwrap_or(0)
    }

    /// Check that partitions are disjoint, inside the grid, and cover every cell
    ///
    /// # Errors
    /// Returns [`CommError::Partition`] naming the first overlapping,
    /// out-of-range or unowned cell
    pub fn validate(&self) -> Result<(), CommError> {
        let mut owner: Vec<Option<usize>> = vec![None; self.total_cells];

        for partition in &self.partitions {
            if partition.stop > self.total_cells {
                return Err(CommError::Partition(format!(
                    "rank {} claims cells up to {} but the grid has {}",
                    partition.rank, partition.stop, self.total_cells
                )));
            }
            for cell in partition.range() {
                if let Some(other) = owner[cell] {
                    return Err(CommError::Partition(format!(
                        "cell {} is claimed by both rank {} and rank {}",
                        cell, other, partition.rank
                    )));
                }
                owner[cell] = Some(partition.rank);
            }
        }

        if let Some(cell) = owner.iter().position(Option::is_none) {
            return Err(CommError::Partition(format!("cell {cell} has no owner")));
        }
        Ok(())
    }
}
