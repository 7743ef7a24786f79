//! Collective broadcast-and-merge of grid geometry
//!
//! Every worker owns a contiguous range of grid cells. One round per worker:
//! the round's source packs its owned cells, broadcasts the buffer, and every
//! other worker writes the records into its own copy of the grid at the
//! transmitted global indices. After the last round all copies are identical.
//!
//! Buffer layout of one round:
//!
//! ```text
//! count:i32 | (index:i32, record) * count | unused tail
//! ```
//!
//! A count of `-1` marks a round whose source failed to pack.

use super::buffer::CommBuffer;
use super::schema::{ScalarKind, Schema};
use super::transport::{Transport, TypeHandle};
use super::CommError;
use crate::grid::{wind_cell_schema, WindCell};
use crate::profiler::ProfilerScope;
use std::ops::Range;
use tracing::{debug, error, info, warn};

const ABORTED_ROUND: i32 = -1;

/// Summary of one synchronization call on one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Broadcast rounds performed (one per worker)
    pub rounds: usize,
    /// Size of the communication buffer in bytes
    pub buffer_capacity: usize,
    /// Cells this worker packed as a source
    pub cells_sent: usize,
    /// Cells this worker received from other sources
    pub cells_received: usize,
}

/// Bytes needed to carry `max_cells_per_rank` records of `schema` in one round
///
/// Every size is asked of the transport, composite sizes through the
/// registered handles.
///
/// # Errors
/// Returns [`CommError::UnknownType`] if a handle is not registered
pub fn buffer_capacity<T, R: Transport>(
    transport: &R,
    schema: &Schema<T>,
    handles: &[TypeHandle],
    max_cells_per_rank: usize,
) -> Result<usize, CommError> {
    let (ints, doubles) = schema.scalar_counts();

    // One leading count, then a global index plus the record's ints per cell
    let mut capacity =
        transport.scalar_pack_size(1 + max_cells_per_rank * (ints + 1), ScalarKind::Int);
    capacity += transport.scalar_pack_size(max_cells_per_rank * doubles, ScalarKind::Double);
    for &handle in handles {
        capacity += transport.composite_pack_size(max_cells_per_rank, handle)?;
    }
    Ok(capacity)
}

/// Bring every worker's grid to the union of all partitions
///
/// Must be called by every worker of the transport's group, with the same
/// `max_cells_per_rank`. `owned` is this worker's partition; cells outside it
/// are overwritten with the owners' values.
///
/// Allocation failure of the communication buffer is fatal and terminates
/// the process with status 1.
///
/// # Arguments
/// * `transport` - This worker's endpoint
/// * `cells` - This worker's full copy of the grid
/// * `owned` - Global indices this worker owns
/// * `max_cells_per_rank` - Largest partition size across the group
///
/// # Errors
/// Returns [`CommError::BufferOverflow`] if `owned` holds more than
/// `max_cells_per_rank` cells, [`CommError::CellIndexOutOfRange`] if a record
/// addresses a cell outside the local grid, [`CommError::RoundAborted`] if
/// another worker failed to pack, or any error raised by the transport
pub fn synchronize<T: Transport>(
    transport: &mut T,
    cells: &mut [WindCell],
    owned: Range<usize>,
    max_cells_per_rank: usize,
) -> Result<SyncReport, CommError> {
    let _scope = ProfilerScope::new("synchronize");
    info!("Begin communication of wind grid");

    let schema = wind_cell_schema();
    let handles = schema
        .composite_layouts()
        .into_iter()
        .map(|layout| transport.register_composite(layout))
        .collect::<Result<Vec<_>, _>>()?;

    let result = match buffer_capacity(&*transport, &schema, &handles, max_cells_per_rank) {
        Ok(capacity) => {
            let mut buffer = match CommBuffer::allocate(capacity) {
                Ok(buffer) => buffer,
                Err(e) => fatal(&e),
            };
            run_rounds(transport, &schema, &mut buffer, cells, owned)
        }
        Err(e) => Err(e),
    };

    for handle in handles {
        transport.free_composite(handle)?;
    }

    let report = result?;
    info!("Finished communication of wind grid");
    debug!(
        "Sync report: {} rounds, {} byte buffer, {} cells sent, {} received",
        report.rounds, report.buffer_capacity, report.cells_sent, report.cells_received
    );
    Ok(report)
}

fn fatal(e: &CommError) -> ! {
    error!("Unable to allocate communication buffer: {}", e);
    std::process::exit(1);
}

/// Runs every round, keeping the worker in lockstep even after a local failure
fn run_rounds<T: Transport>(
    transport: &mut T,
    schema: &Schema<WindCell>,
    buffer: &mut CommBuffer,
    cells: &mut [WindCell],
    owned: Range<usize>,
) -> Result<SyncReport, CommError> {
    let rank = transport.rank();
    let mut report = SyncReport {
        rounds: transport.size(),
        buffer_capacity: buffer.capacity(),
        ..SyncReport::default()
    };
    let mut failure: Option<CommError> = None;

    for root in 0..transport.size() {
        buffer.rewind();

        if root == rank {
            match pack_partition(schema, buffer, cells, owned.clone()) {
                Ok(sent) => report.cells_sent = sent,
                Err(e) => {
                    warn!("Rank {} failed to pack its partition: {}", rank, e);
                    buffer.rewind();
                    buffer.pack_int(ABORTED_ROUND)?;
                    failure.get_or_insert(e);
                }
            }
        }

        if let Err(e) = transport.broadcast(buffer.as_mut_bytes(), root) {
            failure.get_or_insert(e);
            continue;
        }

        if root != rank && failure.is_none() {
            buffer.rewind();
            match unpack_partition(schema, buffer, cells, root) {
                Ok(received) => report.cells_received += received,
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

fn pack_partition(
    schema: &Schema<WindCell>,
    buffer: &mut CommBuffer,
    cells: &[WindCell],
    owned: Range<usize>,
) -> Result<usize, CommError> {
    let owned_cells = cells.get(owned.clone()).ok_or(CommError::CellIndexOutOfRange {
        index: i64::try_from(owned.end).unwrap_or(i64::MAX),
        cells: cells.len(),
    })?;

    buffer.pack_int(wire_int("cell_count", owned_cells.len())?)?;
    for (index, cell) in owned.zip(owned_cells) {
        buffer.pack_int(wire_int("cell_index", index)?)?;
        schema.pack(cell, buffer)?;
    }
    Ok(owned_cells.len())
}

fn unpack_partition(
    schema: &Schema<WindCell>,
    buffer: &mut CommBuffer,
    cells: &mut [WindCell],
    root: usize,
) -> Result<usize, CommError> {
    let count = buffer.unpack_int()?;
    if count == ABORTED_ROUND {
        return Err(CommError::RoundAborted { root });
    }
    let count = usize::try_from(count).map_err(|_| CommError::InvalidField {
        field: "cell_count",
        reason: format!("negative count {count}"),
    })?;

    let len = cells.len();
    for _ in 0..count {
        let index = buffer.unpack_int()?;
        let cell = usize::try_from(index)
            .ok()
            .and_then(|i| cells.get_mut(i))
            .ok_or(CommError::CellIndexOutOfRange {
                index: i64::from(index),
                cells: len,
            })?;

        // A record that fails to decode leaves the target cell untouched
        let mut scratch = cell.clone();
        schema.unpack(&mut scratch, buffer)?;
        *cell = scratch;
    }
    Ok(count)
}

fn wire_int(field: &'static str, value: usize) -> Result<i32, CommError> {
    i32::try_from(value).map_err(|_| CommError::InvalidField {
        field,
        reason: format!("{value} exceeds the 32-bit wire range"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{SoloTransport, WorkerGroup};
    use crate::grid::InWind;

    fn grid(n: usize) -> Vec<WindCell> {
        (0..n)
            .map(|i| {
                let mut cell = WindCell::new(0, i, i);
                cell.r = 1.0e10 * (i + 1) as f64;
                cell.volume = 1.0e30 + i as f64;
                cell.cone.slope = i as f64 * 0.5;
                cell.in_wind = InWind::All;
                cell
            })
            .collect()
    }

    #[test]
    fn test_capacity_matches_packed_records() {
        let mut transport = SoloTransport::new();
        let schema = wind_cell_schema();
        let handles: Vec<_> = schema
            .composite_layouts()
            .into_iter()
            .map(|l| transport.register_composite(l).unwrap())
            .collect();

        let capacity = buffer_capacity(&transport, &schema, &handles, 5).unwrap();
        assert_eq!(capacity, 4 + 5 * (4 + schema.record_bytes()));
    }

    #[test]
    fn test_solo_sync_is_identity() {
        let mut transport = SoloTransport::new();
        let mut cells = grid(6);
        let before = cells.clone();

        let report = synchronize(&mut transport, &mut cells, 0..6, 6).unwrap();
        assert_eq!(cells, before);
        assert_eq!(report.rounds, 1);
        assert_eq!(report.cells_sent, 6);
        assert_eq!(report.cells_received, 0);
        // Composite registrations are released
        assert!(transport.registry().is_empty());
    }

    #[test]
    fn test_overfull_partition_overflows() {
        let mut transport = SoloTransport::new();
        let mut cells = grid(4);
        let err = synchronize(&mut transport, &mut cells, 0..4, 3).unwrap_err();
        assert!(matches!(err, CommError::BufferOverflow { .. }));
        assert!(transport.registry().is_empty());
    }

    #[test]
    fn test_two_workers_merge() {
        let group = WorkerGroup::new(2).unwrap();
        let serial = grid(5);

        let results = group.run(|mut transport| {
            let owned = if transport.rank() == 0 { 0..3 } else { 3..5 };
            let mut cells = vec![WindCell::default(); 5];
            cells[owned.clone()].clone_from_slice(&serial[owned.clone()]);
            let report = synchronize(&mut transport, &mut cells, owned, 3).unwrap();
            (cells, report)
        });

        for (cells, report) in &results {
            assert_eq!(cells, &serial);
            assert_eq!(report.cells_sent + report.cells_received, 5);
        }
    }

    #[test]
    fn test_truncated_record_leaves_cell_untouched() {
        let schema = wind_cell_schema();
        let source = grid(3);
        let mut full = CommBuffer::allocate(4 + 4 + schema.record_bytes()).unwrap();
        pack_partition(&schema, &mut full, &source, 2..3).unwrap();

        // Drop the trailing in_wind flag so the record ends early
        let mut short = CommBuffer::allocate(full.capacity() - 4).unwrap();
        let len = short.capacity();
        short.as_mut_bytes().copy_from_slice(&full.as_bytes()[..len]);

        let mut cells = vec![WindCell::default(); 3];
        let err = unpack_partition(&schema, &mut short, &mut cells, 0).unwrap_err();
        assert!(matches!(err, CommError::BufferOverflow { .. }));
        assert_eq!(cells[2], WindCell::default());

        full.rewind();
        assert_eq!(unpack_partition(&schema, &mut full, &mut cells, 0).unwrap(), 1);
        assert_eq!(cells[2], source[2]);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let schema = wind_cell_schema();
        let source = grid(4);
        let mut buffer = CommBuffer::allocate(4 + 4 + schema.record_bytes()).unwrap();
        pack_partition(&schema, &mut buffer, &source, 3..4).unwrap();
        buffer.rewind();

        let mut cells = vec![WindCell::default(); 2];
        let err = unpack_partition(&schema, &mut buffer, &mut cells, 0).unwrap_err();
        assert!(matches!(err, CommError::CellIndexOutOfRange { index: 3, cells: 2 }));
    }

    #[test]
    fn test_aborted_round_reported_to_peers() {
        let group = WorkerGroup::new(2).unwrap();
        let results = group.run(|mut transport| {
            let mut cells = grid(6);
            // Rank 1 claims more cells than the advertised maximum
            let owned = if transport.rank() == 0 { 0..2 } else { 2..6 };
            synchronize(&mut transport, &mut cells, owned, 3)
        });

        assert!(matches!(results[0], Err(CommError::RoundAborted { root: 1 })));
        assert!(matches!(results[1], Err(CommError::BufferOverflow { .. })));
    }
}
