use radtrans_core::comm::{buffer_capacity, CommBuffer};
use radtrans_core::grid::wind_cell_schema;
use radtrans_core::{
    accumulate, copy_bands, synchronize, BandSet, CommError, GridLayout, PartitionPlan,
    SegmentSampler, SoloTransport, Transport, WindCell, WindGrid, WorkerGroup,
};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn layouts() -> Vec<GridLayout> {
    vec![
        GridLayout::spherical(5, 1.0e9, 1.0e10),
        GridLayout::cylindrical(4, 3, 1.0e10, 1.0e11),
    ]
}

fn serial_grid() -> WindGrid {
    let mut grid = WindGrid::new(layouts()).unwrap();
    grid.define_all().unwrap();
    grid
}

/// Wire image of a grid, compared bit for bit
fn packed(cells: &[WindCell]) -> Vec<u8> {
    let schema = wind_cell_schema();
    let mut buffer = CommBuffer::allocate(cells.len() * schema.record_bytes()).unwrap();
    for cell in cells {
        schema.pack(cell, &mut buffer).unwrap();
    }
    buffer.as_bytes().to_vec()
}

#[test]
fn test_partitioned_sync_matches_serial_grid() {
    let serial = serial_grid();

    for workers in 1..=4 {
        let plan = PartitionPlan::balanced(serial.cell_count(), workers).unwrap();
        plan.validate().unwrap();
        let group = WorkerGroup::new(workers).unwrap();

        let results = group.run(|mut transport| {
            let partition = plan.partition(transport.rank()).unwrap();
            let mut grid = WindGrid::new(layouts()).unwrap();
            grid.define_range(partition.range()).unwrap();
            synchronize(
                &mut transport,
                &mut grid.cells,
                partition.range(),
                plan.max_cells_per_rank(),
            )
            .map(|report| (grid, report))
        });

        for result in results {
            let (grid, report) = result.unwrap();
            assert_eq!(grid.cells, serial.cells, "{workers} workers diverged");
            assert!(
                packed(&grid.cells) == packed(&serial.cells),
                "{workers} workers differ from the serial grid at the byte level"
            );
            assert_eq!(report.rounds, workers);
            assert_eq!(report.cells_sent + report.cells_received, serial.cell_count());
        }
    }
}

#[test]
fn test_uneven_partition_within_capacity() {
    // Explicit plan with one large and one tiny partition
    let serial = serial_grid();
    let total = serial.cell_count();
    let plan = PartitionPlan::from_ranges(total, &[0..total - 2, total - 2..total]);
    plan.validate().unwrap();

    let group = WorkerGroup::new(2).unwrap();
    let results = group.run(|mut transport| {
        let range = plan.partition(transport.rank()).unwrap().range();
        let mut grid = WindGrid::new(layouts()).unwrap();
        grid.define_range(range.clone()).unwrap();
        synchronize(&mut transport, &mut grid.cells, range, plan.max_cells_per_rank())
            .map(|_| grid.cells)
    });

    for cells in results {
        let cells = cells.unwrap();
        assert_eq!(cells, serial.cells);
        assert!(packed(&cells) == packed(&serial.cells));
    }
}

#[test]
fn test_partition_beyond_capacity_overflows() {
    let mut grid = serial_grid();
    let total = grid.cell_count();
    let mut transport = SoloTransport::new();

    // Exactly max cells fit
    synchronize(&mut transport, &mut grid.cells, 0..4, 4).unwrap();

    // One more is an error, not a write past the buffer
    let err = synchronize(&mut transport, &mut grid.cells, 0..5, 4).unwrap_err();
    assert!(matches!(err, CommError::BufferOverflow { .. }));
    assert_eq!(grid.cells, serial_grid().cells);
    assert!(total > 5);
}

#[test]
fn test_capacity_is_queried_from_transport() {
    let mut transport = SoloTransport::new();
    let schema = wind_cell_schema();
    let handles: Vec<_> = schema
        .composite_layouts()
        .into_iter()
        .map(|layout| transport.register_composite(layout).unwrap())
        .collect();

    let (ints, doubles) = schema.scalar_counts();
    let capacity = buffer_capacity(&transport, &schema, &handles, 7).unwrap();
    let expected = 4 * (1 + 7 * (ints + 1)) + 8 * 7 * doubles + 7 * 16;
    assert_eq!(capacity, expected);

    for handle in handles {
        transport.free_composite(handle).unwrap();
    }
}

#[test]
fn test_workers_accumulate_after_sync() {
    let serial = serial_grid();
    let bands = BandSet::log_uniform(1.0e14, 1.0e18, 6).unwrap();
    let plan = PartitionPlan::balanced(serial.cell_count(), 3).unwrap();
    let group = WorkerGroup::new(3).unwrap();

    let results = group.run(|mut transport| {
        let range = plan.partition(transport.rank()).unwrap().range();
        let mut grid = WindGrid::new(layouts()).unwrap();
        grid.define_range(range.clone()).unwrap();
        synchronize(
            &mut transport,
            &mut grid.cells,
            range.clone(),
            plan.max_cells_per_rank(),
        )
        .unwrap();
        copy_bands(&bands, &mut grid.plasma);

        let mut sampler = SegmentSampler::new(100 + transport.rank() as u64, 1.0e14, 1.0e18);
        for n in range.clone() {
            let coord_system = grid.coord_system(&grid.cells[n]);
            for _ in 0..20 {
                let segment = sampler.sample(&grid.cells[n]);
                accumulate(&mut grid.plasma[n], &segment, coord_system);
            }
        }
        (range, grid)
    });

    for (range, grid) in results {
        assert!(packed(&grid.cells) == packed(&serial.cells));
        for (n, plasma) in grid.plasma.iter().enumerate() {
            if range.contains(&n) {
                assert_eq!(plasma.segment_count, 20);
                assert!(plasma.j > 0.0);
                assert!(plasma.provenance.total >= 1);
            } else {
                assert_eq!(plasma.segment_count, 0);
            }
        }
    }
}
