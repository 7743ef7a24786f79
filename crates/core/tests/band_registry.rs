use radtrans_core::{copy_bands, BandSet, GridLayout, WindGrid};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_copy_bands_is_idempotent() {
    let set = BandSet::from_edges(&[1.0e14, 1.0e15, 3.0e15, 1.0e16, 1.0e17], 0.05).unwrap();
    let mut grid = WindGrid::single(GridLayout::cylindrical(4, 5, 1.0e9, 1.0e11)).unwrap();

    copy_bands(&set, &mut grid.plasma);
    let once = grid.plasma.clone();
    copy_bands(&set, &mut grid.plasma);

    assert_eq!(grid.plasma, once);
    for cell in &grid.plasma {
        assert_eq!(cell.bands.count, 4);
        for (i, band) in set.bands().iter().enumerate() {
            assert_eq!(cell.bands.f1[i], band.f1);
            assert_eq!(cell.bands.f2[i], band.f2);
        }
    }
}

#[test]
fn test_copy_replaces_previous_banding() {
    let wide = BandSet::log_uniform(1.0e14, 1.0e18, 12).unwrap();
    let narrow = BandSet::from_edges(&[1.0e15, 2.0e15], 0.0).unwrap();
    let mut grid = WindGrid::single(GridLayout::spherical(6, 1.0e9, 1.0e11)).unwrap();

    copy_bands(&wide, &mut grid.plasma);
    grid.plasma[2].j = 5.0;
    copy_bands(&narrow, &mut grid.plasma);

    assert!(grid.plasma.iter().all(|c| c.bands.count == 1));
    assert_eq!(grid.plasma[0].bands.f2[0], 2.0e15);
    // Estimators are not part of the copy
    assert_eq!(grid.plasma[2].j, 5.0);
}
