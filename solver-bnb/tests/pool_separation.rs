//! Cut and column pool behavior across LP solves: laziness, aging,
//! duplicate handling and removal errors.

use solver_bnb::cuts::{CutPool, SepaStore};
use solver_bnb::lp::{Column, Lp, Row, RowId};
use solver_bnb::pool::SeparationResult;
use solver_bnb::price::{ColumnPool, PriceStore, PricingMode};
use solver_bnb::{BnbError, PoolSettings, PriceStoreSettings};

/// `x0 + x1 <= rhs`
fn make_cut(lp: &mut Lp, name: &str, rhs: f64) -> RowId {
    lp.create_row(Row::new(name, 2, vec![(0, 1.0), (1, 1.0)], f64::NEG_INFINITY, rhs).unwrap())
}

#[test]
fn test_unviolated_cut_evicted_after_age_limit() {
    let mut lp = Lp::new();
    let mut pool = CutPool::new(PoolSettings::default().with_age_limit(2)).unwrap();
    let mut sepa = SepaStore::new();

    let cut = make_cut(&mut lp, "c", 10.0);
    pool.add_row(cut, &mut lp).unwrap();

    for round in 1..=3 {
        lp.install_solution(vec![1.0, 1.0], vec![], 0.0);
        let result = pool.separate(&mut lp, &mut sepa).unwrap();
        assert_eq!(result, SeparationResult::NotFound);

        if round < 3 {
            assert_eq!(pool.entry(cut, &lp).unwrap().map(|e| e.age), Some(round));
        }
    }

    assert!(!pool.contains(cut, &lp).unwrap());
    assert!(pool.is_empty());
    assert_eq!(pool.stats().evicted, 1);
    // Only the caller's use is left
    assert_eq!(lp.rows().nuses(cut).unwrap(), 1);
}

#[test]
fn test_violation_resets_age() {
    let mut lp = Lp::new();
    let mut pool = CutPool::new(PoolSettings::default().with_age_limit(1)).unwrap();
    let mut sepa = SepaStore::new();

    let cut = make_cut(&mut lp, "c", 1.0);
    pool.add_row(cut, &mut lp).unwrap();

    lp.install_solution(vec![0.0, 0.0], vec![], 0.0);
    pool.separate(&mut lp, &mut sepa).unwrap();
    assert_eq!(pool.entry(cut, &lp).unwrap().map(|e| e.age), Some(1));

    lp.install_solution(vec![1.0, 1.0], vec![], 0.0);
    assert_eq!(pool.separate(&mut lp, &mut sepa).unwrap(), SeparationResult::Found);
    assert_eq!(pool.entry(cut, &lp).unwrap().map(|e| e.age), Some(0));
    sepa.clear(&mut lp).unwrap();
}

#[test]
fn test_same_lp_is_not_rescanned() {
    let mut lp = Lp::new();
    let mut pool = CutPool::new(PoolSettings::default()).unwrap();
    let mut sepa = SepaStore::new();

    pool.add_row(make_cut(&mut lp, "a", 1.0), &mut lp).unwrap();
    pool.add_row(make_cut(&mut lp, "b", 5.0), &mut lp).unwrap();

    lp.install_solution(vec![1.0, 1.0], vec![], 0.0);
    assert_eq!(pool.separate(&mut lp, &mut sepa).unwrap(), SeparationResult::Found);
    let checks = pool.stats().checks;
    assert_eq!(checks, 2);

    assert_eq!(pool.separate(&mut lp, &mut sepa).unwrap(), SeparationResult::NotRun);
    assert_eq!(pool.stats().checks, checks);

    // A new entry is the only one checked against the same LP
    pool.add_row(make_cut(&mut lp, "c", 0.5), &mut lp).unwrap();
    assert_eq!(pool.separate(&mut lp, &mut sepa).unwrap(), SeparationResult::Found);
    assert_eq!(pool.stats().checks, checks + 1);
    assert_eq!(sepa.len(), 2);
    sepa.clear(&mut lp).unwrap();
}

#[test]
fn test_equal_cuts_stored_once() {
    let mut lp = Lp::new();
    let mut pool = CutPool::new(PoolSettings::default()).unwrap();

    let first = make_cut(&mut lp, "first", 3.0);
    let copy = make_cut(&mut lp, "copy", 3.0);
    assert_ne!(first, copy);

    let (stored, duplicate) = pool.add_row(first, &mut lp).unwrap();
    assert_eq!((stored, duplicate), (first, false));
    let (stored, duplicate) = pool.add_row(copy, &mut lp).unwrap();
    assert_eq!((stored, duplicate), (first, true));

    assert_eq!(pool.len(), 1);
    assert_eq!(lp.rows().nuses(first).unwrap(), 2);
    assert_eq!(lp.rows().nuses(copy).unwrap(), 1);

    // Removing through the copy removes the canonical entry
    pool.del_row(copy, &mut lp).unwrap();
    assert!(pool.is_empty());
    assert_eq!(lp.rows().nuses(first).unwrap(), 1);
}

#[test]
fn test_error_classes() {
    let mut lp = Lp::new();
    let mut pool = CutPool::new(PoolSettings::default()).unwrap();

    let absent = make_cut(&mut lp, "absent", 1.0);
    let err = pool.del_row(absent, &mut lp).unwrap_err();
    assert!(matches!(err, BnbError::NotInPool(_)));
    assert!(!err.is_usage_error());

    let modifiable = lp.create_row(
        Row::new("m", 2, vec![(0, 1.0)], 0.0, 1.0)
            .unwrap()
            .with_modifiable(true),
    );
    let err = pool.add_row(modifiable, &mut lp).unwrap_err();
    assert_eq!(err, BnbError::ModifiableEntry("row"));
    assert!(err.is_usage_error());
}

#[test]
fn test_column_pool_ages_out_priced_columns() {
    let mut lp = Lp::new();
    let mut pool = ColumnPool::new(PoolSettings::default().with_age_limit(1)).unwrap();
    let mut store = PriceStore::new(PriceStoreSettings::default());

    // reduced cost 4 - 1 * y0
    let col = lp.create_column(Column::new("x", 4.0, 0.0, 1.0, 1, vec![(0, 1.0)]).unwrap());
    pool.add_column(col, &mut lp).unwrap();

    lp.install_solution(vec![], vec![5.0], 0.0);
    assert_eq!(
        pool.price(&mut lp, PricingMode::Redcost, &mut store).unwrap(),
        SeparationResult::Found
    );
    let round = store.select_best(&mut lp, 10).unwrap();
    assert_eq!(round.n_added, 1);
    assert!(lp.is_column_in_lp(col));

    // Columns in the LP are skipped without aging
    lp.install_solution(vec![], vec![0.0], 0.0);
    pool.price(&mut lp, PricingMode::Redcost, &mut store).unwrap();
    assert_eq!(pool.entries()[0].age, 0);
    assert!(store.is_empty());
}
