//! Candidate selection for automatic (FIFO) and manual allocation.
//!
//! Both functions are pure: they decide which units to reserve but never touch
//! the ledger. The caller reserves the returned units one by one.

use std::collections::{HashMap, HashSet};

use freightops_core::{DomainError, DomainResult, Lpn};

use crate::demand::DemandLine;
use crate::unit::{StockUnit, fifo_order};

/// Pick whole units, oldest first, until their quantities cover `required`.
///
/// Units that are not available or hold no quantity are skipped. If the pool runs
/// out first, nothing is selected and the error reports what was available.
pub fn select_fifo(candidates: &[StockUnit], required: i64) -> DomainResult<Vec<&StockUnit>> {
    if required <= 0 {
        return Err(DomainError::validation("required quantity must be positive"));
    }

    let mut pool: Vec<&StockUnit> = candidates
        .iter()
        .filter(|u| u.is_available() && u.quantity > 0)
        .collect();
    pool.sort_by(|a, b| fifo_order(a, b));

    let mut selected = Vec::new();
    let mut total = 0i64;
    for unit in pool {
        if total >= required {
            break;
        }
        total += unit.quantity;
        selected.push(unit);
    }

    if total < required {
        return Err(DomainError::InsufficientStock {
            available: total,
            required,
        });
    }

    Ok(selected)
}

/// Resolve an explicit LPN list for a line, all or nothing.
///
/// Every LPN must name an available unit matching the line's SKU, batch and
/// warehouse. Anything else is reported as missing and nothing is selected.
pub fn select_manual(
    line: &DemandLine,
    requested: &[Lpn],
    found: &HashMap<Lpn, StockUnit>,
) -> DomainResult<Vec<StockUnit>> {
    if requested.is_empty() {
        return Err(DomainError::validation("at least one lpn is required"));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = requested.iter().find(|lpn| !seen.insert(*lpn)) {
        return Err(DomainError::validation(format!("lpn {dup} is listed more than once")));
    }

    let query = line.query();
    let mut missing = Vec::new();
    let mut selected = Vec::with_capacity(requested.len());

    for lpn in requested {
        match found.get(lpn) {
            Some(unit) if unit.is_available() && query.matches(unit) => selected.push(unit.clone()),
            _ => missing.push(lpn.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(DomainError::PartialAvailability { missing });
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{DemandRef, PutAway};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use freightops_core::{DemandLineId, JobId, SkuId, TenantId, UserId};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn unit(sku_id: SkuId, lpn: &str, qty: i64, day: i64) -> StockUnit {
        StockUnit::put_away(PutAway {
            tenant_id: TenantId::new(),
            lpn: Lpn::parse(lpn).unwrap(),
            sku_id,
            batch_number: "B1".into(),
            quantity: qty,
            location: "A-01".into(),
            warehouse: None,
            putaway_at: base_time() + Duration::days(day),
        })
        .unwrap()
    }

    fn lpns(units: &[&StockUnit]) -> Vec<String> {
        units.iter().map(|u| u.lpn().to_string()).collect()
    }

    #[test]
    fn fifo_takes_oldest_units_first() {
        let sku = SkuId::new();
        let pool = vec![
            unit(sku, "C", 10, 3),
            unit(sku, "A", 10, 1),
            unit(sku, "B", 10, 2),
        ];

        let picked = select_fifo(&pool, 15).unwrap();
        assert_eq!(lpns(&picked), vec!["A", "B"]);
    }

    #[test]
    fn fifo_never_splits_a_unit() {
        let sku = SkuId::new();
        let pool = vec![unit(sku, "A", 8, 1), unit(sku, "B", 8, 2)];

        let picked = select_fifo(&pool, 9).unwrap();
        let total: i64 = picked.iter().map(|u| u.quantity).sum();
        assert_eq!(total, 16);
    }

    #[test]
    fn fifo_reports_shortfall_without_selecting() {
        let sku = SkuId::new();
        let pool = vec![unit(sku, "A", 3, 1), unit(sku, "B", 4, 2)];

        let err = select_fifo(&pool, 10).unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock { available: 7, required: 10 });
    }

    #[test]
    fn fifo_skips_reserved_and_empty_units() {
        let sku = SkuId::new();
        let mut reserved = unit(sku, "A", 5, 1);
        reserved
            .reserve(DemandRef::job_line(JobId::new(), DemandLineId::new()), UserId::new(), base_time())
            .unwrap();
        let pool = vec![reserved, unit(sku, "EMPTY", 0, 2), unit(sku, "C", 5, 3)];

        let picked = select_fifo(&pool, 5).unwrap();
        assert_eq!(lpns(&picked), vec!["C"]);
    }

    #[test]
    fn manual_selection_is_all_or_nothing() {
        let sku = SkuId::new();
        let line = DemandLine::new(DemandLineId::new(), sku, Some("B1".into()), 10).unwrap();
        let other_sku = unit(SkuId::new(), "WRONG", 5, 1);
        let good = unit(sku, "GOOD", 5, 1);

        let found: HashMap<Lpn, StockUnit> = [good, other_sku]
            .into_iter()
            .map(|u| (u.lpn().clone(), u))
            .collect();

        let requested = vec![
            Lpn::parse("GOOD").unwrap(),
            Lpn::parse("WRONG").unwrap(),
            Lpn::parse("GONE").unwrap(),
        ];
        let err = select_manual(&line, &requested, &found).unwrap_err();
        assert_eq!(
            err,
            DomainError::PartialAvailability {
                missing: vec!["WRONG".into(), "GONE".into()]
            }
        );

        let ok = select_manual(&line, &requested[..1], &found).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn manual_selection_rejects_duplicates() {
        let line = DemandLine::new(DemandLineId::new(), SkuId::new(), None, 1).unwrap();
        let a = Lpn::parse("A").unwrap();
        let err = select_manual(&line, &[a.clone(), a], &HashMap::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the selection covers the requirement, and dropping the
        /// last (newest) selected unit would leave it uncovered.
        #[test]
        fn fifo_selection_is_minimal(
            quantities in prop::collection::vec(1i64..50, 1..30),
            required in 1i64..400,
        ) {
            let sku = SkuId::new();
            let pool: Vec<StockUnit> = quantities
                .iter()
                .enumerate()
                .map(|(i, q)| unit(sku, &format!("LPN-{i:03}"), *q, i as i64))
                .collect();
            let total: i64 = quantities.iter().sum();

            match select_fifo(&pool, required) {
                Ok(selected) => {
                    let sum: i64 = selected.iter().map(|u| u.quantity).sum();
                    prop_assert!(sum >= required);
                    let last = selected.last().unwrap().quantity;
                    prop_assert!(sum - last < required);

                    // Selected units form a prefix of the FIFO order.
                    let expected: Vec<String> = (0..selected.len()).map(|i| format!("LPN-{i:03}")).collect();
                    prop_assert_eq!(lpns(&selected), expected);
                }
                Err(DomainError::InsufficientStock { available, required: r }) => {
                    prop_assert!(total < required);
                    prop_assert_eq!(available, total);
                    prop_assert_eq!(r, required);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
            }
        }
    }
}
