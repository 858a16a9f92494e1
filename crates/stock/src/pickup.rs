use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freightops_core::{DomainError, DomainResult, Entity, Lpn, PickupId, StockAllocationId, TenantId, UserId};

use crate::unit::{AllocationStatus, DemandOwner, DemandRef, StockUnit};

/// What a pickup is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PickupTarget {
    /// One demand line (of a job or of a stock allocation).
    Line { demand: DemandRef },
    /// Every product line of one container stock allocation.
    Allocation { allocation_id: StockAllocationId },
}

impl PickupTarget {
    /// Whether a unit reserved against `demand` may be picked under this target.
    pub fn accepts(&self, demand: &DemandRef) -> bool {
        match self {
            PickupTarget::Line { demand: target } => target == demand,
            PickupTarget::Allocation { allocation_id } => {
                demand.owner == DemandOwner::Allocation(*allocation_id)
            }
        }
    }

    pub fn owner(&self) -> DemandOwner {
        match self {
            PickupTarget::Line { demand } => demand.owner,
            PickupTarget::Allocation { allocation_id } => DemandOwner::Allocation(*allocation_id),
        }
    }
}

/// Why a requested unit was left out of a pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupWarningReason {
    NotFound,
    NotReserved,
    ReservedForOtherDemand,
    AlreadyPicked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupWarning {
    pub lpn: Lpn,
    pub reason: PickupWarningReason,
}

impl core::fmt::Display for PickupWarning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let reason = match self.reason {
            PickupWarningReason::NotFound => "not found",
            PickupWarningReason::NotReserved => "not reserved",
            PickupWarningReason::ReservedForOtherDemand => "reserved for a different demand",
            PickupWarningReason::AlreadyPicked => "already picked",
        };
        write!(f, "{} ({reason})", self.lpn)
    }
}

/// Outcome of checking requested units against a pickup target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screening {
    pub accepted: Vec<StockUnit>,
    pub warnings: Vec<PickupWarning>,
}

/// Split requested units into pickable ones and per-unit warnings.
///
/// Repeated LPNs are considered once.
pub fn screen_units<F>(target: &PickupTarget, requested: &[Lpn], lookup: F) -> Screening
where
    F: Fn(&Lpn) -> Option<StockUnit>,
{
    let mut seen = HashSet::new();
    let mut screening = Screening::default();

    for lpn in requested {
        if !seen.insert(lpn) {
            continue;
        }
        let warn = |reason| PickupWarning {
            lpn: lpn.clone(),
            reason,
        };

        let Some(unit) = lookup(lpn) else {
            screening.warnings.push(warn(PickupWarningReason::NotFound));
            continue;
        };

        let reason = match (unit.status(), unit.demand()) {
            (AllocationStatus::Available, _) | (_, None) => Some(PickupWarningReason::NotReserved),
            (_, Some(demand)) if !target.accepts(demand) => Some(PickupWarningReason::ReservedForOtherDemand),
            (AllocationStatus::Picked, _) => Some(PickupWarningReason::AlreadyPicked),
            (AllocationStatus::Allocated, _) => None,
        };

        match reason {
            Some(reason) => screening.warnings.push(warn(reason)),
            None => screening.accepted.push(unit),
        }
    }

    screening
}

/// Immutable record of one pickup action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupRecord {
    id: PickupId,
    tenant_id: TenantId,
    target: PickupTarget,
    units: Vec<Lpn>,
    picked_qty: i64,
    buffer_qty: i64,
    final_qty: i64,
    picked_by: UserId,
    picked_at: DateTime<Utc>,
}

impl PickupRecord {
    /// Build a record from the units actually marked picked.
    pub fn new(
        tenant_id: TenantId,
        id: PickupId,
        target: PickupTarget,
        picked: &[StockUnit],
        buffer_qty: i64,
        picked_by: UserId,
        picked_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if picked.is_empty() {
            return Err(DomainError::invariant("a pickup record needs at least one unit"));
        }
        let picked_qty: i64 = picked.iter().map(|u| u.quantity).sum();

        Ok(Self {
            id,
            tenant_id,
            target,
            units: picked.iter().map(|u| u.lpn().clone()).collect(),
            picked_qty,
            buffer_qty,
            final_qty: picked_qty + buffer_qty,
            picked_by,
            picked_at,
        })
    }

    pub fn target(&self) -> &PickupTarget {
        &self.target
    }

    pub fn units(&self) -> &[Lpn] {
        &self.units
    }

    pub fn picked_qty(&self) -> i64 {
        self.picked_qty
    }

    pub fn buffer_qty(&self) -> i64 {
        self.buffer_qty
    }

    /// Picked quantity plus the operator buffer.
    pub fn final_qty(&self) -> i64 {
        self.final_qty
    }

    pub fn picked_by(&self) -> UserId {
        self.picked_by
    }

    pub fn picked_at(&self) -> DateTime<Utc> {
        self.picked_at
    }
}

impl Entity for PickupRecord {
    type Id = PickupId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::PutAway;
    use freightops_core::{DemandLineId, JobId, SkuId};
    use std::collections::HashMap;

    fn unit(lpn: &str, qty: i64) -> StockUnit {
        StockUnit::put_away(PutAway {
            tenant_id: TenantId::new(),
            lpn: Lpn::parse(lpn).unwrap(),
            sku_id: SkuId::new(),
            batch_number: "B".into(),
            quantity: qty,
            location: "L".into(),
            warehouse: None,
            putaway_at: Utc::now(),
        })
        .unwrap()
    }

    fn lpn(s: &str) -> Lpn {
        Lpn::parse(s).unwrap()
    }

    #[test]
    fn screening_reports_each_rejected_unit() {
        let ours = DemandRef::job_line(JobId::new(), DemandLineId::new());
        let theirs = DemandRef::job_line(JobId::new(), DemandLineId::new());
        let actor = UserId::new();

        let mut ok = unit("OK", 4);
        ok.reserve(ours, actor, Utc::now()).unwrap();
        let mut picked = unit("PICKED", 4);
        picked.reserve(ours, actor, Utc::now()).unwrap();
        picked.mark_picked(&ours).unwrap();
        let mut other = unit("OTHER", 4);
        other.reserve(theirs, actor, Utc::now()).unwrap();
        let free = unit("FREE", 4);

        let ledger: HashMap<Lpn, StockUnit> = [ok, picked, other, free]
            .into_iter()
            .map(|u| (u.lpn().clone(), u))
            .collect();

        let target = PickupTarget::Line { demand: ours };
        let requested = [lpn("OK"), lpn("PICKED"), lpn("OTHER"), lpn("FREE"), lpn("NOPE"), lpn("OK")];
        let screening = screen_units(&target, &requested, |l| ledger.get(l).cloned());

        assert_eq!(screening.accepted.len(), 1);
        assert_eq!(screening.accepted[0].lpn(), &lpn("OK"));
        let reasons: Vec<_> = screening.warnings.iter().map(|w| w.reason).collect();
        assert_eq!(
            reasons,
            vec![
                PickupWarningReason::AlreadyPicked,
                PickupWarningReason::ReservedForOtherDemand,
                PickupWarningReason::NotReserved,
                PickupWarningReason::NotFound,
            ]
        );
    }

    #[test]
    fn allocation_target_accepts_any_of_its_lines() {
        let allocation_id = StockAllocationId::new();
        let target = PickupTarget::Allocation { allocation_id };

        assert!(target.accepts(&DemandRef::allocation_line(allocation_id, DemandLineId::new())));
        assert!(!target.accepts(&DemandRef::allocation_line(StockAllocationId::new(), DemandLineId::new())));
        assert!(!target.accepts(&DemandRef::job_line(JobId::new(), DemandLineId::new())));
    }

    #[test]
    fn record_final_quantity_includes_buffer() {
        let units = vec![unit("A", 5), unit("B", 7)];
        let record = PickupRecord::new(
            TenantId::new(),
            PickupId::new(),
            PickupTarget::Allocation {
                allocation_id: StockAllocationId::new(),
            },
            &units,
            -2,
            UserId::new(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(record.picked_qty(), 12);
        assert_eq!(record.buffer_qty(), -2);
        assert_eq!(record.final_qty(), 10);
        assert_eq!(record.units(), &[lpn("A"), lpn("B")]);
    }
}
