use serde::{Deserialize, Serialize};

use freightops_core::{
    ContainerId, DemandLineId, DomainError, DomainResult, Entity, StockAllocationId, TenantId, Versioned,
};
use freightops_stock::{Coverage, DemandLine, DemandRef};

use crate::owner::{BookingKind, BookingRef};

/// Workflow stage of an import allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Expected,
    Received,
    PutAway,
}

/// Workflow stage of an export allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Allocated,
    Picked,
    Dispatched,
}

/// Stage of a stock allocation; the variant fixes the vocabulary.
///
/// Serialized as the bare stage name (`"put_away"`, `"picked"`, ...). The two
/// vocabularies share no names, so the variant is recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllocationStage {
    Import(ImportStage),
    Export(ExportStage),
}

impl AllocationStage {
    pub fn kind(&self) -> BookingKind {
        match self {
            AllocationStage::Import(_) => BookingKind::Import,
            AllocationStage::Export(_) => BookingKind::Export,
        }
    }

    /// First stage of a new allocation for the given direction.
    pub fn initial(kind: BookingKind) -> Self {
        match kind {
            BookingKind::Import => AllocationStage::Import(ImportStage::Expected),
            BookingKind::Export => AllocationStage::Export(ExportStage::Allocated),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStage::Import(ImportStage::Expected) => "expected",
            AllocationStage::Import(ImportStage::Received) => "received",
            AllocationStage::Import(ImportStage::PutAway) => "put_away",
            AllocationStage::Export(ExportStage::Allocated) => "allocated",
            AllocationStage::Export(ExportStage::Picked) => "picked",
            AllocationStage::Export(ExportStage::Dispatched) => "dispatched",
        }
    }
}

impl core::fmt::Display for AllocationStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binding between one container and the product lines loaded into (or out of) it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAllocation {
    pub id: StockAllocationId,
    pub tenant_id: TenantId,
    pub owner: BookingRef,
    pub container_id: ContainerId,
    stage: AllocationStage,
    pub lines: Vec<DemandLine>,
    #[serde(default)]
    version: u64,
}

impl StockAllocation {
    pub fn new(
        tenant_id: TenantId,
        id: StockAllocationId,
        owner: BookingRef,
        container_id: ContainerId,
        mut lines: Vec<DemandLine>,
    ) -> DomainResult<Self> {
        let mut seen = std::collections::HashSet::new();
        if !lines.iter().all(|l| seen.insert(l.id)) {
            return Err(DomainError::validation("duplicate product line id"));
        }
        // Derived totals are only ever rebuilt from the ledger.
        lines.iter_mut().for_each(DemandLine::clear_allocation);

        Ok(Self {
            id,
            tenant_id,
            owner,
            container_id,
            stage: AllocationStage::initial(owner.kind),
            lines,
            version: 0,
        })
    }

    pub fn stage(&self) -> AllocationStage {
        self.stage
    }

    /// Move to another stage of the owner's vocabulary.
    pub fn set_stage(&mut self, stage: AllocationStage) -> DomainResult<()> {
        if stage.kind() != self.owner.kind {
            return Err(DomainError::validation(format!(
                "stage {stage} does not belong to {} bookings",
                self.owner.kind
            )));
        }
        self.stage = stage;
        Ok(())
    }

    /// Stock is reserved and picked only for export allocations still being loaded.
    pub fn ensure_accepts_stock(&self) -> DomainResult<()> {
        match self.stage {
            AllocationStage::Export(ExportStage::Allocated) => Ok(()),
            AllocationStage::Export(_) => Err(DomainError::state_conflict(format!(
                "stock allocation {} is already {}",
                self.id, self.stage
            ))),
            AllocationStage::Import(_) => Err(DomainError::validation(format!(
                "stock allocation {} belongs to an import booking; only export lines reserve stock",
                self.id
            ))),
        }
    }

    pub fn demand_ref(&self, line_id: DemandLineId) -> DemandRef {
        DemandRef::allocation_line(self.id, line_id)
    }

    pub fn line(&self, line_id: DemandLineId) -> DomainResult<&DemandLine> {
        self.lines
            .iter()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(format!("product line {line_id} on allocation {}", self.id)))
    }

    pub fn line_mut(&mut self, line_id: DemandLineId) -> DomainResult<&mut DemandLine> {
        let id = self.id;
        self.lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(format!("product line {line_id} on allocation {id}")))
    }

    pub fn allocation_coverage(&self) -> Coverage {
        Coverage::assess(self.lines.iter().map(DemandLine::allocation_progress))
    }

    pub fn pickup_coverage(&self) -> Coverage {
        Coverage::assess(self.lines.iter().map(DemandLine::pickup_progress))
    }
}

impl Entity for StockAllocation {
    type Id = StockAllocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Versioned for StockAllocation {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
