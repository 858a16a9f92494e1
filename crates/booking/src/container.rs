use serde::{Deserialize, Serialize};

use freightops_core::{ContainerId, DomainError, DomainResult, Entity, TenantId, Versioned};

use crate::booking::ContainerSize;
use crate::owner::BookingRef;

/// Operational status of a physical container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Expecting,
    Received,
    PartiallyPickedUp,
    PickedUp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMeasurements {
    pub gross_weight_kg: Option<f64>,
    pub tare_weight_kg: Option<f64>,
    pub cubic_m3: Option<f64>,
}

/// One physical container of a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetail {
    pub id: ContainerId,
    pub tenant_id: TenantId,
    pub owner: BookingRef,
    pub container_number: String,
    pub size: ContainerSize,
    pub measurements: ContainerMeasurements,
    pub status: ContainerStatus,
    #[serde(default)]
    version: u64,
}

impl ContainerDetail {
    pub fn new(
        tenant_id: TenantId,
        id: ContainerId,
        owner: BookingRef,
        container_number: impl Into<String>,
        size: ContainerSize,
    ) -> DomainResult<Self> {
        let container_number = container_number.into().trim().to_ascii_uppercase();
        if container_number.len() > 11 {
            return Err(DomainError::validation(format!(
                "container number {container_number:?} is longer than 11 characters"
            )));
        }

        Ok(Self {
            id,
            tenant_id,
            owner,
            container_number,
            size,
            measurements: ContainerMeasurements::default(),
            status: ContainerStatus::Expecting,
            version: 0,
        })
    }

    pub fn has_container_number(&self) -> bool {
        !self.container_number.is_empty()
    }
}

impl Entity for ContainerDetail {
    type Id = ContainerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Versioned for ContainerDetail {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
