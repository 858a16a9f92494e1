use serde::{Deserialize, Serialize};

use freightops_core::{DomainError, DomainResult, Entity, SkuId, TenantId};

/// SKU master data needed to derive allocated weight and volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub id: SkuId,
    pub tenant_id: TenantId,
    pub code: String,
    /// Weight of one item, in kilograms.
    pub unit_weight_kg: f64,
    /// Cubic measure of one item, in cubic metres.
    pub unit_cubic_m3: f64,
}

impl Sku {
    pub fn new(
        tenant_id: TenantId,
        id: SkuId,
        code: impl Into<String>,
        unit_weight_kg: f64,
        unit_cubic_m3: f64,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("sku code cannot be empty"));
        }
        for (name, value) in [("unit_weight_kg", unit_weight_kg), ("unit_cubic_m3", unit_cubic_m3)] {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::validation(format!(
                    "{name} must be a finite, non-negative number"
                )));
            }
        }

        Ok(Self {
            id,
            tenant_id,
            code,
            unit_weight_kg,
            unit_cubic_m3,
        })
    }

    pub fn weight_for(&self, quantity: i64) -> f64 {
        quantity as f64 * self.unit_weight_kg
    }
}

impl Entity for Sku {
    type Id = SkuId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
