use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freightops_core::{BookingId, Entity, TenantId, Versioned};

use crate::owner::{BookingKind, BookingRef};

/// Booking status lifecycle: a linear chain plus cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Draft,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Draft,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Draft => "draft",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Next step of the forward chain, if any.
    pub fn successor(&self) -> Option<BookingStatus> {
        match self {
            BookingStatus::Draft => Some(BookingStatus::Confirmed),
            BookingStatus::Confirmed => Some(BookingStatus::InProgress),
            BookingStatus::InProgress => Some(BookingStatus::Completed),
            BookingStatus::Completed | BookingStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl core::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO container size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerSize {
    #[serde(rename = "20ft")]
    Ft20,
    #[serde(rename = "40ft")]
    Ft40,
    #[serde(rename = "40hc")]
    Ft40HighCube,
    #[serde(rename = "45ft")]
    Ft45,
}

/// One transport leg of the container movement (empty or full).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingLeg {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RoutingLeg {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    pub fn has_endpoints(&self) -> bool {
        filled(&self.from) && filled(&self.to)
    }
}

pub(crate) fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Import or export container booking: the top-level order aggregate.
///
/// The "step" fields mirror the booking wizard: basic info, vessel,
/// locations and container sizes, routing. `status` only changes through the
/// state machine in [`crate::state_machine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub tenant_id: TenantId,
    pub kind: BookingKind,
    status: BookingStatus,

    pub customer_reference: String,
    pub booking_reference: String,
    pub charge_to_id: Option<u64>,

    pub vessel_id: Option<u64>,

    pub origin: Option<String>,
    pub destination: Option<String>,
    pub container_quantities: BTreeMap<ContainerSize, u32>,

    pub empty_leg: RoutingLeg,
    pub full_leg: RoutingLeg,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    version: u64,
}

impl Booking {
    /// A fresh draft booking with every step empty.
    pub fn draft(tenant_id: TenantId, id: BookingId, kind: BookingKind, at: DateTime<Utc>) -> Self {
        Self {
            id,
            tenant_id,
            kind,
            status: BookingStatus::Draft,
            customer_reference: String::new(),
            booking_reference: String::new(),
            charge_to_id: None,
            vessel_id: None,
            origin: None,
            destination: None,
            container_quantities: BTreeMap::new(),
            empty_leg: RoutingLeg::default(),
            full_leg: RoutingLeg::default(),
            created_at: at,
            updated_at: at,
            version: 0,
        }
    }

    pub fn booking_ref(&self) -> BookingRef {
        BookingRef {
            kind: self.kind,
            id: self.id,
        }
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    /// Total number of containers declared across all size classes.
    pub fn declared_containers(&self) -> u32 {
        self.container_quantities.values().sum()
    }

    pub(crate) fn set_status(&mut self, status: BookingStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}

impl Entity for Booking {
    type Id = BookingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Versioned for Booking {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
