//! Polymorphic "owning booking" references.
//!
//! Containers and stock allocations belong to either an import or an export
//! booking. Inside the engine that owner is always a [`BookingRef`]: the
//! collection tag travels with the id. Callers may still hand in the loose
//! shapes produced by form posts and partially-populated relations
//! ([`RawOwnerRef`]); those are normalised once, at the boundary.

use serde::{Deserialize, Serialize};

use freightops_core::{BookingId, DomainError, DomainResult};

/// Booking direction, which is also the collection a booking lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    Import,
    Export,
}

impl BookingKind {
    /// Every collection a booking can live in, in lookup order.
    pub const ALL: [BookingKind; 2] = [BookingKind::Import, BookingKind::Export];

    pub fn collection(&self) -> &'static str {
        match self {
            BookingKind::Import => "import_bookings",
            BookingKind::Export => "export_bookings",
        }
    }

    pub fn from_collection(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "import" | "import_bookings" | "import-container-bookings" => Some(BookingKind::Import),
            "export" | "export_bookings" | "export-container-bookings" => Some(BookingKind::Export),
            _ => None,
        }
    }
}

impl core::fmt::Display for BookingKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BookingKind::Import => f.write_str("import"),
            BookingKind::Export => f.write_str("export"),
        }
    }
}

/// Tagged reference to a booking in one of the two collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingRef {
    pub kind: BookingKind,
    pub id: BookingId,
}

impl BookingRef {
    pub fn import(id: BookingId) -> Self {
        Self {
            kind: BookingKind::Import,
            id,
        }
    }

    pub fn export(id: BookingId) -> Self {
        Self {
            kind: BookingKind::Export,
            id,
        }
    }
}

impl core::fmt::Display for BookingRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.kind.collection(), self.id)
    }
}

/// Relation value: either a bare id or a populated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOwnerValue {
    Id(BookingId),
    Object { id: BookingId },
}

impl RawOwnerValue {
    pub fn id(&self) -> BookingId {
        match self {
            RawOwnerValue::Id(id) | RawOwnerValue::Object { id } => *id,
        }
    }
}

/// Owner reference in whatever shape the caller had at hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOwnerRef {
    /// `{ "collection": "export_bookings", "value": ... }` (`relationTo` accepted).
    Tagged {
        #[serde(alias = "relationTo")]
        collection: String,
        value: RawOwnerValue,
    },
    /// `{ "id": ... }`
    Object { id: BookingId },
    /// A bare id.
    Id(BookingId),
}

/// Result of normalising a raw owner reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerLookup {
    /// The collection is known.
    Tagged(BookingRef),
    /// Only the id is known; both collections must be consulted.
    Untagged(BookingId),
}

impl RawOwnerRef {
    pub fn normalize(&self) -> DomainResult<OwnerLookup> {
        match self {
            RawOwnerRef::Tagged { collection, value } => {
                let kind = BookingKind::from_collection(collection).ok_or_else(|| {
                    DomainError::validation(format!("unknown booking collection {collection:?}"))
                })?;
                Ok(OwnerLookup::Tagged(BookingRef { kind, id: value.id() }))
            }
            RawOwnerRef::Object { id } | RawOwnerRef::Id(id) => Ok(OwnerLookup::Untagged(*id)),
        }
    }
}

impl From<BookingRef> for RawOwnerRef {
    fn from(value: BookingRef) -> Self {
        RawOwnerRef::Tagged {
            collection: value.kind.collection().to_string(),
            value: RawOwnerValue::Id(value.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_shapes_normalise_to_the_same_id() {
        let id = BookingId::new();
        let bare: RawOwnerRef = serde_json::from_value(serde_json::json!(id)).unwrap();
        let object: RawOwnerRef = serde_json::from_value(serde_json::json!({ "id": id })).unwrap();
        let tagged: RawOwnerRef = serde_json::from_value(serde_json::json!({
            "relationTo": "export-container-bookings",
            "value": { "id": id, "containerNumber": "MSCU1234567" }
        }))
        .unwrap();

        assert_eq!(bare.normalize().unwrap(), OwnerLookup::Untagged(id));
        assert_eq!(object.normalize().unwrap(), OwnerLookup::Untagged(id));
        assert_eq!(tagged.normalize().unwrap(), OwnerLookup::Tagged(BookingRef::export(id)));
    }

    #[test]
    fn unknown_collection_is_a_validation_error() {
        let raw = RawOwnerRef::Tagged {
            collection: "invoices".into(),
            value: RawOwnerValue::Id(BookingId::new()),
        };
        assert!(matches!(raw.normalize(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn booking_ref_converts_to_tagged_raw_ref() {
        let r = BookingRef::import(BookingId::new());
        let raw: RawOwnerRef = r.into();
        assert_eq!(raw.normalize().unwrap(), OwnerLookup::Tagged(r));
    }
}
