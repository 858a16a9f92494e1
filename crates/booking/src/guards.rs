//! Transition guards: pure predicates over a booking and its owned records.
//!
//! Each guard returns `Err(reason)` with an operator-facing explanation of the
//! first unmet precondition. Guards only read.

use std::collections::HashSet;

use crate::allocation::StockAllocation;
use crate::booking::{Booking, filled};
use crate::container::ContainerDetail;

/// A booking together with the containers and allocations that reference it.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingAggregate {
    pub booking: Booking,
    pub containers: Vec<ContainerDetail>,
    pub allocations: Vec<StockAllocation>,
}

pub type GuardResult = Result<(), String>;

/// Step 1: customer reference, booking reference and charge-to party.
pub fn basic_info_complete(booking: &Booking) -> GuardResult {
    let ok = !booking.customer_reference.trim().is_empty()
        && !booking.booking_reference.trim().is_empty()
        && booking.charge_to_id.is_some();
    ok.then_some(()).ok_or_else(|| "Step 1 (Basic Info) is incomplete".to_string())
}

/// Step 2: vessel reference.
pub fn vessel_complete(booking: &Booking) -> GuardResult {
    booking
        .vessel_id
        .map(|_| ())
        .ok_or_else(|| "Step 2 (Vessel) is incomplete".to_string())
}

/// Step 3: origin, destination and at least one container size with quantity.
pub fn locations_complete(booking: &Booking) -> GuardResult {
    let ok = filled(&booking.origin)
        && filled(&booking.destination)
        && booking.container_quantities.values().any(|qty| *qty >= 1);
    ok.then_some(())
        .ok_or_else(|| "Step 3 (Locations & Containers) is incomplete".to_string())
}

/// Step 4: both routing legs with their endpoints.
pub fn routing_complete(booking: &Booking) -> GuardResult {
    let ok = booking.empty_leg.has_endpoints() && booking.full_leg.has_endpoints();
    ok.then_some(()).ok_or_else(|| "Step 4 (Routing) is incomplete".to_string())
}

/// Every declared container has a saved detail record carrying a container number.
pub fn all_containers_saved(aggregate: &BookingAggregate) -> GuardResult {
    let declared = aggregate.booking.declared_containers() as usize;
    let saved = aggregate.containers.len();

    if saved == 0 || saved < declared {
        return Err(format!(
            "Step 5 (Container Details) is incomplete: {saved} of {declared} container(s) saved"
        ));
    }

    let unnumbered = aggregate
        .containers
        .iter()
        .filter(|c| !c.has_container_number())
        .count();
    if unnumbered > 0 {
        return Err(format!("Container number missing for {unnumbered} container(s)"));
    }

    Ok(())
}

/// draft → confirmed
pub fn can_confirm(aggregate: &BookingAggregate) -> GuardResult {
    let booking = &aggregate.booking;
    basic_info_complete(booking)?;
    vessel_complete(booking)?;
    locations_complete(booking)?;
    routing_complete(booking)?;
    all_containers_saved(aggregate)
}

/// confirmed → in_progress
pub fn can_start(aggregate: &BookingAggregate) -> GuardResult {
    all_containers_saved(aggregate)
}

/// in_progress → completed
pub fn can_complete(aggregate: &BookingAggregate) -> GuardResult {
    if aggregate.containers.is_empty() {
        return Err("No container details recorded".to_string());
    }
    if aggregate.allocations.is_empty() {
        return Err("No stock allocations recorded".to_string());
    }

    let allocated: HashSet<_> = aggregate.allocations.iter().map(|a| a.container_id).collect();
    let orphans = aggregate
        .containers
        .iter()
        .filter(|c| !allocated.contains(&c.id))
        .count();
    if orphans > 0 {
        return Err(format!("Stock allocations missing for {orphans} container(s)"));
    }

    let kind = aggregate.booking.kind;
    let foreign = aggregate
        .allocations
        .iter()
        .filter(|a| a.stage().kind() != kind)
        .count();
    if foreign > 0 {
        return Err(format!(
            "{foreign} stock allocation(s) have a stage outside the {kind} workflow"
        ));
    }

    Ok(())
}
