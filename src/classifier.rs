use std::collections::HashMap;

use serde_json::Value;

use crate::error::ClassifierError;
use crate::models::{RawVehicleRecord, Vehicle, VehicleKind};

/// Trams run on one- or two-digit lines; everything else is a bus
pub fn classify_short_name(short_name: &str) -> VehicleKind {
    let is_tram = (1..=2).contains(&short_name.len())
        && short_name.bytes().all(|b| b.is_ascii_digit());
    if is_tram {
        VehicleKind::Tram
    } else {
        VehicleKind::Bus
    }
}

/// Line name -> vehicle kind, rebuilt wholesale from the reference dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteReference {
    kinds: HashMap<String, VehicleKind>,
}

impl RouteReference {
    pub fn get(&self, short_name: &str) -> Option<VehicleKind> {
        self.kinds.get(short_name).copied()
    }

    /// Kind for a line, falling back to bus for lines the reference does not know
    pub fn kind_of(&self, short_name: &str) -> VehicleKind {
        self.get(short_name).unwrap_or(VehicleKind::Bus)
    }

    pub fn enrich(&self, record: RawVehicleRecord) -> Vehicle {
        let kind = self.kind_of(&record.route_short_name);
        Vehicle::new(record, kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn insert(&mut self, short_name: String, kind: VehicleKind) {
        self.kinds.insert(short_name, kind);
    }
}

impl FromIterator<(String, VehicleKind)> for RouteReference {
    fn from_iter<I: IntoIterator<Item = (String, VehicleKind)>>(iter: I) -> Self {
        Self { kinds: iter.into_iter().collect() }
    }
}

/// Build the line classification from the routes payload.
///
/// Only the first dated bucket (in document order) is read. Entries without a
/// short name are skipped; a later entry for the same short name replaces an earlier one.
pub fn build_route_reference(payload: &Value) -> Result<RouteReference, ClassifierError> {
    let bucket = payload
        .as_object()
        .and_then(|dates| dates.values().next())
        .ok_or(ClassifierError::Malformed("no dated bucket"))?;

    let routes = bucket
        .get("routes")
        .and_then(Value::as_array)
        .ok_or(ClassifierError::Malformed("first bucket has no routes list"))?;

    let mut reference = RouteReference::default();
    let mut skipped = 0usize;

    for entry in routes {
        match entry.get("routeShortName").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => reference.insert(name.to_string(), classify_short_name(name)),
            _ => skipped += 1,
        }
    }

    tracing::debug!(lines = reference.len(), skipped, "Built route reference");
    Ok(reference)
}
