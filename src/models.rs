use serde::{Deserialize, Deserializer, Serialize};

/// Vehicles running more than this many seconds late count as delayed
pub const DELAY_THRESHOLD_SECS: i64 = 120;

/// Kind of vehicle serving a line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    Bus,
    Tram,
}

impl std::fmt::Display for VehicleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleKind::Bus => write!(f, "bus"),
            VehicleKind::Tram => write!(f, "tram"),
        }
    }
}

/// Reads `null` the same as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keeps every readable record and drops the rest
fn readable_records<'de, D>(deserializer: D) -> Result<Vec<RawVehicleRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    let records = raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match RawVehicleRecord::deserialize(&value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable vehicle record");
                None
            }
        })
        .collect();
    Ok(records)
}

/// A single vehicle position as received from the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVehicleRecord {
    /// Feed-wide vehicle identifier, stable across ticks
    pub vehicle_id: i64,

    /// Line the vehicle is serving (e.g. "2", "115", "N1")
    #[serde(default, deserialize_with = "null_as_default")]
    pub route_short_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub headsign: String,

    /// Fleet number painted on the vehicle
    #[serde(default, deserialize_with = "null_as_default")]
    pub vehicle_code: String,

    /// Speed in km/h
    #[serde(default, deserialize_with = "null_as_default")]
    pub speed: f64,

    pub lat: f64,
    pub lon: f64,

    /// Heading in degrees
    #[serde(default, alias = "direction", deserialize_with = "null_as_default")]
    pub bearing: f64,

    /// Seconds behind schedule; negative when early
    #[serde(default, alias = "delay", deserialize_with = "null_as_default")]
    pub delay_seconds: i64,
}

/// Body of the vehicle position feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFeed {
    #[serde(default)]
    pub last_update: Option<String>,
    /// Records missing an id or a position are left out
    #[serde(default, deserialize_with = "readable_records")]
    pub vehicles: Vec<RawVehicleRecord>,
}

/// A feed record with its resolved vehicle kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(flatten)]
    pub record: RawVehicleRecord,
    pub kind: VehicleKind,
}

impl Vehicle {
    pub fn new(record: RawVehicleRecord, kind: VehicleKind) -> Self {
        Self { record, kind }
    }

    pub fn is_delayed(&self) -> bool {
        self.record.delay_seconds > DELAY_THRESHOLD_SECS
    }

    /// Delay rounded towards zero to whole minutes
    pub fn delay_minutes(&self) -> i64 {
        self.record.delay_seconds / 60
    }

    /// Case-insensitive match against an already uppercased line name
    pub fn is_line(&self, normalized_line: &str) -> bool {
        self.record.route_short_name.to_uppercase() == normalized_line
    }
}

impl std::fmt::Display for Vehicle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} #{} -> {} at ({:.6}, {:.6}) {:.0} km/h",
            self.kind,
            self.record.route_short_name,
            self.record.vehicle_code,
            self.record.headsign,
            self.record.lat,
            self.record.lon,
            self.record.speed,
        )?;
        if self.is_delayed() {
            write!(f, " [+{} min]", self.delay_minutes())?;
        }
        Ok(())
    }
}
