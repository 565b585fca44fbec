//! Problem definition: map entities, locations, hotspots and the general game constants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Map names that are played in sandbox mode.
pub const SANDBOX_MAPS: [&str; 2] = ["sSandbox", "gSandbox"];

/// Whether locations are fixed by the map or freely placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Regular,
    Sandbox,
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinates {
            latitude,
            longitude,
        }
    }
}

/// Store categories a location can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocationType {
    #[serde(rename = "Grocery-store-large")]
    GroceryStoreLarge,
    #[serde(rename = "Grocery-store")]
    GroceryStore,
    #[serde(rename = "Gas-station")]
    GasStation,
    #[serde(rename = "Convenience")]
    Convenience,
    #[serde(rename = "Kiosk")]
    Kiosk,
}

impl LocationType {
    pub const ALL: [LocationType; 5] = [
        LocationType::GroceryStoreLarge,
        LocationType::GroceryStore,
        LocationType::GasStation,
        LocationType::Convenience,
        LocationType::Kiosk,
    ];

    /// The name the game API uses for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::GroceryStoreLarge => "Grocery-store-large",
            LocationType::GroceryStore => "Grocery-store",
            LocationType::GasStation => "Gas-station",
            LocationType::Convenience => "Convenience",
            LocationType::Kiosk => "Kiosk",
        }
    }

    /// Maximum number of sandbox placements of this type.
    pub fn default_quota(&self) -> u32 {
        match self {
            LocationType::GroceryStoreLarge => 5,
            LocationType::GroceryStore => 20,
            LocationType::GasStation => 8,
            LocationType::Convenience => 20,
            LocationType::Kiosk => 3,
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed location on a regular map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub location_name: String,
    pub location_type: LocationType,
    pub latitude: f64,
    pub longitude: f64,
    pub footfall: f64,
    #[serde(default)]
    pub footfall_scale: u32,
    pub sales_volume: f64,
}

impl Location {
    pub fn position(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A footfall source on sandbox maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    #[serde(default)]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub spread: f64,
    pub footfall: f64,
}

impl Hotspot {
    pub fn position(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Relative pull of this hotspot when building cluster midpoints.
    pub fn weight(&self) -> f64 {
        self.footfall / self.spread
    }
}

/// Coordinate bounds of a map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    pub latitude_min: f64,
    pub latitude_max: f64,
    pub longitude_min: f64,
    pub longitude_max: f64,
}

impl Border {
    pub fn clamp_latitude(&self, latitude: f64) -> f64 {
        latitude.max(self.latitude_min).min(self.latitude_max)
    }

    pub fn clamp_longitude(&self, longitude: f64) -> f64 {
        longitude.max(self.longitude_min).min(self.longitude_max)
    }

    pub fn clamp(&self, position: Coordinates) -> Coordinates {
        Coordinates::new(
            self.clamp_latitude(position.latitude),
            self.clamp_longitude(position.longitude),
        )
    }

    pub fn latitude_span(&self) -> f64 {
        self.latitude_max - self.latitude_min
    }

    pub fn longitude_span(&self) -> f64 {
        self.longitude_max - self.longitude_min
    }

    pub fn contains_latitude(&self, latitude: f64) -> bool {
        latitude >= self.latitude_min && latitude <= self.latitude_max
    }

    pub fn contains_longitude(&self, longitude: f64) -> bool {
        longitude >= self.longitude_min && longitude <= self.longitude_max
    }
}

/// Everything specific to one map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntity {
    pub map_name: String,
    pub border: Border,
    #[serde(default)]
    pub locations: BTreeMap<String, Location>,
    #[serde(default)]
    pub hotspots: Vec<Hotspot>,
}

impl MapEntity {
    /// Sandbox maps are recognised by name, or by having hotspots but no fixed locations.
    pub fn mode(&self) -> Mode {
        if SANDBOX_MAPS.contains(&self.map_name.as_str())
            || (self.locations.is_empty() && !self.hotspots.is_empty())
        {
            Mode::Sandbox
        } else {
            Mode::Regular
        }
    }

    /// Positions of all fixed locations keyed by location name.
    pub fn positions(&self) -> BTreeMap<String, Coordinates> {
        self.locations
            .iter()
            .map(|(key, location)| (key.clone(), location.position()))
            .collect()
    }
}

/// Per-kind constants for a refill station model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationData {
    pub refill_capacity_per_week: f64,
    pub leasing_cost_per_week: f64,
    pub static_co2: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefillUnitData {
    pub profit_per_unit: f64,
    pub co2_per_unit_in_grams: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassicUnitData {
    pub co2_per_unit_in_grams: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationTypeData {
    #[serde(rename = "type")]
    pub location_type: LocationType,
    #[serde(alias = "salesVol")]
    pub sales_volume: f64,
}

fn default_quotas() -> BTreeMap<LocationType, u32> {
    LocationType::ALL
        .iter()
        .map(|t| (*t, t.default_quota()))
        .collect()
}

/// Map independent game constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralData {
    pub willingness_to_travel_in_meters: f64,
    pub constant_exp_distribution_function: f64,
    pub refill_sales_factor: f64,
    pub refill_distribution_rate: f64,
    pub co2_price_per_kilo_in_sek: f64,
    pub f3100_data: StationData,
    pub f9100_data: StationData,
    pub refill_unit_data: RefillUnitData,
    pub classic_unit_data: ClassicUnitData,
    #[serde(default)]
    pub location_types: BTreeMap<String, LocationTypeData>,
    #[serde(default = "default_quotas")]
    pub sandbox_quotas: BTreeMap<LocationType, u32>,
}

impl GeneralData {
    /// Base sales volume of a sandbox placement of the given type.
    pub fn sales_volume_of(&self, location_type: LocationType) -> f64 {
        self.location_types
            .values()
            .find(|data| data.location_type == location_type)
            .map(|data| data.sales_volume)
            .unwrap_or(0.0)
    }

    pub fn quota_of(&self, location_type: LocationType) -> u32 {
        self.sandbox_quotas
            .get(&location_type)
            .copied()
            .unwrap_or_else(|| location_type.default_quota())
    }

    /// Sum of all per-type quotas, the highest valid `location<n>` suffix.
    pub fn total_quota(&self) -> usize {
        LocationType::ALL
            .iter()
            .map(|t| self.quota_of(*t) as usize)
            .sum()
    }

    pub fn capacity(&self, f3: u32, f9: u32) -> f64 {
        f3 as f64 * self.f3100_data.refill_capacity_per_week
            + f9 as f64 * self.f9100_data.refill_capacity_per_week
    }

    pub fn leasing_cost(&self, f3: u32, f9: u32) -> f64 {
        f3 as f64 * self.f3100_data.leasing_cost_per_week
            + f9 as f64 * self.f9100_data.leasing_cost_per_week
    }

    pub fn static_co2(&self, f3: u32, f9: u32) -> f64 {
        f3 as f64 * self.f3100_data.static_co2 + f9 as f64 * self.f9100_data.static_co2
    }
}
