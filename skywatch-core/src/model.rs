//! Domain types shared by the readers, the engine and the forecast document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::astronomy::AstronomySummary;

/// Where a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Local,
    Online,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Local => "LOCAL",
            Source::Online => "ONLINE",
        }
    }

    pub const fn all() -> &'static [Source] {
        &[Source::Local, Source::Online]
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one source for a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceAvailability {
    Available,
    Stale,
    Unavailable,
}

/// Canonical weather fields shared by snapshots and the merged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    TemperatureC,
    HumidityPct,
    PressureHpa,
    DewpointC,
    WindSpeedMs,
    WindDirectionDeg,
    CloudCoverPct,
    VisibilityKm,
    ConditionText,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::TemperatureC,
        Field::HumidityPct,
        Field::PressureHpa,
        Field::DewpointC,
        Field::WindSpeedMs,
        Field::WindDirectionDeg,
        Field::CloudCoverPct,
        Field::VisibilityKm,
        Field::ConditionText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::TemperatureC => "temperature_c",
            Field::HumidityPct => "humidity_pct",
            Field::PressureHpa => "pressure_hpa",
            Field::DewpointC => "dewpoint_c",
            Field::WindSpeedMs => "wind_speed_ms",
            Field::WindDirectionDeg => "wind_direction_deg",
            Field::CloudCoverPct => "cloud_cover_pct",
            Field::VisibilityKm => "visibility_km",
            Field::ConditionText => "condition_text",
        }
    }

    /// The source consulted first for this field.
    ///
    /// LOCAL for directly measured quantities, ONLINE for sky state.
    pub fn primary(&self) -> Source {
        match self {
            Field::CloudCoverPct | Field::VisibilityKm | Field::ConditionText => Source::Online,
            _ => Source::Local,
        }
    }

    pub fn fallback(&self) -> Source {
        match self.primary() {
            Source::Local => Source::Online,
            Source::Online => Source::Local,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which source supplied a merged field, or `None` when neither did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldSource {
    Local,
    Online,
    None,
}

impl From<Source> for FieldSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Local => FieldSource::Local,
            Source::Online => FieldSource::Online,
        }
    }
}

/// Bag of optional readings in canonical units.
///
/// An absent field means "not provided", never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure_hpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dewpoint_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_cover_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_text: Option<String>,
}

impl Readings {
    /// Numeric value of a field; `None` for text fields.
    pub fn number(&self, field: Field) -> Option<f64> {
        match field {
            Field::TemperatureC => self.temperature_c,
            Field::HumidityPct => self.humidity_pct,
            Field::PressureHpa => self.pressure_hpa,
            Field::DewpointC => self.dewpoint_c,
            Field::WindSpeedMs => self.wind_speed_ms,
            Field::WindDirectionDeg => self.wind_direction_deg,
            Field::CloudCoverPct => self.cloud_cover_pct,
            Field::VisibilityKm => self.visibility_km,
            Field::ConditionText => None,
        }
    }

    /// Set a numeric field. Text fields are left untouched.
    pub fn set_number(&mut self, field: Field, value: f64) {
        let slot = match field {
            Field::TemperatureC => &mut self.temperature_c,
            Field::HumidityPct => &mut self.humidity_pct,
            Field::PressureHpa => &mut self.pressure_hpa,
            Field::DewpointC => &mut self.dewpoint_c,
            Field::WindSpeedMs => &mut self.wind_speed_ms,
            Field::WindDirectionDeg => &mut self.wind_direction_deg,
            Field::CloudCoverPct => &mut self.cloud_cover_pct,
            Field::VisibilityKm => &mut self.visibility_km,
            Field::ConditionText => return,
        };
        *slot = Some(value);
    }

    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::ConditionText => self.condition_text.is_some(),
            numeric => self.number(numeric).is_some(),
        }
    }

    /// Copy one field's value (present or absent) from `other`.
    pub fn copy_field(&mut self, field: Field, other: &Readings) {
        match field {
            Field::ConditionText => self.condition_text = other.condition_text.clone(),
            Field::TemperatureC => self.temperature_c = other.temperature_c,
            Field::HumidityPct => self.humidity_pct = other.humidity_pct,
            Field::PressureHpa => self.pressure_hpa = other.pressure_hpa,
            Field::DewpointC => self.dewpoint_c = other.dewpoint_c,
            Field::WindSpeedMs => self.wind_speed_ms = other.wind_speed_ms,
            Field::WindDirectionDeg => self.wind_direction_deg = other.wind_direction_deg,
            Field::CloudCoverPct => self.cloud_cover_pct = other.cloud_cover_pct,
            Field::VisibilityKm => self.visibility_km = other.visibility_km,
        }
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| !self.has(*f))
    }

    /// Derive the dew point from temperature and humidity when it is missing.
    pub fn fill_dewpoint(&mut self) {
        if self.dewpoint_c.is_some() {
            return;
        }
        if let (Some(t), Some(rh)) = (self.temperature_c, self.humidity_pct) {
            self.dewpoint_c = magnus_dewpoint(t, rh);
        }
    }
}

/// Magnus approximation of the dew point, rounded to 0.1 °C.
pub fn magnus_dewpoint(temperature_c: f64, humidity_pct: f64) -> Option<f64> {
    const A: f64 = 17.27;
    const B: f64 = 237.7;

    if humidity_pct <= 0.0 || humidity_pct > 100.0 {
        return None;
    }
    let alpha = (A * temperature_c) / (B + temperature_c) + (humidity_pct / 100.0).ln();
    let dewpoint = (B * alpha) / (A - alpha);
    dewpoint.is_finite().then(|| (dewpoint * 10.0).round() / 10.0)
}

/// One source's view of the weather at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub source: Source,
    pub observed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub readings: Readings,
}

impl WeatherSnapshot {
    pub fn new(source: Source, observed_at: DateTime<Utc>) -> Self {
        Self {
            source,
            observed_at,
            readings: Readings::default(),
        }
    }
}

/// Per-invocation record reconciled from both sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedWeather {
    #[serde(flatten)]
    pub readings: Readings,
    pub sources_used: BTreeMap<Field, FieldSource>,
    pub availability: BTreeMap<Source, SourceAvailability>,
}

impl MergedWeather {
    /// Record with every field absent and both sources unavailable.
    pub fn empty() -> Self {
        Self {
            readings: Readings::default(),
            sources_used: Field::ALL.iter().map(|f| (*f, FieldSource::None)).collect(),
            availability: Source::all()
                .iter()
                .map(|s| (*s, SourceAvailability::Unavailable))
                .collect(),
        }
    }

    pub fn availability_of(&self, source: Source) -> SourceAvailability {
        self.availability
            .get(&source)
            .copied()
            .unwrap_or(SourceAvailability::Unavailable)
    }

    pub fn source_of(&self, field: Field) -> FieldSource {
        self.sources_used
            .get(&field)
            .copied()
            .unwrap_or(FieldSource::None)
    }
}

/// One future slice of the online forecast series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub at: DateTime<Utc>,
    pub cloud_cover_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
}

/// Trust in a window's inputs. Ordered from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataConfidence {
    Low,
    Medium,
    High,
}

/// Qualitative label for a window, from its average cloud cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowQuality {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl WindowQuality {
    pub fn from_cloud_cover(cloud_cover_pct: f64) -> Self {
        match cloud_cover_pct {
            c if c < 20.0 => WindowQuality::Excellent,
            c if c < 40.0 => WindowQuality::Good,
            c if c < 60.0 => WindowQuality::Moderate,
            _ => WindowQuality::Poor,
        }
    }
}

/// How much moonlight washes out the sky. Ordered from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoonInterference {
    Minimal,
    Moderate,
    High,
}

impl MoonInterference {
    pub fn from_illumination(illumination_pct: f64) -> Self {
        if illumination_pct > 80.0 {
            MoonInterference::High
        } else if illumination_pct > 40.0 {
            MoonInterference::Moderate
        } else {
            MoonInterference::Minimal
        }
    }
}

/// A scored span of future time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub score: f64,
    pub rationale: Vec<String>,
    pub data_confidence: DataConfidence,
    pub quality: WindowQuality,
    pub avg_cloud_cover_pct: f64,
    pub moon_interference: MoonInterference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            name: "DORO Lab Observatory · IT:U Austria".to_string(),
            latitude: 48.2082,
            longitude: 16.3738,
            elevation_m: Some(171.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transparency {
    Excellent,
    Good,
    Moderate,
    Poor,
    Unknown,
}

/// Atmospheric steadiness, estimated from the same inputs as transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seeing {
    Good,
    Moderate,
    Poor,
    Unknown,
}

/// Coarse summary of current sky conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyQuality {
    pub transparency: Transparency,
    pub seeing: Seeing,
    /// 0 to 10; absent when transparency is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_rating: Option<f64>,
}

impl SkyQuality {
    pub fn from_current(current: &MergedWeather) -> Self {
        let transparency = match (current.readings.cloud_cover_pct, current.readings.visibility_km) {
            (Some(cloud), Some(vis)) if cloud < 20.0 && vis > 15.0 => Transparency::Excellent,
            (Some(cloud), Some(vis)) if cloud < 40.0 && vis > 10.0 => Transparency::Good,
            (Some(cloud), Some(_)) if cloud < 60.0 => Transparency::Moderate,
            (Some(_), Some(_)) => Transparency::Poor,
            _ => Transparency::Unknown,
        };
        let (seeing, overall_rating) = match transparency {
            Transparency::Excellent => (Seeing::Good, Some(9.0)),
            Transparency::Good => (Seeing::Moderate, Some(7.0)),
            Transparency::Moderate => (Seeing::Moderate, Some(5.0)),
            Transparency::Poor => (Seeing::Poor, Some(3.0)),
            Transparency::Unknown => (Seeing::Unknown, None),
        };
        Self {
            transparency,
            seeing,
            overall_rating,
        }
    }
}

/// The document produced by one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub generated_at: DateTime<Utc>,
    pub location: Location,
    pub current: MergedWeather,
    pub windows: Vec<ObservationWindow>,
    pub source_status: BTreeMap<Source, SourceAvailability>,
    pub astronomy: AstronomySummary,
    pub sky_quality: SkyQuality,
    /// The forecast series the windows were scored from, limited to the horizon.
    #[serde(rename = "forecast_48h")]
    pub forecast: Vec<ForecastPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
