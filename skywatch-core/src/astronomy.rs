//! Sun and moon helpers used to decide when the sky is dark.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sunrise::{Coordinates, DawnType, SolarDay, SolarEvent};

use crate::error::EngineError;
use crate::model::Location;

/// 2000-01-06 18:14 UTC, a known new moon.
const REFERENCE_NEW_MOON_UNIX: i64 = 947_182_440;
const SYNODIC_MONTH_DAYS: f64 = 29.53059;

/// Solar events for one UTC date.
///
/// When the sun never reaches an event's altitude the underlying calculation
/// yields the Unix epoch; [`SkyClock::day_kind`] sorts those dates out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunEvents {
    pub astronomical_dawn: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub astronomical_dusk: DateTime<Utc>,
}

impl SunEvents {
    /// Events exist and are in their natural order.
    fn is_consistent(&self) -> bool {
        self.astronomical_dawn <= self.sunrise
            && self.sunrise < self.sunset
            && self.sunset <= self.astronomical_dusk
            && self.astronomical_dusk - self.astronomical_dawn < Duration::hours(24)
    }
}

/// How the sun behaves over one UTC date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    /// Sunrise, sunset and a stretch of astronomical night.
    Regular(SunEvents),
    /// The sun sets but never gets 18° below the horizon.
    WhiteNight {
        sunrise: DateTime<Utc>,
        sunset: DateTime<Utc>,
    },
    PolarDay,
    PolarNight,
}

impl DayKind {
    /// Start of full darkness after this date's daylight.
    fn dark_from(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        match self {
            DayKind::Regular(ev) => Some(ev.astronomical_dusk),
            DayKind::WhiteNight { sunrise, sunset } => {
                Some(solar_noon(*sunrise, *sunset) + Duration::hours(12))
            }
            DayKind::PolarNight => Some(start_of(date)),
            DayKind::PolarDay => None,
        }
    }

    /// End of full darkness before this date's daylight.
    fn dark_until(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        match self {
            DayKind::Regular(ev) => Some(ev.astronomical_dawn),
            DayKind::WhiteNight { sunrise, sunset } => {
                Some(solar_noon(*sunrise, *sunset) - Duration::hours(12))
            }
            DayKind::PolarNight => Some(start_of(date) + Duration::days(1)),
            DayKind::PolarDay => None,
        }
    }
}

fn solar_noon(sunrise: DateTime<Utc>, sunset: DateTime<Utc>) -> DateTime<Utc> {
    sunrise + (sunset - sunrise) / 2
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Sun position lookups for a fixed site.
#[derive(Debug, Clone, Copy)]
pub struct SkyClock {
    coords: Coordinates,
}

impl SkyClock {
    pub fn new(location: &Location) -> Result<Self, EngineError> {
        let coords = Coordinates::new(location.latitude, location.longitude).ok_or_else(|| {
            EngineError::InvalidConfig {
                reason: format!(
                    "coordinates out of range: lat {}, lon {}",
                    location.latitude, location.longitude
                ),
            }
        })?;
        Ok(Self { coords })
    }

    pub fn events(&self, date: NaiveDate) -> SunEvents {
        let day = SolarDay::new(self.coords, date);
        SunEvents {
            astronomical_dawn: day.event_time(SolarEvent::Dawn(DawnType::Astronomical)),
            sunrise: day.event_time(SolarEvent::Sunrise),
            sunset: day.event_time(SolarEvent::Sunset),
            astronomical_dusk: day.event_time(SolarEvent::Dusk(DawnType::Astronomical)),
        }
    }

    fn consistent_events(&self, date: NaiveDate) -> Option<SunEvents> {
        Some(self.events(date)).filter(SunEvents::is_consistent)
    }

    pub fn day_kind(&self, date: NaiveDate) -> DayKind {
        let ev = self.events(date);
        let near = |t: DateTime<Utc>| (t - start_of(date)).num_hours().abs() <= 48;

        if near(ev.sunrise) && near(ev.sunset) && ev.sunrise < ev.sunset {
            if near(ev.astronomical_dawn) && near(ev.astronomical_dusk) && ev.is_consistent() {
                DayKind::Regular(ev)
            } else {
                DayKind::WhiteNight {
                    sunrise: ev.sunrise,
                    sunset: ev.sunset,
                }
            }
        } else if self.summer_half(date) {
            DayKind::PolarDay
        } else {
            DayKind::PolarNight
        }
    }

    /// The sun's declination lies on the site's side of the equator.
    fn summer_half(&self, date: NaiveDate) -> bool {
        let days_from_equinox = f64::from(date.ordinal()) - 81.0;
        let declination = (2.0 * std::f64::consts::PI * days_from_equinox / 365.0).sin();
        declination * self.coords.lat() > 0.0
    }

    /// How dark the sky is at `at`, from 0.0 (daylight) to 1.0 (astronomical night).
    ///
    /// Twilight ramps quadratically, so the last stretch before full
    /// darkness gains the most. Where the sun never gets 18° down, the ramp
    /// runs from sunset to solar midnight instead.
    pub fn darkness(&self, at: DateTime<Utc>) -> f64 {
        let date = at.date_naive();
        let days: Vec<(NaiveDate, DayKind)> = [date.pred_opt(), Some(date), date.succ_opt()]
            .into_iter()
            .flatten()
            .map(|d| (d, self.day_kind(d)))
            .collect();

        for (d, kind) in &days {
            match kind {
                DayKind::Regular(ev) => {
                    if at >= ev.sunrise && at <= ev.sunset {
                        return 0.0;
                    }
                    if at > ev.sunset && at < ev.astronomical_dusk {
                        return ramp(ev.sunset, ev.astronomical_dusk, at).powi(2);
                    }
                    if at > ev.astronomical_dawn && at < ev.sunrise {
                        return ramp(ev.sunrise, ev.astronomical_dawn, at).powi(2);
                    }
                }
                DayKind::WhiteNight { sunrise, sunset } => {
                    let noon = solar_noon(*sunrise, *sunset);
                    if at >= *sunrise && at <= *sunset {
                        return 0.0;
                    }
                    if at > *sunset && at <= noon + Duration::hours(12) {
                        return ramp(*sunset, noon + Duration::hours(12), at).powi(2);
                    }
                    if at >= noon - Duration::hours(12) && at < *sunrise {
                        return ramp(*sunrise, noon - Duration::hours(12), at).powi(2);
                    }
                }
                DayKind::PolarNight if *d == date => return 1.0,
                DayKind::PolarDay if *d == date => return 0.0,
                DayKind::PolarNight | DayKind::PolarDay => {}
            }
        }

        for pair in days.windows(2) {
            let (evening, morning) = (&pair[0], &pair[1]);
            let from = evening.1.dark_from(evening.0);
            let until = morning.1.dark_until(morning.0);
            if let (Some(from), Some(until)) = (from, until) {
                if at >= from && at <= until {
                    return 1.0;
                }
            }
        }

        0.0
    }

    /// The first night whose astronomical dawn lies after `now`.
    pub fn upcoming_night(&self, now: DateTime<Utc>) -> Option<(SunEvents, SunEvents)> {
        let date = now.date_naive();
        [date.pred_opt(), Some(date), date.succ_opt()]
            .into_iter()
            .flatten()
            .filter_map(|d| {
                let evening = self.consistent_events(d)?;
                let morning = self.consistent_events(d.succ_opt()?)?;
                Some((evening, morning))
            })
            .find(|(_, morning)| morning.astronomical_dawn > now)
    }
}

/// Position of `at` on the way from `from` to `to`, clamped to [0, 1].
fn ramp(from: DateTime<Utc>, to: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    let span = (to - from).num_seconds() as f64;
    if span == 0.0 {
        return 1.0;
    }
    ((at - from).num_seconds() as f64 / span).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoonPhase {
    pub name: &'static str,
    pub illumination_pct: f64,
    pub age_days: f64,
}

/// Mean-synodic-month approximation; good to about a day.
pub fn moon_phase(at: DateTime<Utc>) -> MoonPhase {
    let days = (at.timestamp() - REFERENCE_NEW_MOON_UNIX) as f64 / 86_400.0;
    let age_days = days.rem_euclid(SYNODIC_MONTH_DAYS);
    let fraction = age_days / SYNODIC_MONTH_DAYS;

    let name = match fraction {
        f if f < 0.0625 => "New Moon",
        f if f < 0.1875 => "Waxing Crescent",
        f if f < 0.3125 => "First Quarter",
        f if f < 0.4375 => "Waxing Gibbous",
        f if f < 0.5625 => "Full Moon",
        f if f < 0.6875 => "Waning Gibbous",
        f if f < 0.8125 => "Last Quarter",
        f if f < 0.9375 => "Waning Crescent",
        _ => "New Moon",
    };

    let illumination = (1.0 - (2.0 * std::f64::consts::PI * fraction).cos()) / 2.0 * 100.0;

    MoonPhase {
        name,
        illumination_pct: round1(illumination),
        age_days: round1(age_days),
    }
}

/// Night and moon summary attached to the forecast document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstronomySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub astronomical_dusk: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub astronomical_dawn: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darkness_hours: Option<f64>,
    pub moon_phase: String,
    pub moon_illumination_pct: f64,
    pub moon_age_days: f64,
}

impl AstronomySummary {
    pub fn at(sky: &SkyClock, now: DateTime<Utc>) -> Self {
        let moon = moon_phase(now);
        let night = sky.upcoming_night(now);

        Self {
            sunset: night.map(|(evening, _)| evening.sunset),
            astronomical_dusk: night.map(|(evening, _)| evening.astronomical_dusk),
            astronomical_dawn: night.map(|(_, morning)| morning.astronomical_dawn),
            sunrise: night.map(|(_, morning)| morning.sunrise),
            darkness_hours: night.map(|(evening, morning)| {
                round1(
                    (morning.astronomical_dawn - evening.astronomical_dusk).num_minutes() as f64
                        / 60.0,
                )
            }),
            moon_phase: moon.name.to_string(),
            moon_illumination_pct: moon.illumination_pct,
            moon_age_days: moon.age_days,
        }
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
