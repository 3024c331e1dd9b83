//! Window scorer: rates each forecast slot for observing and folds
//! neighbouring slots into ranked observation windows.
//!
//! Every slot is scored, including the ones that end up excluded, so the
//! reason a slot was dropped stays inspectable through [`WindowScorer::score_slots`].

use chrono::{DateTime, Duration, Utc};

use crate::astronomy::{SkyClock, moon_phase, round1};
use crate::config::ScoringConfig;
use crate::error::EngineError;
use crate::model::{
    DataConfidence, ForecastPoint, MergedWeather, MoonInterference, ObservationWindow, Source,
    SourceAvailability, WindowQuality,
};

/// Why a slot can never be part of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Daylight,
    VisibilityBelowMinimum,
    NoScore,
}

/// One forecast point turned into a time slot and scored.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotScore {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub score: f64,
    pub rationale: Vec<String>,
    pub data_confidence: DataConfidence,
    pub exclusion: Option<Exclusion>,
    pub cloud_cover_pct: f64,
    pub moon_interference: MoonInterference,
}

impl SlotScore {
    pub fn is_excluded(&self) -> bool {
        self.exclusion.is_some()
    }
}

/// Check that the series is non-empty and strictly increasing in time.
pub fn validate_series(points: &[ForecastPoint]) -> Result<(), EngineError> {
    if points.is_empty() {
        return Err(EngineError::EmptyForecastSeries);
    }

    for (index, pair) in points.windows(2).enumerate() {
        if pair[1].at <= pair[0].at {
            return Err(EngineError::NonMonotonicForecastSeries {
                index: index + 1,
                previous: pair[0].at,
                at: pair[1].at,
            });
        }
    }

    Ok(())
}

/// Scores forecast slots against one site and one set of tunables.
#[derive(Debug, Clone)]
pub struct WindowScorer<'a> {
    config: &'a ScoringConfig,
    sky: &'a SkyClock,
}

impl<'a> WindowScorer<'a> {
    pub fn new(config: &'a ScoringConfig, sky: &'a SkyClock) -> Self {
        Self { config, sky }
    }

    /// Score every slot of the series that overlaps `[now, now + horizon)`.
    ///
    /// Slots follow the series' own sampling: a point covers the time up to
    /// the next point, and the last point reuses the preceding interval. A
    /// slot already under way starts at `now`.
    pub fn score_slots(
        &self,
        current: &MergedWeather,
        points: &[ForecastPoint],
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotScore>, EngineError> {
        validate_series(points)?;

        let slots = slots_in_horizon(points, now, now + self.config.horizon())
            .map(|(i, start, end)| self.score_slot(current, &points[i], start, end, now))
            .collect();

        Ok(slots)
    }

    /// The points of a well-formed series whose slots overlap the horizon.
    pub fn horizon_series(
        &self,
        points: &[ForecastPoint],
        now: DateTime<Utc>,
    ) -> Result<Vec<ForecastPoint>, EngineError> {
        validate_series(points)?;
        Ok(slots_in_horizon(points, now, now + self.config.horizon())
            .map(|(i, _, _)| points[i].clone())
            .collect())
    }

    /// Score the series and build the ranked window list.
    pub fn score_windows(
        &self,
        current: &MergedWeather,
        points: &[ForecastPoint],
        now: DateTime<Utc>,
    ) -> Result<Vec<ObservationWindow>, EngineError> {
        let slots = self.score_slots(current, points, now)?;
        Ok(build_windows(&slots, self.config.merge_tolerance))
    }

    fn score_slot(
        &self,
        current: &MergedWeather,
        point: &ForecastPoint,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SlotScore {
        let cfg = self.config;
        let data_confidence = self.confidence(current, start, now);
        let cloud = point.cloud_cover_pct.clamp(0.0, 100.0);
        let mid = start + (end - start) / 2;
        let moon = moon_phase(mid);
        let moon_interference = MoonInterference::from_illumination(moon.illumination_pct);

        let excluded = |exclusion: Exclusion, reason: String| SlotScore {
            start,
            end,
            score: 0.0,
            rationale: vec![reason],
            data_confidence,
            exclusion: Some(exclusion),
            cloud_cover_pct: cloud,
            moon_interference,
        };

        let darkness = [start, mid, end]
            .iter()
            .map(|t| self.sky.darkness(*t))
            .sum::<f64>()
            / 3.0;
        if darkness <= 0.0 {
            return excluded(Exclusion::Daylight, "daylight".to_string());
        }

        if let Some(visibility) = point.visibility_km {
            if visibility < cfg.visibility_min_km {
                return excluded(
                    Exclusion::VisibilityBelowMinimum,
                    format!(
                        "visibility below minimum ({visibility:.1} km < {:.1} km)",
                        cfg.visibility_min_km
                    ),
                );
            }
        }

        let mut rationale = Vec::new();
        let mut score = 0.0;

        let clarity = (1.0 - cloud / 100.0) * cfg.cloud_weight;
        score += clarity;
        rationale.push(format!("cloud cover {cloud:.0}% (+{clarity:.1})"));

        match point.visibility_km {
            Some(visibility) => {
                let bonus =
                    visibility.min(cfg.visibility_ceiling_km) / cfg.visibility_ceiling_km
                        * cfg.visibility_weight;
                score += bonus;
                rationale.push(format!("visibility {visibility:.1} km (+{bonus:.1})"));
            }
            None => rationale.push("visibility unknown (+0.0)".to_string()),
        }

        let dark_bonus = darkness * cfg.darkness_weight;
        score += dark_bonus;
        if darkness >= 1.0 {
            rationale.push(format!("astronomical night (+{dark_bonus:.1})"));
        } else {
            rationale.push(format!(
                "twilight, {:.0}% dark (+{dark_bonus:.1})",
                darkness * 100.0
            ));
        }

        if start < now + cfg.wind_relevance() {
            if let Some(wind) = current.readings.wind_speed_ms {
                if wind > cfg.wind_threshold_ms {
                    let penalty = ((wind - cfg.wind_threshold_ms) * cfg.wind_penalty_per_ms)
                        .min(cfg.wind_penalty_max);
                    score -= penalty;
                    rationale.push(format!(
                        "wind {wind:.1} m/s above {:.1} m/s (-{penalty:.1})",
                        cfg.wind_threshold_ms
                    ));
                }
            }
        }

        let moon_penalty = match moon_interference {
            MoonInterference::High => cfg.moon_penalty_max,
            MoonInterference::Moderate => cfg.moon_penalty_max / 3.0,
            MoonInterference::Minimal => 0.0,
        };
        if moon_penalty > 0.0 {
            score -= moon_penalty;
            rationale.push(format!(
                "moon {:.0}% illuminated (-{moon_penalty:.1})",
                moon.illumination_pct
            ));
        }

        let score = round1(score.clamp(0.0, 100.0));
        if score <= 0.0 {
            rationale.push("no usable sky".to_string());
            return SlotScore {
                start,
                end,
                score: 0.0,
                rationale,
                data_confidence,
                exclusion: Some(Exclusion::NoScore),
                cloud_cover_pct: cloud,
                moon_interference,
            };
        }

        SlotScore {
            start,
            end,
            score,
            rationale,
            data_confidence,
            exclusion: None,
            cloud_cover_pct: cloud,
            moon_interference,
        }
    }

    /// HIGH only inside the local staleness horizon with a live station,
    /// then MEDIUM up to the configured lead time, LOW beyond.
    fn confidence(
        &self,
        current: &MergedWeather,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DataConfidence {
        let lead = start - now;
        let local_live = current.availability_of(Source::Local) == SourceAvailability::Available;

        if local_live && lead <= self.config.staleness() {
            DataConfidence::High
        } else if lead < self.config.medium_confidence() {
            DataConfidence::Medium
        } else {
            DataConfidence::Low
        }
    }
}

/// `(index, start, end)` of every slot overlapping `[now, horizon_end)`,
/// with a slot already under way clipped to `now`.
fn slots_in_horizon(
    points: &[ForecastPoint],
    now: DateTime<Utc>,
    horizon_end: DateTime<Utc>,
) -> impl Iterator<Item = (usize, DateTime<Utc>, DateTime<Utc>)> + '_ {
    points
        .iter()
        .enumerate()
        .map(move |(i, point)| (i, point.at, slot_end(points, i)))
        .filter(move |(_, start, end)| *end > now && *start < horizon_end)
        .map(move |(i, start, end)| (i, start.max(now), end))
}

fn slot_end(points: &[ForecastPoint], i: usize) -> DateTime<Utc> {
    let start = points[i].at;
    match (points.get(i + 1), i.checked_sub(1).and_then(|p| points.get(p))) {
        (Some(next), _) => next.at,
        (None, Some(prev)) => start + (start - prev.at),
        (None, None) => start + Duration::hours(1),
    }
}

/// Fold contiguous, similarly-scored slots into windows and rank them.
///
/// A run is seeded by a slot and extended while the next slot starts where
/// the run ends and scores at least as well as the seed, by no more than
/// `tolerance`. The window keeps the seed's score and rationale. Excluded
/// slots never join. Windows are ordered by score descending, then start
/// ascending.
pub fn build_windows(slots: &[SlotScore], tolerance: f64) -> Vec<ObservationWindow> {
    let mut windows = Vec::new();
    let mut run: Vec<&SlotScore> = Vec::new();

    for slot in slots {
        if slot.is_excluded() {
            flush_run(&mut run, &mut windows);
            continue;
        }

        let joins = match (run.first(), run.last()) {
            (Some(seed), Some(last)) => {
                last.end == slot.start
                    && slot.score >= seed.score
                    && slot.score - seed.score <= tolerance
            }
            _ => false,
        };
        if !joins {
            flush_run(&mut run, &mut windows);
        }
        run.push(slot);
    }
    flush_run(&mut run, &mut windows);

    windows.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.start.cmp(&b.start))
    });
    windows
}

fn flush_run(run: &mut Vec<&SlotScore>, windows: &mut Vec<ObservationWindow>) {
    let (Some(first), Some(last)) = (run.first(), run.last()) else {
        return;
    };
    let Some(weakest) = run.iter().min_by(|a, b| a.score.total_cmp(&b.score)) else {
        return;
    };

    let mut rationale = weakest.rationale.clone();
    if run.len() > 1 {
        rationale.push(format!("spans {} forecast slots", run.len()));
    }

    let avg_cloud = run.iter().map(|s| s.cloud_cover_pct).sum::<f64>() / run.len() as f64;

    windows.push(ObservationWindow {
        start: first.start,
        end: last.end,
        score: weakest.score,
        rationale,
        data_confidence: run
            .iter()
            .map(|s| s.data_confidence)
            .min()
            .unwrap_or(DataConfidence::Low),
        quality: WindowQuality::from_cloud_cover(avg_cloud),
        avg_cloud_cover_pct: round1(avg_cloud),
        moon_interference: run
            .iter()
            .map(|s| s.moon_interference)
            .max()
            .unwrap_or(MoonInterference::Minimal),
    });
    run.clear();
}
