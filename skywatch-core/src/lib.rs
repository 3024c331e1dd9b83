//! Core library for the `skywatch` forecast generator.
//!
//! This crate defines:
//! - Shared domain models (snapshots, merged weather, windows, forecast document)
//! - Snapshot normalization for loosely-keyed sensor JSON
//! - The merge-and-scoring engine (reconciler, window scorer, assembler)
//! - Abstraction over weather sources and the concrete readers
//! - Configuration handling
//!
//! The engine itself is synchronous and never reads the clock: every
//! operation takes `now` explicitly, so identical inputs produce identical
//! output. Only the readers perform I/O.

pub mod assemble;
pub mod astronomy;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod reader;
pub mod reconcile;
pub mod scoring;

pub use assemble::{ForecastAssembler, SourceReadings};
pub use config::{Config, LocalSourceConfig, OnlineSourceConfig, ScoringConfig, SensorKind};
pub use error::{EngineError, NormalizeError};
pub use model::{
    DataConfidence, Field, FieldSource, Forecast, ForecastPoint, Location, MergedWeather,
    MoonInterference, ObservationWindow, Readings, Seeing, SkyQuality, Source,
    SourceAvailability, Transparency, WeatherSnapshot, WindowQuality,
};
pub use reader::SourceReader;
