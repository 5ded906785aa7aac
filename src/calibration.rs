//! MQ135 clean-air baseline (R0): calibration, persistence and fallback.
//!
//! The baseline file holds a single decimal number and is rewritten on every
//! calibration. A missing or unreadable file is never fatal; the built-in
//! default takes over.

use crate::sensors::SensorError;
use crate::station::{pause, StopSignal};
use embassy_time::Duration;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Clean-air resistance used when nothing better is known, ohms.
pub const DEFAULT_BASELINE_OHMS: f64 = 144_020.0;

/// Reference resistance of the gas sensor in clean air. Always positive and
/// finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline(f64);

impl Baseline {
    pub const DEFAULT: Self = Self(DEFAULT_BASELINE_OHMS);

    pub fn new(ohms: f64) -> Option<Self> {
        (ohms.is_finite() && ohms > 0.0).then_some(Self(ohms))
    }

    pub fn ohms(self) -> f64 {
        self.0
    }
}

impl Default for Baseline {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where the in-memory baseline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineSource {
    Calibrated,
    Stored,
    Default,
}

#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} does not hold a number: {content:?}", path.display())]
    Parse { path: PathBuf, content: String },

    #[error("{} holds an unusable baseline {value}", path.display())]
    OutOfRange { path: PathBuf, value: f64 },
}

/// The persisted baseline file.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `Ok(None)` when no file exists yet.
    pub fn load(&self) -> Result<Option<Baseline>, BaselineError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(BaselineError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let value: f64 = content.trim().parse().map_err(|_| BaselineError::Parse {
            path: self.path.clone(),
            content: content.clone(),
        })?;

        Baseline::new(value).map(Some).ok_or(BaselineError::OutOfRange {
            path: self.path.clone(),
            value,
        })
    }

    /// Overwrites the file. `Display` for `f64` is round-trip exact.
    pub fn save(&self, baseline: Baseline) -> Result<(), BaselineError> {
        fs::write(&self.path, baseline.ohms().to_string()).map_err(|source| BaselineError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Stored baseline, or the default when there is none or it cannot be
    /// read.
    pub fn load_or_default(&self) -> (Baseline, BaselineSource) {
        match self.load() {
            Ok(Some(baseline)) => {
                log::info!("Loaded saved R0 = {:.2}", baseline.ohms());
                (baseline, BaselineSource::Stored)
            }
            Ok(None) => {
                log::info!("No saved R0 found, using default.");
                (Baseline::DEFAULT, BaselineSource::Default)
            }
            Err(err) => {
                log::warn!("could not load saved R0: {err}");
                (Baseline::DEFAULT, BaselineSource::Default)
            }
        }
    }
}

/// Anything that can be sampled for a sensor resistance in ohms.
#[allow(async_fn_in_trait)]
pub trait ResistanceSampler {
    async fn sample_resistance(&mut self) -> Result<f64, SensorError>;
}

/// Timing of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPlan {
    pub warm_up: Duration,
    pub samples: usize,
    pub sample_interval: Duration,
}

impl Default for CalibrationPlan {
    /// 20 minutes of heater warm-up, then two minutes of samples.
    fn default() -> Self {
        Self {
            warm_up: Duration::from_secs(20 * 60),
            samples: 240,
            sample_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    /// Mean of the samples; also persisted unless saving failed.
    Completed(Baseline),
    /// No usable baseline came out of the samples.
    Failed,
    /// The stop signal fired during warm-up or sampling.
    Interrupted,
}

pub struct Calibrator<'a> {
    plan: CalibrationPlan,
    store: &'a BaselineStore,
}

impl<'a> Calibrator<'a> {
    pub fn new(plan: CalibrationPlan, store: &'a BaselineStore) -> Self {
        Self { plan, store }
    }

    /// Warm up, sample, average and persist.
    ///
    /// The warm-up is a deliberate blocking wait: the sensor heater needs it
    /// before any sample is meaningful.
    pub async fn run<P: ResistanceSampler>(&self, sampler: &mut P, stop: &StopSignal) -> CalibrationOutcome {
        log::info!(
            "[MQ135] warming up for {}s before calibration",
            self.plan.warm_up.as_secs()
        );
        if pause(self.plan.warm_up, stop).await {
            return CalibrationOutcome::Interrupted;
        }

        log::info!("[MQ135] calibrating R0 over {} samples", self.plan.samples);
        let mut sum = 0.0;
        let mut taken = 0usize;
        for i in 0..self.plan.samples {
            match sampler.sample_resistance().await {
                Ok(rs) => {
                    sum += rs;
                    taken += 1;
                }
                Err(e) => log::warn!("[MQ135] calibration sample {i} failed: {e}"),
            }
            if pause(self.plan.sample_interval, stop).await {
                return CalibrationOutcome::Interrupted;
            }
        }

        if taken == 0 {
            log::error!("[MQ135] no calibration samples succeeded");
            return CalibrationOutcome::Failed;
        }
        let Some(baseline) = Baseline::new(sum / taken as f64) else {
            log::error!("[MQ135] calibration produced unusable R0 {}", sum / taken as f64);
            return CalibrationOutcome::Failed;
        };
        log::info!("Calibrated R0 = {:.2}", baseline.ohms());

        if let Err(e) = self.store.save(baseline) {
            log::error!("failed to save R0: {e}");
        }
        CalibrationOutcome::Completed(baseline)
    }
}
