//! The acquisition loop.
//!
//! ```text
//! Bootstrapping ──calibrate──▶ Calibrating ──▶ Ready ──▶ Cycling ──stop──▶ Stopped
//!        └──────────────── load / default ─────▲
//! ```
//!
//! A [`Station`] owns the sensors, the uploader and the in-memory baseline.
//! The only way out of `Cycling` is the stop signal; sensor handles are
//! released on the way to `Stopped`, or by drop if the run is abandoned.

use crate::calibration::{
    Baseline, BaselineSource, BaselineStore, CalibrationOutcome, CalibrationPlan, Calibrator,
};
use crate::sensors::manager::SensorSuite;
use crate::session::SessionId;
use crate::snapshot::Snapshot;
use crate::upload::{Payload, Uploader};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_hal_async::spi::SpiDevice;
use embedded_io_async::Read;

/// Raised once, from the OS signal handler, to end the run.
pub type StopSignal = Signal<CriticalSectionRawMutex, ()>;

/// Wait for `duration` unless the stop signal fires first.
/// Returns `true` when stopped. The signal stays raised for later checks.
pub async fn pause(duration: Duration, stop: &StopSignal) -> bool {
    if stop.signaled() {
        return true;
    }
    match select(Timer::after(duration), stop.wait()).await {
        Either::First(()) => false,
        Either::Second(()) => {
            stop.signal(());
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    Bootstrapping,
    Calibrating,
    Ready,
    Cycling,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Run the calibrator before the first cycle.
    pub calibrate: bool,
    pub calibration: CalibrationPlan,
    /// Pause between cycles.
    pub cycle_interval: Duration,
    /// Zone of the upload timestamps.
    pub timezone: Tz,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            calibrate: false,
            calibration: CalibrationPlan::default(),
            cycle_interval: Duration::from_secs(1),
            timezone: chrono_tz::Europe::Bucharest,
        }
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub uploads_sent: u64,
    pub uploads_failed: u64,
    pub uploads_skipped: u64,
}

/// Failures that prevent the station from starting.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("cannot open {device}: {reason}")]
    Device { device: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Upload(#[from] crate::upload::UploadError),

    #[error("cannot install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

pub struct Station<S: Read, SPI: SpiDevice, U> {
    sensors: SensorSuite<S, SPI>,
    uploader: U,
    store: BaselineStore,
    session: SessionId,
    config: StationConfig,
    baseline: Baseline,
    baseline_source: BaselineSource,
    state: StationState,
    summary: RunSummary,
}

impl<S: Read, SPI: SpiDevice, U: Uploader> Station<S, SPI, U> {
    pub fn new(
        sensors: SensorSuite<S, SPI>,
        uploader: U,
        store: BaselineStore,
        session: SessionId,
        config: StationConfig,
    ) -> Self {
        Self {
            sensors,
            uploader,
            store,
            session,
            config,
            baseline: Baseline::DEFAULT,
            baseline_source: BaselineSource::Default,
            state: StationState::Bootstrapping,
            summary: RunSummary::default(),
        }
    }

    pub fn sensors(&self) -> &SensorSuite<S, SPI> {
        &self.sensors
    }

    /// Drive the state machine until the stop signal, then release the
    /// sensors.
    pub async fn run(&mut self, stop: &StopSignal) -> RunSummary {
        log::info!("Session ID: {}", self.session);
        self.sensors.init().await;

        if self.bootstrap(stop).await {
            log::info!("... Gathering Air Quality Data ...");
            self.state = StationState::Cycling;
            loop {
                if stop.signaled() {
                    break;
                }
                self.cycle().await;
                if pause(self.config.cycle_interval, stop).await {
                    break;
                }
            }
        }

        self.shutdown();
        self.summary
    }

    /// Settle the baseline. `false` if stopped while calibrating.
    async fn bootstrap(&mut self, stop: &StopSignal) -> bool {
        let (baseline, source) = if self.config.calibrate {
            self.state = StationState::Calibrating;
            let calibrator = Calibrator::new(self.config.calibration, &self.store);
            match calibrator.run(self.sensors.gas_mut(), stop).await {
                CalibrationOutcome::Completed(baseline) => (baseline, BaselineSource::Calibrated),
                CalibrationOutcome::Failed => self.store.load_or_default(),
                CalibrationOutcome::Interrupted => return false,
            }
        } else {
            self.store.load_or_default()
        };

        self.baseline = baseline;
        self.baseline_source = source;
        self.sensors.set_baseline(baseline);
        self.state = StationState::Ready;
        true
    }

    /// Read, classify, report, upload.
    async fn cycle(&mut self) {
        let now = Utc::now().with_timezone(&self.config.timezone);
        let snapshot = self.sensors.read_snapshot(now).await;
        self.summary.cycles += 1;

        println!();
        for line in snapshot.summary() {
            println!("{line}");
        }

        if snapshot.has_particulates() {
            self.deliver(&snapshot);
        } else {
            self.summary.uploads_skipped += 1;
        }
    }

    fn deliver(&mut self, snapshot: &Snapshot) {
        let sent_at: DateTime<Tz> = Utc::now().with_timezone(&self.config.timezone);
        let payload = Payload::new(snapshot, &sent_at);
        match self.uploader.upload(&self.session, &payload) {
            Ok(()) => {
                self.summary.uploads_sent += 1;
                println!("Data sent to store successfully!");
            }
            Err(e) => {
                self.summary.uploads_failed += 1;
                log::error!("upload failed: {e}");
            }
        }
    }

    fn shutdown(&mut self) {
        self.sensors.release();
        self.state = StationState::Stopped;
    }
}

#[cfg(test)]
impl<S: Read, SPI: SpiDevice, U> Station<S, SPI, U> {
    pub fn state(&self) -> StationState {
        self.state
    }

    pub fn baseline(&self) -> (Baseline, BaselineSource) {
        (self.baseline, self.baseline_source)
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }
}
