mod calibration;
mod classify;
mod config;
mod convert;
mod hal;
mod sensors;
mod session;
mod snapshot;
mod station;
mod upload;

use calibration::BaselineStore;
use chrono::Local;
use clap::Parser;
use config::Args;
use embassy_executor::Spawner;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use hal::{BlockingSpi, SerialLink};
use linux_embedded_hal::SpidevDevice;
use sensors::dht11::Dht11Sensor;
use sensors::manager::SensorSuite;
use sensors::mcp3008::Mcp3008;
use sensors::mq135::Mq135Sensor;
use sensors::sds011::Sds011Sensor;
use session::SessionId;
use station::{Station, StationError, StopSignal};
use upload::HttpUploader;

type AirStation = Station<SerialLink, BlockingSpi<SpidevDevice>, HttpUploader>;

static STOP: StopSignal = Signal::new();

fn build_station(args: &Args) -> anyhow::Result<AirStation> {
    let config = args.station_config()?;
    let channel = args.adc_channel()?;

    let serial = SerialLink::open(
        &args.serial_port,
        args.baud_rate,
        std::time::Duration::from_millis(args.serial_timeout_ms),
    )?;
    let spi = hal::open_spi(&args.spi_device, args.spi_speed_hz)?;

    let sensors = SensorSuite::new(
        Sds011Sensor::new(serial, Duration::from_millis(args.serial_timeout_ms)),
        Mq135Sensor::new(
            Mcp3008::new(spi),
            channel,
            args.gas_curve(),
            config.calibration.warm_up,
        ),
        Dht11Sensor::new(&args.dht_device),
    );

    let uploader = HttpUploader::new(
        &args.store_url,
        std::time::Duration::from_secs(args.upload_timeout_secs),
    )
    .map_err(StationError::from)?;

    Ok(Station::new(
        sensors,
        uploader,
        BaselineStore::new(&args.baseline_file),
        SessionId::starting_at(&Local::now()),
        config,
    ))
}

#[embassy_executor::task]
async fn acquisition(mut station: AirStation) {
    let summary = station.run(&STOP).await;
    log::info!(
        "{} cycles, {} uploads sent, {} failed, {} skipped",
        summary.cycles,
        summary.uploads_sent,
        summary.uploads_failed,
        summary.uploads_skipped
    );
    for stats in station.sensors().stats() {
        log::info!("{stats}");
    }
    drop(station);
    println!("Program stopped by user!");
    std::process::exit(0);
}

fn start(spawner: &Spawner) -> anyhow::Result<()> {
    let args = Args::parse();
    let station = build_station(&args)?;

    ctrlc::set_handler(|| STOP.signal(())).map_err(StationError::from)?;

    spawner
        .spawn(acquisition(station))
        .map_err(|e| anyhow::anyhow!("failed to spawn acquisition task: {e:?}"))?;
    Ok(())
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = start(&spawner) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
