// Polling loop with IMU watchdog
// Each tick reads the whole device tree once and prints the snapshot as a JSON line.
// The watchdog flags the IMU as stale when no frame was decoded for IMU_TIMEOUT.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::{
    BoardConfig, IMU_TIMEOUT, TAG_IMU, TAG_MAIN, TAG_ODOMETER, TAG_POWER, TAG_WSC,
};
use crate::device::{Controller, Sensor};
use crate::error::Result;
use crate::hal::{IdleLines, MonotonicClock};
use crate::imu::{Accelerometer, ByteStream, SerialStream};
use crate::messages::{CycleReport, Reading, RuntimeHealth};
use crate::sensors::{Odometer, Pedal, WheelSpeedSensor};

pub struct Runtime {
    root: Controller,
    last_frame: Rc<Cell<Option<Instant>>>,
    imu_attached: bool,
    health: RuntimeHealth,
    started_at: Instant,
    cycle: u64,
    period: Duration,
    wheel_circumference_m: f32,
    odometer_source: Option<String>,
}

impl Runtime {
    /// Assemble the device tree described by `config`.
    ///
    /// Pulse and analog lines come from `IdleLines`; the IMU reads from
    /// `imu_stream` when one is given.
    pub fn build(config: &BoardConfig, imu_stream: Option<Box<dyn ByteStream>>) -> Result<Self> {
        let mut root = Controller::new();
        root.set_tag(TAG_MAIN);

        let mut wsc = Controller::new();
        for ws in &config.wheel_speed {
            let sensor = WheelSpeedSensor::new(
                vec![ws.pin],
                Box::new(IdleLines::default()),
                Box::new(MonotonicClock::new()),
            )?
            .with_debounce(ws.debounce)
            .with_stall_timeout(ws.stall_timeout_ms);
            wsc.attach(&ws.tag, Box::new(sensor))?;
        }
        root.attach(TAG_WSC, Box::new(wsc))?;

        let mut power = Controller::new();
        for pedal in &config.pedals {
            let sensor = Pedal::new(
                vec![pedal.pin],
                Box::new(IdleLines::default()),
                pedal.rest_value,
                pedal.max_value,
            )?;
            power.attach(&pedal.tag, Box::new(sensor))?;
        }
        root.attach(TAG_POWER, Box::new(power))?;

        let last_frame = Rc::new(Cell::new(None));
        let imu_attached = imu_stream.is_some();
        if let Some(stream) = imu_stream {
            let seen = last_frame.clone();
            let imu = Accelerometer::new(stream).on_update(move |_| seen.set(Some(Instant::now())));
            root.attach(TAG_IMU, Box::new(imu))?;
        }

        root.attach(TAG_ODOMETER, Box::new(Odometer::new()))?;

        Ok(Self {
            root,
            last_frame,
            imu_attached,
            health: if imu_attached {
                RuntimeHealth::ImuStale // Stale until the first frame
            } else {
                RuntimeHealth::ImuDisabled
            },
            started_at: Instant::now(),
            cycle: 0,
            period: config.loop_period(),
            wheel_circumference_m: config.wheel_circumference_m,
            odometer_source: config.wheel_speed.first().map(|ws| ws.tag.clone()),
        })
    }

    pub fn root(&self) -> &Controller {
        &self.root
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Initialize the whole tree; its shape is frozen from here on
    pub fn initialize(&mut self) -> Result<()> {
        self.root.initialize(&[])?;
        self.started_at = Instant::now();
        info!(
            "Device tree ready: {} top-level devices",
            self.root.len()
        );
        Ok(())
    }

    /// Update IMU health from the time of the last decoded frame
    fn update_health(&mut self) {
        if !self.imu_attached {
            return;
        }
        let since = self.last_frame.get().unwrap_or(self.started_at);
        if since.elapsed() > IMU_TIMEOUT {
            if self.health != RuntimeHealth::ImuStale {
                warn!("IMU stale ({:?} since last frame)", since.elapsed());
            }
            self.health = RuntimeHealth::ImuStale;
        } else if self.last_frame.get().is_some() {
            self.health = RuntimeHealth::Ok;
        }
    }

    /// Feed the odometer with the distance the source wheel covered this cycle
    fn update_odometer(&mut self, readings: &Reading) -> Result<f32> {
        let rpm = self
            .odometer_source
            .as_deref()
            .and_then(|tag| readings.at(&[TAG_WSC, tag]))
            .and_then(Reading::as_scalar)
            .unwrap_or(0.0);
        let distance = rpm / 60.0 * self.wheel_circumference_m * self.period.as_secs_f32();

        let mut odometer = self.root.lookup_mut(TAG_ODOMETER)?;
        odometer.write(Reading::Scalar(distance))?;
        Ok(odometer.read()?.as_scalar().unwrap_or(0.0))
    }

    /// One polling cycle
    pub fn step(&mut self) -> Result<CycleReport> {
        let readings = self.root.read()?;
        let mileage = self.update_odometer(&readings)?;
        self.update_health();
        self.cycle += 1;

        Ok(CycleReport {
            cycle: self.cycle,
            health: self.health,
            mileage,
            readings,
        })
    }

    pub fn close(&mut self) -> Result<()> {
        info!("Closing device tree after {} cycles", self.cycle);
        self.root.close()
    }

    /// Tick until `shutdown` resolves or a cycle fails, printing one report
    /// per cycle. The tree is closed on every exit path.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut tick = interval(self.period);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                _ = tick.tick() => match self.step() {
                    Ok(report) => match serde_json::to_string(&report) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("Failed to encode cycle {}: {}", report.cycle, e),
                    },
                    Err(e) => {
                        error!("Cycle {} failed: {}", self.cycle + 1, e);
                        break Err(e);
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
            }
        };

        let closed = self.close();
        outcome.and(closed)
    }
}

pub async fn run(
    config: BoardConfig,
    simulate: bool,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.validate()?;

    let imu_stream: Option<Box<dyn ByteStream>> = if simulate || !config.imu.enabled {
        info!("IMU disabled (simulate={})", simulate);
        None
    } else {
        let stream = SerialStream::open_with_baudrate(&config.imu.port, config.imu.baud_rate)?;
        Some(Box::new(stream))
    };

    let mut runtime = Runtime::build(&config, imu_stream)?;
    runtime.initialize()?;

    info!(
        "Runtime started: {}Hz loop, {}ms IMU timeout",
        config.loop_hz,
        IMU_TIMEOUT.as_millis()
    );

    runtime
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceState;
    use crate::error::DeviceError;
    use crate::imu::rvc::encode_frame;
    use std::collections::VecDeque;

    #[test]
    fn test_build_default_tree() {
        let runtime = Runtime::build(&BoardConfig::default(), None).unwrap();
        let root = runtime.root();
        assert_eq!(root.tag(), "main");
        assert!(root.find(&["wsc", "front"]).is_ok());
        assert!(root.find(&["power", "brake"]).is_ok());
        assert!(root.lookup("imu").is_err());
        assert_eq!(root.find(&["wsc", "rear"]).unwrap().level(), 2);
        assert_eq!(runtime.health(), RuntimeHealth::ImuDisabled);
    }

    #[test]
    fn test_step_reads_whole_tree() {
        let stream: VecDeque<u8> = encode_frame([500, -200, 0, 100, 0, -50]).into_iter().collect();
        let mut runtime = Runtime::build(&BoardConfig::default(), Some(Box::new(stream))).unwrap();
        runtime.initialize().unwrap();

        let report = runtime.step().unwrap();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.health, RuntimeHealth::Ok);
        assert_eq!(report.mileage, 0.0);

        let yaw = report.readings.get("imu").and_then(Reading::as_motion).unwrap().yaw;
        assert!((yaw - 5.0).abs() < 1e-5);
        assert_eq!(
            report.readings.at(&["wsc", "front"]).and_then(Reading::as_scalar),
            Some(0.0)
        );

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"health\":\"ok\""));
        assert!(json.contains("\"wsc\":{\"front\":0.0,\"rear\":0.0}"));

        runtime.close().unwrap();
    }

    #[test]
    fn test_conflicting_pins_rejected_at_build() {
        let mut config = BoardConfig::default();
        config.pedals[0].pin = config.wheel_speed[0].pin;
        assert!(Runtime::build(&config, None).is_err());
    }

    #[tokio::test]
    async fn test_failed_cycle_still_closes_tree() {
        let mut runtime = Runtime::build(&BoardConfig::default(), None).unwrap();
        // A tree without the odometer makes every cycle fail
        runtime.root = Controller::new();
        runtime.root.set_tag(TAG_MAIN);
        runtime.initialize().unwrap();

        let result = runtime.run_until(std::future::pending()).await;
        assert!(matches!(result, Err(DeviceError::NotFound(ref tag)) if tag == TAG_ODOMETER));
        assert_eq!(runtime.root().state(), DeviceState::Closed);
    }

    #[tokio::test]
    async fn test_run_rejects_out_of_range_loop_rate() {
        let mut config = BoardConfig::default();
        config.loop_hz = 5000;
        let err = run(config, true).await.unwrap_err();
        assert!(err.to_string().contains("loop_hz"));
    }
}
