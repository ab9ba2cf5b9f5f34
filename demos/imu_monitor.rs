// IMU monitor: READ-ONLY live view of the UART-RVC stream
//
// Polls the frame decoder at ~100Hz and redraws the latest record in place.
// Press Q (or Esc) to quit; link statistics are printed on exit.
//
// Usage: cargo run --example imu_monitor -- [port] [baudrate]
// Example: cargo run --example imu_monitor -- /dev/ttyUSB0 115200

use crossterm::{
    cursor::MoveTo,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{Clear, ClearType, disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Write};
use std::time::Duration;

use vehicle_daq::config::{IMU_BAUDRATE, IMU_PORT};
use vehicle_daq::imu::{DecodeOutcome, RvcDecoder, SerialStream};
use vehicle_daq::messages::MotionRecord;

const POLL_INTERVAL_MS: u64 = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("warn".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args.next().unwrap_or_else(|| IMU_PORT.to_string());
    let baudrate = match args.next() {
        Some(raw) => raw.parse()?,
        None => IMU_BAUDRATE,
    };

    println!("Opening {} at {} baud...", port, baudrate);
    let mut stream = match SerialStream::open_with_baudrate(&port, baudrate) {
        Ok(stream) => stream,
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check the port path is correct");
            println!("  - Verify the IMU is in UART-RVC mode (PS0 high)");
            return Err(e.into());
        }
    };

    enable_raw_mode()?;
    let result = monitor(&mut stream);
    disable_raw_mode()?;

    let stats = result?;
    println!();
    println!(
        "Frames: {}  Corrupt: {}  Skipped bytes: {}  Dropped bytes: {}",
        stats.frames,
        stats.corrupt,
        stats.skipped,
        stream.dropped()
    );
    Ok(())
}

fn monitor(stream: &mut SerialStream) -> io::Result<vehicle_daq::imu::DecoderStats> {
    let mut decoder = RvcDecoder::new();
    let mut stdout = io::stdout();

    loop {
        if event::poll(Duration::from_millis(POLL_INTERVAL_MS))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind == KeyEventKind::Press
                    && matches!(code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    break;
                }
            }
        }

        if let DecodeOutcome::Record(record) = decoder.poll(stream) {
            execute!(stdout, MoveTo(0, 0), Clear(ClearType::All))?;
            draw(&mut stdout, &record, decoder.stats().frames)?;
        }
    }

    Ok(decoder.stats())
}

// Raw mode needs explicit carriage returns
fn draw(out: &mut impl Write, record: &MotionRecord, frames: u64) -> io::Result<()> {
    write!(out, "IMU monitor (q to quit)   frame #{}\r\n\r\n", frames)?;
    write!(out, "  Yaw:   {:>8.2}°\r\n", record.yaw)?;
    write!(out, "  Pitch: {:>8.2}°\r\n", record.pitch)?;
    write!(out, "  Roll:  {:>8.2}°\r\n\r\n", record.roll)?;
    write!(out, "  X:     {:>8.3} m/s²\r\n", record.x_accel)?;
    write!(out, "  Y:     {:>8.3} m/s²\r\n", record.y_accel)?;
    write!(out, "  Z:     {:>8.3} m/s²\r\n", record.z_accel)?;
    out.flush()
}
