//! `weigh`: take one averaged weight reading from an hx711 and store it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use linux_embedded_hal::Delay;
use log::{error, info};

use gpio_loadcell::gpio::{acquire_hx711_lines, GpioController};
use gpio_loadcell::hx711::HX711;
use gpio_loadcell::session::Session;
use gpio_loadcell::{output, sched};

#[derive(Parser, Debug)]
#[command(about = "Read an averaged weight from an HX711 load cell")]
struct Args {
    /// GPIO controller name or device path
    #[arg(long, default_value = "gpiochip0")]
    chip: String,

    /// Clock (PD_SCK) line offset
    #[arg(long, default_value_t = 17)]
    sck_pin: u32,

    /// Data (DOUT) line offset
    #[arg(long, default_value_t = 18)]
    dt_pin: u32,

    /// CPU core the reading thread is pinned to
    #[arg(long, default_value_t = 2)]
    cpu: usize,

    /// Skip CPU pinning
    #[arg(long)]
    no_pin: bool,

    /// ADC counts per gram
    #[arg(long, default_value_t = 106.5)]
    scale: f32,

    /// Number of samples averaged after the tare read
    #[arg(long, default_value_t = 10)]
    samples: usize,

    /// Pause between samples in milliseconds
    #[arg(long, default_value_t = 100)]
    delay_ms: u32,

    /// Give up if the hx711 is not ready within this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// File overwritten with the result
    #[arg(long, default_value = "weight_data.txt")]
    output: PathBuf,
}

fn run(args: &Args) -> anyhow::Result<f32> {
    if !args.no_pin {
        sched::pin_to_cpu(args.cpu)?;
    }

    let mut controller = GpioController::open(&args.chip)?;
    let (sck, dt) = acquire_hx711_lines(&mut controller, args.sck_pin, args.dt_pin)?;
    let mut hx711 = HX711::new(sck, dt, Delay)?;
    hx711.set_ready_timeout(args.timeout_ms.map(Duration::from_millis));

    let session = Session {
        sample_count: args.samples,
        scale_factor: args.scale,
        inter_sample_delay_ms: args.delay_ms,
    };
    let grams = session.run(&mut hx711, &mut Delay);

    let (mut sck, mut dt, _) = hx711.release();
    sck.release();
    dt.release();
    controller.close();

    Ok(grams?)
}

fn weigh(args: &Args) -> anyhow::Result<()> {
    let grams = run(args)?;

    println!("Average weight: {grams:.2} grams");
    output::write_weight(&args.output, grams)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    info!("weight saved to {}", args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match weigh(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
