//! Command-line tool for the two-axis UDP gimbal.
//!
//! Subcommands:
//! - `attitude`: Read and print the current yaw/pitch/roll
//! - `set`: Command an absolute yaw/pitch and report the acknowledgement
//! - `interactive`: Prompt for yaw/pitch repeatedly, showing before/after attitude

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hardware::gimbal::{
    Attitude, Gimbal, SetAnglesReport, DEFAULT_GIMBAL_IP, DEFAULT_PORT, PITCH_RANGE_DEG,
    YAW_RANGE_DEG,
};
use tracing::info;

/// Two-axis gimbal control tool
#[derive(Parser, Debug)]
#[command(name = "gimbal_tool")]
#[command(about = "Read attitude and command angles on a UDP gimbal")]
#[command(version)]
struct Args {
    /// Gimbal IP address
    #[arg(long, global = true, default_value = DEFAULT_GIMBAL_IP)]
    ip: String,

    /// Gimbal UDP port
    #[arg(long, global = true, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Acknowledgement timeout per attempt in milliseconds
    #[arg(long, global = true, default_value = "350")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the current attitude
    Attitude,

    /// Command an absolute yaw/pitch (out of range values are clamped)
    Set {
        /// Yaw in degrees
        #[arg(long, allow_hyphen_values = true)]
        yaw: f64,

        /// Pitch in degrees
        #[arg(long, allow_hyphen_values = true)]
        pitch: f64,

        /// Send attempts before giving up on the ack
        #[arg(long, default_value = "3")]
        attempts: usize,
    },

    /// Prompt for yaw then pitch in a loop ("q" quits)
    Interactive,
}

fn fmt_attitude(att: Option<Attitude>) -> String {
    match att {
        Some(a) => format!(
            "yaw={:+.1} pitch={:+.1} roll={:+.1}",
            a.yaw_deg, a.pitch_deg, a.roll_deg
        ),
        None => "(not read)".to_string(),
    }
}

fn print_report(report: &SetAnglesReport) {
    println!(
        "Target (clamped): yaw={:+.1} pitch={:+.1}",
        report.sent.yaw_deg(),
        report.sent.pitch_deg()
    );
    match report.confirmed {
        Some(_) => println!("Ack:     {}", fmt_attitude(report.confirmed)),
        None => println!("[WARN] no ack for the angle command"),
    }
}

fn cmd_attitude(gimbal: &mut Gimbal) -> Result<()> {
    let att = gimbal.read_attitude().context("attitude request failed")?;
    println!("Attitude: {}", fmt_attitude(att));
    Ok(())
}

fn cmd_set(gimbal: &mut Gimbal, yaw: f64, pitch: f64, attempts: usize) -> Result<()> {
    let report = gimbal
        .set_angles_with_retry(yaw, pitch, attempts)
        .context("angle command failed")?;
    print_report(&report);
    Ok(())
}

/// Prompt for one number. `Ok(None)` on "q" or end of input.
fn ask_f64(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    prompt: &str,
) -> Result<Option<f64>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let Some(line) = lines.next() else {
        return Ok(None);
    };
    let line = line?;
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    Ok(Some(line.parse::<f64>()?))
}

fn cmd_interactive(gimbal: &mut Gimbal) -> Result<()> {
    println!("Gimbal yaw/pitch control (q to quit)");
    println!(
        "Range: yaw [{}, {}] pitch [{}, {}]\n",
        YAW_RANGE_DEG.0, YAW_RANGE_DEG.1, PITCH_RANGE_DEG.0, PITCH_RANGE_DEG.1
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        let yaw = match ask_f64(&mut lines, "Yaw (deg): ") {
            Ok(Some(v)) => v,
            Ok(None) => break,
            Err(_) => {
                println!("[ERR] enter a valid number\n");
                continue;
            }
        };
        let pitch = match ask_f64(&mut lines, "Pitch (deg): ") {
            Ok(Some(v)) => v,
            Ok(None) => break,
            Err(_) => {
                println!("[ERR] enter a valid number\n");
                continue;
            }
        };

        let before = gimbal.read_attitude()?;
        let report = gimbal.set_angles(yaw, pitch)?;
        let after = gimbal.read_attitude()?;

        print_report(&report);
        println!("Before:  {}", fmt_attitude(before));
        println!("After:   {}", fmt_attitude(after));
        if let (Some(b), Some(a)) = (before, after) {
            println!(
                "Delta:   dy={:+.2} dp={:+.2}",
                a.yaw_deg - b.yaw_deg,
                a.pitch_deg - b.pitch_deg
            );
        }
        println!();
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    info!("Connecting to gimbal at {}:{}", args.ip, args.port);
    let mut gimbal = Gimbal::connect((args.ip.as_str(), args.port))
        .with_context(|| format!("failed to open socket to {}:{}", args.ip, args.port))?;
    gimbal.set_timeout(Duration::from_millis(args.timeout_ms));

    match args.command {
        Command::Attitude => cmd_attitude(&mut gimbal),
        Command::Set {
            yaw,
            pitch,
            attempts,
        } => cmd_set(&mut gimbal, yaw, pitch, attempts),
        Command::Interactive => cmd_interactive(&mut gimbal),
    }
}
