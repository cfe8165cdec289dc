//! camfx - interactive camera filter preview and recorder.
//!
//! Opens the configured camera, runs the selected filter over the live
//! stream with its parameters on live controls, and shows the original and
//! processed streams side by side. With an output path on the command
//! line, the processed stream is also recorded as motion-JPEG AVI.
//!
//! Filter and device selection come from the `CAMFX_CONFIG` file and
//! `CAMFX_*` environment overrides; the command line carries only the
//! optional output path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use camfx::{CamfxConfig, Session};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Output file path; presence enables recording of the processed stream.
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = CamfxConfig::load().context("load configuration")?;

    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = quit.clone();
        ctrlc::set_handler(move || {
            quit.store(true, Ordering::Relaxed);
        })
        .context("install interrupt handler")?;
    }

    let mut session = Session::new(&config, args.output.as_deref())?;
    session.set_quit_flag(quit);

    let stats = session
        .run()
        .context("session ended with an unrecoverable failure")?;

    log::info!(
        "done: {} frames processed, {} recorded",
        stats.frames_processed,
        stats.frames_recorded
    );
    Ok(())
}
