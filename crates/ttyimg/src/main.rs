#![forbid(unsafe_code)]

//! ttyimg: show an image in the terminal, sized to the real screen.

mod app;
mod cli;
mod logging;

use std::io::{self, BufWriter};
use std::process::ExitCode;

use clap::Parser;
use ttyimg_core::TtyPort;

use crate::app::{OUTPUT_BUFFER, Session};
use crate::cli::{Config, Opts};

fn main() -> ExitCode {
    let opts = Opts::parse();
    match run(&opts) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("ttyimg: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &Opts) -> anyhow::Result<ExitCode> {
    logging::init(opts.log_file.as_deref())?;

    // User input is checked before the terminal is touched.
    let config = Config::from_opts(opts)?;

    let port = TtyPort::new();
    let mut session = Session::new(&port);

    if let Some(expected) = &opts.validate {
        let matches = app::validate(
            &mut session,
            &config,
            expected,
            &mut io::stdout().lock(),
            &mut io::stderr().lock(),
        )?;
        return Ok(if matches {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let Some(path) = config.path.as_deref() else {
        anyhow::bail!("no image path given");
    };
    let mut out = BufWriter::with_capacity(OUTPUT_BUFFER, io::stdout().lock());
    app::show(&mut session, &config, path, &mut out)?;
    Ok(ExitCode::SUCCESS)
}
