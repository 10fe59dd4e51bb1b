// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use compliance::drivers::{Drivers, MsrDriver};
use compliance::engine::{Engine, RunRequest, Scope};
use compliance::hardware::{DevMsr, HostCpuid, NoTdcs};
use compliance::registry::Registry;

mod logger;

const EXIT_CODE_ERROR: i32 = 1;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Failed to initialize logging: {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("Invalid log level: {0}")]
    LogLevel(#[from] log::ParseLevelError),
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0} of {1} compliance cases failed")]
    CasesFailed(u32, u32),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Parser)]
#[command(version, about = "Checks the architectural state exposed to a TDX \
    guest against the specification tables.")]
struct Cli {
    /// Test selection: cpuid, cr, msr, all, list, or a single case name.
    #[arg(default_value = "all")]
    target: String,
    /// Specification revision to test against, e.g. "1.0", "1.5" or "2.0";
    /// anything else runs every case.
    #[arg(default_value = "generic")]
    spec_version: String,
    /// CPU whose msr device backs the MSR cases.
    #[arg(long, value_name = "N", default_value_t = 0)]
    cpu: u32,
    /// Emit the report as JSON instead of plain text.
    #[arg(long)]
    json: bool,
    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

fn run(cli: Cli) -> Result<()> {
    logger::init(cli.log_level.parse()?)?;
    log::info!(
        "driving compliance run on CPU {}",
        compliance::hardware::current_cpu()
    );

    let registry = Registry::new();
    let cpuid = HostCpuid;
    // Control registers are out of reach from user space; their registry is
    // skipped with a warning by the engine. Every TDCS negotiation through
    // NoTdcs reports unsupported, which the engine logs and proceeds past.
    let msr = match DevMsr::open(cli.cpu) {
        Ok(msr) => Some(msr),
        Err(err) => {
            log::warn!("{err}, MSR cases will not run");
            None
        }
    };
    let tdcs = NoTdcs;
    let drivers = Drivers {
        cpuid: &cpuid,
        cr: None,
        msr: msr.as_ref().map(|msr| msr as &dyn MsrDriver),
        tdcs: Some(&tdcs),
    };

    let request = RunRequest::new(Scope::parse(&cli.target), cli.spec_version);
    let engine = Engine::new(&registry, drivers);

    if cli.json && matches!(request.scope, Scope::ListOnly) {
        println!("{}", serde_json::to_string_pretty(&engine.list(&request))?);
        return Ok(());
    }
    let report = engine.run(&request);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.log);
    }

    if report.fail > 0 {
        return Err(Error::CasesFailed(report.fail, report.total));
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_CODE_ERROR);
    }
}
