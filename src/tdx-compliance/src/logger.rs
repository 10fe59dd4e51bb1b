// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::thread;

use log::{Log, Metadata, Record};

static LOGGER: StderrLogger = StderrLogger;

/// Line-oriented logger writing to stderr, keeping the report on stdout
/// clean for machine consumption.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let thread = thread::current();
        eprintln!(
            "[{}:{}] {}",
            thread.name().unwrap_or("-"),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

pub fn init(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
