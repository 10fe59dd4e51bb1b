// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Canned driver implementations for tests.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::drivers::{
    ControlRegister, CpuidDriver, CpuidRegs, CrDriver, ExceptionCode, MsrDriver, TdcsDriver,
    TdcsError, EXCP_NONE,
};

/// CPUID driver backed by a fixed leaf table; unknown selectors read as the
/// default (all-zero) register set.
#[derive(Debug, Default)]
pub struct StaticCpuid {
    pub leaves: HashMap<(u32, u32), CpuidRegs>,
    pub default: CpuidRegs,
}

impl StaticCpuid {
    pub fn set(&mut self, leaf: u32, subleaf: u32, regs: CpuidRegs) {
        self.leaves.insert((leaf, subleaf), regs);
    }
}

impl CpuidDriver for StaticCpuid {
    fn probe(&self, leaf: u32, subleaf: u32) -> CpuidRegs {
        self.leaves
            .get(&(leaf, subleaf))
            .copied()
            .unwrap_or(self.default)
    }
}

/// Control-register driver with scripted values and write fault codes.
#[derive(Debug, Default)]
pub struct StaticCr {
    pub values: HashMap<ControlRegister, u64>,
    pub set_excp: HashMap<ControlRegister, ExceptionCode>,
}

impl CrDriver for StaticCr {
    fn get(&self, register: ControlRegister) -> u64 {
        self.values.get(&register).copied().unwrap_or(0)
    }

    fn set(&self, register: ControlRegister, _mask: u64) -> ExceptionCode {
        self.set_excp.get(&register).copied().unwrap_or(EXCP_NONE)
    }
}

/// MSR driver backed by a `(value, exception)` table; unscripted addresses
/// read as zero with `default_excp`, and writes report the same codes.
#[derive(Debug, Default)]
pub struct StaticMsr {
    pub regs: HashMap<u32, (u64, ExceptionCode)>,
    pub default_excp: ExceptionCode,
}

impl MsrDriver for StaticMsr {
    fn read(&self, addr: u32) -> (u64, ExceptionCode) {
        self.regs
            .get(&addr)
            .copied()
            .unwrap_or((0, self.default_excp))
    }

    fn write(&self, addr: u32, _value: u64) -> ExceptionCode {
        self.regs
            .get(&addr)
            .map(|(_, excp)| *excp)
            .unwrap_or(self.default_excp)
    }
}

/// TDCS driver that records every control-field write.
#[derive(Debug, Default)]
pub struct RecordingTdcs {
    /// Value served for the FEATURES0 metadata field.
    pub features0: u64,
    /// `(field, value, mask)` of each accepted write, in order.
    pub writes: RefCell<Vec<(u64, u64, u64)>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl RecordingTdcs {
    pub fn new(features0: u64) -> Self {
        Self {
            features0,
            ..Self::default()
        }
    }
}

impl TdcsDriver for RecordingTdcs {
    fn read_field(&self, _field: u64) -> Result<u64, TdcsError> {
        if self.fail_reads {
            return Err(TdcsError::Tdcall(0x8000_0000_0000_0000));
        }
        Ok(self.features0)
    }

    fn write_field(&self, field: u64, value: u64, mask: u64) -> Result<(), TdcsError> {
        if self.fail_writes {
            return Err(TdcsError::Tdcall(0x8000_0000_0000_0000));
        }
        self.writes.borrow_mut().push((field, value, mask));
        Ok(())
    }
}
