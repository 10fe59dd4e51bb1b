// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Driver implementations backed by the host processor.
//!
//! CPUID is executed directly; MSRs go through the kernel's per-CPU `msr`
//! device, which turns a faulting access into an `EIO` error. Control
//! registers and TDCS fields are not reachable from user space: runs without
//! a CR driver evaluate the CPUID and MSR registries only, and [`NoTdcs`]
//! stands in at the TDCS boundary.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use log::warn;

use crate::drivers::{
    CpuidDriver, CpuidRegs, ExceptionCode, MsrDriver, TdcsDriver, TdcsError, EXCP_GP, EXCP_NONE,
};

/// Errors constructing a hardware driver.
#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum HardwareError {
    /// Failed to open {0:?}: {1}
    OpenMsrDevice(PathBuf, std::io::Error),
}

/// Logical CPU the calling thread currently runs on.
///
/// CPUID output for topology leaves depends on this, so it is worth a log
/// line at the start of a run.
pub fn current_cpu() -> i32 {
    // SAFETY: sched_getcpu takes no arguments and has no preconditions.
    unsafe { libc::sched_getcpu() }
}

/// CPUID driver that executes the instruction on the current logical CPU.
///
/// Output of topology-dependent leaves varies with the CPU the thread is
/// scheduled on; callers that care must pin the thread beforehand.
#[derive(Debug, Default)]
pub struct HostCpuid;

impl CpuidDriver for HostCpuid {
    fn probe(&self, leaf: u32, subleaf: u32) -> CpuidRegs {
        // SAFETY: the CPUID instruction is unconditionally available on
        // x86_64 and has no side effects beyond its output registers.
        let result = unsafe { std::arch::x86_64::__cpuid_count(leaf, subleaf) };
        CpuidRegs {
            eax: result.eax,
            ebx: result.ebx,
            ecx: result.ecx,
            edx: result.edx,
        }
    }
}

/// MSR driver over `/dev/cpu/<n>/msr`.
///
/// The kernel executes the access on the target CPU and reports a faulted
/// RDMSR/WRMSR as `EIO`, which is mapped to #GP; finer-grained fault codes
/// are not observable through this interface.
#[derive(Debug)]
pub struct DevMsr {
    file: File,
}

impl DevMsr {
    pub fn open(cpu: u32) -> Result<Self, HardwareError> {
        let path = PathBuf::from(format!("/dev/cpu/{cpu}/msr"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .or_else(|err| match err.kind() {
                ErrorKind::PermissionDenied => OpenOptions::new().read(true).open(&path),
                _ => Err(err),
            })
            .map_err(|err| HardwareError::OpenMsrDevice(path, err))?;
        Ok(Self { file })
    }
}

impl MsrDriver for DevMsr {
    fn read(&self, addr: u32) -> (u64, ExceptionCode) {
        let mut buf = [0u8; 8];
        match self.file.read_exact_at(&mut buf, u64::from(addr)) {
            Ok(()) => (u64::from_le_bytes(buf), EXCP_NONE),
            Err(err) => (0, fault_code(addr, &err)),
        }
    }

    fn write(&self, addr: u32, value: u64) -> ExceptionCode {
        match self.file.write_all_at(&value.to_le_bytes(), u64::from(addr)) {
            Ok(()) => EXCP_NONE,
            Err(err) => fault_code(addr, &err),
        }
    }
}

// The msr device contract: a faulted RDMSR/WRMSR surfaces as EIO.
fn fault_code(addr: u32, err: &std::io::Error) -> ExceptionCode {
    if err.raw_os_error() != Some(libc::EIO) {
        warn!("unexpected msr device error for {addr:#x}: {err}");
    }
    EXCP_GP
}

/// Placeholder TDCS driver for environments without a TDCALL path.
#[derive(Debug, Default)]
pub struct NoTdcs;

impl TdcsDriver for NoTdcs {
    fn read_field(&self, _field: u64) -> Result<u64, TdcsError> {
        Err(TdcsError::Unsupported)
    }

    fn write_field(&self, _field: u64, _value: u64, _mask: u64) -> Result<(), TdcsError> {
        Err(TdcsError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_cpuid_vendor_leaf() {
        // Leaf 0 is architecturally defined on every x86_64 part: EAX holds
        // the max leaf and the vendor string is never all-zero.
        let regs = HostCpuid.probe(0x0, 0x0);
        assert!(regs.eax > 0);
        assert_ne!((regs.ebx, regs.ecx, regs.edx), (0, 0, 0));
    }

    #[test]
    fn test_no_tdcs_is_unsupported() {
        assert!(matches!(
            NoTdcs.read_field(0),
            Err(TdcsError::Unsupported)
        ));
        assert!(matches!(
            NoTdcs.write_field(0, 0, 0),
            Err(TdcsError::Unsupported)
        ));
    }
}
