// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contracts for the privileged access primitives the engine depends on.
//!
//! The engine never issues a privileged instruction itself. Each register
//! class is reached through one of the narrow traits below; an implementation
//! is expected to complete or fault synchronously, surfacing a trapped fault
//! as an exception code rather than an error.

use std::fmt;

use serde::Serialize;

/// Exception code captured from a privileged access; `0` means no fault.
pub type ExceptionCode = i32;

/// No fault occurred.
pub const EXCP_NONE: ExceptionCode = 0;
/// General protection fault (#GP).
pub const EXCP_GP: ExceptionCode = 13;
/// Virtualization exception (#VE).
pub const EXCP_VE: ExceptionCode = 20;

/// TDX global metadata field enumerating supported TD features.
pub const MD_FIELD_FEATURES0: u64 = 0x0A00_0003_0000_0008;
/// TDCS execution-control field (TD_CTL).
pub const TDCS_FIELD_TD_CTL: u64 = 0x9100_0000_0000_0017;
/// TDCS paravirtualization-control field (FEATURE_PV_CTL).
pub const TDCS_FIELD_FEATURE_PV_CTL: u64 = 0x9100_0000_0000_0018;
/// FEATURES0 bit advertising #VE reduction support.
pub const FEATURES0_VE_REDUCE: u64 = 1 << 30;
/// FEATURES0 bit advertising enumerable vCPU topology.
pub const FEATURES0_VCPU_TOPOLOGY: u64 = 1 << 42;
/// Write mask applied to TD_CTL when a case does not supply its own.
pub const DEFAULT_TD_CTL_MASK: u64 = 0x8000_0000_0000_000e;

/// Output registers of one CPUID invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CpuidRegs {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// CPUID output register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuidRegister {
    Eax,
    Ebx,
    Ecx,
    Edx,
}

impl fmt::Display for CpuidRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Eax => "eax",
            Self::Ebx => "ebx",
            Self::Ecx => "ecx",
            Self::Edx => "edx",
        };
        write!(f, "{name}")
    }
}

impl CpuidRegs {
    /// Value of the selected output register.
    pub fn reg(&self, register: CpuidRegister) -> u32 {
        match register {
            CpuidRegister::Eax => self.eax,
            CpuidRegister::Ebx => self.ebx,
            CpuidRegister::Ecx => self.ecx,
            CpuidRegister::Edx => self.edx,
        }
    }
}

/// Control register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlRegister {
    Cr0,
    Cr4,
}

impl fmt::Display for ControlRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cr0 => write!(f, "cr0"),
            Self::Cr4 => write!(f, "cr4"),
        }
    }
}

/// Executes the CPUID instruction for a `(leaf, subleaf)` selector.
///
/// Must not fail silently; any trap handling is the implementation's concern,
/// the engine only inspects the returned register values.
pub trait CpuidDriver {
    fn probe(&self, leaf: u32, subleaf: u32) -> CpuidRegs;
}

/// Reads and writes control registers, reporting write faults.
pub trait CrDriver {
    /// Current value of the register.
    fn get(&self, register: ControlRegister) -> u64;
    /// Attempts to set the masked bits, returning the captured fault code.
    fn set(&self, register: ControlRegister, mask: u64) -> ExceptionCode;
}

/// Reads and writes MSRs with synchronous fault detection.
pub trait MsrDriver {
    fn read(&self, addr: u32) -> (u64, ExceptionCode);
    fn write(&self, addr: u32, value: u64) -> ExceptionCode;
}

/// Error type for [`TdcsDriver`] operations.
#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum TdcsError {
    /// TDCALL failed with status {0:#x}
    Tdcall(u64),
    /// TDCS control fields are not reachable from this context
    Unsupported,
}

/// Accessor for TDCS control fields, used to alter reduced-exception
/// behavior before certain CPUID cases run.
pub trait TdcsDriver {
    fn read_field(&self, field: u64) -> Result<u64, TdcsError>;
    fn write_field(&self, field: u64, value: u64, mask: u64) -> Result<(), TdcsError>;
}

/// TDCS control-field values a CPUID case requires before probing.
///
/// Absence of an override on a case means "do not attempt the privileged
/// negotiation at all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlOverride {
    /// Value for TD_CTL; zero keeps the current value (mask still applied).
    pub td_ctl: u64,
    /// Value for FEATURE_PV_CTL; zero clears all paravirtualization controls.
    pub feature_pv_ctl: u64,
}

/// The full driver set an engine runs against.
///
/// CPUID access is mandatory; the other classes are skipped with a warning
/// when no driver for them is supplied.
pub struct Drivers<'a> {
    pub cpuid: &'a dyn CpuidDriver,
    pub cr: Option<&'a dyn CrDriver>,
    pub msr: Option<&'a dyn MsrDriver>,
    pub tdcs: Option<&'a dyn TdcsDriver>,
}

impl fmt::Debug for Drivers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drivers")
            .field("cr", &self.cr.is_some())
            .field("msr", &self.msr.is_some())
            .field("tdcs", &self.tdcs.is_some())
            .finish()
    }
}
