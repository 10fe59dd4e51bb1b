// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Case types and the per-class registries.
//!
//! All cases are constructed once from the declarative tables in
//! [`crate::cases`] and are immutable afterwards; per-run scratch state lives
//! in the run context, never in the case. Insertion order is preserved and
//! defines report order.

use serde::Serialize;

use crate::bitfield::BitField;
use crate::drivers::{ControlOverride, ControlRegister, CpuidRegister, ExceptionCode, EXCP_GP};
use crate::version::SpecVersion;

/// Gate evaluated against live CPUID state before a privileged step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// Holds when the selected CPUID feature bit reads as set.
    CpuidBitSet {
        leaf: u32,
        subleaf: u32,
        register: CpuidRegister,
        bit: u32,
    },
}

/// Expectations over the four output registers of one CPUID leaf/subleaf.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuidExpectation {
    pub eax: BitField<u32>,
    pub ebx: BitField<u32>,
    pub ecx: BitField<u32>,
    pub edx: BitField<u32>,
}

impl CpuidExpectation {
    /// Whether every register mask is zero, the "declared but not checked"
    /// sentinel.
    pub fn is_empty(&self) -> bool {
        self.eax.is_dont_care()
            && self.ebx.is_dont_care()
            && self.ecx.is_dont_care()
            && self.edx.is_dont_care()
    }
}

/// One CPUID conformance case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuidCase {
    pub name: String,
    pub leaf: u32,
    pub subleaf: u32,
    pub version: SpecVersion,
    pub expect: CpuidExpectation,
    /// TDCS control values to negotiate before probing, if any.
    pub control: Option<ControlOverride>,
}

impl CpuidCase {
    /// Expects a single bit of one output register to read as `value`.
    pub fn bit(
        leaf: u32,
        subleaf: u32,
        register: CpuidRegister,
        bit: u32,
        value: u32,
        version: SpecVersion,
    ) -> Self {
        let mut case = Self::declared(leaf, subleaf, version);
        case.name = format!("CPUID({leaf:#x},{subleaf:#x}).{register}[{bit}]");
        *case.field_mut(register) = BitField::new(1 << bit, value << bit);
        case
    }

    /// Expects the whole output register to read as `value`.
    pub fn byte(
        leaf: u32,
        subleaf: u32,
        register: CpuidRegister,
        value: u32,
        version: SpecVersion,
    ) -> Self {
        let mut case = Self::declared(leaf, subleaf, version);
        case.name = format!("CPUID({leaf:#x},{subleaf:#x}).{register}");
        *case.field_mut(register) = BitField::new(u32::MAX, value);
        case
    }

    /// Expects the inclusive bit range `[first, last]` to read as zero.
    pub fn reserved(
        leaf: u32,
        subleaf: u32,
        register: CpuidRegister,
        first: u32,
        last: u32,
        version: SpecVersion,
    ) -> Self {
        let mut mask = 0u32;
        for i in first..=last {
            mask |= 1 << i;
        }
        let mut case = Self::declared(leaf, subleaf, version);
        case.name = format!("CPUID({leaf:#x},{subleaf:#x}).{register}[{last}:{first}]");
        *case.field_mut(register) = BitField::new(mask, 0);
        case
    }

    /// A case with no expectations; always classified NotRun.
    ///
    /// Used for topology-dependent leaves that need a matching vCPU
    /// configuration before their expected values can be filled in.
    pub fn declared(leaf: u32, subleaf: u32, version: SpecVersion) -> Self {
        Self {
            name: format!("CPUID({leaf:#x},{subleaf:#x})"),
            leaf,
            subleaf,
            version,
            expect: CpuidExpectation::default(),
            control: None,
        }
    }

    /// Attaches a TDCS control override to negotiate before probing.
    pub fn with_control(mut self, td_ctl: u64, feature_pv_ctl: u64) -> Self {
        self.control = Some(ControlOverride {
            td_ctl,
            feature_pv_ctl,
        });
        self
    }

    fn field_mut(&mut self, register: CpuidRegister) -> &mut BitField<u32> {
        match register {
            CpuidRegister::Eax => &mut self.expect.eax,
            CpuidRegister::Ebx => &mut self.expect.ebx,
            CpuidRegister::Ecx => &mut self.expect.ecx,
            CpuidRegister::Edx => &mut self.expect.edx,
        }
    }
}

/// One control-register conformance case.
///
/// The register expectation declares a single bit value broadcast across the
/// whole mask: pass requires `(observed & mask) == mask * expect_bit` in
/// addition to exact exception-code equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrCase {
    pub name: &'static str,
    pub version: SpecVersion,
    pub register: ControlRegister,
    /// Read the current register value before checking.
    pub read: bool,
    /// Attempt to write `mask` and capture the resulting fault.
    pub write: bool,
    pub mask: u64,
    /// Expected value of every masked bit, 0 or 1.
    pub expect_bit: u64,
    pub expect_excp: ExceptionCode,
    /// Gate checked before a write; declined means SKIP.
    pub precondition: Option<Precondition>,
}

impl CrCase {
    /// Read-only case: masked bits must read as `expect_bit`.
    pub fn get(
        name: &'static str,
        register: ControlRegister,
        mask: u64,
        expect_bit: u64,
        version: SpecVersion,
    ) -> Self {
        Self {
            name,
            version,
            register,
            read: true,
            write: false,
            mask,
            expect_bit,
            expect_excp: 0,
            precondition: None,
        }
    }

    /// Write-probe case: setting the masked bits must fault with
    /// `expect_excp`.
    pub fn set(
        name: &'static str,
        register: ControlRegister,
        mask: u64,
        expect_excp: ExceptionCode,
        version: SpecVersion,
    ) -> Self {
        Self {
            name,
            version,
            register,
            read: false,
            write: true,
            mask,
            expect_bit: 0,
            expect_excp,
            precondition: None,
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }
}

/// Access direction of an MSR case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MsrOp {
    Read,
    Write,
}

/// One MSR conformance case.
///
/// MSR cases validate accessibility and fault behavior, not content: the
/// verdict compares only the captured exception code against the declared
/// one. A `size > 1` declares a range of consecutive addresses that must all
/// fault identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MsrCase {
    pub name: &'static str,
    pub version: SpecVersion,
    pub msr: u32,
    /// Number of consecutive addresses expected to behave identically.
    pub size: u32,
    /// Value written for write cases.
    pub value: u64,
    pub op: MsrOp,
    pub expect_excp: ExceptionCode,
    /// Gate deciding which exception code applies.
    pub precondition: Option<Precondition>,
    /// Expected code when the precondition does not hold.
    pub expect_excp_otherwise: ExceptionCode,
}

impl MsrCase {
    pub fn read(
        name: &'static str,
        msr: u32,
        expect_excp: ExceptionCode,
        version: SpecVersion,
    ) -> Self {
        Self {
            name,
            version,
            msr,
            size: 1,
            value: 0,
            op: MsrOp::Read,
            expect_excp,
            precondition: None,
            expect_excp_otherwise: EXCP_GP,
        }
    }

    pub fn write(
        name: &'static str,
        msr: u32,
        value: u64,
        expect_excp: ExceptionCode,
        version: SpecVersion,
    ) -> Self {
        Self {
            value,
            op: MsrOp::Write,
            ..Self::read(name, msr, expect_excp, version)
        }
    }

    /// Extends the case over `size` consecutive MSR addresses.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Declares a feature gate: when `precondition` does not hold, the
    /// access is expected to fault with `otherwise` instead.
    pub fn gated(mut self, precondition: Precondition, otherwise: ExceptionCode) -> Self {
        self.precondition = Some(precondition);
        self.expect_excp_otherwise = otherwise;
        self
    }
}

/// The three per-class case collections, built once at startup.
#[derive(Debug)]
pub struct Registry {
    pub cpuid: Vec<CpuidCase>,
    pub cr: Vec<CrCase>,
    pub msr: Vec<MsrCase>,
}

impl Registry {
    /// Builds the full registry from the static declarative tables.
    pub fn new() -> Self {
        Self {
            cpuid: crate::cases::cpuid_cases(),
            cr: crate::cases::cr_cases(),
            msr: crate::cases::msr_cases(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::CpuidRegister::*;

    #[test]
    fn test_bit_case_builder() {
        let case = CpuidCase::bit(0x1, 0x0, Ecx, 21, 1, SpecVersion::all());
        assert_eq!(case.name, "CPUID(0x1,0x0).ecx[21]");
        assert_eq!(case.expect.ecx, BitField::new(1 << 21, 1 << 21));
        assert!(case.expect.eax.is_dont_care());
        assert!(case.control.is_none());
    }

    #[test]
    fn test_byte_case_builder() {
        let case = CpuidCase::byte(0x0, 0x0, Ebx, 0x756e_6547, SpecVersion::V1_5);
        assert_eq!(case.name, "CPUID(0x0,0x0).ebx");
        assert_eq!(case.expect.ebx, BitField::new(u32::MAX, 0x756e_6547));
    }

    #[test]
    fn test_reserved_case_builder() {
        let case = CpuidCase::reserved(0x1, 0x0, Eax, 14, 15, SpecVersion::all());
        assert_eq!(case.name, "CPUID(0x1,0x0).eax[15:14]");
        assert_eq!(case.expect.eax, BitField::new(0xc000, 0));
    }

    #[test]
    fn test_declared_case_is_empty() {
        let case = CpuidCase::declared(0xb, 0x0, SpecVersion::V1_5);
        assert!(case.expect.is_empty());
    }

    #[test]
    fn test_registry_is_populated() {
        let registry = Registry::new();
        assert!(!registry.cpuid.is_empty());
        assert!(!registry.cr.is_empty());
        assert!(!registry.msr.is_empty());
    }
}
