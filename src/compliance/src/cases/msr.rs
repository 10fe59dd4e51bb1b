// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! MSR conformance table.
//!
//! These cases validate accessibility, not content: a TD guest must be able
//! to reach the architectural MSRs natively, take #VE on the paravirtualized
//! ones, and #GP on those the TDX module withholds. The x2APIC register
//! banks are declared with a size so every alias in the bank is probed.

use crate::drivers::CpuidRegister::{Ecx, Edx};
use crate::drivers::{EXCP_GP, EXCP_NONE, EXCP_VE};
use crate::registry::{MsrCase, Precondition};
use crate::version::SpecVersion;

const ALL: SpecVersion = SpecVersion::all();

pub fn msr_cases() -> Vec<MsrCase> {
    vec![
        MsrCase::read("MSR_IA32_TSC", 0x10, EXCP_NONE, ALL),
        MsrCase::read("MSR_IA32_APIC_BASE", 0x1b, EXCP_NONE, ALL),
        // TSC_ADJUST is enumerated as absent (CPUID(0x7).EBX[1] == 0), so
        // both directions take #VE for paravirt handling.
        MsrCase::read("MSR_IA32_TSC_ADJUST", 0x3b, EXCP_VE, ALL),
        MsrCase::write("MSR_IA32_TSC_ADJUST.wr", 0x3b, 0, EXCP_VE, ALL),
        MsrCase::read("MSR_IA32_SPEC_CTRL", 0x48, EXCP_NONE, ALL),
        MsrCase::read("MSR_IA32_PLATFORM_INFO", 0xce, EXCP_VE, ALL),
        MsrCase::read("MSR_IA32_ARCH_CAPABILITIES", 0x10a, EXCP_NONE, ALL),
        // DS save area exists only with the DS feature enumerated.
        MsrCase::read("MSR_IA32_DS_AREA", 0x600, EXCP_NONE, ALL).gated(
            Precondition::CpuidBitSet {
                leaf: 0x1,
                subleaf: 0x0,
                register: Edx,
                bit: 21,
            },
            EXCP_GP,
        ),
        // TSC deadline follows the APIC timer enumeration.
        MsrCase::write("MSR_IA32_TSC_DEADLINE", 0x6e0, 0, EXCP_NONE, ALL).gated(
            Precondition::CpuidBitSet {
                leaf: 0x1,
                subleaf: 0x0,
                register: Ecx,
                bit: 24,
            },
            EXCP_GP,
        ),
        // x2APIC register banks; all eight aliases of each bank must behave
        // like the base register.
        MsrCase::read("MSR_IA32_X2APIC_ISR", 0x810, EXCP_NONE, ALL).with_size(8),
        MsrCase::read("MSR_IA32_X2APIC_TMR", 0x818, EXCP_NONE, ALL).with_size(8),
        MsrCase::read("MSR_IA32_X2APIC_IRR", 0x820, EXCP_NONE, ALL).with_size(8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MsrOp;

    #[test]
    fn test_case_names_are_unique() {
        let cases = msr_cases();
        for (i, a) in cases.iter().enumerate() {
            for b in &cases[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_ranged_cases_are_reads() {
        for case in msr_cases() {
            if case.size > 1 {
                assert_eq!(case.op, MsrOp::Read, "{}", case.name);
            }
        }
    }

    #[test]
    fn test_sizes_are_sane() {
        for case in msr_cases() {
            assert!(case.size >= 1 && case.size <= 8, "{}", case.name);
        }
    }
}
