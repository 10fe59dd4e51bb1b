// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! CPUID conformance table for TD guests.
//!
//! Expected values follow the virtual-CPUID tables of the TDX architecture
//! specifications; the version mask on each entry says under which revisions
//! the expectation holds. Leaves whose output depends on the configured vCPU
//! topology (0xb, 0x1f) are declared without expectations and report NRUN
//! until a matching topology is pinned down out of band.

use crate::drivers::CpuidRegister::{Eax, Ebx, Ecx, Edx};
use crate::registry::CpuidCase;
use crate::version::SpecVersion;

const V1_0: SpecVersion = SpecVersion::V1_0;
const V1_5: SpecVersion = SpecVersion::V1_5;
const V2_0: SpecVersion = SpecVersion::V2_0;
const V10_15: SpecVersion = V1_0.union(V1_5);
const V10_20: SpecVersion = V1_0.union(V2_0);
const V15_20: SpecVersion = V1_5.union(V2_0);
const ALL: SpecVersion = SpecVersion::all();

pub fn cpuid_cases() -> Vec<CpuidCase> {
    let mut cases = Vec::new();

    // CPUID(0x0): max index and the "GenuineIntel" vendor string.
    cases.extend([
        CpuidCase::byte(0x0, 0x0, Eax, 0x0000_0021, V1_0),
        CpuidCase::byte(0x0, 0x0, Eax, 0x0000_0023, V15_20),
        CpuidCase::byte(0x0, 0x0, Ebx, 0x756e_6547, V1_5), // "Genu"
        CpuidCase::byte(0x0, 0x0, Ecx, 0x6c65_746e, V1_5), // "ntel"
        CpuidCase::byte(0x0, 0x0, Edx, 0x4965_6e69, V1_5), // "ineI"
    ]);

    // CPUID(0x1).EAX/EBX
    cases.extend([
        CpuidCase::reserved(0x1, 0x0, Eax, 14, 15, ALL),
        CpuidCase::reserved(0x1, 0x0, Eax, 28, 31, ALL),
        CpuidCase::reserved(0x1, 0x0, Ebx, 0, 7, V1_5), // brand index
        CpuidCase::bit(0x1, 0x0, Ebx, 8, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Ebx, 9, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Ebx, 10, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Ebx, 11, 1, ALL), // CLFLUSH line size
        CpuidCase::bit(0x1, 0x0, Ebx, 12, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Ebx, 13, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Ebx, 14, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Ebx, 15, 0, ALL),
    ]);

    // CPUID(0x1).ECX
    cases.extend([
        CpuidCase::bit(0x1, 0x0, Ecx, 0, 1, V1_5),  // SSE3
        CpuidCase::bit(0x1, 0x0, Ecx, 1, 1, V1_5),  // PCLMULQDQ
        CpuidCase::bit(0x1, 0x0, Ecx, 2, 1, V1_5),  // DTES64
        CpuidCase::bit(0x1, 0x0, Ecx, 3, 0, V10_20), // MONITOR
        CpuidCase::bit(0x1, 0x0, Ecx, 4, 1, V1_5),  // DS-CPL
        CpuidCase::bit(0x1, 0x0, Ecx, 5, 0, ALL),   // VMX
        CpuidCase::bit(0x1, 0x0, Ecx, 6, 0, ALL),   // SMX
        CpuidCase::bit(0x1, 0x0, Ecx, 9, 1, V1_5),  // SSSE3
        CpuidCase::bit(0x1, 0x0, Ecx, 13, 1, ALL),  // CMPXCHG16B
        CpuidCase::bit(0x1, 0x0, Ecx, 15, 1, ALL),  // PDCM
        CpuidCase::bit(0x1, 0x0, Ecx, 16, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Ecx, 17, 1, V1_5), // PCID
        CpuidCase::bit(0x1, 0x0, Ecx, 19, 1, V1_5), // SSE4_1
        CpuidCase::bit(0x1, 0x0, Ecx, 20, 1, V1_5), // SSE4_2
        CpuidCase::bit(0x1, 0x0, Ecx, 21, 1, ALL),  // x2APIC
        CpuidCase::bit(0x1, 0x0, Ecx, 22, 1, V1_5), // MOVBE
        CpuidCase::bit(0x1, 0x0, Ecx, 23, 1, V1_5), // POPCNT
        CpuidCase::bit(0x1, 0x0, Ecx, 25, 1, ALL),  // AESNI
        CpuidCase::bit(0x1, 0x0, Ecx, 26, 1, ALL),  // XSAVE
        CpuidCase::bit(0x1, 0x0, Ecx, 30, 1, ALL),  // RDRAND
        CpuidCase::bit(0x1, 0x0, Ecx, 31, 1, ALL),
    ]);

    // CPUID(0x1).EDX
    cases.extend([
        CpuidCase::bit(0x1, 0x0, Edx, 0, 1, V1_5), // FPU
        CpuidCase::bit(0x1, 0x0, Edx, 1, 1, V1_5), // VME
        CpuidCase::bit(0x1, 0x0, Edx, 2, 1, V1_5), // DE
        CpuidCase::bit(0x1, 0x0, Edx, 3, 1, V1_5), // PSE
        CpuidCase::bit(0x1, 0x0, Edx, 4, 1, V1_5), // TSC
        CpuidCase::bit(0x1, 0x0, Edx, 5, 1, ALL),  // MSR
        CpuidCase::bit(0x1, 0x0, Edx, 6, 1, ALL),  // PAE
        CpuidCase::bit(0x1, 0x0, Edx, 8, 1, V1_5), // CX8
        CpuidCase::bit(0x1, 0x0, Edx, 9, 1, ALL),  // APIC
        CpuidCase::bit(0x1, 0x0, Edx, 10, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Edx, 11, 1, V1_5), // SEP
        CpuidCase::bit(0x1, 0x0, Edx, 13, 1, V1_5), // PGE
        CpuidCase::bit(0x1, 0x0, Edx, 15, 1, V1_5), // CMOV
        CpuidCase::bit(0x1, 0x0, Edx, 16, 1, V1_5), // PAT
        CpuidCase::bit(0x1, 0x0, Edx, 17, 0, V1_5), // PSE-36
        CpuidCase::bit(0x1, 0x0, Edx, 19, 1, ALL),  // CLFSH
        CpuidCase::bit(0x1, 0x0, Edx, 20, 0, ALL),
        CpuidCase::bit(0x1, 0x0, Edx, 21, 1, ALL),  // DS
        CpuidCase::bit(0x1, 0x0, Edx, 23, 1, V1_5), // MMX
        CpuidCase::bit(0x1, 0x0, Edx, 24, 1, V1_5), // FXSR
        CpuidCase::bit(0x1, 0x0, Edx, 25, 1, V1_5), // SSE
        CpuidCase::bit(0x1, 0x0, Edx, 26, 1, V1_5), // SSE2
        CpuidCase::bit(0x1, 0x0, Edx, 30, 0, ALL),
    ]);

    // CPUID(0x3): entirely reserved.
    for register in [Eax, Ebx, Ecx, Edx] {
        cases.push(CpuidCase::reserved(0x3, 0x0, register, 0, 31, ALL));
    }

    // CPUID(0x4) subleaves 0-3: cache parameters. The addressable-ID fields
    // are reserved and the ways-of-associativity encoding is fixed.
    for subleaf in 0..=3 {
        cases.push(CpuidCase::reserved(0x4, subleaf, Eax, 10, 13, V15_20));
        for bit in 0..=5 {
            cases.push(CpuidCase::bit(0x4, subleaf, Ebx, bit, 1, V1_5));
        }
        for bit in 6..=11 {
            cases.push(CpuidCase::bit(0x4, subleaf, Ebx, bit, 0, V1_5));
        }
        if subleaf < 3 {
            cases.push(CpuidCase::bit(0x4, subleaf, Edx, 2, 0, V15_20));
        } else {
            cases.push(CpuidCase::reserved(0x4, subleaf, Edx, 3, 31, V15_20));
        }
    }

    // CPUID(0x4) subleaf 4: past the last cache level, everything is null.
    cases.extend([
        CpuidCase::reserved(0x4, 0x4, Eax, 0, 4, ALL),  // type
        CpuidCase::reserved(0x4, 0x4, Eax, 5, 7, ALL),  // level
        CpuidCase::bit(0x4, 0x4, Eax, 8, 0, ALL),       // self initializing
        CpuidCase::bit(0x4, 0x4, Eax, 9, 0, ALL),       // fully associative
        CpuidCase::reserved(0x4, 0x4, Eax, 10, 13, ALL),
        CpuidCase::reserved(0x4, 0x4, Eax, 14, 25, ALL),
        CpuidCase::reserved(0x4, 0x4, Eax, 26, 31, ALL),
        CpuidCase::reserved(0x4, 0x4, Ebx, 0, 11, ALL),
        CpuidCase::reserved(0x4, 0x4, Ebx, 12, 21, ALL),
        CpuidCase::reserved(0x4, 0x4, Ebx, 22, 31, ALL),
        CpuidCase::byte(0x4, 0x4, Ecx, 0, ALL), // number of sets
        CpuidCase::bit(0x4, 0x4, Edx, 0, 0, ALL),
        CpuidCase::bit(0x4, 0x4, Edx, 1, 0, ALL),
        CpuidCase::bit(0x4, 0x4, Edx, 2, 0, ALL),
        CpuidCase::reserved(0x4, 0x4, Edx, 3, 31, ALL),
    ]);

    // CPUID(0x7,0x0)
    cases.extend([
        CpuidCase::byte(0x7, 0x0, Eax, 2, V15_20), // max sub-leaves
        CpuidCase::byte(0x7, 0x0, Eax, 1, V1_0),
        CpuidCase::bit(0x7, 0x0, Ebx, 0, 1, ALL),  // FSGSBASE
        CpuidCase::bit(0x7, 0x0, Ebx, 1, 0, ALL),  // IA32_TSC_ADJUST
        CpuidCase::bit(0x7, 0x0, Ebx, 2, 0, ALL),  // SGX
        CpuidCase::bit(0x7, 0x0, Ebx, 6, 1, V1_5), // FDP_EXCPTN_ONLY
        CpuidCase::bit(0x7, 0x0, Ebx, 7, 1, V1_5), // SMEP
        CpuidCase::bit(0x7, 0x0, Ebx, 10, 1, V1_5), // INVPCID
        CpuidCase::bit(0x7, 0x0, Ebx, 11, 1, V2_0), // RTM
        CpuidCase::bit(0x7, 0x0, Ebx, 13, 1, V1_5), // FCS/FDS deprecation
        CpuidCase::bit(0x7, 0x0, Ebx, 14, 0, ALL),  // MPX
        CpuidCase::bit(0x7, 0x0, Ebx, 18, 1, ALL),  // RDSEED
        CpuidCase::bit(0x7, 0x0, Ebx, 20, 1, ALL),  // SMAP
        CpuidCase::bit(0x7, 0x0, Ebx, 22, 0, V1_0), // PCOMMIT
        CpuidCase::bit(0x7, 0x0, Ebx, 23, 1, ALL),  // CLFLUSHOPT
        CpuidCase::bit(0x7, 0x0, Ebx, 24, 1, ALL),  // CLWB
        CpuidCase::bit(0x7, 0x0, Ebx, 29, 1, ALL),  // SHA
        CpuidCase::bit(0x7, 0x0, Ecx, 15, 0, ALL),  // FZM
        CpuidCase::reserved(0x7, 0x0, Ecx, 17, 21, ALL), // MAWAU
        CpuidCase::bit(0x7, 0x0, Ecx, 24, 1, ALL),  // BUSLOCK
        CpuidCase::bit(0x7, 0x0, Ecx, 26, 0, V15_20),
        CpuidCase::bit(0x7, 0x0, Ecx, 27, 1, V1_5), // MOVDIRI
        CpuidCase::bit(0x7, 0x0, Ecx, 28, 1, ALL),  // MOVDIR64B
        CpuidCase::bit(0x7, 0x0, Ecx, 29, 0, ALL),  // ENQCMD
        CpuidCase::bit(0x7, 0x0, Ecx, 30, 0, ALL),  // SGX_LC
        CpuidCase::reserved(0x7, 0x0, Edx, 0, 1, ALL),
        CpuidCase::reserved(0x7, 0x0, Edx, 6, 7, ALL),
        CpuidCase::bit(0x7, 0x0, Edx, 9, 0, ALL),   // MCU_OPT
        CpuidCase::bit(0x7, 0x0, Edx, 10, 1, V1_5), // MD_CLEAR
        CpuidCase::reserved(0x7, 0x0, Edx, 11, 12, ALL),
        CpuidCase::bit(0x7, 0x0, Edx, 13, 0, ALL),  // RTM_FORCE_ABORT
        CpuidCase::bit(0x7, 0x0, Edx, 17, 0, ALL),
        CpuidCase::bit(0x7, 0x0, Edx, 21, 0, ALL),
        CpuidCase::bit(0x7, 0x0, Edx, 26, 1, ALL),  // IBRS
        CpuidCase::bit(0x7, 0x0, Edx, 27, 1, V1_5), // STIBP
        CpuidCase::bit(0x7, 0x0, Edx, 29, 1, ALL),  // IA32_ARCH_CAPABILITIES
        CpuidCase::bit(0x7, 0x0, Edx, 31, 1, ALL),  // SSBD
    ]);

    // CPUID(0x7,0x1)
    cases.extend([
        CpuidCase::reserved(0x7, 0x1, Eax, 0, 3, ALL),
        CpuidCase::reserved(0x7, 0x1, Eax, 6, 9, V1_0),
        CpuidCase::bit(0x7, 0x1, Eax, 7, 0, V15_20),
        CpuidCase::bit(0x7, 0x1, Eax, 8, 0, V2_0),
        CpuidCase::bit(0x7, 0x1, Eax, 9, 0, V15_20),
        CpuidCase::reserved(0x7, 0x1, Eax, 13, 21, V10_15),
        CpuidCase::reserved(0x7, 0x1, Eax, 13, 18, V2_0),
        CpuidCase::bit(0x7, 0x1, Eax, 20, 0, V2_0), // HRESET
        CpuidCase::bit(0x7, 0x1, Eax, 22, 0, ALL),
        CpuidCase::reserved(0x7, 0x1, Eax, 23, 31, V1_0),
        CpuidCase::reserved(0x7, 0x1, Eax, 23, 25, V15_20),
        CpuidCase::reserved(0x7, 0x1, Eax, 27, 31, V15_20),
        CpuidCase::reserved(0x7, 0x1, Ebx, 0, 31, ALL),
        CpuidCase::reserved(0x7, 0x1, Ecx, 0, 31, ALL),
        CpuidCase::bit(0x7, 0x1, Edx, 4, 1, V1_5), // AVX-VNNI-INT8
        CpuidCase::bit(0x7, 0x1, Edx, 5, 1, V1_5),
    ]);

    // CPUID(0x7,0x2)
    cases.extend([
        CpuidCase::reserved(0x7, 0x2, Eax, 0, 31, V1_5),
        CpuidCase::reserved(0x7, 0x2, Ebx, 0, 31, V1_5),
        CpuidCase::reserved(0x7, 0x2, Ecx, 0, 31, V1_5),
        CpuidCase::bit(0x7, 0x2, Edx, 0, 1, V1_5), // PSFD
        CpuidCase::bit(0x7, 0x2, Edx, 1, 1, V1_5), // IPRED_CTRL
        CpuidCase::bit(0x7, 0x2, Edx, 2, 1, V1_5), // RRSBA_CTRL
        CpuidCase::bit(0x7, 0x2, Edx, 4, 1, V1_5), // BHI_CTRL
        CpuidCase::reserved(0x7, 0x2, Edx, 6, 31, V1_5),
    ]);

    // CPUID(0x8): entirely reserved.
    for register in [Eax, Ebx, Ecx, Edx] {
        cases.push(CpuidCase::reserved(0x8, 0x0, register, 0, 31, ALL));
    }

    // CPUID(0xa): architectural perfmon.
    cases.extend([
        CpuidCase::reserved(0xa, 0x0, Edx, 13, 14, V15_20),
        CpuidCase::reserved(0xa, 0x0, Edx, 16, 31, V15_20),
    ]);

    // CPUID(0xd,0x0): XSAVE state components.
    cases.extend([
        CpuidCase::bit(0xd, 0x0, Eax, 0, 1, ALL), // x87
        CpuidCase::bit(0xd, 0x0, Eax, 1, 1, ALL), // SSE
        CpuidCase::bit(0xd, 0x0, Eax, 3, 0, ALL), // PL_BNDREGS
        CpuidCase::bit(0xd, 0x0, Eax, 4, 0, ALL), // PL_BNDCFS
        CpuidCase::bit(0xd, 0x0, Eax, 8, 0, ALL),
        CpuidCase::reserved(0xd, 0x0, Eax, 10, 16, ALL),
        CpuidCase::reserved(0xd, 0x0, Eax, 19, 31, ALL),
        CpuidCase::reserved(0xd, 0x0, Edx, 0, 31, ALL),
    ]);

    // CPUID(0xd,0x1)
    cases.extend([
        CpuidCase::bit(0xd, 0x1, Eax, 0, 1, ALL),  // XSAVEOPT
        CpuidCase::bit(0xd, 0x1, Eax, 1, 1, ALL),  // XSAVEC
        CpuidCase::bit(0xd, 0x1, Eax, 2, 1, V1_5), // XGETBV with ECX = 1
        CpuidCase::bit(0xd, 0x1, Eax, 3, 1, ALL),  // XSAVES/XRSTORS
        CpuidCase::reserved(0xd, 0x1, Eax, 5, 31, ALL),
        CpuidCase::reserved(0xd, 0x1, Ecx, 0, 7, ALL),
        CpuidCase::bit(0xd, 0x1, Ecx, 9, 0, ALL),
        CpuidCase::bit(0xd, 0x1, Ecx, 10, 0, ALL), // PASID
        CpuidCase::bit(0xd, 0x1, Ecx, 13, 0, ALL), // HDC
        CpuidCase::bit(0xd, 0x1, Ecx, 16, 0, ALL),
        CpuidCase::reserved(0xd, 0x1, Ecx, 17, 31, ALL),
        CpuidCase::reserved(0xd, 0x1, Edx, 0, 31, ALL),
    ]);

    // CPUID(0xd) subleaves 2-0x12: EDX reserved across the board.
    for subleaf in 0x2..=0x12 {
        cases.push(CpuidCase::reserved(0xd, subleaf, Edx, 0, 31, V15_20));
    }

    // CPUID(0xe), 0x11, 0x12, 0x13: entirely reserved.
    for leaf in [0xe, 0x11, 0x12, 0x13] {
        for register in [Eax, Ebx, Ecx, Edx] {
            cases.push(CpuidCase::reserved(leaf, 0x0, register, 0, 31, ALL));
        }
    }

    // CPUID(0x15): virtual TSC enumeration.
    cases.extend([
        CpuidCase::byte(0x15, 0x0, Eax, 0x1, ALL), // denominator
        CpuidCase::byte(0x15, 0x0, Ecx, 0x017d_7840, ALL), // nominal ART frequency
        CpuidCase::reserved(0x15, 0x0, Edx, 0, 31, ALL),
    ]);

    // CPUID(0x19): Key Locker is not exposed to TDs.
    cases.extend([
        CpuidCase::reserved(0x19, 0x0, Eax, 3, 31, V1_5),
        CpuidCase::bit(0x19, 0x0, Ebx, 1, 0, V1_5),
        CpuidCase::bit(0x19, 0x0, Ebx, 3, 0, V1_5),
        CpuidCase::bit(0x19, 0x0, Ebx, 4, 0, V1_5), // IWKey backup
        CpuidCase::reserved(0x19, 0x0, Ebx, 5, 31, V1_5),
        CpuidCase::bit(0x19, 0x0, Ecx, 0, 0, V1_5),   // LOADIWKey
        CpuidCase::bit(0x19, 0x0, Ecx, 1, 0, V10_20), // random IWKey
        CpuidCase::reserved(0x19, 0x0, Ecx, 2, 31, ALL),
        CpuidCase::reserved(0x19, 0x0, Edx, 0, 31, ALL),
    ]);

    // CPUID(0x20): entirely reserved.
    for register in [Eax, Ebx, Ecx, Edx] {
        cases.push(CpuidCase::reserved(0x20, 0x0, register, 0, 31, ALL));
    }

    // CPUID(0x21): the "IntelTDX    " enumeration leaf.
    cases.extend([
        CpuidCase::byte(0x21, 0x0, Eax, 0x0, ALL), // maximum sub-leaf
        CpuidCase::byte(0x21, 0x0, Ebx, 0x6574_6E49, ALL), // "Inte"
        CpuidCase::byte(0x21, 0x0, Ecx, 0x2020_2020, ALL), // "    "
        CpuidCase::byte(0x21, 0x0, Edx, 0x5844_546C, ALL), // "lTDX"
    ]);

    // CPUID(0x22): entirely reserved.
    for register in [Eax, Ebx, Ecx, Edx] {
        cases.push(CpuidCase::reserved(0x22, 0x0, register, 0, 31, V1_5));
    }

    // CPUID(0x23): architectural perfmon extended.
    cases.extend([
        CpuidCase::reserved(0x23, 0x0, Eax, 4, 5, V1_5), // valid sub-leaf bitmap
        CpuidCase::reserved(0x23, 0x0, Eax, 6, 31, V1_5),
        CpuidCase::reserved(0x23, 0x0, Ecx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x0, Edx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x1, Ebx, 0, 3, V1_5), // fixed counter bitmap
        CpuidCase::reserved(0x23, 0x1, Ebx, 4, 31, V1_5),
        CpuidCase::reserved(0x23, 0x1, Ecx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x1, Edx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x2, Eax, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x2, Ebx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x2, Ecx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x2, Edx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x3, Ebx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x3, Ecx, 0, 31, V1_5),
        CpuidCase::reserved(0x23, 0x3, Edx, 0, 31, V1_5),
    ]);

    // CPUID(0x80000000): extended max index.
    cases.extend([
        CpuidCase::byte(0x8000_0000, 0x0, Eax, 0x8000_0008, V1_5),
        CpuidCase::reserved(0x8000_0000, 0x0, Ebx, 0, 31, ALL),
        CpuidCase::reserved(0x8000_0000, 0x0, Ecx, 0, 31, ALL),
        CpuidCase::reserved(0x8000_0000, 0x0, Edx, 0, 31, ALL),
    ]);

    // CPUID(0x80000001)
    cases.extend([
        CpuidCase::reserved(0x8000_0001, 0x0, Eax, 0, 31, ALL),
        CpuidCase::reserved(0x8000_0001, 0x0, Ebx, 0, 31, ALL),
        CpuidCase::bit(0x8000_0001, 0x0, Ecx, 0, 1, V1_5), // LAHF/SAHF in 64-bit
        CpuidCase::reserved(0x8000_0001, 0x0, Ecx, 1, 4, ALL),
        CpuidCase::bit(0x8000_0001, 0x0, Ecx, 5, 1, V1_5), // LZCNT
        CpuidCase::reserved(0x8000_0001, 0x0, Ecx, 6, 7, ALL),
        CpuidCase::bit(0x8000_0001, 0x0, Ecx, 8, 1, V1_5), // PREFETCHW
        CpuidCase::reserved(0x8000_0001, 0x0, Ecx, 9, 31, ALL),
        CpuidCase::reserved(0x8000_0001, 0x0, Edx, 0, 10, ALL),
        CpuidCase::reserved(0x8000_0001, 0x0, Edx, 12, 19, ALL),
        CpuidCase::bit(0x8000_0001, 0x0, Edx, 20, 1, ALL), // execute disable
        CpuidCase::reserved(0x8000_0001, 0x0, Edx, 21, 25, ALL),
        CpuidCase::bit(0x8000_0001, 0x0, Edx, 26, 1, ALL), // 1GB pages
        CpuidCase::bit(0x8000_0001, 0x0, Edx, 27, 1, ALL), // RDTSCP
        CpuidCase::bit(0x8000_0001, 0x0, Edx, 28, 0, ALL),
        CpuidCase::bit(0x8000_0001, 0x0, Edx, 29, 1, ALL), // Intel 64
        CpuidCase::reserved(0x8000_0001, 0x0, Edx, 30, 31, ALL),
    ]);

    // CPUID(0x80000007)
    cases.extend([
        CpuidCase::reserved(0x8000_0007, 0x0, Eax, 0, 31, V1_5),
        CpuidCase::reserved(0x8000_0007, 0x0, Ebx, 0, 31, V1_5),
        CpuidCase::reserved(0x8000_0007, 0x0, Ecx, 0, 31, V1_5),
        CpuidCase::reserved(0x8000_0007, 0x0, Edx, 0, 7, V1_5),
        CpuidCase::bit(0x8000_0007, 0x0, Edx, 8, 1, V1_5), // invariant TSC
        CpuidCase::reserved(0x8000_0007, 0x0, Edx, 9, 31, V1_5),
    ]);

    // CPUID(0x80000008)
    cases.extend([
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 0, 0, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 1, 0, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 2, 1, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 3, 0, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 4, 1, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 5, 1, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 6, 0, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Eax, 7, 0, ALL),
        CpuidCase::reserved(0x8000_0008, 0x0, Eax, 16, 31, ALL),
        CpuidCase::reserved(0x8000_0008, 0x0, Ebx, 0, 8, ALL),
        CpuidCase::bit(0x8000_0008, 0x0, Ebx, 9, 1, V2_0), // WBNOINVD
        CpuidCase::reserved(0x8000_0008, 0x0, Ebx, 10, 31, V10_20),
        CpuidCase::reserved(0x8000_0008, 0x0, Ecx, 0, 31, V10_20),
        CpuidCase::reserved(0x8000_0008, 0x0, Edx, 0, 31, V10_20),
    ]);

    // With #VE reduction active and no paravirtualization controls, the
    // features below are hidden from the TD outright.
    cases.extend([
        CpuidCase::bit(0x1, 0x0, Ecx, 7, 0, V1_5),  // EST
        CpuidCase::bit(0x1, 0x0, Ecx, 24, 0, V1_5), // TSC deadline
        CpuidCase::bit(0x1, 0x0, Edx, 7, 0, V1_5),  // MCE
        CpuidCase::bit(0x1, 0x0, Edx, 12, 0, V1_5), // MTRR
        CpuidCase::bit(0x1, 0x0, Edx, 14, 0, V1_5), // MCA
        CpuidCase::bit(0x1, 0x0, Edx, 22, 0, V1_5), // ACPI thermal
        CpuidCase::byte(0x2, 0x0, Eax, 0x00fe_ff01, V1_5),
        CpuidCase::byte(0x2, 0x0, Ebx, 0, V1_5),
        CpuidCase::byte(0x2, 0x0, Ecx, 0, V1_5),
        CpuidCase::byte(0x2, 0x0, Edx, 0, V1_5),
        CpuidCase::bit(0x6, 0x0, Eax, 2, 1, V1_5), // ARAT
        CpuidCase::reserved(0x6, 0x0, Eax, 0, 1, V1_5),
        CpuidCase::reserved(0x6, 0x0, Eax, 3, 31, V1_5),
        CpuidCase::byte(0x6, 0x0, Ebx, 0, V1_5),
        CpuidCase::byte(0x6, 0x0, Ecx, 0, V1_5),
        CpuidCase::byte(0x6, 0x0, Edx, 0, V1_5),
        CpuidCase::bit(0x7, 0x0, Edx, 30, 0, V1_5), // CORE_CAPABILITIES
        CpuidCase::bit(0x7, 0x0, Ebx, 12, 0, V1_5), // RDT_M
        CpuidCase::bit(0x7, 0x0, Ebx, 15, 0, V1_5), // RDT_A
        CpuidCase::bit(0x7, 0x0, Edx, 18, 0, V1_5), // PCONFIG
        CpuidCase::bit(0x7, 0x0, Ecx, 13, 0, V1_5), // TME
        CpuidCase::bit(0x1, 0x0, Ecx, 18, 0, V1_5), // DCA, gates leaf 0x9
        CpuidCase::byte(0x9, 0x0, Eax, 0, V1_5),
        CpuidCase::byte(0xc, 0x0, Eax, 0, V1_5),
        CpuidCase::byte(0xc, 0x0, Ebx, 0, V1_5),
        CpuidCase::byte(0xc, 0x0, Ecx, 0, V1_5),
        CpuidCase::byte(0xc, 0x0, Edx, 0, V1_5),
    ]);

    // Same checks with the paravirtualization controls negotiated on; the
    // TDCS write happens right before the probe.
    cases.extend([
        CpuidCase::bit(0x1, 0x0, Ecx, 7, 0, V1_5).with_control(8, 1 << 2),
        CpuidCase::bit(0x1, 0x0, Ecx, 24, 0, V1_5).with_control(8, 1 << 11),
    ]);

    // Topology leaves need a pinned vCPU layout before their expected values
    // can be declared; until then they surface as NRUN.
    for subleaf in 0..=2 {
        cases.push(CpuidCase::declared(0xb, subleaf, V1_5));
    }
    for subleaf in 0..=3 {
        cases.push(CpuidCase::declared(0x1f, subleaf, V1_5));
    }

    cases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_are_unique_per_expectation() {
        // Distinct cases may share a name only when their version masks are
        // disjoint or a control override distinguishes them.
        let cases = cpuid_cases();
        for (i, a) in cases.iter().enumerate() {
            for b in &cases[i + 1..] {
                if a.name == b.name && a.control == b.control {
                    assert!(
                        !a.version.intersects(b.version) || a.expect == b.expect,
                        "conflicting expectations for {}",
                        a.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_topology_leaves_are_declared_only() {
        for case in cpuid_cases() {
            if case.leaf == 0xb || case.leaf == 0x1f {
                assert!(case.expect.is_empty(), "{} has expectations", case.name);
            }
        }
    }

    #[test]
    fn test_control_overrides_present() {
        let with_control = cpuid_cases().iter().filter(|c| c.control.is_some()).count();
        assert_eq!(with_control, 2);
    }
}
