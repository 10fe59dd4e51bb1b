// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Control-register conformance table.
//!
//! TD guests run with a set of CR0/CR4 bits pinned by the TDX module: the
//! fixed-1 bits must read as set, and flipping a fixed-0 bit must fault
//! rather than take effect. Write probes name the attempted transition so a
//! read check and a write probe on the same bit stay distinguishable.

use crate::drivers::ControlRegister::{Cr0, Cr4};
use crate::drivers::CpuidRegister::Ecx;
use crate::drivers::{EXCP_GP, EXCP_NONE};
use crate::registry::{CrCase, Precondition};
use crate::version::SpecVersion;

const ALL: SpecVersion = SpecVersion::all();
const V15_20: SpecVersion = SpecVersion::V1_5.union(SpecVersion::V2_0);

pub fn cr_cases() -> Vec<CrCase> {
    vec![
        // Fixed-1 bits.
        CrCase::get("CR0.PE", Cr0, 1 << 0, 1, ALL),
        CrCase::get("CR0.NE", Cr0, 1 << 5, 1, ALL),
        CrCase::get("CR4.MCE", Cr4, 1 << 6, 1, ALL),
        // Fixed-0 bits read as clear.
        CrCase::get("CR4.VMXE", Cr4, 1 << 13, 0, ALL),
        CrCase::get("CR4.SMXE", Cr4, 1 << 14, 0, ALL),
        // Setting a fixed-0 bit must fault.
        CrCase::set("CR0.CD=1", Cr0, 1 << 30, EXCP_GP, ALL),
        CrCase::set("CR0.NW=1", Cr0, 1 << 29, EXCP_GP, ALL),
        CrCase::set("CR4.VMXE=1", Cr4, 1 << 13, EXCP_GP, ALL),
        CrCase::set("CR4.SMXE=1", Cr4, 1 << 14, EXCP_GP, ALL),
        // PKS is configurable; with the feature enumerated the write must be
        // accepted, without it the probe proves nothing and is skipped.
        CrCase::set("CR4.PKS=1", Cr4, 1 << 24, EXCP_NONE, V15_20).with_precondition(
            Precondition::CpuidBitSet {
                leaf: 0x7,
                subleaf: 0x0,
                register: Ecx,
                bit: 31,
            },
        ),
    ]
}
