// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The declarative conformance tables, one per register class.
//!
//! Entry order is load-bearing: the registry preserves it and the report
//! numbers cases in this order.

mod cpuid;
mod cr;
mod msr;

pub use cpuid::cpuid_cases;
pub use cr::cr_cases;
pub use msr::msr_cases;
