// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Conformance-test engine for the architectural state exposed to a TDX
//! guest.
//!
//! The engine evaluates a registry of declarative expectations against live
//! CPUID leaves, control registers and model-specific registers, and reports
//! per-case PASS/FAIL verdicts plus an aggregate summary. Privileged register
//! access is abstracted behind the driver traits in [`drivers`]; the engine
//! itself only applies mask-and-compare semantics and never inlines
//! privileged instructions.

/// Bit-level expectation model shared by all register classes.
pub mod bitfield;
/// Static declarative test tables.
pub mod cases;
/// Access-driver contracts and exception-code vocabulary.
pub mod drivers;
/// Evaluation loops, run context and report surface.
pub mod engine;
/// In-tree drivers for state reachable from userland.
#[cfg(target_arch = "x86_64")]
pub mod hardware;
/// Case types and the per-class registries.
pub mod registry;
/// Mock drivers for tests.
pub mod test_utils;
/// Specification-version bitmask and token resolver.
pub mod version;
