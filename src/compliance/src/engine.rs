// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The evaluation engine.
//!
//! One [`Engine::run`] invocation performs a full sequential pass over the
//! selected registries. All run state (statistics, log buffer, active version
//! filter) lives in a per-invocation context, so consecutive runs over
//! unchanged state yield identical reports. A single case's failure never
//! aborts the run.

use log::{info, warn};
use serde::Serialize;

use crate::drivers::{
    ControlOverride, CpuidRegs, Drivers, ExceptionCode, TdcsDriver, DEFAULT_TD_CTL_MASK, EXCP_NONE,
    FEATURES0_VCPU_TOPOLOGY, FEATURES0_VE_REDUCE, MD_FIELD_FEATURES0, TDCS_FIELD_FEATURE_PV_CTL,
    TDCS_FIELD_TD_CTL,
};
use crate::registry::{CpuidCase, CrCase, MsrCase, MsrOp, Precondition, Registry};
use crate::version::SpecVersion;

/// Upper bound on the textual log accumulated across one run.
const LOG_CAPACITY: usize = 32 << 10;
const TRUNCATION_MARKER: &str = "...(log truncated)";

/// What a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Cpuid,
    Cr,
    Msr,
    All,
    /// List in-scope cases without executing them.
    ListOnly,
    /// Run the one case with this exact name, in whichever class it lives.
    Single(String),
}

impl Scope {
    /// Maps a raw target word onto a scope, by prefix.
    ///
    /// Anything that is not one of the class keywords is taken to be a case
    /// name; class keywords are lowercase while case names start with an
    /// uppercase register-class tag, so the two cannot collide.
    pub fn parse(target: &str) -> Self {
        if target.starts_with("cpuid") {
            Self::Cpuid
        } else if target.starts_with("cr") {
            Self::Cr
        } else if target.starts_with("msr") {
            Self::Msr
        } else if target.starts_with("all") {
            Self::All
        } else if target.starts_with("list") {
            Self::ListOnly
        } else {
            Self::Single(target.to_string())
        }
    }
}

/// A parsed run command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub scope: Scope,
    /// Free-text version token, resolved through [`SpecVersion::resolve`].
    pub version_token: String,
}

impl RunRequest {
    pub fn new(scope: Scope, version_token: impl Into<String>) -> Self {
        Self {
            scope,
            version_token: version_token.into(),
        }
    }

    /// Parses the raw command form `"<target> [version-token]"`.
    pub fn from_command(input: &str) -> Self {
        let input = input.trim_end_matches('\n');
        match input.split_once(' ') {
            Some((target, token)) => Self::new(Scope::parse(target), token),
            None => Self::new(Scope::parse(input), "generic"),
        }
    }
}

/// Verdict of one evaluated case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseResult {
    Pass,
    Fail,
    /// Inapplicable by declaration; excluded from the totals.
    NotRun,
    /// A precondition declined execution; counted in the total only.
    Skip,
}

impl CaseResult {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::NotRun => "NRUN",
            Self::Skip => "SKIP",
        }
    }
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Cases executed (or skipped by a precondition); NotRun and list-mode
    /// entries are excluded.
    pub total: u32,
    pub pass: u32,
    pub fail: u32,
    pub skip: u32,
    /// One line per reported case plus a trailing summary, bounded.
    pub log: String,
}

/// Bounded run log; lines past the bound are dropped after a marker.
#[derive(Debug, Default)]
struct LogBuffer {
    buf: String,
    truncated: bool,
}

impl LogBuffer {
    fn push_line(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.buf.len() + line.len() + 1 > LOG_CAPACITY - TRUNCATION_MARKER.len() - 1 {
            self.truncated = true;
            self.buf.push_str(TRUNCATION_MARKER);
            self.buf.push('\n');
            return;
        }
        self.buf.push_str(line);
        self.buf.push('\n');
    }
}

/// Per-invocation run state, constructed fresh for every [`Engine::run`].
#[derive(Debug)]
struct RunContext {
    active: SpecVersion,
    token: String,
    name_filter: Option<String>,
    list_only: bool,
    total: u32,
    pass: u32,
    fail: u32,
    /// Per-line sequence number; counts every reported case line, including
    /// NotRun ones, so report order stays observable.
    seq: u32,
    log: LogBuffer,
}

impl RunContext {
    fn new(request: &RunRequest) -> Self {
        let name_filter = match &request.scope {
            Scope::Single(name) => Some(name.clone()),
            _ => None,
        };
        Self {
            active: SpecVersion::resolve(&request.version_token),
            token: request.version_token.clone(),
            name_filter,
            list_only: matches!(request.scope, Scope::ListOnly),
            total: 0,
            pass: 0,
            fail: 0,
            seq: 0,
            log: LogBuffer::default(),
        }
    }

    fn selects(&self, name: &str, version: SpecVersion) -> bool {
        if let Some(filter) = &self.name_filter {
            if filter != name {
                return false;
            }
        }
        version.applies(self.active)
    }

    /// Emits the list-mode line `"<name> <version-label>"`.
    fn list(&mut self, name: &str, version: SpecVersion) {
        let line = format!("{} {}", name, version.label());
        self.log.push_line(&line);
    }

    /// Records a verdict and appends its report line.
    fn record(&mut self, name: &str, result: CaseResult) {
        self.seq += 1;
        match result {
            CaseResult::Pass => {
                self.total += 1;
                self.pass += 1;
            }
            CaseResult::Fail => {
                self.total += 1;
                self.fail += 1;
            }
            CaseResult::Skip => self.total += 1,
            CaseResult::NotRun => {}
        }
        let line = match result {
            CaseResult::Skip => format!("{}: {}:\t SKIP", self.seq, name),
            _ => format!("{}: {}_{}:\t {}", self.seq, name, self.token, result.as_str()),
        };
        self.log.push_line(&line);
    }

    fn into_report(mut self) -> Report {
        if !self.list_only {
            let line = format!(
                "Total:{}, PASS:{}, FAIL:{}, SKIP:{}",
                self.total,
                self.pass,
                self.fail,
                self.total - self.pass - self.fail
            );
            self.log.push_line(&line);
        }
        Report {
            total: self.total,
            pass: self.pass,
            fail: self.fail,
            skip: self.total - self.pass - self.fail,
            log: self.log.buf,
        }
    }
}

/// The cases a request selects, with their declared expectations; the
/// structured counterpart of the plain-text list output.
#[derive(Debug, Serialize)]
pub struct Listing<'a> {
    pub cpuid: Vec<&'a CpuidCase>,
    pub cr: Vec<&'a CrCase>,
    pub msr: Vec<&'a MsrCase>,
}

/// Which register classes a scope covers, as `(cpuid, cr, msr)`.
fn classes(scope: &Scope) -> (bool, bool, bool) {
    match scope {
        Scope::Cpuid => (true, false, false),
        Scope::Cr => (false, true, false),
        Scope::Msr => (false, false, true),
        Scope::All | Scope::ListOnly | Scope::Single(_) => (true, true, true),
    }
}

/// Drives the registries against a driver set.
#[derive(Debug)]
pub struct Engine<'a> {
    registry: &'a Registry,
    drivers: Drivers<'a>,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry, drivers: Drivers<'a>) -> Self {
        Self { registry, drivers }
    }

    /// Performs one full pass over the requested scope and returns the
    /// report. Never fails; per-case mismatches are verdicts, not errors.
    pub fn run(&self, request: &RunRequest) -> Report {
        let mut ctx = RunContext::new(request);
        let (cpuid, cr, msr) = classes(&request.scope);
        if cpuid {
            self.run_cpuid(&mut ctx);
        }
        if cr {
            self.run_cr(&mut ctx);
        }
        if msr {
            self.run_msr(&mut ctx);
        }
        ctx.into_report()
    }

    /// Structured counterpart of a ListOnly run: the cases the request
    /// selects, with their full expectations, for machine consumption.
    pub fn list(&self, request: &RunRequest) -> Listing<'a> {
        let ctx = RunContext::new(request);
        let (cpuid, cr, msr) = classes(&request.scope);
        Listing {
            cpuid: self
                .registry
                .cpuid
                .iter()
                .filter(|case| cpuid && ctx.selects(&case.name, case.version))
                .collect(),
            cr: self
                .registry
                .cr
                .iter()
                .filter(|case| cr && ctx.selects(case.name, case.version))
                .collect(),
            msr: self
                .registry
                .msr
                .iter()
                .filter(|case| msr && ctx.selects(case.name, case.version))
                .collect(),
        }
    }

    fn run_cpuid(&self, ctx: &mut RunContext) {
        info!("testing CPUID cases");
        for case in &self.registry.cpuid {
            if !ctx.selects(&case.name, case.version) {
                continue;
            }
            if ctx.list_only {
                ctx.list(&case.name, case.version);
                continue;
            }
            if let Some(control) = &case.control {
                match self.drivers.tdcs {
                    Some(tdcs) => negotiate_control(tdcs, control),
                    None => warn!("no TDCS driver, running {} without its override", case.name),
                }
            }
            let regs = self.drivers.cpuid.probe(case.leaf, case.subleaf);
            let result = self.check_cpuid(ctx, case, &regs);
            ctx.record(&case.name, result);
        }
    }

    fn check_cpuid(&self, ctx: &mut RunContext, case: &CpuidCase, regs: &CpuidRegs) -> CaseResult {
        let expect = &case.expect;
        if expect.is_empty() {
            return CaseResult::NotRun;
        }
        if expect.eax.matches(regs.eax)
            && expect.ebx.matches(regs.ebx)
            && expect.ecx.matches(regs.ecx)
            && expect.edx.matches(regs.edx)
        {
            return CaseResult::Pass;
        }

        // The diagnostic triple: masked observation, expectation and masks
        // for all four registers, enough to pinpoint the diverging bit.
        let header = format!("CPUID: {}_{}", case.name, ctx.token);
        ctx.log.push_line(&header);
        let observed = dump_pattern(
            expect.eax.masked(regs.eax),
            expect.ebx.masked(regs.ebx),
            expect.ecx.masked(regs.ecx),
            expect.edx.masked(regs.edx),
        );
        ctx.log.push_line(&format!("CPUID obs: {observed}"));
        let expected = dump_pattern(
            expect.eax.expect,
            expect.ebx.expect,
            expect.ecx.expect,
            expect.edx.expect,
        );
        ctx.log.push_line(&format!("CPUID exp: {expected}"));
        let masks = dump_pattern(
            expect.eax.mask,
            expect.ebx.mask,
            expect.ecx.mask,
            expect.edx.mask,
        );
        ctx.log.push_line(&format!("CPUID msk: {masks}"));

        // One bit-level diff per diverging register.
        let registers = [
            ("eax", &expect.eax, regs.eax),
            ("ebx", &expect.ebx, regs.ebx),
            ("ecx", &expect.ecx, regs.ecx),
            ("edx", &expect.edx, regs.edx),
        ];
        for (name, field, observed) in registers {
            if !field.matches(observed) {
                ctx.log.push_line(&format!("{name}:"));
                ctx.log.push_line(&field.diff_string(observed));
            }
        }
        CaseResult::Fail
    }

    fn run_cr(&self, ctx: &mut RunContext) {
        info!("testing control-register cases");
        for case in &self.registry.cr {
            if !ctx.selects(case.name, case.version) {
                continue;
            }
            if ctx.list_only {
                ctx.list(case.name, case.version);
                continue;
            }
            let Some(driver) = self.drivers.cr else {
                warn!("no control-register driver, CR cases not evaluated");
                return;
            };

            let mut observed = 0u64;
            let mut excp = EXCP_NONE;
            if case.read {
                observed = driver.get(case.register);
            }
            if case.write {
                if let Some(precondition) = &case.precondition {
                    if !self.precondition_holds(precondition) {
                        ctx.record(case.name, CaseResult::Skip);
                        continue;
                    }
                }
                excp = driver.set(case.register, case.mask);
            }

            let masked = observed & case.mask;
            let expected = case.mask.wrapping_mul(case.expect_bit);
            let result = if masked == expected && excp == case.expect_excp {
                CaseResult::Pass
            } else {
                let line = format!(
                    "Error: CR compliance test failed, output/exception {:#x}/{}, but expect \
                     {:#x}/{}",
                    masked, excp, expected, case.expect_excp
                );
                ctx.log.push_line(&line);
                CaseResult::Fail
            };
            ctx.record(case.name, result);
        }
    }

    fn run_msr(&self, ctx: &mut RunContext) {
        info!("testing MSR cases");
        for case in &self.registry.msr {
            if !ctx.selects(case.name, case.version) {
                continue;
            }
            if ctx.list_only {
                ctx.list(case.name, case.version);
                continue;
            }
            let Some(driver) = self.drivers.msr else {
                warn!("no MSR driver, MSR cases not evaluated");
                return;
            };

            let expect_excp = match &case.precondition {
                Some(precondition) if !self.precondition_holds(precondition) => {
                    case.expect_excp_otherwise
                }
                _ => case.expect_excp,
            };
            let access = |addr: u32| -> ExceptionCode {
                match case.op {
                    MsrOp::Read => driver.read(addr).1,
                    MsrOp::Write => driver.write(addr, case.value),
                }
            };

            // Every address in a multi-register range must fault identically
            // to the base address; a divergence fails the case outright.
            let base = access(case.msr);
            let mut diverged = false;
            for offset in 1..case.size {
                let code = access(case.msr + offset);
                if code != base {
                    let line = format!(
                        "Error: MSR multiple bytes difference, MSR({:x}): {}(byte0) and \
                         {}(byte{})",
                        case.msr, base, code, offset
                    );
                    ctx.log.push_line(&line);
                    diverged = true;
                    break;
                }
            }

            let result = if diverged {
                CaseResult::Fail
            } else if base == expect_excp {
                CaseResult::Pass
            } else {
                let line = format!(
                    "Error: MSR compliance test failed, exception {}, but expect_exception {}",
                    base, expect_excp
                );
                ctx.log.push_line(&line);
                CaseResult::Fail
            };
            ctx.record(case.name, result);
        }
    }

    fn precondition_holds(&self, precondition: &Precondition) -> bool {
        match precondition {
            Precondition::CpuidBitSet {
                leaf,
                subleaf,
                register,
                bit,
            } => {
                let regs = self.drivers.cpuid.probe(*leaf, *subleaf);
                (regs.reg(*register) >> bit) & 1 == 1
            }
        }
    }
}

fn dump_pattern(eax: u32, ebx: u32, ecx: u32, edx: u32) -> String {
    format!("eax({eax:08x}) ebx({ebx:08x}) ecx({ecx:08x}) edx({edx:08x})")
}

/// Best-effort TDCS control-field negotiation before a CPUID probe.
///
/// Mirrors the guest-side flow: read FEATURES0 to learn whether #VE
/// reduction and vCPU topology enumeration are supported, then write TD_CTL
/// and FEATURE_PV_CTL. Failures are logged and the probe proceeds against
/// current state; a case that depended on the override will then mismatch
/// and be reported as FAIL, which is the intended signal.
fn negotiate_control(tdcs: &dyn TdcsDriver, control: &ControlOverride) {
    let features0 = match tdcs.read_field(MD_FIELD_FEATURES0) {
        Ok(value) => value,
        Err(err) => {
            warn!("failed to read TDX FEATURES0: {err}");
            return;
        }
    };

    let ve_reduce = features0 & FEATURES0_VE_REDUCE != 0;
    let vcpu_topology = features0 & FEATURES0_VCPU_TOPOLOGY != 0;

    if ve_reduce || vcpu_topology {
        let mask = match control.td_ctl {
            0 => DEFAULT_TD_CTL_MASK,
            td_ctl => td_ctl,
        };
        match tdcs.write_field(TDCS_FIELD_TD_CTL, control.td_ctl, mask) {
            Ok(()) => info!("TD_CTL set to {:#x}", control.td_ctl),
            Err(err) => warn!("failed to set TD_CTL to {:#x}: {err}", control.td_ctl),
        }
    } else {
        info!("TD_CTL not supported by this TD (FEATURES0 {features0:#x})");
    }

    if ve_reduce {
        let mask = match control.feature_pv_ctl {
            0 => u64::MAX,
            pv_ctl => pv_ctl,
        };
        match tdcs.write_field(TDCS_FIELD_FEATURE_PV_CTL, control.feature_pv_ctl, mask) {
            Ok(()) => info!("FEATURE_PV_CTL set to {:#x}", control.feature_pv_ctl),
            Err(err) => warn!(
                "failed to set FEATURE_PV_CTL to {:#x}: {err}",
                control.feature_pv_ctl
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::CpuidRegister::*;
    use crate::drivers::{ControlRegister, EXCP_GP, EXCP_VE};
    use crate::test_utils::{RecordingTdcs, StaticCpuid, StaticCr, StaticMsr};

    const ALL: SpecVersion = SpecVersion::all();

    fn empty_registry() -> Registry {
        Registry {
            cpuid: vec![],
            cr: vec![],
            msr: vec![],
        }
    }

    // CPUID(0x1).ECX[21] (x2APIC) expected set, plus a reserved range.
    fn leaf1_registry() -> Registry {
        Registry {
            cpuid: vec![
                CpuidCase::bit(0x1, 0x0, Ecx, 21, 1, ALL),
                CpuidCase::reserved(0x1, 0x0, Eax, 14, 15, SpecVersion::V1_5),
            ],
            cr: vec![],
            msr: vec![],
        }
    }

    fn leaf1_cpuid(ecx: u32) -> StaticCpuid {
        let mut cpuid = StaticCpuid::default();
        cpuid.set(0x1, 0x0, CpuidRegs { eax: 0, ebx: 0, ecx, edx: 0 });
        cpuid
    }

    fn drivers(cpuid: &StaticCpuid) -> Drivers<'_> {
        Drivers {
            cpuid,
            cr: None,
            msr: None,
            tdcs: None,
        }
    }

    fn run_all(registry: &Registry, cpuid: &StaticCpuid) -> Report {
        Engine::new(registry, drivers(cpuid)).run(&RunRequest::new(Scope::Cpuid, "generic"))
    }

    #[test]
    fn test_cpuid_bit_pass() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(1 << 21);
        let report = run_all(&registry, &cpuid);
        assert_eq!((report.total, report.pass, report.fail), (2, 2, 0));
        assert!(report.log.contains("1: CPUID(0x1,0x0).ecx[21]_generic:\t PASS"));
    }

    #[test]
    fn test_cpuid_single_bit_flip_fails() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(0);
        let report = run_all(&registry, &cpuid);
        assert_eq!((report.total, report.pass, report.fail), (2, 1, 1));
        // The diagnostic triple pinpoints bit 21 of ecx as the divergence.
        assert!(report.log.contains("CPUID obs: eax(00000000) ebx(00000000) ecx(00000000)"));
        assert!(report.log.contains("CPUID exp: eax(00000000) ebx(00000000) ecx(00200000)"));
        assert!(report.log.contains("CPUID msk: eax(00000000) ebx(00000000) ecx(00200000)"));
        // Only the diverging register gets a bit-level diff.
        assert!(report.log.contains(
            "ecx:\n\
             * expected: 0b00000000001000000000000000000000\n\
             * observed: 0b00000000000000000000000000000000\n\
             * diff    :             ^"
        ));
        assert!(!report.log.contains("eax:\n* expected"));
    }

    #[test]
    fn test_cpuid_all_registers_must_match() {
        let registry = leaf1_registry();
        // ecx matches but the reserved eax range does not.
        let mut cpuid = StaticCpuid::default();
        cpuid.set(
            0x1,
            0x0,
            CpuidRegs {
                eax: 1 << 14,
                ebx: 0,
                ecx: 1 << 21,
                edx: 0,
            },
        );
        let report = run_all(&registry, &cpuid);
        assert_eq!((report.pass, report.fail), (1, 1));
    }

    #[test]
    fn test_all_zero_mask_is_not_run() {
        let registry = Registry {
            cpuid: vec![CpuidCase::declared(0xb, 0x0, ALL)],
            cr: vec![],
            msr: vec![],
        };
        let cpuid = leaf1_cpuid(u32::MAX);
        let report = run_all(&registry, &cpuid);
        assert_eq!((report.total, report.pass, report.fail), (0, 0, 0));
        assert!(report.log.contains("1: CPUID(0xb,0x0)_generic:\t NRUN"));
    }

    #[test]
    fn test_version_filtering() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(1 << 21);
        let engine = Engine::new(&registry, drivers(&cpuid));

        // The V1_5-only reserved case is out of scope under 1.0 and 2.0.
        for token in ["1.0", "2.0"] {
            let report = engine.run(&RunRequest::new(Scope::Cpuid, token));
            assert_eq!(report.total, 1, "token {token}");
        }
        for token in ["1.5", "generic", ""] {
            let report = engine.run(&RunRequest::new(Scope::Cpuid, token));
            assert_eq!(report.total, 2, "token {token}");
        }
    }

    #[test]
    fn test_idempotence() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(1 << 21);
        let engine = Engine::new(&registry, drivers(&cpuid));
        let request = RunRequest::new(Scope::All, "generic");
        let first = engine.run(&request);
        let second = engine.run(&request);
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_mode() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(0);
        let engine = Engine::new(&registry, drivers(&cpuid));
        let report = engine.run(&RunRequest::new(Scope::ListOnly, "generic"));
        assert_eq!((report.total, report.pass, report.fail), (0, 0, 0));
        let lines: Vec<&str> = report.log.lines().collect();
        assert_eq!(
            lines,
            vec!["CPUID(0x1,0x0).ecx[21] ", "CPUID(0x1,0x0).eax[15:14] 1.5"]
        );
    }

    #[test]
    fn test_single_case_scope() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(1 << 21);
        let engine = Engine::new(&registry, drivers(&cpuid));
        let request = RunRequest::from_command("CPUID(0x1,0x0).ecx[21] 1.5");
        assert_eq!(
            request.scope,
            Scope::Single("CPUID(0x1,0x0).ecx[21]".to_string())
        );
        let report = engine.run(&request);
        assert_eq!((report.total, report.pass), (1, 1));
    }

    #[test]
    fn test_scope_parse_keywords() {
        assert_eq!(Scope::parse("cpuid"), Scope::Cpuid);
        assert_eq!(Scope::parse("cr"), Scope::Cr);
        assert_eq!(Scope::parse("msr"), Scope::Msr);
        assert_eq!(Scope::parse("all"), Scope::All);
        assert_eq!(Scope::parse("list"), Scope::ListOnly);
    }

    #[test]
    fn test_summary_line() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(0);
        let report = run_all(&registry, &cpuid);
        assert!(report.log.ends_with("Total:2, PASS:1, FAIL:1, SKIP:0\n"));
    }

    fn cr_registry(expect_excp: ExceptionCode) -> Registry {
        Registry {
            cpuid: vec![],
            cr: vec![CrCase {
                expect_bit: 1,
                read: true,
                expect_excp,
                ..CrCase::set("CR0.NE", ControlRegister::Cr0, 1 << 5, expect_excp, ALL)
            }],
            msr: vec![],
        }
    }

    #[test]
    fn test_cr_pass_requires_both_value_and_exception() {
        let cpuid = StaticCpuid::default();
        let mut cr = StaticCr::default();
        cr.values.insert(ControlRegister::Cr0, 1 << 5);

        // Register matches and exception matches: PASS.
        let registry = cr_registry(EXCP_NONE);
        let mut drv = drivers(&cpuid);
        drv.cr = Some(&cr);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Cr, "generic"));
        assert_eq!((report.total, report.pass, report.fail), (1, 1, 0));

        // Register matches but the declared exception does not: FAIL.
        let registry = cr_registry(EXCP_GP);
        let mut drv = drivers(&cpuid);
        drv.cr = Some(&cr);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Cr, "generic"));
        assert_eq!((report.total, report.pass, report.fail), (1, 0, 1));
        assert!(report.log.contains("Error: CR compliance test failed,"));
    }

    #[test]
    fn test_cr_precondition_skip() {
        let registry = Registry {
            cpuid: vec![],
            cr: vec![CrCase::set("CR4.PKS", ControlRegister::Cr4, 1 << 24, EXCP_GP, ALL)
                .with_precondition(Precondition::CpuidBitSet {
                    leaf: 0x7,
                    subleaf: 0x0,
                    register: Ecx,
                    bit: 31,
                })],
            msr: vec![],
        };
        // CPUID(0x7).ECX[31] reads as clear, so the gate declines.
        let cpuid = StaticCpuid::default();
        let cr = StaticCr::default();
        let mut drv = drivers(&cpuid);
        drv.cr = Some(&cr);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Cr, "generic"));

        // SKIP counts toward the total but neither pass nor fail.
        assert_eq!((report.total, report.pass, report.fail), (1, 0, 0));
        assert_eq!(report.skip, 1);
        assert!(report.log.contains("1: CR4.PKS:\t SKIP"));
        assert!(report.log.ends_with("Total:1, PASS:0, FAIL:0, SKIP:1\n"));
    }

    #[test]
    fn test_msr_exception_comparison() {
        let registry = Registry {
            cpuid: vec![],
            cr: vec![],
            msr: vec![MsrCase::read("MSR_IA32_TSC", 0x10, EXCP_NONE, ALL)],
        };
        let cpuid = StaticCpuid::default();
        let mut msr = StaticMsr::default();
        msr.regs.insert(0x10, (1234, EXCP_NONE));
        let mut drv = drivers(&cpuid);
        drv.msr = Some(&msr);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Msr, "generic"));
        assert_eq!((report.total, report.pass, report.fail), (1, 1, 0));
    }

    #[test]
    fn test_msr_multibyte_divergence_fails_regardless_of_expectation() {
        // Offsets 0-2 fault with the declared code, offset 3 diverges; the
        // case must fail through the multi-byte path even though the base
        // code equals the expectation.
        let registry = Registry {
            cpuid: vec![],
            cr: vec![],
            msr: vec![MsrCase::read("MSR_X2APIC_ISR", 0x810, EXCP_VE, ALL).with_size(4)],
        };
        let cpuid = StaticCpuid::default();
        let mut msr = StaticMsr {
            default_excp: EXCP_VE,
            ..StaticMsr::default()
        };
        msr.regs.insert(0x813, (0, -1));
        let mut drv = drivers(&cpuid);
        drv.msr = Some(&msr);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Msr, "generic"));
        assert_eq!((report.total, report.pass, report.fail), (1, 0, 1));
        assert!(report
            .log
            .contains("Error: MSR multiple bytes difference, MSR(810): 20(byte0) and -1(byte3)"));
    }

    #[test]
    fn test_msr_gated_expectation() {
        // With the feature bit clear the gated case expects #GP instead.
        let registry = Registry {
            cpuid: vec![],
            cr: vec![],
            msr: vec![MsrCase::read("MSR_IA32_DS_AREA", 0x600, EXCP_NONE, ALL).gated(
                Precondition::CpuidBitSet {
                    leaf: 0x1,
                    subleaf: 0x0,
                    register: Edx,
                    bit: 21,
                },
                EXCP_GP,
            )],
        };
        let cpuid = StaticCpuid::default();
        let mut msr = StaticMsr::default();
        msr.regs.insert(0x600, (0, EXCP_GP));
        let mut drv = drivers(&cpuid);
        drv.msr = Some(&msr);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Msr, "generic"));
        assert_eq!((report.pass, report.fail), (1, 0));
    }

    #[test]
    fn test_control_override_negotiation() {
        let registry = Registry {
            cpuid: vec![CpuidCase::bit(0x1, 0x0, Ecx, 24, 1, SpecVersion::V1_5)
                .with_control(8, 1 << 11)],
            cr: vec![],
            msr: vec![],
        };
        let cpuid = leaf1_cpuid(1 << 24);
        let tdcs = RecordingTdcs::new(FEATURES0_VE_REDUCE);
        let mut drv = drivers(&cpuid);
        drv.tdcs = Some(&tdcs);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Cpuid, "1.5"));
        assert_eq!((report.total, report.pass), (1, 1));
        assert_eq!(
            *tdcs.writes.borrow(),
            vec![
                (TDCS_FIELD_TD_CTL, 8, 8),
                (TDCS_FIELD_FEATURE_PV_CTL, 1 << 11, 1 << 11),
            ]
        );
    }

    #[test]
    fn test_control_negotiation_failure_is_non_fatal() {
        let registry = Registry {
            cpuid: vec![CpuidCase::bit(0x1, 0x0, Ecx, 24, 1, SpecVersion::V1_5)
                .with_control(8, 1 << 11)],
            cr: vec![],
            msr: vec![],
        };
        let cpuid = leaf1_cpuid(1 << 24);
        let tdcs = RecordingTdcs {
            fail_writes: true,
            ..RecordingTdcs::new(FEATURES0_VE_REDUCE)
        };
        let mut drv = drivers(&cpuid);
        drv.tdcs = Some(&tdcs);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Cpuid, "1.5"));
        // The probe still ran against current state.
        assert_eq!(report.total, 1);
    }

    #[test]
    fn test_control_negotiation_read_failure_is_non_fatal() {
        let registry = Registry {
            cpuid: vec![CpuidCase::bit(0x1, 0x0, Ecx, 24, 1, SpecVersion::V1_5)
                .with_control(8, 1 << 11)],
            cr: vec![],
            msr: vec![],
        };
        let cpuid = leaf1_cpuid(1 << 24);
        let tdcs = RecordingTdcs {
            fail_reads: true,
            ..RecordingTdcs::new(FEATURES0_VE_REDUCE)
        };
        let mut drv = drivers(&cpuid);
        drv.tdcs = Some(&tdcs);
        let report = Engine::new(&registry, drv).run(&RunRequest::new(Scope::Cpuid, "1.5"));
        // Negotiation aborts before any write; the probe still runs.
        assert!(tdcs.writes.borrow().is_empty());
        assert_eq!((report.total, report.pass), (1, 1));
    }

    #[test]
    fn test_structured_listing() {
        let registry = leaf1_registry();
        let cpuid = leaf1_cpuid(0);
        let engine = Engine::new(&registry, drivers(&cpuid));

        let listing = engine.list(&RunRequest::new(Scope::ListOnly, "1.5"));
        assert_eq!(listing.cpuid.len(), 2);
        assert!(listing.cr.is_empty() && listing.msr.is_empty());
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["cpuid"][0]["name"], "CPUID(0x1,0x0).ecx[21]");
        assert_eq!(
            json["cpuid"][0]["expect"]["ecx"],
            "0bxxxxxxxxxx1xxxxxxxxxxxxxxxxxxxxx"
        );
        assert_eq!(
            json["cpuid"][0]["version"],
            serde_json::json!(["1.0", "1.5", "2.0"])
        );
        assert_eq!(json["cpuid"][1]["version"], serde_json::json!(["1.5"]));

        // The version filter applies to the structured form too.
        let listing = engine.list(&RunRequest::new(Scope::ListOnly, "1.0"));
        assert_eq!(listing.cpuid.len(), 1);
    }

    #[test]
    fn test_run_request_from_command() {
        let request = RunRequest::from_command("cpuid 1.5\n");
        assert_eq!(request.scope, Scope::Cpuid);
        assert_eq!(request.version_token, "1.5");

        let request = RunRequest::from_command("all");
        assert_eq!(request.scope, Scope::All);
        assert_eq!(request.version_token, "generic");
    }

    #[test]
    fn test_log_buffer_is_bounded() {
        let mut log = LogBuffer::default();
        let line = "x".repeat(100);
        for _ in 0..1000 {
            log.push_line(&line);
        }
        assert!(log.truncated);
        assert!(log.buf.len() <= LOG_CAPACITY);
        assert!(log.buf.ends_with("...(log truncated)\n"));
    }

    #[test]
    fn test_empty_registry_reports_zero() {
        let registry = empty_registry();
        let cpuid = StaticCpuid::default();
        let report =
            Engine::new(&registry, drivers(&cpuid)).run(&RunRequest::new(Scope::All, "generic"));
        assert_eq!((report.total, report.pass, report.fail), (0, 0, 0));
        assert_eq!(report.log, "Total:0, PASS:0, FAIL:0, SKIP:0\n");
    }
}
