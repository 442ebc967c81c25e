//! External compiler / simulator process wrapping.
//!
//! Every external tool is invoked by argv with stdout/stderr captured. Each
//! child gets its own process group so that a timeout can kill the whole
//! tree; groups still alive at shutdown are reaped by [`Invoker::reap`].

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::{FaultSimControl, LogicSimControl};
use crate::error::LogicSimulationError;
use crate::tools::kill_process_group;

/// Sentinel carried by both captured streams when a child timed out.
pub const TIMEOUT_SENTINEL: &str = "TimeoutExpired";

lazy_static! {
    static ref DEFAULT_SUCCESS_RE: Regex =
        Regex::new(r"\$finish at simulation time\s+([0-9]+)ns").expect("default pattern compiles");
}

/// Outcome of an HDL source compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compilation {
    Success,
    Error,
}

/// Outcome of a logic simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicSimulation {
    Success,
    SimError,
    Timeout,
}

impl fmt::Display for LogicSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicSimulation::Success => "SUCCESS",
            LogicSimulation::SimError => "SIM_ERROR",
            LogicSimulation::Timeout => "TIMEOUT",
        })
    }
}

/// Outcome of a fault simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSimulation {
    Success,
    FsimError,
    Timeout,
}

impl fmt::Display for FaultSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultSimulation::Success => "SUCCESS",
            FaultSimulation::FsimError => "FSIM_ERROR",
            FaultSimulation::Timeout => "TIMEOUT",
        })
    }
}

enum Captured {
    Finished {
        success: bool,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

/// Serial wrapper around the external assembler, HDL compiler and the two
/// simulators.
#[derive(Debug, Default)]
pub struct Invoker {
    /// Process groups of children that have not been waited on.
    active_groups: Vec<u32>,
}

impl Invoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `argv` in its own process group and waits for it, bounded by
    /// `limit` when given. On timeout the whole group is killed.
    async fn run_captured(
        &mut self,
        argv: &[String],
        limit: Option<f64>,
    ) -> anyhow::Result<Captured> {
        let (program, args) = argv.split_first().context("empty command line")?;
        debug!(?argv, ?limit, "executing");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        let child = command
            .spawn()
            .with_context(|| format!("failed to spawn '{program}'"))?;
        let pgid = child.id();
        if let Some(pgid) = pgid {
            self.active_groups.push(pgid);
        }

        let waited = match limit {
            Some(secs) => match timeout(Duration::from_secs_f64(secs), child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?argv, "child timed out after {secs}s, killing its process group");
                    if let Some(pgid) = pgid {
                        kill_process_group(pgid);
                        self.active_groups.retain(|&g| g != pgid);
                    }
                    return Ok(Captured::TimedOut);
                }
            },
            None => child.wait_with_output().await,
        };

        if let Some(pgid) = pgid {
            self.active_groups.retain(|&g| g != pgid);
        }
        let output = waited.with_context(|| format!("failed to wait for '{program}'"))?;
        Ok(Captured::Finished {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Generic capture of an external command. On timeout both streams take
    /// the [`TIMEOUT_SENTINEL`] value.
    pub async fn execute(
        &mut self,
        argv: &[String],
        limit: Option<f64>,
    ) -> anyhow::Result<(String, String)> {
        match self.run_captured(argv, limit).await? {
            Captured::Finished { stdout, stderr, .. } => Ok((stdout, stderr)),
            Captured::TimedOut => Ok((TIMEOUT_SENTINEL.to_string(), TIMEOUT_SENTINEL.to_string())),
        }
    }

    /// Cross-assembles the test program. Success means a clean exit with an
    /// empty stderr.
    pub async fn compile_assembly(&mut self, argv: &[String]) -> anyhow::Result<bool> {
        match self.run_captured(argv, None).await? {
            Captured::Finished {
                success, stderr, ..
            } => Ok(success && stderr.is_empty()),
            Captured::TimedOut => Ok(false),
        }
    }

    /// Compiles the HDL sources. Anything on stderr is an error.
    pub async fn compile_sources(&mut self, argv: &[String]) -> anyhow::Result<Compilation> {
        let (_, stderr) = self.execute(argv, None).await?;
        if stderr.is_empty() {
            Ok(Compilation::Success)
        } else {
            debug!(%stderr, "HDL compilation produced errors");
            Ok(Compilation::Error)
        }
    }

    /// Runs a logic simulation and extracts the test application time.
    ///
    /// On a clean exit, stdout is scanned with the control's success pattern
    /// (default: `$finish at simulation time <N>ns`); the configured capture
    /// group is parsed as a non-negative integer and appended to `tat_out`.
    /// A non-matching pattern or an unparseable capture indicates a
    /// misconfiguration and surfaces as [`LogicSimulationError`].
    pub async fn logic_simulate(
        &mut self,
        argv: &[String],
        control: &LogicSimControl,
        tat_out: &mut Vec<u64>,
    ) -> anyhow::Result<LogicSimulation> {
        let (stdout, stderr) = self.execute(argv, control.timeout).await?;
        if stdout == TIMEOUT_SENTINEL && stderr == TIMEOUT_SENTINEL {
            return Ok(LogicSimulation::Timeout);
        }
        if !stderr.is_empty() {
            debug!(%stderr, "logic simulation produced errors");
            return Ok(LogicSimulation::SimError);
        }

        let compiled;
        let pattern = match &control.success_regexp {
            Some(src) => {
                compiled = Regex::new(src)
                    .with_context(|| format!("bad success regular expression '{src}'"))?;
                &compiled
            }
            None => &*DEFAULT_SUCCESS_RE,
        };

        let captures = pattern
            .captures(&stdout)
            .ok_or_else(|| LogicSimulationError::NoMatch {
                command: argv.to_vec(),
            })?;
        let capture = captures
            .get(control.tat_regexp_capture_group)
            .ok_or_else(|| LogicSimulationError::NoMatch {
                command: argv.to_vec(),
            })?
            .as_str();
        let tat = capture
            .parse::<u64>()
            .map_err(|_| LogicSimulationError::BadTat {
                capture: capture.to_string(),
            })?;

        debug!(tat, "logic simulation succeeded");
        tat_out.push(tat);
        Ok(LogicSimulation::Success)
    }

    /// Runs a fault simulation; classification mirrors the logic simulation
    /// without TaT extraction.
    pub async fn fault_simulate(
        &mut self,
        argv: &[String],
        control: &FaultSimControl,
    ) -> anyhow::Result<FaultSimulation> {
        let (stdout, stderr) = self.execute(argv, control.timeout).await?;
        if stdout == TIMEOUT_SENTINEL && stderr == TIMEOUT_SENTINEL {
            return Ok(FaultSimulation::Timeout);
        }
        if !stderr.is_empty() {
            debug!(%stderr, "fault simulation produced errors");
            return Ok(FaultSimulation::FsimError);
        }
        Ok(FaultSimulation::Success)
    }

    /// Kills every process group still attached to this invoker.
    pub fn reap(&mut self) {
        for pgid in self.active_groups.drain(..) {
            warn!(pgid, "reaping leftover simulator process group");
            kill_process_group(pgid);
        }
    }
}

/// Writes a fault-campaign script: one `<directive> <value>` line per entry.
/// A repeated directive overwrites the earlier value in place.
pub fn create_fcm_script(path: &Path, directives: &[(&str, &str)]) -> anyhow::Result<()> {
    let mut ordered: Vec<(&str, &str)> = Vec::new();
    for &(key, value) in directives {
        match ordered.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => ordered.push((key, value)),
        }
    }

    let mut script = String::new();
    for (key, value) in ordered {
        script.push_str(key);
        script.push(' ');
        script.push_str(value);
        script.push('\n');
    }
    std::fs::write(path, script)
        .with_context(|| format!("failed to write FCM script {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn execute_captures_both_streams() {
        let mut invoker = Invoker::new();
        let (stdout, stderr) = invoker
            .execute(&sh("echo out; echo err >&2"), None)
            .await
            .unwrap();
        assert_eq!(stdout, "out\n");
        assert_eq!(stderr, "err\n");
    }

    #[tokio::test]
    async fn execute_times_out_with_sentinel() {
        let mut invoker = Invoker::new();
        let (stdout, stderr) = invoker.execute(&sh("sleep 5"), Some(0.1)).await.unwrap();
        assert_eq!(stdout, TIMEOUT_SENTINEL);
        assert_eq!(stderr, TIMEOUT_SENTINEL);
        assert!(invoker.active_groups.is_empty());
    }

    #[tokio::test]
    async fn assembly_compilation_requires_clean_exit_and_silence() {
        let mut invoker = Invoker::new();
        assert!(invoker.compile_assembly(&sh("true")).await.unwrap());
        assert!(!invoker.compile_assembly(&sh("false")).await.unwrap());
        assert!(!invoker
            .compile_assembly(&sh("echo bad >&2"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn source_compilation_fails_on_stderr() {
        let mut invoker = Invoker::new();
        assert_eq!(
            invoker.compile_sources(&sh("echo fine")).await.unwrap(),
            Compilation::Success
        );
        assert_eq!(
            invoker
                .compile_sources(&sh("echo broken >&2"))
                .await
                .unwrap(),
            Compilation::Error
        );
    }

    #[tokio::test]
    async fn logic_simulation_extracts_tat_with_default_pattern() {
        let mut invoker = Invoker::new();
        let mut tat = Vec::new();
        let outcome = invoker
            .logic_simulate(
                &sh(r"echo '$finish at simulation time  482140ns'"),
                &LogicSimControl::default(),
                &mut tat,
            )
            .await
            .unwrap();
        assert_eq!(outcome, LogicSimulation::Success);
        assert_eq!(tat, vec![482140]);
    }

    #[tokio::test]
    async fn logic_simulation_extracts_tat_with_custom_pattern() {
        let mut invoker = Invoker::new();
        let control = LogicSimControl {
            success_regexp: Some(r"test application time = ([0-9]+) clock cycles".to_string()),
            ..LogicSimControl::default()
        };
        let mut tat = Vec::new();
        let outcome = invoker
            .logic_simulate(
                &sh("echo '[TESTBENCH] 482140ns: test application time = 48209 clock cycles (482090 ns)'"),
                &control,
                &mut tat,
            )
            .await
            .unwrap();
        assert_eq!(outcome, LogicSimulation::Success);
        assert_eq!(tat, vec![48209]);
    }

    #[tokio::test]
    async fn logic_simulation_classifies_stderr_and_timeout() {
        let mut invoker = Invoker::new();
        let mut tat = Vec::new();
        assert_eq!(
            invoker
                .logic_simulate(&sh("echo oops >&2"), &LogicSimControl::default(), &mut tat)
                .await
                .unwrap(),
            LogicSimulation::SimError
        );

        let control = LogicSimControl {
            timeout: Some(0.1),
            ..LogicSimControl::default()
        };
        assert_eq!(
            invoker
                .logic_simulate(&sh("sleep 5"), &control, &mut tat)
                .await
                .unwrap(),
            LogicSimulation::Timeout
        );
        assert!(tat.is_empty());
    }

    #[tokio::test]
    async fn non_matching_pattern_is_fatal() {
        let mut invoker = Invoker::new();
        let mut tat = Vec::new();
        let err = invoker
            .logic_simulate(&sh("echo nothing useful"), &LogicSimControl::default(), &mut tat)
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<LogicSimulationError>().is_some());
    }

    #[tokio::test]
    async fn unparseable_capture_is_fatal() {
        let mut invoker = Invoker::new();
        let control = LogicSimControl {
            success_regexp: Some(r"\$finish.*?(\d+n)".to_string()),
            ..LogicSimControl::default()
        };
        let mut tat = Vec::new();
        let err = invoker
            .logic_simulate(
                &sh(r"echo '$finish at simulation time 482140ns'"),
                &control,
                &mut tat,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LogicSimulationError>(),
            Some(LogicSimulationError::BadTat { .. })
        ));
    }

    #[tokio::test]
    async fn fault_simulation_classification() {
        let mut invoker = Invoker::new();
        let control = FaultSimControl::default();
        assert_eq!(
            invoker
                .fault_simulate(&sh("echo fsim done"), &control)
                .await
                .unwrap(),
            FaultSimulation::Success
        );
        assert_eq!(
            invoker
                .fault_simulate(&sh("echo err >&2"), &control)
                .await
                .unwrap(),
            FaultSimulation::FsimError
        );
        assert_eq!(
            invoker
                .fault_simulate(&sh("sleep 5"), &FaultSimControl { timeout: Some(0.1) })
                .await
                .unwrap(),
            FaultSimulation::Timeout
        );
    }

    #[test]
    fn fcm_script_overwrites_repeated_directives() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fcm.tcl");
        create_fcm_script(
            &path,
            &[
                ("set_config", "-global_max_jobs 64"),
                ("fsim", "-verbose"),
                ("report", "-campaign NAME -report fsim_out.rpt -overwrite"),
                (
                    "report",
                    "-campaign NAME -report fsim_out_hier.rpt -overwrite -hierarchical 3",
                ),
            ],
        )
        .unwrap();

        let expected = "\
set_config -global_max_jobs 64
fsim -verbose
report -campaign NAME -report fsim_out_hier.rpt -overwrite -hierarchical 3
";
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
    }
}
