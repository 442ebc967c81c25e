use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Run settings for one compaction campaign, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// ISA description consumed by the assembly handlers.
    pub isa_spec: PathBuf,
    /// Assembly sources that make up the self-test program.
    pub asm_sources: Vec<PathBuf>,
    /// argv of the cross-assembler invocation.
    pub assembly_compilation_instructions: Vec<String>,
    /// argv of the HDL compilation step; omitted when the model is prebuilt.
    #[serde(default)]
    pub vcs_compilation_instructions: Option<Vec<String>>,
    /// argv of the logic simulation.
    pub vcs_logic_simulation_instructions: Vec<String>,
    #[serde(default)]
    pub vcs_logic_simulation_control: LogicSimControl,
    /// argv of the fault simulation.
    pub zoix_fault_simulation_instructions: Vec<String>,
    #[serde(default)]
    pub zoix_fault_simulation_control: FaultSimControl,
    /// Fault report produced by the fault simulator, re-read after every run.
    pub fsim_report: PathBuf,
    /// Name of the coverage formula to evaluate from the report.
    pub coverage_formula: String,
    /// Translation of fault-attribute names to trace column names.
    pub zoix_to_trace: BTreeMap<String, String>,
    /// Trace dialect key, e.g. "CV32E40P".
    pub processor_name: String,
    /// Cycle-accurate execution trace of the unmodified program.
    pub processor_trace: PathBuf,
    /// ELF of the compiled program, for PC-to-source resolution.
    pub elf_file: PathBuf,
    /// Name of the program-counter column in the trace schema.
    #[serde(default = "default_pc_column")]
    pub pc_column: String,
    /// Permutations applied to the candidate list before the loop starts.
    #[serde(default = "default_times_to_shuffle")]
    pub times_to_shuffle: usize,
    /// Override for the backup archiver argv; defaults to `zip -j`.
    #[serde(default)]
    pub archive_instructions: Option<Vec<String>>,
}

/// Control knobs of the logic simulation step.
#[derive(Debug, Clone, Deserialize)]
pub struct LogicSimControl {
    /// Wall-clock timeout in seconds; unbounded when omitted.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Pattern that marks a successful simulation and captures the TaT.
    #[serde(default)]
    pub success_regexp: Option<String>,
    /// Capture group of `success_regexp` holding the TaT value.
    #[serde(default = "default_tat_capture_group")]
    pub tat_regexp_capture_group: usize,
}

impl Default for LogicSimControl {
    fn default() -> Self {
        Self {
            timeout: None,
            success_regexp: None,
            tat_regexp_capture_group: default_tat_capture_group(),
        }
    }
}

/// Control knobs of the fault simulation step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaultSimControl {
    /// Wall-clock timeout in seconds; unbounded when omitted.
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl Settings {
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }
}

fn default_pc_column() -> String {
    "PC".to_string()
}

fn default_times_to_shuffle() -> usize {
    100
}

fn default_tat_capture_group() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_settings_round_trip() {
        let toml_src = r#"
            isa_spec = "isa/rv32.toml"
            asm_sources = ["sbst/test1.S", "sbst/test2.S"]
            assembly_compilation_instructions = ["make", "-C", "sbst", "all"]
            vcs_compilation_instructions = ["make", "vcs/compile"]
            vcs_logic_simulation_instructions = ["./simv", "+firmware=sbst.hex"]
            zoix_fault_simulation_instructions = ["fsim", "-i", "fcm.tcl"]
            fsim_report = "fsim_out.rpt"
            coverage_formula = "Diagnostic Coverage"
            processor_name = "CV32E40P"
            processor_trace = "trace.log"
            elf_file = "sbst.elf"

            [zoix_to_trace]
            PC_IF = "PC"
            sim_time = "Time"

            [vcs_logic_simulation_control]
            timeout = 120.0
            success_regexp = 'test application time = ([0-9]+)'
            tat_regexp_capture_group = 1

            [zoix_fault_simulation_control]
            timeout = 3600.0
        "#;

        let settings: Settings = toml::from_str(toml_src).unwrap();
        assert_eq!(settings.asm_sources.len(), 2);
        assert_eq!(settings.pc_column, "PC");
        assert_eq!(settings.times_to_shuffle, 100);
        assert_eq!(settings.vcs_logic_simulation_control.timeout, Some(120.0));
        assert_eq!(
            settings.vcs_logic_simulation_control.tat_regexp_capture_group,
            1
        );
        assert_eq!(settings.zoix_to_trace["PC_IF"], "PC");
        assert!(settings.archive_instructions.is_none());
    }

    #[test]
    fn control_sections_are_optional() {
        let toml_src = r#"
            isa_spec = "isa.toml"
            asm_sources = ["a.S"]
            assembly_compilation_instructions = ["as", "a.S"]
            vcs_logic_simulation_instructions = ["./simv"]
            zoix_fault_simulation_instructions = ["fsim"]
            fsim_report = "rpt"
            coverage_formula = "DC"
            processor_name = "CV32E40P"
            processor_trace = "trace.log"
            elf_file = "a.elf"

            [zoix_to_trace]
            PC = "PC"
        "#;

        let settings: Settings = toml::from_str(toml_src).unwrap();
        assert!(settings.vcs_compilation_instructions.is_none());
        assert!(settings.vcs_logic_simulation_control.timeout.is_none());
        assert!(settings.vcs_logic_simulation_control.success_regexp.is_none());
        assert!(settings.zoix_fault_simulation_control.timeout.is_none());
    }
}
