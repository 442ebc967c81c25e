//! Vendor fault-report ingestion.
//!
//! A fault report is a text file containing up to three section kinds:
//!
//! ```text
//! FaultList SAF {
//!     <  1> ON 0 {PORT "tb.dut.cellA.ZN"}(* "test1"->PC=30551073; *)
//!         -- 1 {PORT "tb.dut.cellA.A1"}
//! }
//! StatusGroups {
//!     SA "Safe" (UT < UB < UR UU);
//! }
//! Coverage {
//!     "Observational Coverage" = "DD/(NA + DA + DN + DD)";
//! }
//! ```
//!
//! Each section has a dedicated parser; [`FaultReport`] bundles the parsed
//! sections of one report file and is the value the coverage engine works on.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::ParseError;

/// One simulated fault.
///
/// Exactly one fault per equivalence class is the *prime* and carries
/// `equivalent_faults` (the class size, including itself). Every other class
/// member carries `equivalent_to`, an index into the owning fault list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fault {
    /// Two-letter status code, e.g. `ON`, `NN`, `UU`.
    pub fault_status: String,
    /// Fault model token: `0`, `1`, `R`, `F` or `~`.
    pub fault_type: String,
    /// Optional timing annotation, e.g. `["6.532ns"]` or `["6", "4", "26"]`.
    pub timing_info: Option<Vec<String>>,
    /// Hierarchical signal paths the fault is attached to.
    pub fault_sites: Vec<String>,
    /// Attributes from the `(* ... *)` block, e.g. `PC` and `time`.
    pub fault_attributes: Option<BTreeMap<String, String>>,
    /// Class size; present on the prime of each equivalence class.
    pub equivalent_faults: Option<usize>,
    /// Index of the prime fault; present on non-prime class members.
    pub equivalent_to: Option<usize>,
}

impl Fault {
    pub fn is_prime(&self) -> bool {
        self.equivalent_to.is_none()
    }
}

/// A named aggregation of fault-status codes, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusGroup {
    pub name: String,
    pub members: Vec<String>,
}

/// A named coverage formula with its normalised expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageFormula {
    pub name: String,
    pub expr: String,
}

/// The parsed sections of one fault-report file.
///
/// Sections missing from the file parse to empty collections; the coverage
/// engine reports the resulting lookup misses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultReport {
    pub faults: Vec<Fault>,
    pub groups: Vec<StatusGroup>,
    pub formulas: Vec<CoverageFormula>,
}

impl FaultReport {
    /// Reads and parses a report file. The report is re-read after every
    /// fault simulation, so this does not cache anything.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fault report {}", path.display()))?;
        Self::from_text(&text)
    }

    pub fn from_text(text: &str) -> anyhow::Result<Self> {
        let faults = match extract_block(text, "FaultList") {
            Some(section) => parse_fault_list(section)?,
            None => {
                debug!("fault report has no FaultList section");
                Vec::new()
            }
        };
        let groups = match extract_block(text, "StatusGroups") {
            Some(section) => parse_status_groups(section)?,
            None => {
                debug!("fault report has no StatusGroups section");
                Vec::new()
            }
        };
        let formulas = match extract_block(text, "Coverage") {
            Some(section) => parse_coverage(section)?,
            None => {
                debug!("fault report has no Coverage section");
                Vec::new()
            }
        };
        Ok(Self {
            faults,
            groups,
            formulas,
        })
    }
}

/// Slices the brace-balanced block starting at the line whose first token is
/// `keyword`. Nested braces (fault sites) are accounted for.
fn extract_block<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed
            .strip_prefix(keyword)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '{'))
        {
            let start = offset + (line.len() - trimmed.len());
            let open = text[start..].find('{')?;
            let mut depth = 0usize;
            for (i, c) in text[start + open..].char_indices() {
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(&text[start..start + open + i + 1]);
                        }
                    }
                    _ => {}
                }
            }
            return None;
        }
        offset += line.len();
    }
    None
}

const FAULT_LIST: &str = "FaultList";
const STATUS_GROUPS: &str = "StatusGroups";
const COVERAGE: &str = "Coverage";

const FAULT_TYPES: [&str; 5] = ["0", "1", "R", "F", "~"];

/// Parses a `FaultList MODEL { ... }` section into its fault records with
/// equivalence classes resolved.
pub fn parse_fault_list(text: &str) -> Result<Vec<Fault>, ParseError> {
    let mut faults: Vec<Fault> = Vec::new();
    let mut prime: Option<usize> = None;
    let mut in_body = false;

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if !in_body {
            let rest = line.strip_prefix(FAULT_LIST).ok_or_else(|| {
                ParseError::new(FAULT_LIST, lineno, format!("expected section header, got '{line}'"))
            })?;
            let model = rest.trim_end_matches('{').trim();
            if model.is_empty() {
                return Err(ParseError::new(FAULT_LIST, lineno, "missing fault model"));
            }
            debug!(model, "parsing fault list");
            in_body = true;
            continue;
        }

        if line == "}" {
            return Ok(faults);
        }

        if let Some(rest) = line.strip_prefix('<') {
            // Prime line: "<  n> STATUS TYPE [(timing)] {CLASS "site"} [(* .. *)]"
            let (count, rest) = rest
                .split_once('>')
                .ok_or_else(|| ParseError::new(FAULT_LIST, lineno, "unterminated '< n >'"))?;
            count.trim().parse::<usize>().map_err(|_| {
                ParseError::new(FAULT_LIST, lineno, format!("bad equivalence count '{}'", count.trim()))
            })?;

            let mut cursor = rest.trim_start();
            let status = take_token(&mut cursor);
            if status.len() != 2 || !status.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ParseError::new(
                    FAULT_LIST,
                    lineno,
                    format!("bad fault status '{status}'"),
                ));
            }

            let mut fault = parse_fault_body(cursor, lineno)?;
            fault.fault_status = status.to_string();
            fault.equivalent_faults = Some(1);
            prime = Some(faults.len());
            faults.push(fault);
        } else if let Some(rest) = line.strip_prefix("--") {
            // Continuation line: same shape minus the count, status and
            // attributes; status is inherited from the prime.
            let prime_idx = prime.ok_or_else(|| {
                ParseError::new(FAULT_LIST, lineno, "continuation line before any fault")
            })?;
            let mut fault = parse_fault_body(rest.trim_start(), lineno)?;
            fault.fault_status = faults[prime_idx].fault_status.clone();
            fault.equivalent_to = Some(prime_idx);
            faults.push(fault);
            *faults[prime_idx]
                .equivalent_faults
                .as_mut()
                .expect("prime fault carries a class size") += 1;
        } else {
            return Err(ParseError::new(
                FAULT_LIST,
                lineno,
                format!("unexpected token '{line}'"),
            ));
        }
    }

    Err(ParseError::new(FAULT_LIST, text.lines().count(), "unterminated section"))
}

/// Parses the part of a fault line after the status code: fault type,
/// optional timing list, fault sites and optional attribute block.
fn parse_fault_body(input: &str, lineno: usize) -> Result<Fault, ParseError> {
    let mut cursor = input.trim_start();

    let fault_type = take_token(&mut cursor);
    if !FAULT_TYPES.contains(&fault_type) {
        return Err(ParseError::new(
            FAULT_LIST,
            lineno,
            format!("bad fault type '{fault_type}'"),
        ));
    }

    cursor = cursor.trim_start();
    let timing_info = if cursor.starts_with('(') && !cursor.starts_with("(*") {
        let close = cursor
            .find(')')
            .ok_or_else(|| ParseError::new(FAULT_LIST, lineno, "unterminated timing list"))?;
        let inner = &cursor[1..close];
        cursor = &cursor[close + 1..];
        Some(inner.split(',').map(|t| t.trim().to_string()).collect())
    } else {
        None
    };

    cursor = cursor.trim_start();
    let Some(rest) = cursor.strip_prefix('{') else {
        return Err(ParseError::new(FAULT_LIST, lineno, "missing fault sites"));
    };
    let close = rest
        .find('}')
        .ok_or_else(|| ParseError::new(FAULT_LIST, lineno, "unterminated fault sites"))?;
    let sites_src = &rest[..close];
    cursor = &rest[close + 1..];

    let mut site_parts = sites_src.trim().splitn(2, char::is_whitespace);
    let class = site_parts.next().unwrap_or_default();
    if class != "PORT" && class != "FLOP" {
        return Err(ParseError::new(
            FAULT_LIST,
            lineno,
            format!("bad fault site class '{class}'"),
        ));
    }
    let fault_sites = quoted_strings(site_parts.next().unwrap_or_default());
    if fault_sites.is_empty() {
        return Err(ParseError::new(FAULT_LIST, lineno, "empty fault site list"));
    }

    cursor = cursor.trim_start();
    let fault_attributes = if let Some(rest) = cursor.strip_prefix("(*") {
        let close = rest
            .find("*)")
            .ok_or_else(|| ParseError::new(FAULT_LIST, lineno, "unterminated attribute block"))?;
        Some(parse_attributes(&rest[..close], lineno)?)
    } else {
        None
    };

    Ok(Fault {
        fault_status: String::new(),
        fault_type: fault_type.to_string(),
        timing_info,
        fault_sites,
        fault_attributes,
        equivalent_faults: None,
        equivalent_to: None,
    })
}

/// Parses `"test1"->PC=30551073; "test1"->time="45ns";` pairs. The test-name
/// prefix is dropped; quoted values have their surrounding whitespace
/// stripped, units are kept verbatim.
fn parse_attributes(input: &str, lineno: usize) -> Result<BTreeMap<String, String>, ParseError> {
    let mut attributes = BTreeMap::new();
    for pair in input.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (_test, assignment) = pair.split_once("->").ok_or_else(|| {
            ParseError::new(FAULT_LIST, lineno, format!("bad attribute pair '{pair}'"))
        })?;
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            ParseError::new(FAULT_LIST, lineno, format!("bad attribute pair '{pair}'"))
        })?;
        let value = value.trim().trim_matches('"').trim();
        attributes.insert(key.trim().to_string(), value.to_string());
    }
    Ok(attributes)
}

/// Parses a `StatusGroups { ... }` section into its ordered groups. Both `<`
/// and `,` member separators are accepted and dropped; labels are discarded.
pub fn parse_status_groups(text: &str) -> Result<Vec<StatusGroup>, ParseError> {
    let mut groups = Vec::new();
    let mut in_body = false;

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if !in_body {
            if !line.starts_with(STATUS_GROUPS) {
                return Err(ParseError::new(
                    STATUS_GROUPS,
                    lineno,
                    format!("expected section header, got '{line}'"),
                ));
            }
            in_body = true;
            continue;
        }

        if line == "}" {
            return Ok(groups);
        }

        let mut cursor = line;
        let name = take_token(&mut cursor);
        if name.len() != 2 || !name.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ParseError::new(
                STATUS_GROUPS,
                lineno,
                format!("bad group code '{name}'"),
            ));
        }

        let open = cursor
            .find('(')
            .ok_or_else(|| ParseError::new(STATUS_GROUPS, lineno, "missing member list"))?;
        let close = cursor
            .find(')')
            .ok_or_else(|| ParseError::new(STATUS_GROUPS, lineno, "unterminated member list"))?;
        let members: Vec<String> = cursor[open + 1..close]
            .split(|c: char| c.is_whitespace() || c == ',' || c == '<')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        for member in &members {
            if member.len() != 2 || !member.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ParseError::new(
                    STATUS_GROUPS,
                    lineno,
                    format!("bad status code '{member}' in group {name}"),
                ));
            }
        }

        groups.push(StatusGroup {
            name: name.to_string(),
            members,
        });
    }

    Err(ParseError::new(STATUS_GROUPS, text.lines().count(), "unterminated section"))
}

const FORMAT_SPECIFIERS: [&str; 3] = ["FLT", "PCT", "INT"];

/// Parses a `Coverage { ... }` section into its ordered formulae. Format
/// specifiers are stripped (keeping the parenthesised inner expression) and
/// `^` is rewritten to `**`.
pub fn parse_coverage(text: &str) -> Result<Vec<CoverageFormula>, ParseError> {
    let mut formulas = Vec::new();
    let mut in_body = false;

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if !in_body {
            if !line.starts_with(COVERAGE) {
                return Err(ParseError::new(
                    COVERAGE,
                    lineno,
                    format!("expected section header, got '{line}'"),
                ));
            }
            in_body = true;
            continue;
        }

        if line == "}" {
            return Ok(formulas);
        }

        let (lhs, rhs) = line.split_once('=').ok_or_else(|| {
            ParseError::new(COVERAGE, lineno, format!("expected 'name = \"expr\";', got '{line}'"))
        })?;
        let name = lhs.trim().trim_matches('"').to_string();
        let rhs = rhs.trim().trim_end_matches(';').trim();
        if !(rhs.starts_with('"') && rhs.ends_with('"') && rhs.len() >= 2) {
            return Err(ParseError::new(
                COVERAGE,
                lineno,
                format!("expression of '{name}' is not quoted"),
            ));
        }
        let expr = normalise_expression(&rhs[1..rhs.len() - 1]);
        formulas.push(CoverageFormula { name, expr });
    }

    Err(ParseError::new(COVERAGE, text.lines().count(), "unterminated section"))
}

/// Drops a single outermost `FLT|PCT|INT(...)` wrapper and rewrites `^` to
/// the evaluator's power operator.
fn normalise_expression(expr: &str) -> String {
    let expr = expr.trim();
    let stripped = FORMAT_SPECIFIERS
        .iter()
        .find_map(|spec| {
            let rest = expr.strip_prefix(spec)?;
            (rest.starts_with('(') && rest.ends_with(')') && balanced(rest)).then_some(rest)
        })
        .unwrap_or(expr);
    stripped.replace('^', "**")
}

/// True when the leading '(' of `s` matches its final ')'.
fn balanced(s: &str) -> bool {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

fn take_token<'a>(cursor: &mut &'a str) -> &'a str {
    let trimmed = cursor.trim_start();
    let end = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());
    let (token, rest) = trimmed.split_at(end);
    *cursor = rest;
    token
}

fn quoted_strings(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = input;
    while let Some(open) = rest.find('"') {
        let Some(close) = rest[open + 1..].find('"') else {
            break;
        };
        out.push(rest[open + 1..open + 1 + close].to_string());
        rest = &rest[open + close + 2..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fault(status: &str, fault_type: &str, sites: &[&str]) -> Fault {
        Fault {
            fault_status: status.to_string(),
            fault_type: fault_type.to_string(),
            fault_sites: sites.iter().map(|s| s.to_string()).collect(),
            ..Fault::default()
        }
    }

    fn attrs(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn stuck_at_fault_list() {
        let sample = r#"
            FaultList SAF {
                <  1> ON 0 {PORT "tb.dut.subunit_a.subunit_b.cellA.ZN"}(* "test1"->PC=30551073; "test1"->time="45ns"; *)
                    -- 1 {PORT "tb.dut.subunit_a.subunit_b.cellA.A1"}
                    -- 1 {PORT "tb.dut.subunit_a.subunit_b.cellA.A2"}
                    -- 0 {PORT "tb.dut.subunit_a.subunit_b.operand_b[27:3]"}
            }
        "#;

        let faults = parse_fault_list(sample).unwrap();

        let mut expected = vec![
            fault("ON", "0", &["tb.dut.subunit_a.subunit_b.cellA.ZN"]),
            fault("ON", "1", &["tb.dut.subunit_a.subunit_b.cellA.A1"]),
            fault("ON", "1", &["tb.dut.subunit_a.subunit_b.cellA.A2"]),
            fault("ON", "0", &["tb.dut.subunit_a.subunit_b.operand_b[27:3]"]),
        ];
        expected[0].fault_attributes = attrs(&[("PC", "30551073"), ("time", "45ns")]);
        expected[0].equivalent_faults = Some(4);
        expected[1].equivalent_to = Some(0);
        expected[2].equivalent_to = Some(0);
        expected[3].equivalent_to = Some(0);

        assert_eq!(faults, expected);
    }

    #[test]
    fn transition_delay_fault_list() {
        let sample = r#"
            FaultList TDF {
                <  1> NN F {PORT "tb.dut.subunit_c.U1528.CI"}
                <  1> ON R {PORT "tb.dut.subunit_c.U1528.CO"}(* "test1"->PC_IF=00000d1c; "test1"->sim_time="   8905ns"; *)
                      -- R {PORT "tb.dut.subunit_c.U28.A"}
            }
        "#;

        let faults = parse_fault_list(sample).unwrap();

        let mut expected = vec![
            fault("NN", "F", &["tb.dut.subunit_c.U1528.CI"]),
            fault("ON", "R", &["tb.dut.subunit_c.U1528.CO"]),
            fault("ON", "R", &["tb.dut.subunit_c.U28.A"]),
        ];
        expected[0].equivalent_faults = Some(1);
        expected[1].equivalent_faults = Some(2);
        expected[1].fault_attributes = attrs(&[("PC_IF", "00000d1c"), ("sim_time", "8905ns")]);
        expected[2].equivalent_to = Some(1);

        assert_eq!(faults, expected);
    }

    #[test]
    fn small_delay_defect_fault_list() {
        let sample = r#"
            FaultList TDF {
                <  1> NN F (6.532ns) {PORT "tb.dut.subunit_c.U1528.CI"}
                <  1> ON F (9.432ns) {PORT "tb.dut.subunit_c.U1528.S"}(*  "test1"->PC_IF=00000d1c; *)
                      -- F (1.532ns) {PORT "tb.dut.subunit_c.U27.A"}
                      -- ~ (6,4,26) {FLOP "tb.dut.subunit_d.reg_q[0]"}
            }
        "#;

        let faults = parse_fault_list(sample).unwrap();

        assert_eq!(faults.len(), 4);
        assert_eq!(faults[0].timing_info, Some(vec!["6.532ns".to_string()]));
        assert_eq!(faults[0].equivalent_faults, Some(1));
        assert_eq!(faults[1].equivalent_faults, Some(3));
        assert_eq!(
            faults[3].timing_info,
            Some(vec!["6".to_string(), "4".to_string(), "26".to_string()])
        );
        assert_eq!(faults[3].fault_type, "~");
        assert_eq!(faults[3].fault_sites, vec!["tb.dut.subunit_d.reg_q[0]"]);
        assert_eq!(faults[3].equivalent_to, Some(1));
        assert!(faults[3].fault_attributes.is_none());
    }

    #[test]
    fn fault_without_attributes_has_none() {
        let sample = r#"
            FaultList SAF {
                <  1> NN 0 {PORT "tb.a"}
            }
        "#;
        let faults = parse_fault_list(sample).unwrap();
        assert_eq!(faults.len(), 1);
        assert!(faults[0].fault_attributes.is_none());
    }

    #[test]
    fn fault_list_rejects_garbage() {
        let sample = r#"
            FaultList SAF {
                this is not a fault
            }
        "#;
        let err = parse_fault_list(sample).unwrap_err();
        assert_eq!(err.section, "FaultList");
        assert_eq!(err.line, 3);
    }

    #[test]
    fn status_groups_comma_separated() {
        let sample = r#"
        StatusGroups {
            SA "Safe" (UT, UB, UR, UU);
            SU "Safe Unobserved" (NN, NC, NO, NT);
            DA "Dangerous Assumed" (HA, HM, HT, OA, OZ, IA, IP, IF, IX);
            DN "Dangerous Not Diagnosed" (PN, ON, PP, OP, NP, AN, AP);
            DD "Dangerous Diagnosed" (PD, OD, ND, AD);
        }
        "#;

        let groups = parse_status_groups(sample).unwrap();
        assert_eq!(groups.len(), 5);
        assert_eq!(groups[0].name, "SA");
        assert_eq!(groups[0].members, vec!["UT", "UB", "UR", "UU"]);
        assert_eq!(groups[3].name, "DN");
        assert_eq!(
            groups[3].members,
            vec!["PN", "ON", "PP", "OP", "NP", "AN", "AP"]
        );
    }

    #[test]
    fn status_groups_precedence_separated() {
        let sample = r#"
        StatusGroups {
            SA "Safe" (UT < UB < UR UU);
        }
        "#;

        let groups = parse_status_groups(sample).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec!["UT", "UB", "UR", "UU"]);
    }

    #[test]
    fn coverage_unquoted_and_quoted_names() {
        let sample = r#"
        Coverage {
            Coverage_1 = "AA + BB + CC";
            "Coverage_2" = "(DD + DN)/(NA + DA + DN + DD + SU)";
        }
        "#;

        let formulas = parse_coverage(sample).unwrap();
        assert_eq!(formulas.len(), 2);
        assert_eq!(formulas[0].name, "Coverage_1");
        assert_eq!(formulas[0].expr, "AA + BB + CC");
        assert_eq!(formulas[1].name, "Coverage_2");
        assert_eq!(formulas[1].expr, "(DD + DN)/(NA + DA + DN + DD + SU)");
    }

    #[test]
    fn coverage_strips_format_specifiers() {
        let sample = r#"
        Coverage {
            "Coverage_1" = "FLT(AA + BB + CC)";
            Coverage_2 = "PCT((DD + DN)/(NA + DA + DN + DD + SU))";
            Coverage_3 = "INT(FF+CC*2)";
        }
        "#;

        let formulas = parse_coverage(sample).unwrap();
        assert_eq!(formulas[0].expr, "(AA + BB + CC)");
        assert_eq!(formulas[1].expr, "((DD + DN)/(NA + DA + DN + DD + SU))");
        assert_eq!(formulas[2].expr, "(FF+CC*2)");
    }

    #[test]
    fn coverage_rewrites_power_operator() {
        let sample = r#"
        Coverage {
            "Coverage_1" = "FLT(AA ^ BB ^ CC)";
        }
        "#;

        let formulas = parse_coverage(sample).unwrap();
        assert_eq!(formulas[0].expr, "(AA ** BB ** CC)");
    }

    #[test]
    fn specifier_without_outer_parens_is_kept() {
        assert_eq!(normalise_expression("FLT(AA) + PCT(BB)"), "FLT(AA) + PCT(BB)");
        assert_eq!(normalise_expression("INT(FF+CC*2)"), "(FF+CC*2)");
    }

    #[test]
    fn report_with_all_sections() {
        let text = r#"
            FaultList SAF {
                <  1> ON 0 {PORT "tb.a"}
                      -- 1 {PORT "tb.b"}
                <  1> NN 0 {PORT "tb.c"}
            }
            StatusGroups {
                DN "Dangerous Not Diagnosed" (ON);
                SU "Safe Unobserved" (NN);
            }
            Coverage {
                "DC" = "DN/(DN + SU)";
            }
        "#;

        let report = FaultReport::from_text(text).unwrap();
        assert_eq!(report.faults.len(), 3);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.formulas.len(), 1);
    }
}
