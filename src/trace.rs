//! Processor-trace ingestion.
//!
//! Each supported processor has a dedicated transformer that turns the
//! vendor's whitespace-aligned per-cycle dump into a uniform comma-separated
//! column stream: line 0 is the canonical header, every following line has
//! six fields with the decoded instruction and the register/memory contents
//! double-quoted.

use anyhow::bail;

use crate::error::ParseError;

/// Converts one trace dialect into the uniform column stream.
pub trait TraceTransformer {
    /// Dialect key this transformer answers to, e.g. `CV32E40P`.
    fn processor(&self) -> &'static str;

    /// Parses the raw trace into header + body lines.
    fn parse(&self, raw: &str) -> Result<Vec<String>, ParseError>;
}

/// Looks up the transformer for a processor key.
pub fn transformer_for(processor: &str) -> anyhow::Result<Box<dyn TraceTransformer>> {
    match processor {
        "CV32E40P" => Ok(Box::new(Cv32e40p)),
        other => bail!("unsupported processor trace dialect '{other}'"),
    }
}

/// Transformer for the CV32E40P tracer output.
pub struct Cv32e40p;

const SECTION: &str = "CV32E40P trace";
const HEADER: &str = "Time,Cycle,PC,Instr,Decoded instruction,Register and memory contents";

impl TraceTransformer for Cv32e40p {
    fn processor(&self) -> &'static str {
        "CV32E40P"
    }

    fn parse(&self, raw: &str) -> Result<Vec<String>, ParseError> {
        let mut lines = vec![HEADER.to_string()];

        for (lineno, line) in raw.lines().enumerate() {
            let lineno = lineno + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            // The vendor header repeats the column names; drop it.
            if tokens.first() == Some(&"Time") {
                continue;
            }
            if tokens.len() < 5 {
                return Err(ParseError::new(
                    SECTION,
                    lineno,
                    format!("expected at least 5 columns, got {}", tokens.len()),
                ));
            }

            let time = tokens[0];
            if !is_time(time) {
                return Err(ParseError::new(SECTION, lineno, format!("bad time '{time}'")));
            }
            let cycle = tokens[1];
            if !cycle.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseError::new(SECTION, lineno, format!("bad cycle '{cycle}'")));
            }
            let pc = tokens[2];
            if pc.len() != 8 || !pc.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseError::new(SECTION, lineno, format!("bad PC '{pc}'")));
            }
            let instr = tokens[3];
            if instr.is_empty() || !instr.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseError::new(
                    SECTION,
                    lineno,
                    format!("bad instruction word '{instr}'"),
                ));
            }

            // Operands run up to the first register/memory token, which is
            // recognisable by its NAME=VALUE / NAME:VALUE shape.
            let mnemonic = tokens[4];
            let tail = &tokens[5..];
            let regmem_start = tail
                .iter()
                .position(|t| t.contains('=') || t.contains(':'))
                .unwrap_or(tail.len());

            let mut decoded = mnemonic.to_string();
            for operand in &tail[..regmem_start] {
                decoded.push(' ');
                decoded.push_str(operand);
            }
            let regmem = tail[regmem_start..].join(", ");

            lines.push(format!(
                "{time},{cycle},{pc},{instr},\"{decoded}\",\"{regmem}\""
            ));
        }

        Ok(lines)
    }
}

fn is_time(token: &str) -> bool {
    let digits = token.strip_suffix("ns").unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
