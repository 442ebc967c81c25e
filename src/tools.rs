//! Wrappers around the external collaborators that are not simulators:
//! the `addr2line`-style symbol resolver, the backup archiver and the Unix
//! process-group reaper.

use std::path::Path;
use std::process::Command;

use anyhow::Context;
use tracing::{debug, warn};

/// Resolves a program counter to `(source file name, 1-based line number)`
/// through the external `addr2line` resolver. Unresolvable addresses
/// (`??:0` style output, or a failing resolver) yield `None`.
pub fn addr2line(elf: &Path, pc: &str) -> Option<(String, usize)> {
    let output = Command::new("addr2line")
        .arg("-e")
        .arg(elf)
        .arg(pc)
        .output();
    let output = match output {
        Ok(output) => output,
        Err(err) => {
            warn!(%err, "failed to run addr2line");
            return None;
        }
    };
    if !output.status.success() {
        warn!(pc, elf = %elf.display(), "addr2line exited with an error");
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let resolved = stdout.lines().next()?.trim();
    let (file, lineno) = resolved.rsplit_once(':')?;
    if file.starts_with("??") {
        return None;
    }
    let lineno: usize = lineno.parse().ok()?;
    if lineno == 0 {
        return None;
    }
    let name = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())?;
    debug!(pc, file = %name, lineno, "resolved program counter");
    Some((name, lineno))
}

/// Archives the given files by invoking the external archiver once. The
/// default argv is `zip -j <dest>.zip <files>`; `argv_override` replaces the
/// `zip -j` prefix.
pub fn zip_archive(
    dest_stem: &str,
    files: &[&Path],
    argv_override: Option<&[String]>,
) -> anyhow::Result<()> {
    let default_argv = ["zip".to_string(), "-j".to_string()];
    let argv: &[String] = argv_override.unwrap_or(&default_argv);
    let (program, args) = argv.split_first().context("empty archiver command line")?;

    let dest = format!("{dest_stem}.zip");
    let output = Command::new(program)
        .args(args)
        .arg(&dest)
        .args(files)
        .output()
        .with_context(|| format!("failed to run archiver '{program}'"))?;
    anyhow::ensure!(
        output.status.success(),
        "archiver failed for {dest}: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    debug!(%dest, count = files.len(), "backup archive created");
    Ok(())
}

/// Sends SIGKILL to an entire process group.
pub fn kill_process_group(pgid: u32) {
    // Negative pid addresses the group; ESRCH just means it is already gone.
    unsafe {
        libc::kill(-(pgid as i32), libc::SIGKILL);
    }
}
