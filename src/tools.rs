//! External texture tools: assembly then compression.
//!
//! Two DirectXTex command-line tools turn the rendered PNGs into the final
//! texture:
//!
//! ```text
//! texassemble from-mips -y -o <work>/temp_uncompressed.dds mip0.png mip1.png …
//! texconv -f BC7_UNORM -y -o <work> <work>/temp_uncompressed.dds
//! ```
//!
//! Both run to completion with stdout/stderr captured. A tool only counts as
//! successful when it exits 0 *and* the file it was supposed to write is
//! actually there: texassemble in particular has been seen to exit 0 without
//! producing anything. texconv writes `<stem>.dds` into the output directory,
//! but some builds upper-case the extension, so both spellings are checked.
//!
//! Nothing is retried and no timeout is imposed.

use crate::error::PipelineError;
use crate::types::TextureFormat;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// File name of the uncompressed container inside the work directory.
pub const UNCOMPRESSED_NAME: &str = "temp_uncompressed.dds";

/// Captured result of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program to completion.
///
/// `Err` means the program could not be started at all; a program that ran
/// and failed is an `Ok` with a non-zero code.
pub trait ToolRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ToolOutput>;
}

/// Runs tools with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<ToolOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        hide_console_window(&mut cmd);

        let output = cmd.output()?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(windows)]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_cmd: &mut Command) {}

/// Resolved locations of the two tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// texassemble
    pub assembler: PathBuf,
    /// texconv
    pub compressor: PathBuf,
}

impl ToolPaths {
    /// Both paths must point at existing files.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (label, path) in [("texassemble", &self.assembler), ("texconv", &self.compressor)] {
            if path.as_os_str().is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "{label} path is not set"
                )));
            }
            if !path.is_file() {
                return Err(PipelineError::Configuration(format!(
                    "{label} not found at {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

fn tool_label(program: &Path) -> String {
    program
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string())
}

pub fn assembler_args(dest: &Path, artifacts: &[PathBuf]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["from-mips".into(), "-y".into(), "-o".into()];
    args.push(dest.into());
    args.extend(artifacts.iter().map(OsString::from));
    args
}

pub fn compressor_args(format: TextureFormat, input: &Path, out_dir: &Path) -> Vec<OsString> {
    vec![
        "-f".into(),
        format.tool_name().into(),
        "-y".into(),
        "-o".into(),
        out_dir.into(),
        input.into(),
    ]
}

fn invoke(
    runner: &(impl ToolRunner + ?Sized),
    program: &Path,
    args: &[OsString],
) -> Result<ToolOutput, PipelineError> {
    let label = tool_label(program);
    debug!(tool = %label, program = %program.display(), ?args, "running tool");

    let output = runner
        .run(program, args)
        .map_err(|e| PipelineError::fs(format!("Failed to start {label}"), e))?;
    debug!(tool = %label, code = ?output.code, "tool finished");

    if !output.success() {
        return Err(PipelineError::ToolInvocation {
            tool: label,
            code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

fn captured(output: &ToolOutput) -> String {
    format!(
        "stdout: {}\nstderr: {}",
        output.stdout.trim(),
        output.stderr.trim()
    )
}

/// Build the uncompressed mip-chain container at `dest` from `artifacts`
/// (level 0 first).
pub fn assemble(
    runner: &(impl ToolRunner + ?Sized),
    tool: &Path,
    artifacts: &[PathBuf],
    dest: &Path,
) -> Result<(), PipelineError> {
    info!(levels = artifacts.len(), "assembling mip chain");
    let output = invoke(runner, tool, &assembler_args(dest, artifacts))?;

    let written = fs::metadata(dest).map(|m| m.len() > 0).unwrap_or(false);
    if !written {
        return Err(PipelineError::ArtifactNotFound {
            path: dest.to_path_buf(),
            detail: format!(
                "{} exited successfully but the container is missing or empty\n{}",
                tool_label(tool),
                captured(&output)
            ),
        });
    }
    Ok(())
}

/// Compress `input` into `out_dir` and return the path of the compressed
/// file.
pub fn compress(
    runner: &(impl ToolRunner + ?Sized),
    tool: &Path,
    format: TextureFormat,
    input: &Path,
    out_dir: &Path,
) -> Result<PathBuf, PipelineError> {
    info!(format = format.tool_name(), "compressing texture");
    invoke(runner, tool, &compressor_args(format, input, out_dir))?;
    locate_compressed_output(out_dir, input)
}

/// Find `<out_dir>/<stem>.dds`, falling back to `<stem>.DDS`.
pub fn locate_compressed_output(out_dir: &Path, input: &Path) -> Result<PathBuf, PipelineError> {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let mut candidates = Vec::with_capacity(2);
    for ext in ["dds", "DDS"] {
        let candidate = out_dir.join(format!("{stem}.{ext}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
        candidates.push(candidate);
    }

    Err(PipelineError::ArtifactNotFound {
        path: candidates.swap_remove(0),
        detail: format!("work directory contains: {}", list_dir(out_dir)),
    })
}

fn list_dir(dir: &Path) -> String {
    let Ok(entries) = fs::read_dir(dir) else {
        return "<unreadable>".to_string();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    if names.is_empty() {
        return "<empty>".to_string();
    }
    names.sort();
    names.join(", ")
}
