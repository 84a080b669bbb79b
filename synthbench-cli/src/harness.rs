//! Execution Harness
//!
//! Turns one (case, pattern, type) combination into a measured time:
//!
//! ```text
//! BenchmarkCase × Pattern × ElementType
//!        │  build_invocation + emit_program
//!        ▼
//!  <work_dir>/timefun.cpp
//!        │  Toolchain::build   (non-zero exit is fatal)
//!        ▼
//!  <work_dir>/timefun
//!        │  Toolchain::run     (launch failure is fatal)
//!        ▼
//!  last stdout line "s0 us0 s1 us1"
//!        │  parse_timer_output (malformed line -> None)
//!        ▼
//!  Option<f64> seconds
//! ```
//!
//! The external steps sit behind the [`Toolchain`] trait; [`ShellToolchain`] is the
//! real implementation and tests substitute a scripted one.

use crate::config::BuildFlags;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use synthbench_core::{
    BenchmarkCase, ConfigurationError, ConvolutionPattern, ElementType, IdxBackend, Pattern,
    ProgramSpec, build_invocation, emit_program,
};
use thiserror::Error;

/// Fatal harness failures. A malformed timing line is not one of them.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The program could not be synthesized
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] ConfigurationError),

    /// Reading or writing the work directory failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external build exited unsuccessfully
    #[error("Build of {target} failed ({}): {stderr}", describe_exit(.code))]
    Build {
        /// Target being built
        target: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The external build or the timed binary could not be started
    #[error("Failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "killed by signal".to_string(),
    }
}

/// The timing line did not have the expected form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedOutput {
    /// Nothing was printed
    #[error("timed binary printed nothing")]
    Empty,
    /// The last line is not four integers
    #[error("wrong timing line: {0:?}")]
    WrongLine(String),
}

/// Parse the timed binary's standard output.
///
/// Lines before the last are progress output. The last line holds
/// `start_s start_us end_s end_us`; each pair is concatenated into a microsecond
/// timestamp and the difference is returned in seconds.
pub fn parse_timer_output(stdout: &str) -> Result<f64, MalformedOutput> {
    let last = stdout
        .trim_end()
        .lines()
        .last()
        .ok_or(MalformedOutput::Empty)?;

    let tokens: Vec<&str> = last.split_whitespace().collect();
    let wrong = || MalformedOutput::WrongLine(last.to_string());
    if tokens.len() != 4 || !tokens.iter().all(|t| t.bytes().all(|b| b.is_ascii_digit())) {
        return Err(wrong());
    }

    let start: i64 = format!("{}{}", tokens[0], tokens[1])
        .parse()
        .map_err(|_| wrong())?;
    let end: i64 = format!("{}{}", tokens[2], tokens[3])
        .parse()
        .map_err(|_| wrong())?;
    Ok((end - start) as f64 / 1_000_000.0)
}

/// Progress lines printed before the timing line.
fn progress_lines(stdout: &str) -> impl Iterator<Item = &str> {
    let mut lines: Vec<&str> = stdout.trim_end().lines().collect();
    lines.pop();
    lines.into_iter()
}

/// Which external program is being built and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    /// Synthesized single-function program
    TimedFunction,
    /// Fixed convolution program
    Convolution,
}

impl BuildTarget {
    /// Name of the produced binary
    pub fn binary(self) -> &'static str {
        match self {
            BuildTarget::TimedFunction => "timefun",
            BuildTarget::Convolution => "timeconv",
        }
    }

    /// Source file name inside the work directory
    pub fn source(self) -> &'static str {
        match self {
            BuildTarget::TimedFunction => "timefun.cpp",
            BuildTarget::Convolution => "timeconv.cpp",
        }
    }

    /// Environment variable set to `1` while building this target
    pub fn env_marker(self) -> &'static str {
        match self {
            BuildTarget::TimedFunction => "TIMEFUN",
            BuildTarget::Convolution => "TIMECONV",
        }
    }
}

/// External build and run steps.
pub trait Toolchain {
    /// One-off preparation before a pass (e.g. building the library under test)
    fn prepare(&mut self, _work_dir: &Path) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Build `target` from the sources in `work_dir`
    fn build(&mut self, work_dir: &Path, target: BuildTarget) -> Result<(), HarnessError>;

    /// Run the built `target` and return its standard output
    fn run(
        &mut self,
        work_dir: &Path,
        target: BuildTarget,
        args: &[String],
    ) -> Result<String, HarnessError>;
}

/// Settings for [`ShellToolchain`]
#[derive(Debug, Clone)]
pub struct ShellSettings {
    /// Build command; `{target}` is replaced by the binary name
    pub command: String,
    /// File copied into the work directory before each build
    pub project_descriptor: Option<PathBuf>,
    /// Library build run once in `library_root`; `{work_dir}` is substituted
    pub library_command: Option<String>,
    /// Root of the library under test
    pub library_root: PathBuf,
    /// Root of the vendor numeric library
    pub vendor_root: Option<PathBuf>,
    /// Compilation switches
    pub flags: BuildFlags,
}

/// Runs builds through `sh -c` and the produced binaries directly.
#[derive(Debug, Clone)]
pub struct ShellToolchain {
    settings: ShellSettings,
}

impl ShellToolchain {
    /// Create a toolchain from settings
    pub fn new(settings: ShellSettings) -> Self {
        Self { settings }
    }

    fn vendor_root(&self) -> String {
        self.settings
            .vendor_root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn shell(&self, command: &str, dir: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).current_dir(dir);
        for (key, value) in self.settings.flags.env_vars() {
            cmd.env(key, value);
        }
        cmd
    }

    fn check(output: Output, target: &str) -> Result<Output, HarnessError> {
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tracing::warn!("build of {} failed:\n{}", target, stderr);
        Err(HarnessError::Build {
            target: target.to_string(),
            code: output.status.code(),
            stderr,
        })
    }
}

impl Toolchain for ShellToolchain {
    fn prepare(&mut self, work_dir: &Path) -> Result<(), HarnessError> {
        let Some(template) = &self.settings.library_command else {
            return Ok(());
        };
        let command = template.replace("{work_dir}", &work_dir.display().to_string());
        tracing::debug!("preparing library: {}", command);

        let mut cmd = self.shell(&command, &self.settings.library_root);
        if self.settings.flags.vendor {
            cmd.env("FORCE_IPP_DIR", self.vendor_root());
        }
        let output = cmd.output().map_err(|source| HarnessError::Launch {
            program: "sh".to_string(),
            source,
        })?;
        let output = Self::check(output, "library")?;
        tracing::debug!("{}", String::from_utf8_lossy(&output.stdout));
        Ok(())
    }

    fn build(&mut self, work_dir: &Path, target: BuildTarget) -> Result<(), HarnessError> {
        if let Some(descriptor) = &self.settings.project_descriptor {
            let name = descriptor.file_name().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file: {}", descriptor.display()),
                )
            })?;
            std::fs::copy(descriptor, work_dir.join(name))?;
        }

        let command = self.settings.command.replace("{target}", target.binary());
        tracing::debug!("building {}: {}", target.binary(), command);

        let output = self
            .shell(&command, work_dir)
            .env("EBL_ROOT", &self.settings.library_root)
            .env("TMP_DIR", work_dir)
            .env("IPPROOT", self.vendor_root())
            .env(target.env_marker(), "1")
            .output()
            .map_err(|source| HarnessError::Launch {
                program: "sh".to_string(),
                source,
            })?;
        let output = Self::check(output, target.binary())?;
        tracing::debug!("{}", String::from_utf8_lossy(&output.stdout));
        Ok(())
    }

    fn run(
        &mut self,
        work_dir: &Path,
        target: BuildTarget,
        args: &[String],
    ) -> Result<String, HarnessError> {
        let mut library_path = format!(
            "{}:{}/sharedlib",
            work_dir.join("lib").display(),
            self.vendor_root()
        );
        if let Ok(existing) = std::env::var("LD_LIBRARY_PATH") {
            library_path.push(':');
            library_path.push_str(&existing);
        }

        let binary = work_dir.join(target.binary());
        tracing::debug!("running {} {}", binary.display(), args.join(" "));
        let output = Command::new(&binary)
            .args(args)
            .current_dir(work_dir)
            .env("LD_LIBRARY_PATH", library_path)
            .output()
            .map_err(|source| HarnessError::Launch {
                program: binary.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            tracing::warn!(
                "{} exited unsuccessfully ({}), parsing its output anyway",
                target.binary(),
                describe_exit(&output.status.code())
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Synthesizes, builds, runs and times programs in one work directory.
pub struct Harness<T: Toolchain> {
    toolchain: T,
    work_dir: PathBuf,
    backend: IdxBackend,
    convolution_source: Option<PathBuf>,
}

impl<T: Toolchain> Harness<T> {
    /// Create a harness; `n_cores` is passed to the vendor library initialisation
    pub fn new(toolchain: T, work_dir: impl Into<PathBuf>, n_cores: u32) -> Self {
        Self {
            toolchain,
            work_dir: work_dir.into(),
            backend: IdxBackend::new(n_cores),
            convolution_source: None,
        }
    }

    /// Source copied into the work directory before the convolution build
    pub fn with_convolution_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.convolution_source = Some(source.into());
        self
    }

    /// Underlying toolchain
    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Run the toolchain's one-off preparation
    pub fn prepare(&mut self) -> Result<(), HarnessError> {
        self.toolchain.prepare(&self.work_dir)
    }

    /// Time one function for one pattern and element type.
    ///
    /// Scalar literals and container fill values are drawn from `rng`, in that order.
    /// Returns `Ok(None)` when the timing line is malformed.
    pub fn time_function<R: Rng + ?Sized>(
        &mut self,
        case: &BenchmarkCase,
        pattern: &Pattern,
        element_type: ElementType,
        rng: &mut R,
    ) -> Result<Option<f64>, HarnessError> {
        let invocation = build_invocation(
            &case.function_name,
            &case.roles,
            element_type,
            pattern.repeat_count,
            rng,
        );
        let spec = ProgramSpec {
            containers: &invocation.containers,
            element_type,
            shape: &pattern.shape,
            commands: &invocation.commands,
        };
        let program = emit_program(&self.backend, &spec, rng)?;

        let target = BuildTarget::TimedFunction;
        tracing::debug!("writing {}", target.source());
        std::fs::write(self.work_dir.join(target.source()), program)?;

        self.toolchain.build(&self.work_dir, target)?;
        let stdout = self.toolchain.run(&self.work_dir, target, &[])?;
        Ok(self.read_timing(&stdout))
    }

    /// Copy the convolution source and build it once for the pass
    pub fn prepare_convolution(&mut self) -> Result<(), HarnessError> {
        let target = BuildTarget::Convolution;
        if let Some(source) = &self.convolution_source {
            std::fs::copy(source, self.work_dir.join(target.source()))?;
        }
        self.toolchain.build(&self.work_dir, target)
    }

    /// Run the convolution program with `size repeat n_examples size_param n_cores`
    pub fn time_convolution(
        &mut self,
        pattern: &ConvolutionPattern,
    ) -> Result<Option<f64>, HarnessError> {
        let args: Vec<String> = [
            pattern.size,
            pattern.repeat_count,
            pattern.n_examples,
            pattern.size_param,
            u64::from(self.backend.n_cores),
        ]
        .iter()
        .map(u64::to_string)
        .collect();

        let stdout = self
            .toolchain
            .run(&self.work_dir, BuildTarget::Convolution, &args)?;
        Ok(self.read_timing(&stdout))
    }

    fn read_timing(&self, stdout: &str) -> Option<f64> {
        for line in progress_lines(stdout) {
            tracing::info!("{}", line);
        }
        match parse_timer_output(stdout) {
            Ok(elapsed) => {
                tracing::debug!("timed: {}", elapsed);
                Some(elapsed)
            }
            Err(e) => {
                tracing::warn!("parse_timer_output: {}", e);
                None
            }
        }
    }
}
