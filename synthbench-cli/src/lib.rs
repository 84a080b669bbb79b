#![warn(missing_docs)]
//! Synthbench CLI Library
//!
//! Command line, settings, execution harness and benchmark driver. The binary in the
//! `synthbench` crate calls [`run`]:
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     synthbench_cli::run()
//! }
//! ```
//!
//! A run reads the benchmark plan, synthesizes one program per
//! (case, pattern, element type), builds and times it through the external toolchain,
//! and appends one encoded `TestResult` line per case to the output file.

mod config;
mod executor;
mod harness;

pub use config::*;
pub use executor::{
    CONVOLUTION_SEED, Driver, DriverError, OutputMode, ResultSink, ShowFormat, format_csv_output,
    format_human_output, format_json_output,
};
pub use harness::*;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use synthbench_core::{BenchmarkCase, BenchmarkPlan};
use synthbench_record::{TestResult, decode_results};

/// Synthbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "synthbench")]
#[command(
    author,
    version,
    about = "Synthbench - synthesized micro-benchmarks for numeric library routines"
)]
pub struct Cli {
    /// Optional subcommand (Run, List, Show, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Run only tests whose name matches this regex
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Result file (default: output.file from synthbench.toml, else "out")
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Vendor library thread count, 0 leaves it uninitialised
    #[arg(short = 'n', long, global = true)]
    pub ncores: Option<u32>,

    /// Build with OpenMP
    #[arg(long, global = true)]
    pub openmp: bool,

    /// Build with SSE
    #[arg(long, global = true)]
    pub sse: bool,

    /// Link the vendor numeric library (needs --ipproot or paths.vendor_root)
    #[arg(long, global = true)]
    pub ipp: bool,

    /// Prefer fast over accurate vendor routines
    #[arg(long, global = true)]
    pub fast: bool,

    /// Enable vendor argument checks
    #[arg(long, global = true)]
    pub checks: bool,

    /// Benchmark plan file
    #[arg(short, long, global = true)]
    pub conffile: Option<PathBuf>,

    /// Work directory for generated sources and binaries
    #[arg(short, long, global = true)]
    pub tmpdir: Option<PathBuf>,

    /// Vendor numeric library root
    #[arg(long, global = true)]
    pub ipproot: Option<PathBuf>,

    /// Root of the library under test
    #[arg(long, global = true)]
    pub library_root: Option<PathBuf>,

    /// What to do with an existing result file; asks when not given
    #[arg(long, value_enum, global = true)]
    pub mode: Option<OutputMode>,

    /// Label stored with every result of this run
    #[arg(long, global = true)]
    pub series: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide the progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark plan (default)
    Run,
    /// Print the parsed plan without running anything
    List,
    /// Print stored results
    Show {
        /// Result files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = ShowFormat::Human)]
        format: ShowFormat,
    },
    /// Print a commented default synthbench.toml
    Init,
}

/// Run the Synthbench CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the Synthbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Logs go to stderr so `show` output stays clean
    let filter = if cli.verbose {
        "synthbench=debug"
    } else {
        "synthbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    // Discover synthbench.toml configuration (CLI flags override)
    let config = SynthConfig::discover()?.unwrap_or_default();

    match cli.command {
        Some(Commands::Init) => {
            print!("{}", SynthConfig::default_toml());
        }
        Some(Commands::Show {
            ref files,
            format,
        }) => {
            show_results(files, format)?;
        }
        Some(Commands::List) => {
            let settings = RunSettings::resolve(&cli, &config)?;
            list_plan(&settings)?;
        }
        Some(Commands::Run) | None => {
            let settings = RunSettings::resolve(&cli, &config)?;
            run_benchmarks(&settings)?;
        }
    }

    Ok(())
}

/// Settings for one run, after layering synthbench.toml and command-line flags
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Benchmark plan file
    pub plan: PathBuf,
    /// Work directory
    pub work_dir: PathBuf,
    /// Root of the library under test (absolute)
    pub library_root: PathBuf,
    /// Vendor library root (absolute), when the vendor library is enabled
    pub vendor_root: Option<PathBuf>,
    /// Result file
    pub output: PathBuf,
    /// Output mode, if decided without asking
    pub mode: Option<OutputMode>,
    /// Compilation switches
    pub flags: BuildFlags,
    /// Vendor library thread count
    pub n_cores: u32,
    /// Show a progress bar
    pub show_progress: bool,
    /// Series label
    pub series: String,
    /// Test name filter
    pub filter: Regex,
    /// External build configuration
    pub build: BuildConfig,
}

impl RunSettings {
    /// Layer command-line flags over the settings file and validate paths
    pub fn resolve(cli: &Cli, config: &SynthConfig) -> anyhow::Result<Self> {
        let flags = BuildFlags {
            openmp: cli.openmp || config.flags.openmp,
            sse: cli.sse || config.flags.sse,
            vendor: cli.ipp || config.flags.vendor,
            fast: cli.fast || config.flags.fast,
            checks: cli.checks || config.flags.checks,
        };

        let vendor_root = if flags.vendor {
            let root = cli
                .ipproot
                .clone()
                .or_else(|| config.paths.vendor_root.as_ref().map(PathBuf::from))
                .context("--ipp needs a vendor library root (--ipproot or paths.vendor_root)")?;
            if !root.is_dir() {
                bail!("vendor library root {} does not exist", root.display());
            }
            Some(std::path::absolute(&root)?)
        } else {
            None
        };

        let library_root = cli
            .library_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.paths.library_root));

        let filter = Regex::new(&cli.filter)
            .with_context(|| format!("invalid test filter {:?}", cli.filter))?;

        Ok(Self {
            plan: cli
                .conffile
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.runner.plan)),
            work_dir: cli
                .tmpdir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.paths.work_dir)),
            library_root: std::path::absolute(&library_root)?,
            vendor_root,
            output: cli
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.output.file)),
            mode: cli.mode.or(config.output.mode),
            flags,
            n_cores: cli.ncores.unwrap_or(config.runner.n_cores),
            show_progress: config.runner.show_progress && !cli.no_progress,
            series: cli
                .series
                .clone()
                .or_else(|| config.runner.series.clone())
                .unwrap_or_default(),
            filter,
            build: config.build.clone(),
        })
    }

    /// Cases selected by the filter; seeds keep their plan positions
    pub fn select<'a>(&self, plan: &'a BenchmarkPlan) -> Vec<&'a BenchmarkCase> {
        plan.functions
            .iter()
            .filter(|case| self.filter.is_match(&case.test_name))
            .collect()
    }

    fn shell_settings(&self) -> anyhow::Result<ShellSettings> {
        Ok(ShellSettings {
            command: self.build.command.clone(),
            project_descriptor: self
                .build
                .project_descriptor
                .as_ref()
                .map(std::path::absolute)
                .transpose()?,
            library_command: self.build.library_command.clone(),
            library_root: self.library_root.clone(),
            vendor_root: self.vendor_root.clone(),
            flags: self.flags,
        })
    }
}

/// Create the work directory if needed and return its absolute path
pub fn prepare_work_dir(path: &Path) -> anyhow::Result<PathBuf> {
    if path.exists() {
        if !path.is_dir() {
            bail!("{} is not a directory", path.display());
        }
    } else {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating work directory {}", path.display()))?;
    }
    Ok(std::fs::canonicalize(path)?)
}

/// Decide how to open the result file.
///
/// A configured mode wins and a missing file is simply created. Otherwise the
/// operator is asked on `output`, reading answers from `input`. `Ok(None)` means
/// abort.
pub fn resolve_output_mode(
    path: &Path,
    configured: Option<OutputMode>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<Option<OutputMode>> {
    if path.exists() && !path.is_file() {
        bail!("{} exists and is not a regular file", path.display());
    }
    if let Some(mode) = configured {
        return Ok(Some(mode));
    }
    if !path.exists() {
        return Ok(Some(OutputMode::Erase));
    }

    loop {
        write!(
            output,
            "Output file {} already exists. Abort, continue (append) or erase? [a/c/e] ",
            path.display()
        )?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(None);
        }
        match answer.trim() {
            "a" => return Ok(None),
            "c" => return Ok(Some(OutputMode::Append)),
            "e" => return Ok(Some(OutputMode::Erase)),
            _ => continue,
        }
    }
}

fn run_benchmarks(settings: &RunSettings) -> anyhow::Result<()> {
    let plan = BenchmarkPlan::load(&settings.plan)
        .with_context(|| format!("loading plan {}", settings.plan.display()))?;
    let cases: Vec<BenchmarkCase> = settings.select(&plan).into_iter().cloned().collect();
    let convolution = plan
        .convolution
        .as_ref()
        .filter(|_| settings.filter.is_match("convolution"));

    if cases.is_empty() && convolution.is_none() {
        println!("No tests match {:?}.", settings.filter.as_str());
        return Ok(());
    }

    let mode = {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        resolve_output_mode(&settings.output, settings.mode, &mut stdin.lock(), &mut stdout)?
    };
    let Some(mode) = mode else {
        println!("Aborted.");
        return Ok(());
    };

    let work_dir = prepare_work_dir(&settings.work_dir)?;
    let toolchain = ShellToolchain::new(settings.shell_settings()?);
    let mut harness = Harness::new(toolchain, &work_dir, settings.n_cores);
    if let Some(source) = &settings.build.convolution_source {
        harness = harness.with_convolution_source(source);
    }
    harness.prepare()?;

    let sink = ResultSink::open(&settings.output, mode)
        .with_context(|| format!("opening {}", settings.output.display()))?;
    let mut driver = Driver::new(harness, sink)
        .with_series(&settings.series)
        .with_progress(settings.show_progress);

    println!(
        "Running {} tests over {} patterns in {}...\n",
        cases.len(),
        plan.patterns.len(),
        work_dir.display()
    );
    let start_time = Instant::now();

    let mut results = driver.time_functions(&plan.patterns, &cases)?;
    if let Some(convolution) = convolution {
        results.push(driver.time_convolution(convolution)?);
    }

    let failed: usize = results
        .iter()
        .flat_map(|r| r.data.iter())
        .flat_map(|series| series.cases.iter())
        .filter(|case| case.elapsed.is_none())
        .count();
    if failed > 0 {
        eprintln!("Warning: {} measurements had a malformed timing line", failed);
    }
    println!(
        "{} results written to {} in {:.1}s",
        results.len(),
        driver.sink().path().display(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

fn list_plan(settings: &RunSettings) -> anyhow::Result<()> {
    let plan = BenchmarkPlan::load(&settings.plan)
        .with_context(|| format!("loading plan {}", settings.plan.display()))?;

    println!("Synthbench Plan:");
    println!("├── patterns");
    for pattern in &plan.patterns {
        println!("│   ├── {} × {}", pattern.shape, pattern.repeat_count);
    }

    let cases = settings.select(&plan);
    println!("├── functions");
    for case in &cases {
        let roles: String = case.roles.iter().map(|r| r.letter()).collect();
        let types: Vec<&str> = case.element_types.iter().map(|t| t.name()).collect();
        println!(
            "│   ├── {}: {}({}) [{}] seed {}",
            case.test_name,
            case.function_name,
            roles,
            types.join(", "),
            case.seed
        );
    }

    if let Some(convolution) = &plan.convolution {
        let types: Vec<&str> = convolution.element_types.iter().map(|t| t.name()).collect();
        println!("├── convolution [{}]", types.join(", "));
        for p in &convolution.patterns {
            println!(
                "│   ├── repeat {}, size {}, {} examples, size_param {}",
                p.repeat_count, p.size, p.n_examples, p.size_param
            );
        }
    }

    println!(
        "{} of {} tests selected, {} patterns.",
        cases.len(),
        plan.functions.len(),
        plan.patterns.len()
    );
    Ok(())
}

fn show_results(files: &[PathBuf], format: ShowFormat) -> anyhow::Result<()> {
    let mut results: Vec<TestResult> = Vec::new();
    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        results.extend(
            decode_results(&text).with_context(|| format!("decoding {}", file.display()))?,
        );
    }

    let output = match format {
        ShowFormat::Human => format_human_output(&results),
        ShowFormat::Json => format_json_output(&results)?,
        ShowFormat::Csv => format_csv_output(&results),
    };
    print!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("synthbench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        assert_eq!(cli.filter, ".*");

        let cli = parse(&["show", "out", "--format", "csv"]);
        match cli.command {
            Some(Commands::Show { files, format }) => {
                assert_eq!(files, [PathBuf::from("out")]);
                assert_eq!(format, ShowFormat::Csv);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = SynthConfig::default();
        config.runner.n_cores = 2;
        config.flags.sse = true;
        config.output.mode = Some(OutputMode::Erase);

        let cli = parse(&["-n", "8", "--openmp", "--mode", "append", "-o", "results", "^add"]);
        let settings = RunSettings::resolve(&cli, &config).unwrap();
        assert_eq!(settings.n_cores, 8);
        assert!(settings.flags.openmp);
        assert!(settings.flags.sse);
        assert_eq!(settings.mode, Some(OutputMode::Append));
        assert_eq!(settings.output, PathBuf::from("results"));
        assert!(settings.filter.is_match("add_float"));
        assert!(!settings.filter.is_match("mul"));
        assert!(settings.library_root.is_absolute());
    }

    #[test]
    fn test_vendor_root_required() {
        let config = SynthConfig::default();
        assert!(RunSettings::resolve(&parse(&["--ipp"]), &config).is_err());
        assert!(
            RunSettings::resolve(&parse(&["--ipp", "--ipproot", "/does/not/exist"]), &config)
                .is_err()
        );

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let settings = RunSettings::resolve(&parse(&["--ipp", "--ipproot", root]), &config).unwrap();
        assert!(settings.flags.vendor);
        assert!(settings.vendor_root.is_some());
    }

    #[test]
    fn test_invalid_filter_is_fatal() {
        let config = SynthConfig::default();
        assert!(RunSettings::resolve(&parse(&["add("]), &config).is_err());
    }

    #[test]
    fn test_output_mode_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let mut shown = Vec::new();

        // missing file: no question asked
        let mode = resolve_output_mode(&path, None, &mut Cursor::new(""), &mut shown).unwrap();
        assert_eq!(mode, Some(OutputMode::Erase));
        assert!(shown.is_empty());

        std::fs::write(&path, "").unwrap();
        let mode =
            resolve_output_mode(&path, None, &mut Cursor::new("x\nc\n"), &mut shown).unwrap();
        assert_eq!(mode, Some(OutputMode::Append));
        let text = String::from_utf8(shown).unwrap();
        assert_eq!(text.matches("[a/c/e]").count(), 2);

        let mode =
            resolve_output_mode(&path, None, &mut Cursor::new("a\n"), &mut Vec::new()).unwrap();
        assert_eq!(mode, None);
        let mode =
            resolve_output_mode(&path, None, &mut Cursor::new(""), &mut Vec::new()).unwrap();
        assert_eq!(mode, None);
        let mode = resolve_output_mode(
            &path,
            Some(OutputMode::Erase),
            &mut Cursor::new(""),
            &mut Vec::new(),
        )
        .unwrap();
        assert_eq!(mode, Some(OutputMode::Erase));
    }

    #[test]
    fn test_output_path_must_be_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_output_mode(
            dir.path(),
            Some(OutputMode::Append),
            &mut Cursor::new(""),
            &mut Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_prepare_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("nested").join("tmp");
        let resolved = prepare_work_dir(&work).unwrap();
        assert!(resolved.is_dir());
        assert!(resolved.is_absolute());

        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(prepare_work_dir(&file).is_err());
    }
}
