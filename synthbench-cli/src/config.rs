//! Configuration loading from synthbench.toml
//!
//! Settings for the external build and run steps can be kept in a `synthbench.toml`
//! file. It is discovered by walking up from the current directory; command-line
//! flags override anything it sets.

use crate::executor::OutputMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Synthbench settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SynthConfig {
    /// Directory configuration
    #[serde(default)]
    pub paths: PathsConfig,
    /// External build configuration
    #[serde(default)]
    pub build: BuildConfig,
    /// Compilation flags exported to external commands
    #[serde(default)]
    pub flags: BuildFlags,
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Working directory for generated sources and binaries
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    /// Root of the numeric library under test
    #[serde(default = "default_library_root")]
    pub library_root: String,
    /// Root of the vendor numeric library (required when `flags.vendor` is set)
    #[serde(default)]
    pub vendor_root: Option<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            library_root: default_library_root(),
            vendor_root: None,
        }
    }
}

fn default_work_dir() -> String {
    "tmp".to_string()
}
fn default_library_root() -> String {
    "../..".to_string()
}

/// External build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Shell command building a target in the work directory (`{target}` is substituted)
    #[serde(default = "default_build_command")]
    pub command: String,
    /// Project descriptor copied into the work directory before each build
    #[serde(default = "default_project_descriptor")]
    pub project_descriptor: Option<String>,
    /// One-off library build run in the library root (`{work_dir}` is substituted)
    #[serde(default)]
    pub library_command: Option<String>,
    /// Convolution program source copied into the work directory
    #[serde(default = "default_convolution_source")]
    pub convolution_source: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            project_descriptor: default_project_descriptor(),
            library_command: None,
            convolution_source: default_convolution_source(),
        }
    }
}

fn default_build_command() -> String {
    "cmake -DCMAKE_BUILD_TYPE=Release . && make {target}".to_string()
}
fn default_project_descriptor() -> Option<String> {
    Some("CMakeLists.txt".to_string())
}
fn default_convolution_source() -> Option<String> {
    Some("timeconv.cpp".to_string())
}

/// Compilation switches, exported to every external command as environment variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFlags {
    /// Build with OpenMP
    #[serde(default)]
    pub openmp: bool,
    /// Build with SSE
    #[serde(default)]
    pub sse: bool,
    /// Link the vendor numeric library
    #[serde(default)]
    pub vendor: bool,
    /// Prefer fast over accurate vendor routines
    #[serde(default)]
    pub fast: bool,
    /// Enable vendor argument checks
    #[serde(default)]
    pub checks: bool,
}

impl BuildFlags {
    /// Environment variables describing these flags
    pub fn env_vars(&self) -> Vec<(&'static str, &'static str)> {
        let bit = |b: bool| if b { "1" } else { "0" };
        let precision = if self.fast {
            ("IPPFAST", "1")
        } else {
            ("IPPACC", "1")
        };
        vec![
            ("USEOPENMP", bit(self.openmp)),
            ("USESSE", bit(self.sse)),
            ("NOIPP", bit(!self.vendor)),
            precision,
            ("IPPCHECKS", bit(self.checks)),
        ]
    }
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Benchmark plan file
    #[serde(default = "default_plan")]
    pub plan: String,
    /// Vendor library thread count (0 = do not initialise)
    #[serde(default)]
    pub n_cores: u32,
    /// Show a progress bar during runs
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
    /// Label stored with every result of a run
    #[serde(default)]
    pub series: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            plan: default_plan(),
            n_cores: 0,
            show_progress: default_show_progress(),
            series: None,
        }
    }
}

fn default_plan() -> String {
    "conf".to_string()
}
fn default_show_progress() -> bool {
    true
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Result file
    #[serde(default = "default_output_file")]
    pub file: String,
    /// What to do with an existing result file (asks when unset)
    #[serde(default)]
    pub mode: Option<OutputMode>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
            mode: None,
        }
    }
}

fn default_output_file() -> String {
    "out".to_string()
}

impl SynthConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Discover and load configuration by walking up from the current directory.
    ///
    /// A settings file that exists but does not parse is an error, never a
    /// silent fallback to defaults.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        Self::discover_from(&std::env::current_dir()?)
    }

    /// Discover and load configuration by walking up from `start`
    pub fn discover_from(start: &Path) -> anyhow::Result<Option<Self>> {
        for dir in start.ancestors() {
            let config_path = dir.join("synthbench.toml");
            if config_path.exists() {
                let config = Self::load(&config_path)
                    .with_context(|| format!("invalid settings file {}", config_path.display()))?;
                tracing::debug!("using settings from {}", config_path.display());
                return Ok(Some(config));
            }
        }
        Ok(None)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Synthbench Configuration

[paths]
# Working directory for generated sources and binaries
work_dir = "tmp"
# Root of the numeric library under test
library_root = "../.."
# Root of the vendor numeric library (uncomment to enable)
# vendor_root = "/opt/intel/ipp/em64t"

[build]
# Build command run in the work directory; {target} is the binary name
command = "cmake -DCMAKE_BUILD_TYPE=Release . && make {target}"
# Project descriptor copied into the work directory before each build
project_descriptor = "CMakeLists.txt"
# Library build run once in library_root before timing (uncomment to enable)
# library_command = "make release prj=eblearn && make install DIR={work_dir}"
# Convolution program copied into the work directory
convolution_source = "timeconv.cpp"

[flags]
openmp = false
sse = false
# Link the vendor numeric library
vendor = false
fast = false
checks = false

[runner]
# Benchmark plan file
plan = "conf"
# Vendor library threads, 0 leaves the library uninitialised
n_cores = 0
show_progress = true
# Label stored with every result (uncomment to enable)
# series = "baseline"

[output]
file = "out"
# "erase" or "append"; asks interactively when unset and the file exists
# mode = "append"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SynthConfig::default();
        assert_eq!(config.paths.work_dir, "tmp");
        assert_eq!(config.runner.plan, "conf");
        assert_eq!(config.runner.n_cores, 0);
        assert!(config.output.mode.is_none());
        assert!(config.build.command.contains("{target}"));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [paths]
            work_dir = "/tmp/bench"

            [flags]
            vendor = true
            fast = true

            [output]
            mode = "append"
        "#;

        let config: SynthConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.paths.work_dir, "/tmp/bench");
        assert!(config.flags.vendor);
        assert_eq!(config.output.mode, Some(OutputMode::Append));
        // Defaults should still apply
        assert_eq!(config.paths.library_root, "../..");
        assert_eq!(config.output.file, "out");
    }

    #[test]
    fn test_default_toml_parses() {
        let config: SynthConfig = toml::from_str(&SynthConfig::default_toml()).unwrap();
        assert_eq!(config.paths.work_dir, "tmp");
        assert_eq!(
            config.build.project_descriptor.as_deref(),
            Some("CMakeLists.txt")
        );
        assert!(config.build.library_command.is_none());
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("synthbench.toml"),
            "[flags]\nvendor = true\n",
        )
        .unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = SynthConfig::discover_from(&nested).unwrap().unwrap();
        assert!(config.flags.vendor);
    }

    #[test]
    fn test_discover_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("synthbench.toml"),
            "[flags]\nvendor = \"yes\"\n",
        )
        .unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();

        let err = SynthConfig::discover_from(&nested).unwrap_err();
        assert!(err.to_string().contains("synthbench.toml"));
    }

    #[test]
    fn test_flag_environment() {
        let vars = BuildFlags::default().env_vars();
        assert!(vars.contains(&("USEOPENMP", "0")));
        assert!(vars.contains(&("NOIPP", "1")));
        assert!(vars.contains(&("IPPACC", "1")));

        let flags = BuildFlags {
            openmp: true,
            vendor: true,
            fast: true,
            ..BuildFlags::default()
        };
        let vars = flags.env_vars();
        assert!(vars.contains(&("USEOPENMP", "1")));
        assert!(vars.contains(&("NOIPP", "0")));
        assert!(vars.contains(&("IPPFAST", "1")));
        assert!(!vars.iter().any(|(k, _)| *k == "IPPACC"));
    }
}
