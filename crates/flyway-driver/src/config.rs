//! Experiment settings for simulator runs, read from JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ns3_frontend::{Launcher, Ns3Flyway};

/// Settings for a batch of simulator runs. Every field is optional so that files and command-line
/// flags can be layered with [`RunConfig::or`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// The ns-3 source tree.
    pub ns3_dir: Option<PathBuf>,
    /// The topology file, relative to `ns3_dir` unless absolute.
    pub topology: Option<PathBuf>,
    /// The ns-3 program to run.
    pub program: Option<String>,
    /// Antenna gain.
    pub gain: Option<f64>,
    /// Per-run time limit in seconds.
    pub timeout_secs: Option<u64>,
    /// Maximum number of simulator runs in flight.
    pub jobs: Option<usize>,
    /// How the program is started.
    pub launcher: Option<Launcher>,
}

impl RunConfig {
    /// Fills every unset field of `self` from `fallback`.
    pub fn or(self, fallback: RunConfig) -> RunConfig {
        RunConfig {
            ns3_dir: self.ns3_dir.or(fallback.ns3_dir),
            topology: self.topology.or(fallback.topology),
            program: self.program.or(fallback.program),
            gain: self.gain.or(fallback.gain),
            timeout_secs: self.timeout_secs.or(fallback.timeout_secs),
            jobs: self.jobs.or(fallback.jobs),
            launcher: self.launcher.or(fallback.launcher),
        }
    }

    /// Builds the simulator these settings describe.
    pub fn simulator(&self) -> Result<Ns3Flyway, ConfigError> {
        let ns3_dir = self
            .ns3_dir
            .clone()
            .ok_or(ConfigError::Missing("ns3_dir"))?;
        let topology = self
            .topology
            .clone()
            .ok_or(ConfigError::Missing("topology"))?;
        let mut sim = Ns3Flyway::builder()
            .ns3_dir(ns3_dir)
            .topology(topology)
            .timeout(self.timeout_secs.map(Duration::from_secs))
            .launcher(self.launcher.unwrap_or_default())
            .build();
        if let Some(program) = &self.program {
            sim.program = program.clone();
        }
        if let Some(gain) = self.gain {
            sim.gain = gain;
        }
        Ok(sim)
    }
}

/// Reads a [`RunConfig`] from a JSON file.
pub fn read_run_config(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        }
        _ => return Err(ConfigError::UnknownFileType(path.into())),
    };
    Ok(config)
}

/// Error kinds for run settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Unknown file type.
    #[error("unknown file type: {0}")]
    UnknownFileType(PathBuf),

    /// A required setting was given nowhere.
    #[error("missing setting `{0}`")]
    Missing(&'static str),

    /// Error deserializing JSON.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use ns3_frontend::{DEFAULT_GAIN, DEFAULT_PROGRAM};

    use super::*;

    #[test]
    fn read_json() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{
                "ns3_dir": "/opt/ns-3.9",
                "topology": "scratch/topo-search.dat",
                "gain": 18,
                "timeout_secs": 600,
                "launcher": "direct"
            }"#,
        )?;
        let config = read_run_config(&path)?;
        assert_eq!(config.gain, Some(18.0));
        assert_eq!(config.jobs, None);
        let sim = config.simulator()?;
        assert_eq!(sim.ns3_dir, Path::new("/opt/ns-3.9"));
        assert_eq!(sim.program, DEFAULT_PROGRAM);
        assert_eq!(sim.gain, 18.0);
        assert_eq!(sim.timeout, Some(Duration::from_secs(600)));
        assert_eq!(sim.launcher, Launcher::Direct);
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "gian": 18 }"#)?;
        assert!(matches!(read_run_config(&path), Err(ConfigError::Json(_))));
        Ok(())
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            read_run_config("run.dhall"),
            Err(ConfigError::UnknownFileType(_))
        ));
    }

    #[test]
    fn flags_override_file() {
        let flags = RunConfig {
            gain: Some(30.0),
            jobs: Some(4),
            ..Default::default()
        };
        let file = RunConfig {
            ns3_dir: Some("/opt/ns-3.9".into()),
            topology: Some("topo.dat".into()),
            gain: Some(18.0),
            ..Default::default()
        };
        let config = flags.or(file);
        assert_eq!(config.gain, Some(30.0));
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.ns3_dir, Some(PathBuf::from("/opt/ns-3.9")));
    }

    #[test]
    fn simulator_needs_ns3_dir_and_topology() {
        let config = RunConfig {
            topology: Some("topo.dat".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.simulator(),
            Err(ConfigError::Missing("ns3_dir"))
        ));
        let config = RunConfig {
            ns3_dir: Some(".".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.simulator(),
            Err(ConfigError::Missing("topology"))
        ));
    }

    #[test]
    fn simulator_defaults() -> anyhow::Result<()> {
        let config = RunConfig {
            ns3_dir: Some(".".into()),
            topology: Some("topo.dat".into()),
            ..Default::default()
        };
        let sim = config.simulator()?;
        assert_eq!(sim.gain, DEFAULT_GAIN);
        assert_eq!(sim.timeout, None);
        assert_eq!(sim.launcher, Launcher::Waf);
        Ok(())
    }
}
