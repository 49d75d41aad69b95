//! An interface to the ns-3 flyway simulation.
//!
//! This crate is tightly coupled to the command line of the `flyway-data` ns-3 program.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use derivative::Derivative;
use flyway_core::sim::{SimError, SimJob, Simulator};
use log::{debug, warn};

/// The ns-3 program run by default.
pub const DEFAULT_PROGRAM: &str = "flyway-data";

/// The default antenna gain of every ToR antenna.
pub const DEFAULT_GAIN: f64 = 25.0;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

// Process IDs of running simulations. On unix each is also the ID of the simulation's process group.
static RUNNING: Mutex<BTreeSet<u32>> = Mutex::new(BTreeSet::new());

/// The ns-3 flyway simulation, run once per [`SimJob`].
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Ns3Flyway {
    /// The ns-3 source tree (the directory containing `waf`).
    #[builder(setter(into))]
    pub ns3_dir: PathBuf,
    /// The topology file, relative to `ns3_dir` unless absolute.
    #[builder(setter(into))]
    pub topology: PathBuf,
    /// The program to run.
    #[builder(default = DEFAULT_PROGRAM.to_owned(), setter(into))]
    pub program: String,
    /// Antenna gain, passed through to the simulation unchanged.
    #[builder(default = DEFAULT_GAIN)]
    pub gain: f64,
    /// Kill a run that takes longer than this.
    #[builder(default)]
    pub timeout: Option<Duration>,
    /// How `program` is started.
    #[builder(default)]
    pub launcher: Launcher,
}

impl Ns3Flyway {
    /// The simulation arguments for a job.
    fn sim_args(&self, job: &SimJob) -> Vec<String> {
        vec![
            format!("--topo={}", self.topology.display()),
            format!("--flow={}", job.flow_file.display()),
            format!("--alloc={}", job.alloc_file.display()),
            format!("--outfile={}", job.out_file.display()),
            format!("--gain={}", self.gain),
        ]
    }

    fn command(&self, ns3_dir: &Path, args: &[String]) -> Result<Command, SimError> {
        let mut cmd = match self.launcher {
            Launcher::Waf => {
                // waf splits the `--run` string on whitespace.
                if let Some(arg) = args.iter().find(|arg| arg.contains(char::is_whitespace)) {
                    return Err(SimError::InvalidArgument(arg.clone()));
                }
                let mut cmd = Command::new(ns3_dir.join("waf"));
                cmd.arg("--run")
                    .arg(format!("{} {}", self.program, args.join(" ")));
                cmd
            }
            Launcher::Direct => {
                let mut words = self.program.split_whitespace();
                let mut cmd = Command::new(words.next().unwrap_or_default());
                cmd.args(words).args(args);
                cmd
            }
        };
        cmd.current_dir(ns3_dir);
        // A new process group, so a timeout also takes down whatever the launcher started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        Ok(cmd)
    }
}

impl Simulator for Ns3Flyway {
    fn simulate(&self, job: &SimJob) -> Result<(), SimError> {
        // We need absolute paths because the simulation runs from the ns-3 directory.
        let ns3_dir = fs::canonicalize(&self.ns3_dir)?;
        let job = SimJob {
            flow_file: fs::canonicalize(&job.flow_file)?,
            alloc_file: fs::canonicalize(&job.alloc_file)?,
            out_file: absolute(&job.out_file)?,
            log_file: absolute(&job.log_file)?,
            ..job.clone()
        };
        let args = self.sim_args(&job);
        let mut cmd = self.command(&ns3_dir, &args)?;
        let log = File::create(&job.log_file)?;
        cmd.stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log);
        debug!("running {cmd:?}");
        let mut child = cmd.spawn().map_err(SimError::Spawn)?;
        lock_running().insert(child.id());
        let status = wait(&mut child, self.timeout);
        lock_running().remove(&child.id());
        // Nothing the simulator left in the background may outlive the run.
        #[cfg(unix)]
        {
            if let Err(e) = kill_group(child.id()) {
                if e.raw_os_error() != Some(libc::ESRCH) {
                    warn!("failed to clean up after simulator process {}: {e}", child.id());
                }
            }
        }
        let status = status?;
        if !status.success() {
            return Err(SimError::Failed {
                code: status.code(),
            });
        }
        if !job.out_file.is_file() {
            return Err(SimError::MissingOutput(job.out_file));
        }
        Ok(())
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    Ok(fs::canonicalize(parent)?.join(name))
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, SimError> {
    let Some(timeout) = timeout else {
        return Ok(child.wait()?);
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            if let Err(e) = kill_tree(child) {
                warn!("failed to kill simulator process {}: {e}", child.id());
            }
            child.wait()?;
            return Err(SimError::TimedOut(timeout));
        }
        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

/// Kills every simulation this process is running, including the processes they started. Meant
/// for interrupt handlers. Does nothing off unix.
pub fn kill_running() {
    for &id in lock_running().iter() {
        if let Err(e) = kill_group(id) {
            warn!("failed to kill simulator process {id}: {e}");
        }
    }
}

fn lock_running() -> std::sync::MutexGuard<'static, BTreeSet<u32>> {
    RUNNING.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    kill_group(child.id())
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

#[cfg(unix)]
fn kill_group(id: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(id)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: `kill` takes no pointers.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_group(_id: u32) -> io::Result<()> {
    Ok(())
}

/// How the simulation program is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum Launcher {
    /// `./waf --run "<program> <args>"` from the ns-3 directory. waf splits the string on
    /// whitespace, so every path passed through it must be free of whitespace.
    #[derivative(Default)]
    Waf,
    /// `<program> <args>` from the ns-3 directory, for prebuilt binaries. `program` is split on
    /// whitespace, so it may carry leading arguments of its own (`sh run-sim.sh`).
    Direct,
}

#[cfg(test)]
mod tests {
    use super::*;

    use flyway_core::{ScenarioId, VariantId};

    fn job() -> SimJob {
        SimJob {
            scenario: ScenarioId::new(1),
            variant: VariantId::new(2),
            flow_file: "/data/logs/flows__1.dat".into(),
            alloc_file: "/data/logs/alloc__1_2.dat".into(),
            out_file: "/data/results/.1_2.txt.partial".into(),
            log_file: "/data/results/1_2.log".into(),
        }
    }

    fn sim(launcher: Launcher) -> Ns3Flyway {
        Ns3Flyway::builder()
            .ns3_dir("/opt/ns-3.9")
            .topology("scratch/topo-search.dat")
            .gain(18.5)
            .launcher(launcher)
            .build()
    }

    #[test]
    fn sim_args_correct() {
        let args = sim(Launcher::Waf).sim_args(&job()).join("\n");
        insta::assert_snapshot!(args, @r###"
        --topo=scratch/topo-search.dat
        --flow=/data/logs/flows__1.dat
        --alloc=/data/logs/alloc__1_2.dat
        --outfile=/data/results/.1_2.txt.partial
        --gain=18.5
        "###);
    }

    #[test]
    fn waf_command_wraps_program() -> anyhow::Result<()> {
        let sim = sim(Launcher::Waf);
        let cmd = sim.command(Path::new("/opt/ns-3.9"), &sim.sim_args(&job()))?;
        assert_eq!(cmd.get_program(), "/opt/ns-3.9/waf");
        let args = cmd.get_args().collect::<Vec<_>>();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], "--run");
        assert!(args[1]
            .to_string_lossy()
            .starts_with("flyway-data --topo=scratch/topo-search.dat --flow="));
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/opt/ns-3.9")));
        Ok(())
    }

    #[test]
    fn waf_rejects_paths_with_whitespace() -> anyhow::Result<()> {
        const OUT_ARG: &str = "--outfile=/home/j doe/results/.1_2.txt.partial";
        let mut job = job();
        job.out_file = "/home/j doe/results/.1_2.txt.partial".into();
        let waf = sim(Launcher::Waf);
        let res = waf.command(Path::new("/opt/ns-3.9"), &waf.sim_args(&job));
        assert!(matches!(res, Err(SimError::InvalidArgument(arg)) if arg == OUT_ARG));
        let direct = sim(Launcher::Direct);
        let cmd = direct.command(Path::new("/opt/ns-3.9"), &direct.sim_args(&job))?;
        assert_eq!(cmd.get_args().nth(3).unwrap(), OUT_ARG);
        Ok(())
    }

    #[test]
    fn direct_command_passes_args() -> anyhow::Result<()> {
        let sim = sim(Launcher::Direct);
        let cmd = sim.command(Path::new("/opt/ns-3.9"), &sim.sim_args(&job()))?;
        assert_eq!(cmd.get_program(), "flyway-data");
        assert_eq!(cmd.get_args().count(), 5);
        Ok(())
    }

    #[test]
    fn direct_command_splits_program() -> anyhow::Result<()> {
        let mut sim = sim(Launcher::Direct);
        sim.program = "sh run-sim.sh".to_owned();
        let cmd = sim.command(Path::new("/opt/ns-3.9"), &sim.sim_args(&job()))?;
        assert_eq!(cmd.get_program(), "sh");
        let args = cmd.get_args().collect::<Vec<_>>();
        assert_eq!(args[0], "run-sim.sh");
        assert_eq!(args[1], "--topo=scratch/topo-search.dat");
        Ok(())
    }

    #[test]
    fn defaults() {
        let sim = Ns3Flyway::builder().ns3_dir(".").topology("t.dat").build();
        assert_eq!(sim.program, DEFAULT_PROGRAM);
        assert_eq!(sim.gain, DEFAULT_GAIN);
        assert_eq!(sim.timeout, None);
        assert_eq!(sim.launcher, Launcher::Waf);
    }
}
