use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use flyway_core::sim::{SimError, SimJob, Simulator};
use flyway_core::{ScenarioId, VariantId};
use ns3_frontend::{Launcher, Ns3Flyway};

fn job(dir: &Path) -> anyhow::Result<SimJob> {
    let flow_file = dir.join("flows__0.dat");
    let alloc_file = dir.join("alloc__0_0.dat");
    fs::write(&flow_file, "0 0 1 Tcp 100000000 1Gbps\n")?;
    fs::write(&alloc_file, "0 0 1 Tcp 100000000 1Gbps 1\n")?;
    Ok(SimJob {
        scenario: ScenarioId::new(0),
        variant: VariantId::new(0),
        flow_file,
        alloc_file,
        out_file: dir.join("0_0.txt"),
        log_file: dir.join("0_0.log"),
    })
}

// Runs through `sh` so the script never has to be executable.
fn script(dir: &Path, body: &str) -> anyhow::Result<String> {
    let path = dir.join("fake-sim.sh");
    fs::write(&path, format!("{body}\n"))?;
    Ok(format!("sh {}", path.display()))
}

// Sets `$out` to the `--outfile` argument.
const FIND_OUTFILE: &str = r#"for arg in "$@"; do
  case "$arg" in --outfile=*) out="${arg#--outfile=}" ;; esac
done"#;

fn direct(dir: &Path, program: &str) -> Ns3Flyway {
    Ns3Flyway::builder()
        .ns3_dir(dir)
        .topology("topo.dat")
        .program(program)
        .launcher(Launcher::Direct)
        .timeout(Some(Duration::from_secs(10)))
        .build()
}

#[test]
#[cfg(unix)]
fn successful_run_writes_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let program = script(
        dir.path(),
        &format!(
            r#"{FIND_OUTFILE}
echo "simulating $@"
echo "[0: 1.0 0.1]" > "$out""#
        ),
    )?;
    let job = job(dir.path())?;
    direct(dir.path(), &program).simulate(&job)?;
    assert_eq!(fs::read_to_string(&job.out_file)?, "[0: 1.0 0.1]\n");
    let log = fs::read_to_string(&job.log_file)?;
    assert!(log.contains("--gain=25"));
    assert!(log.contains("--topo=topo.dat"));
    Ok(())
}

#[test]
#[cfg(unix)]
fn nonzero_exit_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let program = script(dir.path(), "exit 3")?;
    let res = direct(dir.path(), &program).simulate(&job(dir.path())?);
    assert!(matches!(res, Err(SimError::Failed { code: Some(3) })));
    Ok(())
}

#[test]
#[cfg(unix)]
fn silent_success_is_missing_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let program = script(dir.path(), "exit 0")?;
    let res = direct(dir.path(), &program).simulate(&job(dir.path())?);
    assert!(matches!(res, Err(SimError::MissingOutput(_))));
    Ok(())
}

#[test]
#[cfg(unix)]
fn hung_run_times_out() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let program = script(dir.path(), "exec sleep 30")?;
    let mut sim = direct(dir.path(), &program);
    sim.timeout = Some(Duration::from_millis(300));
    let res = sim.simulate(&job(dir.path())?);
    assert!(matches!(res, Err(SimError::TimedOut(t)) if t == Duration::from_millis(300)));
    Ok(())
}

#[test]
#[cfg(unix)]
fn timeout_kills_background_writers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let program = script(
        dir.path(),
        &format!(
            r#"{FIND_OUTFILE}
( sleep 1; echo "[0: garbled" > "$out" ) &
wait"#
        ),
    )?;
    let mut sim = direct(dir.path(), &program);
    sim.timeout = Some(Duration::from_millis(300));
    let job = job(dir.path())?;
    let res = sim.simulate(&job);
    assert!(matches!(res, Err(SimError::TimedOut(_))));
    thread::sleep(Duration::from_millis(1500));
    assert!(!job.out_file.exists());
    Ok(())
}

#[test]
#[cfg(unix)]
fn failed_run_leaves_no_background_writers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let program = script(
        dir.path(),
        &format!(
            r#"{FIND_OUTFILE}
( sleep 1; echo "[0: garbled" > "$out" ) &
exit 4"#
        ),
    )?;
    let job = job(dir.path())?;
    let res = direct(dir.path(), &program).simulate(&job);
    assert!(matches!(res, Err(SimError::Failed { code: Some(4) })));
    thread::sleep(Duration::from_millis(1500));
    assert!(!job.out_file.exists());
    Ok(())
}

#[test]
fn missing_binary_fails_to_spawn() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let program = dir.path().join("no-such-simulator");
    let res = direct(dir.path(), &program.display().to_string()).simulate(&job(dir.path())?);
    assert!(matches!(res, Err(SimError::Spawn(_))));
    Ok(())
}

#[test]
#[ignore = "ns-3 needs to be compiled"]
fn ns3_runs() -> anyhow::Result<()> {
    const MANIFEST_DIR: &str = env!("CARGO_MANIFEST_DIR");
    let data_dir = tempfile::tempdir()?;
    let ns3_dir = format!("{MANIFEST_DIR}/../../ns-3.9");
    let sim = Ns3Flyway::builder()
        .ns3_dir(ns3_dir)
        .topology("scratch/topo-search.dat")
        .timeout(Some(Duration::from_secs(600)))
        .build();
    let job = job(data_dir.path())?;
    sim.simulate(&job)?;
    assert!(job.out_file.is_file());
    Ok(())
}
