use clap::Parser;
use schedsim_rs::handle::{RemoteHandle, SelfContainedHandle, SimulationHandle};
use schedsim_rs::policy::FirstComeFirstServed;
use schedsim_rs::protocol::RemoteConfig;
use schedsim_rs::sim::{NotifyType, Result, SimTime};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "schedsim",
    about = "Run a workload through the job-scheduling simulator with the FCFS policy"
)]
struct Args {
    /// Path to platform.json
    #[arg(long)]
    platform: PathBuf,

    /// Path to workload.json; without it jobs must be registered dynamically
    #[arg(long)]
    workload: Option<PathBuf>,

    /// Output prefix; monitors write `<output>_<name>.json`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Delegate execution to this external simulator program
    #[arg(long, value_name = "PROGRAM")]
    remote: Option<PathBuf>,

    /// Stop once simulated time reaches this many seconds
    #[arg(long, value_name = "SECS")]
    until: Option<u64>,
}

fn drive(handle: &mut dyn SimulationHandle, until: Option<SimTime>) -> Result<()> {
    while handle.is_running() {
        if let Some(until) = until {
            if handle.current_time() >= until {
                info!(now = %handle.current_time(), "到达 --until，提前结束");
                break;
            }
        }
        handle.advance()?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let mut handle: Box<dyn SimulationHandle> = match &args.remote {
        Some(program) => Box::new(RemoteHandle::new(RemoteConfig::with_program(program))),
        None => Box::new(SelfContainedHandle::new()),
    };
    let policy = FirstComeFirstServed::attach(handle.as_mut());

    handle.start(
        &args.platform,
        args.workload.as_deref(),
        args.output.as_deref(),
    )?;
    if args.workload.is_none() {
        // 这个驱动不会动态注册作业
        handle.notify(NotifyType::RegistrationFinished)?;
    }

    // 无论推进是否出错都要结束仿真，保证外部进程被回收
    let driven = drive(handle.as_mut(), args.until.map(SimTime));
    let finished = handle.finish();
    driven?;
    finished?;

    let policy = policy.borrow();
    println!("jobs_completed {}", policy.completed());
    println!("jobs_walltime_reached {}", policy.walltime_reached());
    println!("jobs_killed {}", policy.killed());
    println!("jobs_rejected {}", policy.rejected());
    println!("makespan {}", policy.makespan().0);
    println!("sim_time {}", handle.current_time().0);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "仿真失败");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
