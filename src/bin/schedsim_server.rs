use clap::Parser;
use schedsim_rs::protocol;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Debug, Parser)]
#[command(
    name = "schedsim_server",
    about = "Reference external simulator for the remote backend"
)]
struct Args {
    /// Driver address, e.g. tcp://127.0.0.1:28000
    #[arg(short = 's', long = "socket-endpoint")]
    socket: String,

    /// Path to platform.json
    #[arg(short = 'p', long)]
    platform: PathBuf,

    /// Path to workload.json
    #[arg(short = 'w', long)]
    workload: Option<PathBuf>,

    /// Keep submission open until the driver notifies REGISTRATION_FINISHED
    #[arg(long)]
    enable_dynamic_jobs: bool,

    /// Output prefix
    #[arg(short = 'e', long = "export")]
    export: Option<PathBuf>,
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
    match protocol::serve(
        &args.socket,
        &args.platform,
        args.workload.as_deref(),
        args.export.as_deref(),
        args.enable_dynamic_jobs,
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "服务失败");
            ExitCode::FAILURE
        }
    }
}
