use crate::demo::{print_policies, run_demo, DemoArgs, PoliciesArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use crm_leave::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "CRM Leave Service",
    about = "Run and demonstrate the CRM leave-request approval service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the baseline leave policies seeded for a year
    Policies(PoliciesArgs),
    /// Walk a leave request through the full approval chain in memory
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Policies(args) => print_policies(args),
        Command::Demo(args) => run_demo(args),
    }
}
