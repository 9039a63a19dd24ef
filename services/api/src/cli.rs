use crate::commands::{run_dispatch, run_process, DispatchArgs, ProcessArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use fc_forms::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "FC Form Processor",
    about = "Turn admission cost estimates into financial counselling forms",
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
    /// Render a single inference output file as a form
    Process(ProcessArgs),
    /// Run the storage pipeline over an object-created notification file
    Dispatch(DispatchArgs),
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
        Command::Process(args) => run_process(args),
        Command::Dispatch(args) => run_dispatch(args),
    }
}
