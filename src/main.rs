use ccswitch::cli::Cli;
use ccswitch::commands;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    ExitCode::from(commands::run(cli).await)
}
