use std::process::ExitCode;

use ai_login::cli::{usage_error_message, Cli, Credentials};
use ai_login::driver::perform_login;
use ai_login::report::{report, LoginResult};
use ai_login::LlmAgentFactory;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries only the result line
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let result = match Cli::try_parse() {
        Ok(cli) => {
            let credentials = Credentials::from_env();
            perform_login(
                &cli.login_request(&credentials),
                credentials.api_key.as_ref(),
                &LlmAgentFactory,
                &cli.driver_options(),
            )
            .await
        }
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            LoginResult::failure(usage_error_message(&e.to_string()))
        }
    };

    match report(&result, &mut std::io::stdout().lock()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "failed to write result");
            ExitCode::FAILURE
        }
    }
}
