use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tls_ping::cli::Cli;
use tls_ping::engine::Prober;
use tls_ping::error::{FailureKind, ProbeError, StageExt};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => return fail(ProbeError::Usage(err.render().to_string())),
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

async fn run(cli: Cli) -> Result<(), ProbeError> {
    let cfg = cli.into_config()?;
    let prober = Prober::new(cfg)?;
    let mut report = prober.run().await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    tls_ping::output::write_report(&mut out, &prober.config().output, &report)
        .stage(FailureKind::Output)?;

    match report.take_read_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn fail(err: ProbeError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::from(err.exit_code())
}
