// Entrypoint for the CLI application.
// - Credentials are checked before anything else; a missing variable ends
//   the run with a message and a non-zero exit code.
// - Logs go to stderr so the table on stdout stays clean.
// - The first Ctrl-C stops the run after the current number and still prints
//   the report; a second one exits immediately.

use anyhow::Context;
use clap::Parser;
use telegrab::api::GatewayClient;
use telegrab::app::{check_numbers, RunContext};
use telegrab::cli::Cli;
use telegrab::config::Credentials;
use telegrab::controller::{StopFlag, ThreadSleeper};
use telegrab::input;
use telegrab::ui::Ui;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let ui = Ui::new(cli.color());
    if !cli.json {
        ui.print_banner();
    }

    let credentials = Credentials::from_env()?;
    let entries = input::resolve(&cli.source(), || ui.prompt_numbers())?;

    let stop = StopFlag::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            if stop.is_stopped() {
                std::process::exit(130);
            }
            eprintln!("\nStopping after the current number...");
            stop.stop();
        })
        .context("Failed to set Ctrl+C handler")?;
    }
    let sleeper = ThreadSleeper::new(stop.clone());

    let api = GatewayClient::connect(&cli.gateway, &credentials, &cli.session_path())?;
    let spinner = ui.spinner();
    let ctx = RunContext {
        operator_phone: &credentials.phone,
        policy: cli.policy(),
        sleeper: &sleeper,
        observer: &spinner,
        stop: &stop,
    };
    let report = check_numbers(api, &entries, &ctx, || ui.prompt_code());
    spinner.finish();

    ui.print_report(&report?, cli.json)?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "telegrab=debug" } else { "telegrab=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
