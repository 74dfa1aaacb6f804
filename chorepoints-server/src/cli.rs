use clap::{Parser, Subcommand};

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/app.db)
  PORT        (default: 5151 or config.listen_port)

The `settle` command runs the nightly settlement once for the current date
in the configured timezone and prints the report as JSON. A run that already
completed today is reported as `already_run` and changes nothing.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "chorepoints-server",
    version,
    about = "Chore points and allowance server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the nightly settlement now and exit
    Settle {
        /// Job code recorded in the run log (defaults to settlement.job_code)
        #[arg(long)]
        job_code: Option<String>,
    },
}
