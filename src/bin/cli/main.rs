mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docimport-cli", about = "Import documents as editor pages", version)]
struct Cli {
    /// Path to an import config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize a file into a title, markdown body and document state
    Import {
        /// File to import
        file: PathBuf,
        /// Mime type (guessed from the extension when omitted)
        #[arg(long)]
        mime_type: Option<String>,
        /// Directory for rehosted images
        #[arg(long)]
        assets_dir: Option<PathBuf>,
        /// Do not download remote images
        #[arg(long)]
        no_fetch: bool,
        /// Output format
        #[arg(long, default_value = "plain")]
        format: OutputFormat,
        /// Write the encoded document state to this file
        #[arg(long)]
        state_out: Option<PathBuf>,
    },

    /// Print the block tree stored in an encoded state file
    Decode {
        /// State file written by `import --state-out`
        state_file: PathBuf,
        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();

    match cli.command {
        Command::Import {
            file,
            mime_type,
            assets_dir,
            no_fetch,
            format,
            state_out,
        } => {
            let app = app::App::new(cli.config.as_deref(), assets_dir, no_fetch)?;
            commands::import::run(
                &app,
                &file,
                mime_type.as_deref(),
                state_out.as_deref(),
                &format,
                use_color,
            )
            .await?;
        }
        Command::Decode { state_file, format } => {
            commands::decode::run(&state_file, &format, use_color)?;
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
