use ar_capture::cli::{self, Args, Command, RunMode};
use ar_capture::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let result = match args.command {
        Command::ListCameras => cli::list_cameras(),
        Command::Config { action } => cli::handle_config_action(action, args.config.as_deref()),
        Command::Snapshot(capture) => match load_config(&args.config) {
            Ok(config) => cli::run_capture(&capture, &config, RunMode::Snapshot).await,
            Err(e) => Err(e),
        },
        Command::Preview { capture, every } => match load_config(&args.config) {
            Ok(config) => cli::run_capture(&capture, &config, RunMode::Preview { every }).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: &Option<std::path::PathBuf>) -> Result<Config, String> {
    Config::load(path.as_deref()).map_err(|e| e.to_string())
}
