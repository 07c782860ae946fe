use std::io::{BufRead as _, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use freeserver_lib::config::load_config_from;
use freeserver_lib::paths::config_path;
use freeserver_lib::update::wait_for_notice;
use freeserver_lib::{init_logging, AppState, Result};

const USAGE: &str = "usage: freeserver [--config PATH] <fetch|check|update [--yes]|backups|restore VERSION|watch [--yes]>";

enum Command {
    Fetch,
    Check,
    Update { yes: bool },
    Backups,
    Restore(String),
    Watch { yes: bool },
}

struct Cli {
    config: PathBuf,
    command: Command,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Cli> {
    let mut config = config_path();
    let mut command = None;
    let mut yes = false;
    let mut restore = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = PathBuf::from(args.next()?),
            "--yes" | "-y" => yes = true,
            "fetch" | "check" | "update" | "backups" | "watch" if command.is_none() => {
                command = Some(arg.clone())
            }
            "restore" if command.is_none() => {
                restore = Some(args.next()?);
                command = Some(arg.clone());
            }
            _ => return None,
        }
    }

    let command = match command?.as_str() {
        "fetch" => Command::Fetch,
        "check" => Command::Check,
        "update" => Command::Update { yes },
        "backups" => Command::Backups,
        "restore" => Command::Restore(restore?),
        "watch" => Command::Watch { yes },
        _ => return None,
    };
    Some(Cli { config, command })
}

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

/// Ask on a blocking thread so the runtime keeps serving other tasks.
async fn ask(prompt: String, yes: bool) -> bool {
    if yes {
        return true;
    }
    tokio::task::spawn_blocking(move || confirm(&prompt))
        .await
        .unwrap_or(false)
}

async fn install_and_report(state: &AppState) -> Result<bool> {
    if state.install_update().await? {
        println!("Update successful, restart to use the new version");
        Ok(true)
    } else {
        eprintln!("Update failed! Please try manually");
        Ok(false)
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config = load_config_from(&cli.config)?;
    let state = AppState::from_config(&config, cli.config)?;

    match cli.command {
        Command::Fetch => {
            let listing = state.fetch_servers().await;
            if listing.empty {
                eprintln!("No valid servers found");
                return Ok(false);
            }
            for line in &listing.lines {
                println!("{}", line);
            }
            Ok(true)
        }
        Command::Check => {
            let status = state.check_update().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(true)
        }
        Command::Update { yes } => {
            let status = state.check_update().await;
            if !status.available {
                println!("Already up to date ({})", status.installed_version);
                return Ok(true);
            }
            let prompt = format!(
                "New version {} available!\n\n{}\n\nUpdate now?",
                status.state.latest_version, status.state.changelog
            );
            if !ask(prompt, yes).await {
                return Ok(true);
            }
            install_and_report(&state).await
        }
        Command::Backups => {
            for backup in state.list_backups()? {
                println!(
                    "{}\t{}\t{}",
                    backup.metadata.version,
                    backup.metadata.created_at,
                    backup.metadata.files.join(",")
                );
            }
            Ok(true)
        }
        Command::Restore(version) => {
            let restored = state.restore_backup(&version)?;
            println!("Restored {} files from backup of {}", restored, version);
            Ok(true)
        }
        Command::Watch { yes } => {
            if !config.update.auto_check {
                println!("Automatic update checks are disabled in the config");
                return Ok(true);
            }
            let scheduler = state.start_scheduler();
            let mut notices = scheduler.subscribe();
            loop {
                let notice = tokio::select! {
                    notice = wait_for_notice(&mut notices, Duration::from_secs(3600)) => notice,
                    _ = tokio::signal::ctrl_c() => break,
                };
                let Some(notice) = notice else {
                    continue;
                };

                let prompt = format!(
                    "New version {} available!\n\n{}\n\nUpdate now?",
                    notice.version, notice.changelog
                );
                if !ask(prompt, yes).await {
                    continue;
                }
                if let Err(e) = install_and_report(&state).await {
                    log::error!("Update failed: {}", e);
                }
            }
            scheduler.cancel();
            scheduler.join().await;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let Some(cli) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
