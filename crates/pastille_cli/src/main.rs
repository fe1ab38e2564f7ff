//! CLI entry point that prints the recap of every document in a project.
//!
//! # Responsibility
//! - Load a project directory or `project.json` through `pastille_core`.
//! - Print one recap block per document, in import order.
//!
//! Usage: `pastille_cli <project> [--log-dir <absolute dir>]` or `pastille_cli --version`.

use log::{error, info};
use pastille_core::{core_version, default_log_level, init_logging, load_any};
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    project: PathBuf,
    log_dir: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Args>, String> {
    let mut project = None;
    let mut log_dir = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(None),
            "--log-dir" => {
                log_dir = Some(args.next().ok_or("--log-dir needs a directory")?);
            }
            _ if project.is_none() => project = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument `{arg}`")),
        }
    }
    let project = project.ok_or("missing project path")?;
    Ok(Some(Args { project, log_dir }))
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("pastille_core version={}", core_version());
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}");
            eprintln!("usage: pastille_cli <project> [--log-dir <dir>] | --version");
            return ExitCode::from(2);
        }
    };

    if let Some(log_dir) = &args.log_dir {
        if let Err(message) = init_logging(default_log_level(), log_dir) {
            eprintln!("logging disabled: {message}");
        }
    }

    let project = match load_any(&args.project) {
        Ok(project) => project,
        Err(err) => {
            error!("event=cli_load module=cli status=error error_code={}", err.code());
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "event=cli_load module=cli status=ok documents={}",
        project.documents().len()
    );

    println!("{} ({} documents)", project.name, project.documents().len());
    for document in project.documents() {
        let recap = document.recap(&project.rubric, project.settings.out_of());
        println!();
        println!("== {}", document.original_name);
        print!("{}", recap.to_text());
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::parse_args;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_project_and_log_dir() {
        let parsed = parse_args(args(&["grading", "--log-dir", "/tmp/logs"]))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.project.to_str(), Some("grading"));
        assert_eq!(parsed.log_dir.as_deref(), Some("/tmp/logs"));
    }

    #[test]
    fn version_flag_short_circuits() {
        assert!(parse_args(args(&["--version"])).unwrap().is_none());
    }

    #[test]
    fn missing_or_extra_arguments_fail() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["a", "b"])).is_err());
        assert!(parse_args(args(&["a", "--log-dir"])).is_err());
    }
}
