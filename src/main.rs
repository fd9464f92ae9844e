mod cli;

use std::{
    io::{self, Write},
    process::ExitCode,
};

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use stata_runner::{
    executor::{ExecuteOptions, ExitStatus, ScriptSubmission},
    guard::GuardVerdict,
    logging,
    printer::{self, TextPrinter},
    Config, Session,
};
use tracing::warn;

use cli::{Cli, Command, RunArgs, ScriptArgs};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    let cfg = Config::load();
    logging::init(&cfg)?;

    let printer = TextPrinter { color: io::stdout().is_terminal() };
    let session = Session::new(cfg);

    match &args.command {
        Command::Run(run) => run_script(&session, &args, run, &printer).await,
        Command::Check(script) => check_script(&session, &args, script, &printer),
        Command::Locate { all } => locate(&session, &args, *all, &printer),
        Command::Usable => usable(&session, &args, &printer),
    }
}

fn submission(script: &ScriptArgs, cfg: &Config) -> ScriptSubmission {
    let dangerous = script.dangerous || cfg.dangerous_mode();
    let sub = match (&script.file, &script.code) {
        (Some(path), _) => ScriptSubmission::file(path),
        (None, Some(code)) => ScriptSubmission::text(code.as_str()),
        (None, None) => ScriptSubmission::text(String::new()),
    };
    sub.dangerous(dangerous)
}

async fn run_script(session: &Session, args: &Cli, run: &RunArgs, printer: &TextPrinter) -> Result<ExitCode> {
    let cfg = session.config();
    let sub = submission(&run.script, cfg);
    let timeout = run
        .timeout
        .filter(|s| *s > 0)
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| cfg.timeout());

    let mut confirmed = run.yes;
    if !confirmed {
        if let Ok(text) = sub.read() {
            let report = session.check(&text, sub.dangerous_mode);
            if report.needs_confirmation() && io::stdin().is_terminal() {
                eprintln!("{}", printer.report(&report));
                confirmed = ask_confirmation()?;
            }
        }
    }

    let mut opts = ExecuteOptions::new(timeout).confirmed(confirmed);
    if let Some(dir) = &run.cwd {
        opts = opts.working_dir(dir);
    }

    let result = session.run(args.stata.as_deref(), &sub, &opts).await?;
    if args.json {
        println!("{}", printer::json(&result)?);
    } else {
        println!("{}", printer.result(&result));
    }

    Ok(match result.exit_status {
        ExitStatus::Success => ExitCode::SUCCESS,
        ExitStatus::Failure => ExitCode::from(1),
        ExitStatus::Denied => ExitCode::from(2),
        ExitStatus::Timeout => ExitCode::from(3),
        ExitStatus::LaunchError => ExitCode::from(4),
    })
}

fn ask_confirmation() -> Result<bool> {
    print!("Run anyway? [y/N]: ");
    io::stdout().flush().ok();
    let mut choice = String::new();
    io::stdin().read_line(&mut choice)?;
    Ok(matches!(choice.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn check_script(session: &Session, args: &Cli, script: &ScriptArgs, printer: &TextPrinter) -> Result<ExitCode> {
    let sub = submission(script, session.config());
    let text = sub.read().context("reading do-file")?;
    let report = session.check(&text, sub.dangerous_mode);
    if args.json {
        println!("{}", printer::json(&report)?);
    } else {
        println!("{}", printer.report(&report));
    }
    Ok(match report.verdict {
        GuardVerdict::Allow => ExitCode::SUCCESS,
        GuardVerdict::Ask { .. } => ExitCode::from(1),
        GuardVerdict::Deny { .. } => ExitCode::from(2),
    })
}

fn locate(session: &Session, args: &Cli, all: bool, printer: &TextPrinter) -> Result<ExitCode> {
    if all {
        let found = session.installations(args.stata.as_deref());
        if args.json {
            println!("{}", printer::json(&found)?);
        } else if found.is_empty() {
            println!("no Stata installations found");
        } else {
            for e in &found {
                println!("{}", printer.installation(e));
            }
        }
        return Ok(if found.is_empty() { ExitCode::FAILURE } else { ExitCode::SUCCESS });
    }

    let resolved = session.resolve(args.stata.as_deref())?;
    if args.json {
        println!("{}", printer::json(&resolved)?);
    } else {
        println!("{}", printer.interpreter(&resolved));
    }
    Ok(ExitCode::SUCCESS)
}

fn usable(session: &Session, args: &Cli, printer: &TextPrinter) -> Result<ExitCode> {
    match session.resolve(args.stata.as_deref()) {
        Ok(resolved) => {
            println!("Stata is usable: {}", printer.interpreter(&resolved));
            println!("logs: {}", session.config().cache_path().display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            warn!("{e}");
            println!("Stata is not usable on this machine.\n{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
