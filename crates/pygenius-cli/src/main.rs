mod cli;
mod console;
mod error;
mod packages;
mod render;
mod settings;
mod tutor;

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use owo_colors::OwoColorize;
use pygenius::{ExecutionEngine, OutputKind, OutputRecord, analyze, explain};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, PipAction, RunArgs};
use crate::packages::PackageManager;
use crate::settings::Settings;
use crate::tutor::TutorClient;

/// Stack for the interpreter thread. Snippet recursion past this continues
/// on segments the interpreter allocates itself.
const ENGINE_STACK_SIZE: usize = 16 * 1024 * 1024;

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pygenius=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn dispatch(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load();
    match cli.command {
        Command::Run(args) => run(args, &settings),
        Command::Analyze { file, json } => {
            let findings = analyze(&read_source(&file)?);
            if json {
                println!("{}", serde_json::to_string_pretty(&findings)?);
            } else {
                render::print_findings(&findings);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Explain {
            message,
            context,
            json,
        } => {
            let context = match context {
                Some(path) => read_source(&path)?,
                None => String::new(),
            };
            let explanation = explain(&message, &context);
            if json {
                println!("{}", serde_json::to_string_pretty(&explanation)?);
            } else {
                render::print_explanation(&explanation);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Console { no_preload } => {
            let mut config = settings.engine_config();
            if no_preload {
                config.preload_libraries = false;
            }
            on_engine_thread(move || console::run(config))??;
            Ok(ExitCode::SUCCESS)
        }
        Command::Pip { action } => pip(action, &settings),
        Command::Ask { question, code } => {
            let code = match code {
                Some(path) => read_source(&path)?,
                None => String::new(),
            };
            let client = TutorClient::new(settings.tutor_config())?;
            let reply = block_on(client.ask(&question, &code))?;
            println!("{}", reply);
            Ok(exit_code(!reply.starts_with("Error: ")))
        }
        Command::Review { kind, file } => {
            let code = read_source(&file)?;
            let client = TutorClient::new(settings.tutor_config())?;
            let reply = block_on(client.review(kind, &code))?;
            println!("{}", reply);
            Ok(exit_code(!reply.starts_with("Error: ")))
        }
    }
}

fn run(args: RunArgs, settings: &Settings) -> Result<ExitCode> {
    let source = read_source(&args.file)?;
    let mut config = settings.engine_config();
    if args.no_preload {
        config.preload_libraries = false;
    }
    let json = args.json;

    let execution = on_engine_thread(move || {
        let engine = ExecutionEngine::with_config(config);
        if json {
            engine.run(&source, None)
        } else {
            let mut observer = |record: &OutputRecord| render::print_record(record);
            engine.run(&source, Some(&mut observer))
        }
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else if execution.is_success() && execution.records_of(OutputKind::Output).next().is_none() {
        println!("{}", execution.result.dimmed());
    }
    Ok(exit_code(execution.is_success()))
}

fn pip(action: PipAction, settings: &Settings) -> Result<ExitCode> {
    let manager = PackageManager::new(settings.python());
    match action {
        PipAction::Install { name } => {
            let message = block_on(manager.install(&name))?;
            render::print_status(&message);
            Ok(exit_code(message.starts_with('✓')))
        }
        PipAction::Uninstall { name } => {
            let message = block_on(manager.uninstall(&name))?;
            render::print_status(&message);
            Ok(exit_code(message.starts_with('✓')))
        }
        PipAction::List { json } => {
            let packages = block_on(manager.list())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&packages)?);
            } else {
                render::print_packages(&packages);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Read a snippet from a file, or from stdin when the path is `-`.
fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn on_engine_thread<T: Send + 'static>(work: impl FnOnce() -> T + Send + 'static) -> Result<T> {
    thread::Builder::new()
        .name("pygenius-engine".to_string())
        .stack_size(ENGINE_STACK_SIZE)
        .spawn(work)
        .context("failed to start interpreter thread")?
        .join()
        .map_err(|_| anyhow!("interpreter thread panicked"))
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
