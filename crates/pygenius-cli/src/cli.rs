use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::tutor::Review;

#[derive(Parser, Debug)]
#[command(
    name = "pygenius",
    about = "Run, analyze and explain Python snippets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a snippet and stream its output.
    Run(RunArgs),
    /// Scan a snippet for likely bugs without running it.
    Analyze {
        /// Source file, or `-` for stdin.
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Print findings as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Explain an error message such as "KeyError: 'age'".
    Explain {
        #[arg(value_name = "MESSAGE")]
        message: String,
        /// File holding the code that raised the error.
        #[arg(long, value_name = "FILE")]
        context: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Interactive session with one persistent namespace.
    Console {
        /// Do not bind np, pd and plt.
        #[arg(long = "no-preload")]
        no_preload: bool,
    },
    /// Manage packages of the host Python installation.
    Pip {
        #[command(subcommand)]
        action: PipAction,
    },
    /// Ask the remote tutor a question.
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
        /// Send this file as code context (first 1000 characters).
        #[arg(long, value_name = "FILE")]
        code: Option<PathBuf>,
    },
    /// Have the remote tutor explain, debug or optimize a file.
    Review {
        #[arg(value_enum)]
        kind: Review,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Source file, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Print the execution (result, outcome, records) as JSON.
    #[arg(long)]
    pub json: bool,
    /// Do not bind np, pd and plt.
    #[arg(long = "no-preload")]
    pub no_preload: bool,
}

#[derive(Subcommand, Debug)]
pub enum PipAction {
    Install {
        name: String,
    },
    Uninstall {
        name: String,
    },
    List {
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from(["pygenius", "run", "lesson.py", "--json", "--no-preload"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.file, PathBuf::from("lesson.py"));
                assert!(args.json);
                assert!(args.no_preload);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_review() {
        let cli = Cli::parse_from(["pygenius", "review", "bugs", "-"]);
        assert!(matches!(
            cli.command,
            Command::Review {
                kind: Review::Bugs,
                ..
            }
        ));
    }
}
