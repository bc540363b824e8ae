//! The interactive console loop.

use std::fs;

use anyhow::Result;
use owo_colors::OwoColorize;
use pygenius::{Console, EngineConfig, OutputRecord};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::render;
use crate::settings;

const PROMPT: &str = ">>> ";
const CONTINUATION: &str = "... ";

/// A console meta-command, entered with a leading `:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meta {
    Reset,
    Vars,
    Quit,
    Help,
}

impl Meta {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            ":reset" => Some(Meta::Reset),
            ":vars" => Some(Meta::Vars),
            ":quit" | ":q" | ":exit" => Some(Meta::Quit),
            ":help" => Some(Meta::Help),
            _ => None,
        }
    }
}

/// Whether a line opens an indented block that needs more input.
fn opens_block(line: &str) -> bool {
    line.trim_end().ends_with(':') && !line.trim_start().starts_with('#')
}

pub fn run(config: EngineConfig) -> Result<()> {
    let mut console = Console::with_config(config);
    let mut editor = DefaultEditor::new()?;
    let history = settings::history_path();
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    println!(
        "{}",
        "PyGenius console. :vars lists variables, :reset clears them, :quit exits.".dimmed()
    );

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line.as_str());

        match Meta::parse(&line) {
            Some(Meta::Quit) => break,
            Some(Meta::Reset) => {
                console.reset();
                println!("{}", "Namespace cleared.".dimmed());
                continue;
            }
            Some(Meta::Vars) => {
                let variables = console.variables();
                if variables.is_empty() {
                    println!("{}", "No variables defined.".dimmed());
                }
                for summary in variables {
                    println!("{}", summary);
                }
                continue;
            }
            Some(Meta::Help) => {
                println!(":vars   list variables\n:reset  clear the namespace\n:quit   exit");
                continue;
            }
            None => {}
        }

        let mut submission = line;
        if opens_block(&submission) {
            loop {
                match editor.readline(CONTINUATION) {
                    Ok(more) if more.trim().is_empty() => break,
                    Ok(more) => {
                        submission.push('\n');
                        submission.push_str(&more);
                    }
                    Err(ReadlineError::Interrupted) => {
                        submission.clear();
                        break;
                    }
                    Err(ReadlineError::Eof) => break,
                    Err(err) => return Err(err.into()),
                }
            }
            if submission.is_empty() {
                continue;
            }
        }

        let mut observer = |record: &OutputRecord| render::print_record(record);
        let execution = console.submit(&submission, Some(&mut observer));
        debug!(outcome = ?execution.outcome, "console submission finished");
    }

    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_commands() {
        assert_eq!(Meta::parse(" :vars "), Some(Meta::Vars));
        assert_eq!(Meta::parse(":q"), Some(Meta::Quit));
        assert_eq!(Meta::parse("vars"), None);
        assert_eq!(Meta::parse(":unknown"), None);
    }

    #[test]
    fn test_block_detection() {
        assert!(opens_block("def f(x):"));
        assert!(opens_block("for i in range(3):  "));
        assert!(!opens_block("x = {'a': 1}"));
        assert!(!opens_block("# note:"));
    }
}
