//! Interactive host loop.
//!
//! A minimal line editor wired to the pipeline: every accepted line is
//! dispatched before execution, and a blocked line runs a no-op instead of
//! the original. This is the documented extension point in miniature - any
//! host that calls `dispatch` and honors the returned line and `blocked`
//! flag behaves the same way.

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config;
use crate::pipeline::Pipeline;

pub fn run(pipeline: &mut Pipeline, no_exec: bool) -> i32 {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("preflight: cannot start line editor: {e}");
            return 1;
        }
    };
    let history = config::state_dir().map(|dir| dir.join("history"));
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    let mut exit_code = 0;
    loop {
        match editor.readline("preflight> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                let result = pipeline.dispatch(line);
                if result.blocked {
                    if let Some(message) = &result.message {
                        eprintln!("{message}");
                    }
                } else if result.line != line {
                    // Rewrites are announced on stderr; stdout belongs to
                    // the command itself.
                    eprintln!("-> {}", result.line);
                }

                if no_exec {
                    println!("{}", result.line);
                } else {
                    exit_code = execute(&result.line);
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("preflight: {e}");
                exit_code = 1;
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = editor.save_history(path);
    }
    exit_code
}

/// Run a line through the system shell, inheriting the terminal.
pub fn execute(line: &str) -> i32 {
    match std::process::Command::new("bash").arg("-c").arg(line).status() {
        Ok(status) => status.code().unwrap_or(-1),
        Err(e) => {
            eprintln!("preflight: failed to run bash: {e}");
            127
        }
    }
}
