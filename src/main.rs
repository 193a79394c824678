use std::process::ExitCode;

use preflight::config::Config;
use preflight::pipeline::Pipeline;
use preflight::{plugins, repl};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parsed command-line arguments
struct CliArgs {
    command: Option<String>,
    json: bool,
    no_exec: bool,
    help: bool,
    version: bool,
}

/// Parse command-line arguments
fn parse_args(args: &[String]) -> CliArgs {
    let mut cli = CliArgs {
        command: None,
        json: false,
        no_exec: false,
        help: false,
        version: false,
    };

    let mut i = 1; // Skip program name
    while i < args.len() {
        match args[i].as_str() {
            "-c" => {
                // Everything after -c is the command line
                if i + 1 < args.len() {
                    cli.command = Some(args[i + 1..].join(" "));
                }
                break;
            }
            "--json" => {
                cli.json = true;
            }
            "-n" | "--no-exec" => {
                cli.no_exec = true;
            }
            "--help" | "-h" => {
                cli.help = true;
            }
            "--version" | "-V" => {
                cli.version = true;
            }
            other => {
                eprintln!("preflight: unknown argument: {other}");
                cli.help = true;
            }
        }
        i += 1;
    }
    cli
}

fn print_help() {
    println!("preflight {VERSION} - command-line middleware");
    println!();
    println!("USAGE:");
    println!("    preflight [OPTIONS]              start the interactive loop");
    println!("    preflight [OPTIONS] -c <line>    dispatch one line");
    println!();
    println!("OPTIONS:");
    println!("    -n, --no-exec    print the final line instead of executing it");
    println!("        --json       with -c, print the dispatch outcome as JSON");
    println!("    -h, --help       show this help");
    println!("    -V, --version    show the version");
    println!();
    println!("ENVIRONMENT:");
    println!("    PREFLIGHT_HOME   state directory (default ~/.preflight)");
    println!("    PREFLIGHT_DEBUG  enable diagnostic trace output on stderr");
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);

    if cli.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if cli.version {
        println!("preflight {VERSION}");
        return ExitCode::SUCCESS;
    }

    let config = Config::load();
    let mut pipeline = Pipeline::with_cache_capacity(config.cache_capacity);
    plugins::register_builtin(&mut pipeline, &config);

    match cli.command {
        Some(line) => {
            let result = pipeline.dispatch(&line);
            if cli.json {
                match serde_json::to_string(&result) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("preflight: {e}");
                        return ExitCode::FAILURE;
                    }
                }
                return if result.blocked {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                };
            }
            if let Some(message) = &result.message {
                eprintln!("{message}");
            }
            if result.blocked {
                println!("{}", result.line);
                return ExitCode::FAILURE;
            }
            if cli.no_exec {
                println!("{}", result.line);
                return ExitCode::SUCCESS;
            }
            ExitCode::from(repl::execute(&result.line).clamp(0, 255) as u8)
        }
        None => ExitCode::from(repl::run(&mut pipeline, cli.no_exec).clamp(0, 255) as u8),
    }
}
