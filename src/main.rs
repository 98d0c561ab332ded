// ABOUTME: CLI entry point — script runner and REPL

use clap::Parser;
use rumlisp::env::Environment;
use rumlisp::error::RumError;
use rumlisp::eval;
use rumlisp::reader;
use rumlisp::repl::RumLispHelper;
use rumlisp::value::Value;
use rumlisp::{builtins, config, host};
use rustyline::error::ReadlineError;
use rustyline::{Config as RlConfig, Editor};
use std::path::PathBuf;
use std::rc::Rc;

/// A tree-walking interpreter for the RumLisp S-expression language.
#[derive(Parser, Debug)]
#[command(name = "rumlisp")]
#[command(version = config::VERSION)]
#[command(about = "A reference-sharing, tree-walking interpreter for RumLisp")]
struct CliArgs {
    /// Script file to run. With no file, starts a REPL.
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Restrict host file access to this directory via a capability sandbox.
    #[arg(long = "fs-sandbox", value_name = "PATH")]
    fs_sandbox: Option<PathBuf>,
}

fn build_environment(args: &CliArgs) -> Rc<Environment> {
    if let Some(root) = &args.fs_sandbox {
        match host::CapStdHost::open(root) {
            Ok(h) => host::install(Rc::new(h)),
            Err(e) => eprintln!("warning: cannot open fs-sandbox '{}': {}", root.display(), e),
        }
    }
    let env = Environment::new();
    builtins::register_builtins(&env);
    config::load_prelude(&env);
    env
}

fn main() {
    let args = CliArgs::parse();
    let env = build_environment(&args);

    let exit_code = match &args.script {
        Some(path) => run_script(path, &env),
        None => {
            run_repl(&env);
            0
        }
    };
    std::process::exit(exit_code);
}

fn run_script(path: &PathBuf, env: &Rc<Environment>) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read {}: {}", path.display(), e);
            return 1;
        }
    };
    match run_program(&source, env) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{}", e.render());
            1
        }
    }
}

fn run_program(source: &str, env: &Rc<Environment>) -> Result<Value, RumError> {
    let exprs = reader::read_program(source)?;
    let mut result = Value::Unit;
    for expr in &exprs {
        result = eval::eval(expr, env)?;
    }
    Ok(result)
}

fn run_repl(env: &Rc<Environment>) {
    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);

    let rl_config = RlConfig::builder().auto_add_history(true).build();
    let mut rl = match Editor::with_config(rl_config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("cannot start REPL: {}", e);
            return;
        }
    };
    rl.set_helper(Some(RumLispHelper));

    let history_path = ".rumlisp_history";
    let _ = rl.load_history(history_path);

    loop {
        match rl.readline("risp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == ":exit" {
                    break;
                }
                if let Some(topic) = line.strip_prefix(':') {
                    print_help(topic.trim());
                    continue;
                }
                match run_program(line, env) {
                    Ok(Value::Unit) => {}
                    Ok(v) => println!("{}", v.repr()),
                    Err(e) => eprintln!("{}", e.render()),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        }
    }

    let _ = rl.save_history(history_path);
}

fn print_help(topic: &str) {
    if topic.is_empty() {
        println!("{}", rumlisp::help::format_quick_reference());
        return;
    }
    match rumlisp::help::get_help(topic) {
        Some(entry) => println!("{}", rumlisp::help::format_help_entry(&entry)),
        None => println!("no help found for '{}'", topic),
    }
}
