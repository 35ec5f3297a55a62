/// PrologTron - ISO Prolog Evaluator CLI
use std::env;
use std::process;

use prologtron::backend::{ensure_loaded, Environment, Outcome};
use prologtron::reader::parse_term;
use prologtron::writer::{term_to_string, WriteOptions};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("PrologTron v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    prologtron [OPTIONS] [FILES...]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -v, --version        Print version information");
    eprintln!("    -g, --goal <GOAL>    Run GOAL after loading (may repeat)");
    eprintln!("    -a, --all            Print every solution, not just the first");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    [FILES...]           Prolog source files to consult, in order");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    prologtron family.pl -g \"ancestor(tom, X).\"");
    eprintln!("    prologtron -a -g \"member(X, [1,2,3]).\" ");
}

fn print_version() {
    println!("PrologTron {}", VERSION);
}

struct Options {
    files: Vec<String>,
    goals: Vec<String>,
    all_solutions: bool,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let mut files = Vec::new();
    let mut goals = Vec::new();
    let mut all_solutions = false;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-g" | "--goal" => {
                i += 1;
                if i >= args.len() {
                    return Err("missing argument for --goal".to_string());
                }
                goals.push(args[i].clone());
            }
            "-a" | "--all" => {
                all_solutions = true;
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option: {}", other));
            }
            file => files.push(file.to_string()),
        }
        i += 1;
    }
    Ok(Options {
        files,
        goals,
        all_solutions,
    })
}

/// Render the bindings of one solution, `true` when the goal had no
/// variables
fn show_solution(env: &Environment, variables: &[(String, prologtron::Term)]) -> String {
    if variables.is_empty() {
        return "true".to_string();
    }
    variables
        .iter()
        .map(|(name, value)| {
            format!(
                "{} = {}",
                name,
                term_to_string(env, value, WriteOptions::quoted())
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run one goal, printing its solutions. Returns an exit code when the
/// goal executed halt.
fn run_goal(env: &Environment, text: &str, all_solutions: bool) -> Option<i32> {
    let parsed = match parse_term(env, text) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return None;
        }
    };
    let mut interp = env.create_interpreter();
    let mut query = interp.prepare(parsed.term);
    let mut any = false;
    loop {
        match interp.solve(&mut query) {
            Outcome::Success => {
                any = true;
                println!("{} ;", show_solution(env, &parsed.variables));
                if !all_solutions {
                    interp.stop(&mut query);
                    return None;
                }
            }
            Outcome::SuccessLast => {
                println!("{}.", show_solution(env, &parsed.variables));
                return None;
            }
            Outcome::Fail => {
                if !any {
                    println!("false.");
                }
                return None;
            }
            Outcome::Halt(code) => return Some(code),
            Outcome::Exception(ball) => {
                eprintln!(
                    "uncaught exception: {}",
                    term_to_string(env, &ball, WriteOptions::quoted())
                );
                return None;
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = match parse_args() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {}", e);
            print_usage();
            process::exit(2);
        }
    };

    let env = Environment::new();
    for file in &options.files {
        if let Err(e) = ensure_loaded(&env, file) {
            eprintln!("error loading {}: {}", file, e);
            process::exit(1);
        }
    }
    for record in env.load_errors() {
        eprintln!(
            "warning: {}:{}: {}",
            record.source, record.line, record.reason
        );
    }

    for goal in &options.goals {
        if let Some(code) = run_goal(&env, goal, options.all_solutions) {
            process::exit(code);
        }
    }
}
