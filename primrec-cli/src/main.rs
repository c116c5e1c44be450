use std::path::Path;

use anyhow::{Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use figment::providers::Serialized;
use primrec::{
    Evaluator, TermSource,
    config::{Config, load_base_config},
    standard,
};

mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Overrides `evaluator.maxDepth`
    #[clap(long, global = true)]
    max_depth: Option<usize>,
    /// Overrides `evaluator.maxSteps`
    #[clap(long, global = true)]
    max_steps: Option<u64>,
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a term against natural-number arguments
    Eval {
        /// JSON file or `std:<name>`
        term: String,
        #[clap(allow_negative_numbers = true)]
        args: Vec<String>,
    },
    /// Evaluate and print every sub-evaluation
    Trace {
        term: String,
        #[clap(allow_negative_numbers = true)]
        args: Vec<String>,
        #[clap(long)]
        json: bool,
    },
    /// Report every violation in a term
    Validate { term: String },
    /// Print a term with its arity and size
    Show {
        term: String,
        #[clap(long)]
        json: bool,
    },
    /// List the standard functions
    Standard,
}

fn main() -> Result<(), anyhow::Error> {
    utils::install_hooks()?;

    let args = Args::parse();
    utils::init_logger(args.verbose);

    let mut figment = load_base_config();
    if let Some(max_depth) = args.max_depth {
        figment = figment.merge(Serialized::default("evaluator.maxDepth", max_depth));
    }
    if let Some(max_steps) = args.max_steps {
        figment = figment.merge(Serialized::default("evaluator.maxSteps", max_steps));
    }
    let config: Config = figment.extract()?;
    log::debug!("evaluator config: {:?}", config.evaluator);

    match args.command {
        Some(Commands::Eval { term, args }) => {
            let term = primrec::load_term_with(&term, &config.graph)?;
            let arguments = primrec::parse_arguments(&term, &args)?;
            let mut evaluator = Evaluator::new(config.evaluator);
            let result = evaluator.evaluate(&term, &arguments, false)?;
            for warning in evaluator.warnings() {
                eprintln!("warning: {warning}");
            }
            println!("{result}");
            log::info!("{} steps", evaluator.statistics().total_steps);
            Ok(())
        }
        Some(Commands::Trace { term, args, json }) => {
            let term = primrec::load_term_with(&term, &config.graph)?;
            let arguments = primrec::parse_arguments(&term, &args)?;
            let mut evaluator = Evaluator::new(config.evaluator);
            let trace = evaluator.trace(&term, &arguments)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trace)?);
            } else {
                print!("{}", utils::trace_report(&trace));
            }
            Ok(())
        }
        Some(Commands::Validate { term }) => {
            let source = match term.strip_prefix("std:") {
                Some(_) => TermSource::Tree(primrec::load_term(&term)?),
                None => primrec::read_term_source(Path::new(&term))?,
            };
            let violations = source.violations();
            if violations.is_empty() {
                println!("ok");
                return Ok(());
            }
            print!("{}", utils::violation_report(&violations));
            bail!("{} violation(s) found", violations.len())
        }
        Some(Commands::Show { term, json }) => {
            let term = primrec::load_term_with(&term, &config.graph)?;
            if json {
                println!("{}", term.to_json()?);
            } else {
                print!("{}", utils::term_summary(&term));
            }
            Ok(())
        }
        Some(Commands::Standard) => {
            for name in standard::NAMES {
                if let Some(term) = standard::by_name(name) {
                    println!("std:{name:<16} arity {}  {term}", term.arity());
                }
            }
            Ok(())
        }
        None => {
            println!("No command provided");
            Ok(())
        }
    }
}
