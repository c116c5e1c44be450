use std::fmt::Write;
use std::panic;

use color_eyre::{config::HookBuilder, eyre};
use primrec::{ExecutionTrace, Term, Violation};

pub fn install_hooks() -> anyhow::Result<()> {
    let (panic_hook, eyre_hook) = HookBuilder::default()
        .display_env_section(false)
        .into_hooks();

    // convert from a color_eyre PanicHook to a standard panic hook
    let panic_hook = panic_hook.into_panic_hook();
    panic::set_hook(Box::new(move |panic_info| {
        panic_hook(panic_info);
    }));

    // convert from a color_eyre EyreHook to a eyre ErrorHook
    let eyre_hook = eyre_hook.into_eyre_hook();
    eyre::set_hook(Box::new(
        move |error: &(dyn std::error::Error + 'static)| eyre_hook(error),
    ))?;

    Ok(())
}

/// `RUST_LOG` wins; otherwise each `-v` raises the default level by one.
pub fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

pub fn trace_report(trace: &ExecutionTrace) -> String {
    let mut out = trace.render_tree();
    let _ = writeln!(
        out,
        "\nresult: {}\nsteps: {}\nmax depth: {}",
        trace.result, trace.statistics.total_steps, trace.statistics.max_depth
    );
    for warning in &trace.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}

pub fn violation_report(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{:?}: {violation}\n", violation.kind()))
        .collect()
}

pub fn term_summary(term: &Term) -> String {
    format!(
        "{term}\narity: {}\nnodes: {}\nheight: {}\n",
        term.arity(),
        term.node_count(),
        term.height()
    )
}

#[cfg(test)]
mod tests {
    use primrec::{Evaluator, standard, validator};

    use super::*;

    #[test]
    fn summary_lists_shape() {
        assert_eq!(
            term_summary(&standard::addition()),
            "Rec(P1^1, Comp(S; P2^3))\narity: 2\nnodes: 5\nheight: 3\n"
        );
    }

    #[test]
    fn report_ends_with_statistics() {
        let trace = Evaluator::default()
            .trace(&Term::Successor, &[4])
            .unwrap();
        assert_eq!(
            trace_report(&trace),
            "#1 S(4) = 5\n\nresult: 5\nsteps: 1\nmax depth: 0\n"
        );
    }

    #[test]
    fn violations_are_tagged_with_their_kind() {
        let term = Term::Projection { n: 2, i: 3 };
        let report = violation_report(&validator::validate(&term));
        assert!(report.starts_with("Shape: root:"));
    }
}
