use std::fmt::Write;

use serde::Serialize;

use crate::term::{Natural, TermKind};

/// One sub-evaluation. Steps are numbered from 1 in the order they were
/// entered and refer to each other by that number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStep {
    pub sequence: u64,
    pub kind: TermKind,
    pub term: String,
    pub args: Vec<Natural>,
    pub result: Natural,
    pub depth: usize,
    pub parent: Option<u64>,
    pub children: Vec<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStatistics {
    pub total_steps: u64,
    pub max_depth: usize,
    pub warnings: usize,
}

/// Everything one traced call produced, detached from the evaluator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub term: String,
    pub args: Vec<Natural>,
    pub result: Natural,
    pub statistics: EvaluationStatistics,
    pub warnings: Vec<String>,
    pub steps: Vec<EvaluationStep>,
}

impl ExecutionTrace {
    pub fn root(&self) -> Option<&EvaluationStep> {
        self.steps.first()
    }

    pub fn step(&self, sequence: u64) -> Option<&EvaluationStep> {
        step_by_sequence(&self.steps, sequence)
    }

    pub fn children<'a>(
        &'a self,
        step: &'a EvaluationStep,
    ) -> impl Iterator<Item = &'a EvaluationStep> + 'a {
        step.children
            .iter()
            .filter_map(|sequence| self.step(*sequence))
    }

    /// Indented dump, one line per step in call order.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut pending: Vec<&EvaluationStep> = self.root().into_iter().collect();
        while let Some(step) = pending.pop() {
            let _ = writeln!(
                out,
                "{:indent$}#{} {}({}) = {}",
                "",
                step.sequence,
                step.term,
                format_arguments(&step.args),
                step.result,
                indent = step.depth * 2
            );
            pending.extend(self.children(step).collect::<Vec<_>>().into_iter().rev());
        }
        out
    }
}

pub(crate) fn step_by_sequence(steps: &[EvaluationStep], sequence: u64) -> Option<&EvaluationStep> {
    let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
    steps.get(index)
}

pub fn max_depth(steps: &[EvaluationStep]) -> usize {
    steps.iter().map(|step| step.depth).max().unwrap_or(0)
}

pub fn format_arguments(args: &[Natural]) -> String {
    args.iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
