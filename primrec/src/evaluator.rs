//! Bounded interpretation of terms.
//!
//! The evaluator never recurses on the native stack. It runs a small machine
//! that alternates between computing a term and returning a value to the
//! innermost pending continuation, so the depth ceiling is a logical limit
//! and can sit far above what the host stack could take.

use std::collections::HashMap;

use crate::{
    config::EvaluatorConfig,
    error::{Error, Result},
    execution_trace::{
        EvaluationStatistics, EvaluationStep, ExecutionTrace, max_depth, step_by_sequence,
    },
    term::{Natural, Term},
};

enum State<'t> {
    Compute {
        term: &'t Term,
        args: Vec<Natural>,
        depth: usize,
        /// Trace index of the step that asked for this computation.
        parent: Option<usize>,
    },
    Return(Natural),
    Done(Natural),
}

/// What to do with the next returned value.
enum Context<'t> {
    /// Close the trace record of a composite term.
    Finish { record: Option<usize> },
    /// Collect one more inner result, then compute the next inner term or
    /// the outer term.
    Inner {
        outer: &'t Term,
        inner: &'t [Term],
        args: Vec<Natural>,
        results: Vec<Natural>,
        depth: usize,
        record: Option<usize>,
    },
    /// The value is `f(x, rest..)`; apply the recursion step to it.
    Previous {
        step: &'t Term,
        x: Natural,
        rest: Vec<Natural>,
        depth: usize,
        record: Option<usize>,
    },
}

#[derive(Default)]
struct Recorder {
    steps: Vec<EvaluationStep>,
    rendered: HashMap<*const Term, String>,
}

impl Recorder {
    fn enter(&mut self, term: &Term, args: &[Natural], depth: usize, parent: Option<usize>) -> usize {
        let index = self.steps.len();
        let sequence = index as u64 + 1;
        let rendered = self
            .rendered
            .entry(term as *const Term)
            .or_insert_with(|| term.to_string())
            .clone();
        self.steps.push(EvaluationStep {
            sequence,
            kind: term.kind(),
            term: rendered,
            args: args.to_vec(),
            result: 0,
            depth,
            parent: parent.map(|p| p as u64 + 1),
            children: vec![],
        });
        if let Some(parent) = parent.and_then(|p| self.steps.get_mut(p)) {
            parent.children.push(sequence);
        }
        index
    }

    fn finish(&mut self, record: Option<usize>, value: Natural) {
        if let Some(step) = record.and_then(|index| self.steps.get_mut(index)) {
            step.result = value;
        }
    }
}

struct Machine<'t, 'c> {
    config: &'c EvaluatorConfig,
    step_counter: u64,
    recorder: Option<Recorder>,
    context: Vec<Context<'t>>,
}

impl<'t> Machine<'t, '_> {
    fn run(&mut self, term: &'t Term, args: &[Natural]) -> Result<Natural> {
        let mut state = State::Compute {
            term,
            args: args.to_vec(),
            depth: 0,
            parent: None,
        };
        loop {
            state = match self.step(state)? {
                State::Done(value) => return Ok(value),
                next => next,
            };
        }
    }

    fn step(&mut self, state: State<'t>) -> Result<State<'t>> {
        match state {
            State::Compute {
                term,
                args,
                depth,
                parent,
            } => self.step_compute(term, args, depth, parent),
            State::Return(value) => Ok(self.step_return(value)),
            State::Done(value) => Ok(State::Done(value)),
        }
    }

    fn step_compute(
        &mut self,
        term: &'t Term,
        args: Vec<Natural>,
        depth: usize,
        parent: Option<usize>,
    ) -> Result<State<'t>> {
        if depth > self.config.max_depth {
            return Err(Error::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        if self.step_counter >= self.config.max_steps {
            return Err(Error::StepsExceeded {
                limit: self.config.max_steps,
            });
        }
        self.step_counter += 1;
        let record = self
            .recorder
            .as_mut()
            .map(|recorder| recorder.enter(term, &args, depth, parent));

        let next = match term {
            Term::Composition { outer, inner } => {
                self.context.push(Context::Finish { record });
                match inner.first() {
                    Some(first) => {
                        self.context.push(Context::Inner {
                            outer,
                            inner,
                            args: args.clone(),
                            results: Vec::with_capacity(inner.len()),
                            depth,
                            record,
                        });
                        State::Compute {
                            term: first,
                            args,
                            depth: depth + 1,
                            parent: record,
                        }
                    }
                    None => State::Compute {
                        term: outer,
                        args: vec![],
                        depth: depth + 1,
                        parent: record,
                    },
                }
            }
            Term::PrimitiveRecursion { base, step } => {
                let Some((&x, rest)) = args.split_first() else {
                    return Err(Error::ArityMismatch {
                        expected: term.arity(),
                        actual: 0,
                    });
                };
                self.context.push(Context::Finish { record });
                if x == 0 {
                    State::Compute {
                        term: base,
                        args: rest.to_vec(),
                        depth: depth + 1,
                        parent: record,
                    }
                } else {
                    self.context.push(Context::Previous {
                        step,
                        x: x - 1,
                        rest: rest.to_vec(),
                        depth,
                        record,
                    });
                    let mut previous = args;
                    previous[0] = x - 1;
                    State::Compute {
                        term,
                        args: previous,
                        depth: depth + 1,
                        parent: record,
                    }
                }
            }
            leaf => {
                let value = leaf.apply(&args)?;
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.finish(record, value);
                }
                State::Return(value)
            }
        };
        Ok(next)
    }

    fn step_return(&mut self, value: Natural) -> State<'t> {
        let Some(context) = self.context.pop() else {
            return State::Done(value);
        };
        match context {
            Context::Finish { record } => {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.finish(record, value);
                }
                State::Return(value)
            }
            Context::Inner {
                outer,
                inner,
                args,
                mut results,
                depth,
                record,
            } => {
                results.push(value);
                match inner.get(results.len()) {
                    Some(next) => {
                        let next_args = args.clone();
                        self.context.push(Context::Inner {
                            outer,
                            inner,
                            args,
                            results,
                            depth,
                            record,
                        });
                        State::Compute {
                            term: next,
                            args: next_args,
                            depth: depth + 1,
                            parent: record,
                        }
                    }
                    None => State::Compute {
                        term: outer,
                        args: results,
                        depth: depth + 1,
                        parent: record,
                    },
                }
            }
            Context::Previous {
                step,
                x,
                rest,
                depth,
                record,
            } => {
                let mut args = Vec::with_capacity(rest.len() + 2);
                args.push(x);
                args.push(value);
                args.extend(rest);
                State::Compute {
                    term: step,
                    args,
                    depth: depth + 1,
                    parent: record,
                }
            }
        }
    }
}

/// Evaluates terms under the configured ceilings. The accessors describe the
/// most recent call only.
#[derive(Debug, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
    step_counter: u64,
    steps: Vec<EvaluationStep>,
    warnings: Vec<String>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EvaluatorConfig) {
        self.config = config;
    }

    /// Computes `term(args)`. With `track_steps` every sub-evaluation is
    /// recorded and available from [`Evaluator::steps`] afterwards.
    ///
    /// Fails before doing any work when `args` does not match the arity, and
    /// aborts as a whole when a ceiling is hit. After a failure the step
    /// counter and warnings are kept but no trace is.
    pub fn evaluate(&mut self, term: &Term, args: &[Natural], track_steps: bool) -> Result<Natural> {
        self.step_counter = 0;
        self.steps.clear();
        self.warnings.clear();

        if args.len() != term.arity() {
            return Err(Error::ArityMismatch {
                expected: term.arity(),
                actual: args.len(),
            });
        }

        let threshold = self.config.large_argument_threshold;
        if args.iter().any(|arg| *arg > threshold) {
            let warning =
                format!("large arguments detected (above {threshold}), computation may be slow");
            log::warn!("{}", warning);
            self.warnings.push(warning);
        }

        log::debug!(
            "evaluating {} term ({} nodes) on [{}]",
            term.kind(),
            term.node_count(),
            crate::execution_trace::format_arguments(args)
        );

        let mut machine = Machine {
            config: &self.config,
            step_counter: 0,
            recorder: track_steps.then(Recorder::default),
            context: vec![],
        };
        let outcome = machine.run(term, args);
        self.step_counter = machine.step_counter;

        match outcome {
            Ok(value) => {
                if let Some(recorder) = machine.recorder {
                    self.steps = recorder.steps;
                }
                log::debug!("result {} after {} steps", value, self.step_counter);
                Ok(value)
            }
            Err(err) => {
                if err.is_ceiling() {
                    log::info!("evaluation aborted after {} steps: {}", self.step_counter, err);
                } else {
                    log::debug!("evaluation failed after {} steps: {}", self.step_counter, err);
                }
                Err(err)
            }
        }
    }

    pub fn evaluate_traced(&mut self, term: &Term, args: &[Natural]) -> Result<Natural> {
        self.evaluate(term, args, true)
    }

    /// Traced evaluation packaged as an owned, serializable trace.
    pub fn trace(&mut self, term: &Term, args: &[Natural]) -> Result<ExecutionTrace> {
        let result = self.evaluate_traced(term, args)?;
        Ok(ExecutionTrace {
            term: term.to_string(),
            args: args.to_vec(),
            result,
            statistics: self.statistics(),
            warnings: self.warnings.clone(),
            steps: self.steps.clone(),
        })
    }

    /// Recorded steps ordered by sequence number; empty after a lean call or
    /// a failed one.
    pub fn steps(&self) -> &[EvaluationStep] {
        &self.steps
    }

    pub fn root_step(&self) -> Option<&EvaluationStep> {
        self.steps.first()
    }

    pub fn step(&self, sequence: u64) -> Option<&EvaluationStep> {
        step_by_sequence(&self.steps, sequence)
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn statistics(&self) -> EvaluationStatistics {
        EvaluationStatistics {
            total_steps: self.step_counter,
            max_depth: max_depth(&self.steps),
            warnings: self.warnings.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{standard, term::TermKind};

    fn limited(max_depth: usize, max_steps: u64) -> Evaluator {
        Evaluator::new(EvaluatorConfig {
            max_depth,
            max_steps,
            ..Default::default()
        })
    }

    #[test]
    fn leaves_take_one_step() {
        let mut evaluator = Evaluator::default();
        assert_eq!(evaluator.evaluate(&Term::Successor, &[41], false), Ok(42));
        assert_eq!(evaluator.statistics().total_steps, 1);
        assert_eq!(evaluator.evaluate(&Term::constant(9, 0), &[], true), Ok(9));
        assert_eq!(evaluator.steps().len(), 1);
    }

    #[test]
    fn standard_values() {
        let mut evaluator = Evaluator::default();
        let add = standard::addition();
        let mult = standard::multiplication();
        let fact = standard::factorial();
        assert_eq!(evaluator.evaluate(&add, &[0, 5], false), Ok(5));
        assert_eq!(evaluator.evaluate(&add, &[3, 4], false), Ok(7));
        assert_eq!(evaluator.evaluate(&mult, &[0, 5], false), Ok(0));
        assert_eq!(evaluator.evaluate(&mult, &[3, 4], false), Ok(12));
        assert_eq!(evaluator.evaluate(&fact, &[0], false), Ok(1));
        assert_eq!(evaluator.evaluate(&fact, &[5], false), Ok(120));
    }

    #[test]
    fn trace_follows_the_call_tree() {
        let mut evaluator = Evaluator::default();
        assert_eq!(evaluator.evaluate_traced(&standard::addition(), &[1, 2]), Ok(3));

        let summary: Vec<(u64, TermKind, Vec<Natural>, Natural, usize, Option<u64>)> = evaluator
            .steps()
            .iter()
            .map(|s| (s.sequence, s.kind, s.args.clone(), s.result, s.depth, s.parent))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, TermKind::PrimitiveRecursion, vec![1, 2], 3, 0, None),
                (2, TermKind::PrimitiveRecursion, vec![0, 2], 2, 1, Some(1)),
                (3, TermKind::Projection, vec![2], 2, 2, Some(2)),
                (4, TermKind::Composition, vec![0, 2, 2], 3, 1, Some(1)),
                (5, TermKind::Projection, vec![0, 2, 2], 2, 2, Some(4)),
                (6, TermKind::Successor, vec![2], 3, 2, Some(4)),
            ]
        );
        assert_eq!(evaluator.step(1).unwrap().children, vec![2, 4]);
        assert_eq!(evaluator.step(4).unwrap().children, vec![5, 6]);
        assert_eq!(
            evaluator.statistics(),
            EvaluationStatistics {
                total_steps: 6,
                max_depth: 2,
                warnings: 0
            }
        );
    }

    #[test]
    fn both_modes_count_the_same_steps() {
        let mut evaluator = Evaluator::default();
        let fact = standard::factorial();
        let lean = evaluator.evaluate(&fact, &[4], false).unwrap();
        let lean_steps = evaluator.statistics().total_steps;
        assert_eq!(evaluator.statistics().max_depth, 0);

        let traced = evaluator.evaluate(&fact, &[4], true).unwrap();
        assert_eq!(lean, traced);
        assert_eq!(evaluator.statistics().total_steps, lean_steps);
        assert_eq!(evaluator.steps().len() as u64, lean_steps);
        assert!(evaluator.statistics().max_depth > 0);
    }

    #[test]
    fn arity_is_checked_before_any_work() {
        let mut evaluator = Evaluator::default();
        assert_eq!(
            evaluator.evaluate(&standard::addition(), &[1], true),
            Err(Error::ArityMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(evaluator.statistics().total_steps, 0);
        assert!(evaluator.steps().is_empty());
    }

    #[test]
    fn depth_ceiling_aborts_the_call() {
        let mut evaluator = limited(5, 1_000);
        let err = evaluator
            .evaluate(&standard::addition(), &[10, 0], true)
            .unwrap_err();
        assert_eq!(err, Error::DepthExceeded { limit: 5 });
        assert!(evaluator.steps().is_empty());
        assert!(evaluator.statistics().total_steps > 0);
    }

    #[test]
    fn step_ceiling_keeps_the_counter() {
        let mut evaluator = limited(1_000, 10);
        let err = evaluator
            .evaluate(&standard::addition(), &[5, 5], false)
            .unwrap_err();
        assert_eq!(err, Error::StepsExceeded { limit: 10 });
        assert_eq!(evaluator.statistics().total_steps, 10);
    }

    #[test]
    fn exactly_enough_steps_is_fine() {
        // add(1, 2) takes six steps.
        let mut evaluator = limited(1_000, 6);
        assert_eq!(evaluator.evaluate(&standard::addition(), &[1, 2], false), Ok(3));
    }

    #[test]
    fn exactly_enough_depth_is_fine() {
        // add(1, 2) reaches depth 2.
        let mut evaluator = limited(2, 1_000);
        assert_eq!(evaluator.evaluate(&standard::addition(), &[1, 2], false), Ok(3));

        let mut evaluator = limited(1, 1_000);
        assert_eq!(
            evaluator.evaluate(&standard::addition(), &[1, 2], false),
            Err(Error::DepthExceeded { limit: 1 })
        );
    }

    #[test]
    fn deep_recursion_stays_off_the_native_stack() {
        let mut evaluator = Evaluator::default();
        let add = standard::addition();
        assert_eq!(evaluator.evaluate(&add, &[200_000, 1], false), Ok(200_001));
        assert_eq!(evaluator.statistics().total_steps, 4 * 200_000 + 2);
    }

    #[test]
    fn large_arguments_only_warn() {
        let mut evaluator = Evaluator::new(EvaluatorConfig {
            large_argument_threshold: 10,
            ..Default::default()
        });
        assert_eq!(evaluator.evaluate(&standard::addition(), &[0, 11], false), Ok(11));
        assert_eq!(evaluator.warnings().len(), 1);
        assert_eq!(evaluator.statistics().warnings, 1);

        evaluator.evaluate(&standard::addition(), &[0, 1], false).unwrap();
        assert!(evaluator.warnings().is_empty());
    }

    #[test]
    fn malformed_terms_fail_cleanly() {
        // Z takes one argument but receives two.
        let term = Term::Composition {
            outer: Box::new(Term::Zero),
            inner: vec![Term::Projection { n: 1, i: 1 }, Term::Projection { n: 1, i: 1 }],
        };
        let mut evaluator = Evaluator::default();
        assert_eq!(
            evaluator.evaluate(&term, &[3], true),
            Err(Error::ArityMismatch {
                expected: 1,
                actual: 2
            })
        );
        assert!(evaluator.steps().is_empty());
    }

    #[test]
    fn empty_compositions_call_the_outer_term_with_nothing() {
        let term = Term::Composition {
            outer: Box::new(Term::constant(7, 0)),
            inner: vec![],
        };
        let mut evaluator = Evaluator::default();
        assert_eq!(evaluator.evaluate(&term, &[], true), Ok(7));
        assert_eq!(evaluator.step(1).unwrap().children, vec![2]);
    }

    #[test]
    fn owned_traces_render() {
        let mut evaluator = Evaluator::default();
        let trace = evaluator.trace(&standard::addition(), &[0, 4]).unwrap();
        assert_eq!(trace.result, 4);
        assert_eq!(
            trace.render_tree(),
            "#1 Rec(P1^1, Comp(S; P2^3))(0, 4) = 4\n  #2 P1^1(4) = 4\n"
        );
    }
}
