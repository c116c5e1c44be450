pub mod config;
pub mod error;
pub mod evaluator;
pub mod execution_trace;
pub mod graph;
pub mod standard;
pub mod term;
pub mod validator;

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use config::GraphConfig;
use serde_json::Value;

//REXPORTS
pub use error::Error;
pub use evaluator::Evaluator;
pub use execution_trace::{EvaluationStatistics, EvaluationStep, ExecutionTrace};
pub use graph::{Node, NodeId, TermGraph};
pub use term::{Natural, Term, TermKind};
pub use validator::{Violation, is_valid, validate};

/// A term file holds either a nested record or a node table.
pub enum TermSource {
    Tree(Term),
    Graph(TermGraph),
}

impl TermSource {
    pub fn from_value(value: &Value) -> Result<TermSource> {
        if value.get("nodes").is_some() {
            Ok(TermSource::Graph(
                TermGraph::from_value(value).context("failed to read node table")?,
            ))
        } else {
            Ok(TermSource::Tree(
                Term::from_value(value).context("failed to read term record")?,
            ))
        }
    }

    pub fn violations(&self) -> Vec<Violation> {
        match self {
            TermSource::Tree(term) => validator::validate(term),
            TermSource::Graph(graph) => validator::validate_graph(graph),
        }
    }

    pub fn into_term(self) -> Result<Term> {
        self.into_term_with(&GraphConfig::default())
    }

    /// Node tables are only turned into trees once they validate cleanly.
    pub fn into_term_with(self, config: &GraphConfig) -> Result<Term> {
        match self {
            TermSource::Tree(term) => Ok(term),
            TermSource::Graph(graph) => {
                let violations = validator::validate_graph(&graph);
                if !violations.is_empty() {
                    bail!(
                        "node table is not a well-formed term:\n{}",
                        violations
                            .iter()
                            .map(|v| format!("  {v}"))
                            .collect::<Vec<_>>()
                            .join("\n")
                    );
                }
                Ok(graph.to_term_within(config.max_term_nodes)?)
            }
        }
    }
}

pub fn read_term_source(path: &Path) -> Result<TermSource> {
    let file = File::open(path)
        .map_err(|e| anyhow!("failed to open term file {}: {}", path.display(), e))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).context("failed to parse term file")?;
    TermSource::from_value(&value)
}

pub fn load_term_file(path: &Path) -> Result<Term> {
    load_term_file_with(path, &GraphConfig::default())
}

pub fn load_term_file_with(path: &Path, config: &GraphConfig) -> Result<Term> {
    read_term_source(path)?.into_term_with(config)
}

pub fn load_term(source: &str) -> Result<Term> {
    load_term_with(source, &GraphConfig::default())
}

/// `std:<name>` picks a standard function, anything else is a file path.
pub fn load_term_with(source: &str, config: &GraphConfig) -> Result<Term> {
    match source.strip_prefix("std:") {
        Some(name) => standard::by_name(name).ok_or(anyhow!(
            "unknown standard function {name:?}, expected one of {}",
            standard::NAMES.join(", ")
        )),
        None => load_term_file_with(Path::new(source), config),
    }
}

/// Accepts the whole `Natural` range; negative integers are parsed only so
/// they can be reported as such.
pub fn parse_arguments(term: &Term, arguments: &[String]) -> Result<Vec<Natural>> {
    let values = arguments
        .iter()
        .enumerate()
        .map(|(index, arg)| {
            arg.trim()
                .parse::<i128>()
                .context(format!("could not parse argument {index} ({arg:?}) as an integer"))
        })
        .collect::<Result<Vec<_>>>()?;

    // Naturals above i64::MAX stay non-negative when clamped.
    let clamped: Vec<i64> = values
        .iter()
        .map(|value| (*value).clamp(i64::MIN.into(), i64::MAX.into()) as i64)
        .collect();
    if let Some(violation) = validator::validate_arguments(term, &clamped) {
        return Err(Error::from(violation)).context(violation.to_string());
    }

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            Natural::try_from(value)
                .map_err(|_| anyhow!("argument {index} ({value}) does not fit in {} bits", Natural::BITS))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn arguments_are_parsed_and_checked() {
        let add = standard::addition();
        assert_eq!(parse_arguments(&add, &strings(&["3", " 4"])).unwrap(), vec![3, 4]);

        let err = parse_arguments(&add, &strings(&["3", "-4"])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::NegativeArgument { index: 1, value: -4 })
        );

        let err = parse_arguments(&add, &strings(&["3"])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::ArityMismatch {
                expected: 2,
                actual: 1
            })
        );

        assert!(parse_arguments(&add, &strings(&["3", "four"])).is_err());
    }

    #[test]
    fn arguments_cover_the_whole_natural_range() {
        let add = standard::addition();
        assert_eq!(
            parse_arguments(&add, &strings(&["18446744073709551615", "9223372036854775808"]))
                .unwrap(),
            vec![u64::MAX, 1 << 63]
        );
        assert!(parse_arguments(&add, &strings(&["0", "18446744073709551616"])).is_err());

        let err = parse_arguments(&add, &strings(&["-99999999999999999999", "1"])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::NegativeArgument {
                index: 0,
                value: i64::MIN
            })
        );
    }

    #[test]
    fn node_tables_respect_the_term_budget() {
        let table = json!({
            "nodes": [
                { "type": "composition", "f": 1, "g_list": [2, 2] },
                { "type": "projection", "n": 2, "i": 1 },
                { "type": "successor" }
            ]
        });
        let config = GraphConfig { max_term_nodes: 3 };
        let err = TermSource::from_value(&table)
            .unwrap()
            .into_term_with(&config)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::TermTooLarge { limit: 3 })
        );
        assert_eq!(TermSource::from_value(&table).unwrap().into_term().unwrap().node_count(), 4);
    }

    #[test]
    fn standard_sources_resolve() {
        assert_eq!(load_term("std:add").unwrap(), standard::addition());
        assert!(load_term("std:power").is_err());
    }

    #[test]
    fn sources_are_told_apart_by_their_shape() {
        let tree = json!({ "type": "successor" });
        assert!(matches!(
            TermSource::from_value(&tree).unwrap(),
            TermSource::Tree(Term::Successor)
        ));

        let cyclic = json!({
            "root": 0,
            "nodes": [{ "type": "composition", "f": 0, "g_list": [0] }]
        });
        let source = TermSource::from_value(&cyclic).unwrap();
        assert!(!source.violations().is_empty());
        let err = source.into_term().unwrap_err();
        assert!(err.to_string().contains("circular dependency"));
    }
}
