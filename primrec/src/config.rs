use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
};
pub use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_MAX_TERM_NODES;

pub const CONFIG_FILE: &str = ".primrecrc.toml";
pub const ENV_PREFIX: &str = "PRIMREC_";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub evaluator: EvaluatorConfig,
    pub graph: GraphConfig,
}

/// Ceilings read once at the start of every evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatorConfig {
    pub max_depth: usize,
    pub max_steps: u64,
    /// Arguments above this only raise a warning.
    pub large_argument_threshold: u64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 300_000,
            max_steps: 100_000_000,
            large_argument_threshold: 1_000_000,
        }
    }
}

/// Limits for turning node tables into terms.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphConfig {
    /// Shared nodes are copied into every parent, so a small table can
    /// stand for a very large tree.
    pub max_term_nodes: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_term_nodes: DEFAULT_MAX_TERM_NODES,
        }
    }
}

/// Defaults, then `.primrecrc.toml` in the working directory, then the one in
/// the home directory, then `PRIMREC_*` variables (`PRIMREC_EVALUATOR__MAX_DEPTH`
/// sets `evaluator.maxDepth`).
pub fn load_base_config() -> Figment {
    let mut figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(CONFIG_FILE));
    if let Some(home_dir) = home::home_dir() {
        figment = figment.merge(Toml::file(home_dir.join(CONFIG_FILE)));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).map(env_key))
}

/// `EVALUATOR__MAX_DEPTH` -> `evaluator.maxDepth`
fn env_key(key: &UncasedStr) -> Uncased<'_> {
    key.as_str()
        .split("__")
        .map(|segment| {
            let segment = segment.to_ascii_lowercase();
            let mut words = segment.split('_');
            let first = words.next().unwrap_or_default().to_string();
            words.fold(first, |mut camel, word| {
                let mut chars = word.chars();
                if let Some(initial) = chars.next() {
                    camel.extend(initial.to_uppercase());
                    camel.push_str(chars.as_str());
                }
                camel
            })
        })
        .collect::<Vec<_>>()
        .join(".")
        .into()
}

impl Config {
    pub fn load() -> anyhow::Result<Config> {
        Ok(load_base_config().extract()?)
    }
}
