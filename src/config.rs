use std::env;
use std::time::Duration;

use crate::errors::ConfigError;

/// Recognized options are read from the environment (prefix `PYNEOUMLSSYNCER_`)
/// after an optional `.env` file is loaded by the caller via `dotenvy::dotenv()`.
#[derive(Debug, Clone)]
pub struct Config {
    pub umls_api_key: Option<String>,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: String,
    pub neo4j_import_dir: String,
    pub sab_filter: Vec<String>,
    pub sab_priority: Vec<String>,
    pub suppression_handling: SuppressionHandling,
    pub max_parallel_processes: usize,
    pub apoc_batch_size: usize,
    pub graph_retry_ceiling: u32,
    pub batch_timeout: Duration,
}

/// Which `SUPPRESS` codes in MRCONSO are dropped by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionHandling {
    pub drop_o: bool,
    pub drop_y: bool,
    pub drop_e: bool,
}

impl Default for SuppressionHandling {
    fn default() -> Self {
        SuppressionHandling { drop_o: true, drop_y: true, drop_e: false }
    }
}

impl SuppressionHandling {
    pub fn should_drop(&self, suppress: &str) -> bool {
        match suppress {
            "O" => self.drop_o,
            "Y" => self.drop_y,
            "E" => self.drop_e,
            _ => false,
        }
    }

    fn parse(value: &str) -> Result<SuppressionHandling, ConfigError> {
        let mut handling = SuppressionHandling { drop_o: false, drop_y: false, drop_e: false };
        for token in value.split(',') {
            match token.trim() {
                "" => continue,
                "O" => handling.drop_o = true,
                "Y" => handling.drop_y = true,
                "E" => handling.drop_e = true,
                other => {
                    return Err(ConfigError::Invalid {
                        name: "SUPPRESSION_HANDLING",
                        value: other.to_string(),
                    });
                }
            }
        }
        Ok(handling)
    }
}

const PREFIX: &str = "PYNEOUMLSSYNCER_";

fn var(name: &'static str) -> Option<String> {
    env::var(format!("{PREFIX}{name}")).ok().filter(|v| !v.is_empty())
}

fn var_or(name: &'static str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

fn csv_list(value: Option<String>) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(v) => v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
    }
}

impl Config {
    /// Load configuration from the process environment. Call `dotenvy::dotenv().ok()`
    /// before this if a `.env` file should be honored.
    pub fn from_env() -> Result<Config, ConfigError> {
        let suppression_handling = match var("SUPPRESSION_HANDLING") {
            Some(value) => SuppressionHandling::parse(&value)?,
            None => SuppressionHandling::default(),
        };

        let max_parallel_processes = match var("MAX_PARALLEL_PROCESSES") {
            Some(value) => value.parse::<usize>().map_err(|_| ConfigError::Invalid {
                name: "MAX_PARALLEL_PROCESSES",
                value: value.clone(),
            })?,
            None => num_cpus::get(),
        };

        let apoc_batch_size = match var("APOC_BATCH_SIZE") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid { name: "APOC_BATCH_SIZE", value: value.clone() })?,
            None => 10_000,
        };

        Ok(Config {
            umls_api_key: var("UMLS_API_KEY"),
            neo4j_uri: var_or("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: var_or("NEO4J_USER", "neo4j"),
            neo4j_password: var_or("NEO4J_PASSWORD", "neo4j"),
            neo4j_database: var_or("NEO4J_DATABASE", "neo4j"),
            neo4j_import_dir: var_or("NEO4J_IMPORT_DIR", "./import"),
            sab_filter: csv_list(var("SAB_FILTER")),
            sab_priority: csv_list(var("SAB_PRIORITY")),
            suppression_handling,
            max_parallel_processes: max_parallel_processes.max(1),
            apoc_batch_size,
            graph_retry_ceiling: 5,
            batch_timeout: Duration::from_secs(5 * 60),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_default_drops_o_and_y_only() {
        let handling = SuppressionHandling::default();
        assert!(handling.should_drop("O"));
        assert!(handling.should_drop("Y"));
        assert!(!handling.should_drop("E"));
    }

    #[test]
    fn suppression_parse_accepts_all_three() {
        let handling = SuppressionHandling::parse("O,Y,E").unwrap();
        assert!(handling.should_drop("O"));
        assert!(handling.should_drop("Y"));
        assert!(handling.should_drop("E"));
    }

    #[test]
    fn suppression_parse_rejects_unknown_token() {
        assert!(SuppressionHandling::parse("O,Z").is_err());
    }

    #[test]
    fn csv_list_trims_and_drops_empties() {
        assert_eq!(csv_list(Some(" RXNORM, MSH ,".to_string())), vec!["RXNORM", "MSH"]);
    }
}
