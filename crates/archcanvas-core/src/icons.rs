//! Product name → icon reference lookup.
//!
//! Matching is deliberately strict: an exact id, name or alias, then a normalized
//! comparison. There is no substring or fuzzy stage, so "Data" never resolves to
//! "Dataflow".

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IconEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Asset path or URL handed to the renderer.
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IconCatalog {
    pub entries: Vec<IconEntry>,
}

const BUILTIN: &[(&str, &str, &[&str])] = &[
    ("bigquery", "BigQuery", &["bq"]),
    ("pubsub", "Pub/Sub", &["cloud pubsub", "google pub/sub"]),
    ("dataflow", "Dataflow", &["apache beam"]),
    ("dataproc", "Dataproc", &["spark"]),
    ("datastream", "Datastream", &[]),
    ("gcs", "Cloud Storage", &["storage", "bucket"]),
    ("cloud_sql", "Cloud SQL", &[]),
    ("spanner", "Cloud Spanner", &[]),
    ("composer", "Cloud Composer", &["airflow"]),
    ("dataform", "Dataform", &[]),
    ("looker", "Looker", &["looker studio"]),
    ("vertex_ai", "Vertex AI", &["vertex"]),
    ("cloud_run", "Cloud Run", &[]),
    ("cloud_functions", "Cloud Functions", &["functions"]),
    ("iam", "Cloud IAM", &["identity and access management"]),
    ("vpc", "VPC", &["virtual private cloud"]),
    ("interconnect", "Cloud Interconnect", &[]),
    ("monitoring", "Cloud Monitoring", &["stackdriver"]),
    ("logging", "Cloud Logging", &[]),
    ("oracle", "Oracle", &["oracle db", "oracle database"]),
    ("postgresql", "PostgreSQL", &["postgres"]),
    ("mysql", "MySQL", &[]),
    ("kafka", "Kafka", &["apache kafka"]),
    ("salesforce", "Salesforce", &["sfdc"]),
    ("sap", "SAP", &[]),
    ("workday", "Workday", &[]),
    ("servicenow", "ServiceNow", &[]),
    ("tableau", "Tableau", &[]),
    ("power_bi", "Power BI", &["powerbi"]),
];

/// Lowercase, drop a leading "cloud" word when more words follow, then squash out
/// whitespace and `_ - / .`. "Cloud SQL" becomes "sql" but "Cloudflare" stays whole.
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut words = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, '_' | '-' | '/' | '.'))
        .filter(|w| !w.is_empty())
        .peekable();
    let mut out = String::new();
    if let Some(first) = words.next() {
        if first != "cloud" || words.peek().is_none() {
            out.push_str(first);
        }
    }
    out.extend(words);
    out
}

impl IconCatalog {
    /// A small catalogue of common cloud and data products.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(id, name, aliases)| IconEntry {
                id: id.to_string(),
                name: name.to_string(),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                reference: format!("icons/{id}.svg"),
            })
            .collect();
        Self { entries }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve a node's icon from its display name and optional hint. The hint is tried
    /// first; for each candidate the stages run exact id, exact name, exact alias, then
    /// normalized. First match wins.
    pub fn resolve(&self, display_name: &str, hint: Option<&str>) -> Option<&str> {
        hint.into_iter()
            .chain(std::iter::once(display_name))
            .filter(|c| !c.trim().is_empty())
            .find_map(|candidate| self.lookup(candidate))
            .map(|e| e.reference.as_str())
    }

    fn lookup(&self, candidate: &str) -> Option<&IconEntry> {
        if let Some(e) = self.entries.iter().find(|e| e.id == candidate) {
            return Some(e);
        }
        if let Some(e) = self.entries.iter().find(|e| e.name == candidate) {
            return Some(e);
        }
        if let Some(e) = self
            .entries
            .iter()
            .find(|e| e.aliases.iter().any(|a| a == candidate))
        {
            return Some(e);
        }
        let wanted = normalize(candidate);
        self.entries.iter().find(|e| {
            normalize(&e.id) == wanted
                || normalize(&e.name) == wanted
                || e.aliases.iter().any(|a| normalize(a) == wanted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators_and_cloud() {
        assert_eq!(normalize("Cloud Storage"), "storage");
        assert_eq!(normalize("cloud_sql"), "sql");
        assert_eq!(normalize("Pub/Sub"), "pubsub");
        assert_eq!(normalize("Vertex-AI.v2"), "vertexaiv2");
        assert_eq!(normalize("Cloud"), "cloud");
    }

    #[test]
    fn cloud_is_only_stripped_as_a_word() {
        assert_eq!(normalize("Cloudflare"), "cloudflare");
        assert_eq!(normalize("Cloudera CDP"), "clouderacdp");
        assert_eq!(normalize("  cloud  run "), "run");
        assert_eq!(normalize("my cloud sql"), "mycloudsql");

        let raw = r#"{"entries": [{"id": "flare", "name": "Flare", "reference": "icons/flare.svg"}]}"#;
        let icons = IconCatalog::from_json(raw).unwrap();
        assert_eq!(icons.resolve("Cloudflare", None), None);
        assert_eq!(icons.resolve("Cloud Flare", None), Some("icons/flare.svg"));
    }

    #[test]
    fn stages_resolve_in_order() {
        let icons = IconCatalog::builtin();
        assert_eq!(icons.resolve("BigQuery", None), Some("icons/bigquery.svg"));
        assert_eq!(icons.resolve("anything", Some("gcs")), Some("icons/gcs.svg"));
        assert_eq!(icons.resolve("postgres", None), Some("icons/postgresql.svg"));
        assert_eq!(icons.resolve("cloud pub-sub", None), Some("icons/pubsub.svg"));
        assert_eq!(icons.resolve("CLOUD COMPOSER", None), Some("icons/composer.svg"));
    }

    #[test]
    fn hint_wins_over_name() {
        let icons = IconCatalog::builtin();
        assert_eq!(icons.resolve("Looker", Some("tableau")), Some("icons/tableau.svg"));
        // an unknown hint falls back to the name
        assert_eq!(icons.resolve("Looker", Some("nope")), Some("icons/looker.svg"));
    }

    #[test]
    fn no_substring_matches() {
        let icons = IconCatalog::builtin();
        assert_eq!(icons.resolve("Data", None), None);
        assert_eq!(icons.resolve("Big", None), None);
        assert_eq!(icons.resolve("", Some("  ")), None);
    }

    #[test]
    fn catalogue_loads_from_json() {
        let raw = r#"{"entries": [{"id": "snowflake", "name": "Snowflake", "reference": "https://cdn.example/snowflake.svg"}]}"#;
        let icons = IconCatalog::from_json(raw).unwrap();
        assert_eq!(icons.resolve("snow flake", None), Some("https://cdn.example/snowflake.svg"));
        assert!(icons.entries[0].aliases.is_empty());
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icons.json");
        assert!(matches!(IconCatalog::load(&path), Err(ConfigError::Read { .. })));
        std::fs::write(&path, r#"{"entries": []}"#).unwrap();
        assert_eq!(IconCatalog::load(&path).unwrap(), IconCatalog::default());
    }
}
