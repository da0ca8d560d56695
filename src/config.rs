//! Arena Configuration
//!
//! Loaded once at startup from environment variables:
//!
//! | Variable | Default |
//! |---|---|
//! | `ARENA_ISSUER_SECRET` | required |
//! | `ARENA_MIN_PLAYERS` | `4` |
//! | `ARENA_TALLY_POLICY` | `quorum` |
//! | `ARENA_VARIANTS_FILE` | built-in variants |
//! | `ARENA_BIND_ADDR` | `0.0.0.0:8080` |
//!
//! JWT settings (`AUTH_*`) are read by [`AuthConfig::from_env`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::network::auth::AuthConfig;
use crate::tournament::rules::{builtin_variants, Variant};
use crate::tournament::voting::TallyPolicy;

/// Default quorum.
pub const DEFAULT_MIN_PLAYERS: usize = 4;

/// Default WebSocket bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Startup configuration errors. All are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `ARENA_ISSUER_SECRET` unset or empty.
    #[error("ARENA_ISSUER_SECRET is not set")]
    MissingIssuerSecret,

    /// `ARENA_MIN_PLAYERS` not an integer >= 2.
    #[error("ARENA_MIN_PLAYERS must be an integer >= 2, got {0:?}")]
    InvalidMinPlayers(String),

    /// `ARENA_TALLY_POLICY` not `quorum` or `unanimous`.
    #[error("ARENA_TALLY_POLICY must be quorum or unanimous, got {0:?}")]
    InvalidTallyPolicy(String),

    /// Variants file unreadable.
    #[error("cannot read variants file {path}: {source}")]
    VariantsFile {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Variants file is not valid JSON.
    #[error("cannot parse variants file: {0}")]
    VariantsParse(#[from] serde_json::Error),

    /// A variant table is inconsistent.
    #[error("invalid variant: {0}")]
    InvalidVariant(String),

    /// Two variants share a name.
    #[error("duplicate variant name: {0}")]
    DuplicateVariant(String),

    /// Empty variant list.
    #[error("no rule variants configured")]
    NoVariants,
}

/// Everything the server needs to start.
#[derive(Clone)]
pub struct ArenaConfig {
    /// Key material for anonIds and credential tags.
    pub issuer_secret: Vec<u8>,
    /// Votes required before tallying.
    pub min_players: usize,
    /// Tally trigger.
    pub tally_policy: TallyPolicy,
    /// Rule variants offered for voting.
    pub variants: Vec<Variant>,
    /// WebSocket bind address.
    pub bind_addr: String,
    /// Transport identity validation.
    pub auth: AuthConfig,
}

impl ArenaConfig {
    /// Defaults around `issuer_secret`.
    pub fn new(issuer_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            issuer_secret: issuer_secret.into(),
            min_players: DEFAULT_MIN_PLAYERS,
            tally_policy: TallyPolicy::Quorum,
            variants: builtin_variants(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            auth: AuthConfig::default(),
        }
    }

    /// Override the quorum.
    pub fn with_min_players(mut self, min_players: usize) -> Self {
        self.min_players = min_players;
        self
    }

    /// Override the tally policy.
    pub fn with_tally_policy(mut self, policy: TallyPolicy) -> Self {
        self.tally_policy = policy;
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.auth = AuthConfig::from_env();
        Ok(config)
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("ARENA_ISSUER_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingIssuerSecret)?;

        let mut config = Self::new(secret.into_bytes());

        if let Some(raw) = lookup("ARENA_MIN_PLAYERS") {
            config.min_players = match raw.trim().parse::<usize>() {
                Ok(n) if n >= 2 => n,
                _ => return Err(ConfigError::InvalidMinPlayers(raw)),
            };
        }

        if let Some(raw) = lookup("ARENA_TALLY_POLICY") {
            config.tally_policy =
                TallyPolicy::parse(&raw).ok_or(ConfigError::InvalidTallyPolicy(raw))?;
        }

        if let Some(path) = lookup("ARENA_VARIANTS_FILE") {
            config.variants = load_variants(PathBuf::from(path))?;
        }

        if let Some(addr) = lookup("ARENA_BIND_ADDR") {
            config.bind_addr = addr;
        }

        Ok(config)
    }
}

impl fmt::Debug for ArenaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaConfig")
            .field("issuer_secret", &"<redacted>")
            .field("min_players", &self.min_players)
            .field("tally_policy", &self.tally_policy)
            .field("variants", &self.variants.len())
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

/// Read and validate a JSON array of variants.
pub fn load_variants(path: PathBuf) -> Result<Vec<Variant>, ConfigError> {
    let raw = std::fs::read_to_string(&path)
        .map_err(|source| ConfigError::VariantsFile { path, source })?;
    parse_variants(&raw)
}

/// Parse and validate a JSON array of variants.
pub fn parse_variants(json: &str) -> Result<Vec<Variant>, ConfigError> {
    let variants: Vec<Variant> = serde_json::from_str(json)?;
    validate_variants(&variants)?;
    Ok(variants)
}

/// Reject empty lists, duplicate names and inconsistent tables.
pub fn validate_variants(variants: &[Variant]) -> Result<(), ConfigError> {
    if variants.is_empty() {
        return Err(ConfigError::NoVariants);
    }
    let mut names = BTreeSet::new();
    for variant in variants {
        variant.validate().map_err(ConfigError::InvalidVariant)?;
        if !names.insert(variant.name.as_str()) {
            return Err(ConfigError::DuplicateVariant(variant.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ArenaConfig::from_lookup(lookup(&[("ARENA_ISSUER_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.issuer_secret, b"s3cret");
        assert_eq!(config.min_players, DEFAULT_MIN_PLAYERS);
        assert_eq!(config.tally_policy, TallyPolicy::Quorum);
        assert_eq!(config.variants.len(), 3);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        assert!(matches!(
            ArenaConfig::from_lookup(lookup(&[])),
            Err(ConfigError::MissingIssuerSecret)
        ));
        assert!(matches!(
            ArenaConfig::from_lookup(lookup(&[("ARENA_ISSUER_SECRET", "")])),
            Err(ConfigError::MissingIssuerSecret)
        ));
    }

    #[test]
    fn test_overrides() {
        let config = ArenaConfig::from_lookup(lookup(&[
            ("ARENA_ISSUER_SECRET", "k"),
            ("ARENA_MIN_PLAYERS", "6"),
            ("ARENA_TALLY_POLICY", "Unanimous"),
            ("ARENA_BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.min_players, 6);
        assert_eq!(config.tally_policy, TallyPolicy::Unanimous);
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_bad_values_rejected() {
        for players in ["1", "zero", "-3"] {
            let result = ArenaConfig::from_lookup(lookup(&[
                ("ARENA_ISSUER_SECRET", "k"),
                ("ARENA_MIN_PLAYERS", players),
            ]));
            assert!(matches!(result, Err(ConfigError::InvalidMinPlayers(_))));
        }

        let result = ArenaConfig::from_lookup(lookup(&[
            ("ARENA_ISSUER_SECRET", "k"),
            ("ARENA_TALLY_POLICY", "majority"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidTallyPolicy(_))));
    }

    #[test]
    fn test_parse_variants() {
        let json = r#"[{"name": "Classic", "defeats": {
            "Rock": ["Scissors"], "Paper": ["Rock"], "Scissors": ["Paper"]
        }}]"#;
        let variants = parse_variants(json).unwrap();
        assert_eq!(variants[0].name, "Classic");
        assert_eq!(variants[0].moves().count(), 3);
    }

    #[test]
    fn test_invalid_variant_files() {
        assert!(matches!(parse_variants("[]"), Err(ConfigError::NoVariants)));
        assert!(matches!(parse_variants("{"), Err(ConfigError::VariantsParse(_))));

        let unknown = r#"[{"name": "X", "defeats": {"Rock": ["Lava"], "Paper": []}}]"#;
        assert!(matches!(parse_variants(unknown), Err(ConfigError::InvalidVariant(_))));

        let dup = r#"[
            {"name": "X", "defeats": {"Rock": ["Paper"], "Paper": []}},
            {"name": "X", "defeats": {"Rock": ["Paper"], "Paper": []}}
        ]"#;
        assert!(matches!(parse_variants(dup), Err(ConfigError::DuplicateVariant(_))));
    }

    #[test]
    fn test_missing_variants_file() {
        let result = load_variants(PathBuf::from("/nonexistent/variants.json"));
        assert!(matches!(result, Err(ConfigError::VariantsFile { .. })));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", ArenaConfig::new(b"hunter2".to_vec()));
        assert!(!rendered.contains("hunter2"));
    }
}
