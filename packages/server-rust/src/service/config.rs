//! Pipeline configuration.

/// Deployment environment. Controls how much detail unhandled faults expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl Environment {
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Request-pipeline configuration.
///
/// Controls admission caps and the error-detail policy.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Soft cap on the total number of saved relations.
    pub max_saved_relations: u64,
    /// Soft cap on the total number of resources.
    pub max_resources: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            max_saved_relations: 100_000,
            max_resources: 50_000,
        }
    }
}
