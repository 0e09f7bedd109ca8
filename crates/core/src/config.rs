use serde::Deserialize;

/// Engine configuration. Loaded from environment variables with the prefix
/// `EDGEMATCH__`, or constructed with [`Default`] for embedded use.
#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    /// Trim age applied to the page-view history when no audience in the
    /// current run supplies a finite look-back.
    #[serde(default = "default_max_age_secs")]
    pub default_max_age_secs: u64,
    /// Hard ceiling on retained page views. Bounds storage growth when an
    /// unbounded look-back suppresses time-based trimming.
    #[serde(default = "default_max_retained_views")]
    pub max_retained_views: usize,
    /// Whether re-matching a still-valid audience advances its expiry.
    /// Off by default: a re-match leaves the TTL untouched.
    #[serde(default = "default_refresh_on_rematch")]
    pub refresh_on_rematch: bool,
}

fn default_max_age_secs() -> u64 {
    3600
}
fn default_max_retained_views() -> usize {
    300
}
fn default_refresh_on_rematch() -> bool {
    false
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            default_max_age_secs: default_max_age_secs(),
            max_retained_views: default_max_retained_views(),
            refresh_on_rematch: default_refresh_on_rematch(),
        }
    }
}

impl EdgeConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("EDGEMATCH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
