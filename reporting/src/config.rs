use url::Url;

/// Environment variable naming the endpoint error reports are POSTed to.
/// Reporting is disabled entirely when it is unset.
pub const ENDPOINT_URL_VAR: &str = "RUNTIME_ERROR_ENDPOINT_URL";

/// Environment variable carrying a statically configured board id, used as a
/// fallback source by the tenant resolver.
pub const BOARD_ID_VAR: &str = "BOARD_ID";

/// Immutable reporting configuration, read once at process start and handed
/// to the recovery middleware. The failure path never re-reads the
/// environment.
#[derive(Clone, Debug, Default)]
pub struct ReportingConfig {
    pub endpoint_url: Option<Url>,
    pub board_id: Option<String>,
}

impl ReportingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Empty
    /// values are treated the same as unset ones; an endpoint URL that does
    /// not parse disables reporting rather than failing startup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let endpoint_url = lookup(ENDPOINT_URL_VAR)
            .filter(|value| !value.is_empty())
            .and_then(|raw| match Url::parse(&raw) {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(
                        value = %raw,
                        error = %err,
                        "ignoring unparseable {ENDPOINT_URL_VAR}, error reporting disabled"
                    );
                    None
                }
            });

        let board_id = lookup(BOARD_ID_VAR).filter(|value| !value.is_empty());

        Self {
            endpoint_url,
            board_id,
        }
    }

    pub fn reporting_enabled(&self) -> bool {
        self.endpoint_url.is_some()
    }
}
