use url::Url;

use crate::error::ConfigError;
use crate::runtime::{self, HostProbe, RuntimeProbe};
use crate::types::{RuntimeTag, VerificationPolicy};

/// Explicit full base URL.
pub const BASE_URL_VAR: &str = "JOBS_BASE_URL";

/// Deployment host names, used with an `https://` prefix.
pub const DEPLOYMENT_HOST_VARS: [&str; 2] = ["VERCEL_URL", "NEXT_PUBLIC_VERCEL_URL"];

/// Resolved scheduler configuration.
///
/// Built once and threaded through the pipelines. Nothing inside a
/// pipeline step reads the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    base_url: Option<String>,
    runtime: RuntimeTag,
    verification_policy: VerificationPolicy,
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Resolve everything from the process environment.
    pub fn from_env() -> Self {
        Self::builder().build()
    }

    /// Raw base URL as resolved, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn runtime(&self) -> RuntimeTag {
        self.runtime
    }

    pub fn verification_policy(&self) -> VerificationPolicy {
        self.verification_policy
    }

    /// Parse the base URL, failing if none was resolved.
    pub fn require_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.base_url.as_deref().ok_or(ConfigError::MissingBaseUrl)?;
        Url::parse(raw).map_err(|err| ConfigError::InvalidBaseUrl {
            value: raw.to_string(),
            reason: err.to_string(),
        })
    }

    /// Join `route` onto the base URL.
    pub fn resolve_url(&self, route: &str) -> Result<Url, ConfigError> {
        let base = self.require_base_url()?;
        base.join(route).map_err(|err| ConfigError::InvalidRoute {
            route: route.to_string(),
            reason: err.to_string(),
        })
    }

    /// Whether the base URL points at the local host.
    pub fn is_localhost(&self) -> bool {
        let Ok(url) = self.require_base_url() else {
            return false;
        };
        matches!(
            url.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]")
        )
    }
}

/// Builder for [`SchedulerConfig`].
///
/// Explicit values win over environment lookups.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    base_url: Option<String>,
    runtime: Option<RuntimeTag>,
    verification_policy: VerificationPolicy,
}

impl SchedulerConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn runtime(mut self, runtime: RuntimeTag) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn verification_policy(mut self, policy: VerificationPolicy) -> Self {
        self.verification_policy = policy;
        self
    }

    /// Resolve against the process environment and host.
    pub fn build(self) -> SchedulerConfig {
        self.build_with(|name| std::env::var(name).ok(), &HostProbe)
    }

    /// Resolve against an arbitrary lookup and probe.
    pub fn build_with<F>(self, lookup: F, probe: &dyn RuntimeProbe) -> SchedulerConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = self.base_url.or_else(|| infer_base_url(&lookup));
        let runtime = runtime::select(self.runtime, probe);

        tracing::debug!(
            base_url = base_url.as_deref().unwrap_or("<unset>"),
            runtime = %runtime,
            "resolved scheduler config"
        );

        SchedulerConfig {
            base_url,
            runtime,
            verification_policy: self.verification_policy,
        }
    }
}

fn infer_base_url<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(BASE_URL_VAR).filter(|v| !v.is_empty()) {
        return Some(url);
    }

    DEPLOYMENT_HOST_VARS
        .iter()
        .filter_map(|name| lookup(name).filter(|v| !v.is_empty()))
        .map(|host| format!("https://{host}"))
        .next()
}

/// Resolve a single value: explicit argument, then each env var in order.
pub(crate) fn resolve_value<F>(explicit: Option<&str>, vars: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .map(str::to_string)
        .or_else(|| vars.iter().find_map(|name| lookup(name).filter(|v| !v.is_empty())))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct ServerProbe;

    impl RuntimeProbe for ServerProbe {
        fn has_browser_global(&self) -> bool {
            false
        }

        fn has_edge_marker(&self) -> bool {
            false
        }
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn explicit_base_url_wins_over_env() {
        let config = SchedulerConfig::builder()
            .base_url("https://example.com")
            .build_with(lookup(&[("VERCEL_URL", "example.vercel.app")]), &ServerProbe);
        assert_eq!(config.base_url(), Some("https://example.com"));
    }

    #[test]
    fn deployment_hosts_get_https_prefix() {
        let config = SchedulerConfig::builder()
            .build_with(lookup(&[("VERCEL_URL", "example.vercel.app")]), &ServerProbe);
        assert_eq!(config.base_url(), Some("https://example.vercel.app"));

        let config = SchedulerConfig::builder().build_with(
            lookup(&[("NEXT_PUBLIC_VERCEL_URL", "world.vercel.app")]),
            &ServerProbe,
        );
        assert_eq!(config.base_url(), Some("https://world.vercel.app"));
    }

    #[test]
    fn full_base_url_var_comes_first() {
        let config = SchedulerConfig::builder().build_with(
            lookup(&[
                ("JOBS_BASE_URL", "http://localhost:3000"),
                ("VERCEL_URL", "example.vercel.app"),
            ]),
            &ServerProbe,
        );
        assert_eq!(config.base_url(), Some("http://localhost:3000"));
        assert!(config.is_localhost());
    }

    #[test]
    fn missing_base_url_is_reported_on_use() {
        let config = SchedulerConfig::builder().build_with(lookup(&[]), &ServerProbe);
        assert_eq!(config.base_url(), None);
        assert_eq!(
            config.resolve_url("/jobs/email"),
            Err(ConfigError::MissingBaseUrl)
        );
    }

    #[test]
    fn invalid_base_url_is_reported_on_use() {
        let config = SchedulerConfig::builder()
            .base_url("localhost")
            .build_with(lookup(&[]), &ServerProbe);
        assert!(matches!(
            config.resolve_url("/jobs/email"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn routes_join_onto_base_url() {
        let config = SchedulerConfig::builder()
            .base_url("http://localhost:3000")
            .build_with(lookup(&[]), &ServerProbe);
        assert_eq!(
            config.resolve_url("/jobs/email").unwrap().as_str(),
            "http://localhost:3000/jobs/email"
        );
    }

    #[test]
    fn resolve_value_prefers_explicit() {
        let env = lookup(&[("QSTASH_TOKEN", "5678")]);
        assert_eq!(
            resolve_value(Some("1234"), &["QSTASH_TOKEN"], &env),
            Some("1234".to_string())
        );
        assert_eq!(
            resolve_value(None, &["QSTASH_TOKEN"], &env),
            Some("5678".to_string())
        );
        assert_eq!(resolve_value(None, &["MISSING"], &env), None);
    }
}
