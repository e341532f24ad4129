//! Per-receiver shared secrets.
//!
//! Each receiver is configured with a single string of tenant-scoped
//! entries, `secret0, id1=secret1, id2=secret2`. An entry without an id is
//! the default secret, used when the request URI carries no tenant id.

use crate::error::{Result, WebhookError};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Inclusive bounds on the byte length of a receiver's secrets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretBounds {
    pub min: usize,
    pub max: usize,
}

impl SecretBounds {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

/// Secrets configured for one receiver, keyed by lowercase tenant id.
///
/// The default secret is stored under the empty id.
#[derive(Debug, Clone, Default)]
pub struct ReceiverSecrets {
    entries: HashMap<String, SecretString>,
}

impl ReceiverSecrets {
    /// Parse a `secret0, id1=secret1` configuration string
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an entry with an empty id or
    /// secret, or for a tenant id configured twice.
    pub fn parse(config: &str) -> Result<Self> {
        let mut entries = HashMap::new();

        for entry in config.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, secret) = match entry.split_once('=') {
                Some((id, secret)) => (id.trim(), secret.trim()),
                None => ("", entry),
            };

            if entry.contains('=') && id.is_empty() {
                return Err(WebhookError::configuration(
                    "Secret entry has an '=' but no tenant id",
                ));
            }
            if secret.is_empty() {
                return Err(WebhookError::configuration(format!(
                    "Secret entry for tenant id '{}' is empty",
                    id
                )));
            }

            let key = id.to_ascii_lowercase();
            if entries.contains_key(&key) {
                return Err(WebhookError::configuration(format!(
                    "Tenant id '{}' is configured more than once",
                    id
                )));
            }
            entries.insert(key, SecretString::from(secret.to_string()));
        }

        Ok(Self { entries })
    }

    /// Secret for `tenant_id`; the empty id selects the default secret
    pub fn get(&self, tenant_id: &str) -> Option<&SecretString> {
        self.entries.get(&tenant_id.trim().to_ascii_lowercase())
    }

    /// Configured tenant ids, default included as `""`
    pub fn tenant_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every configured secret against `bounds`
    pub fn validate(&self, receiver: &str, bounds: SecretBounds) -> Result<()> {
        for (id, secret) in &self.entries {
            check_length(receiver, id, secret, bounds)?;
        }
        Ok(())
    }
}

fn check_length(receiver: &str, id: &str, secret: &SecretString, bounds: SecretBounds) -> Result<()> {
    let len = secret.expose_secret().len();
    if bounds.contains(len) {
        return Ok(());
    }
    Err(WebhookError::configuration(format!(
        "Secret for receiver '{}' and tenant id '{}' must be between {} and {} bytes, found {}",
        receiver, id, bounds.min, bounds.max, len
    )))
}

/// One configuration generation: receiver name to its secrets
pub type SecretSnapshot = HashMap<String, ReceiverSecrets>;

/// Resolves shared secrets by receiver name and tenant id.
///
/// The store holds an immutable snapshot. [`SecretStore::reload`] replaces
/// the whole snapshot at once, so a lookup sees either the old or the new
/// generation, never a mix.
pub struct SecretStore {
    snapshot: RwLock<Arc<SecretSnapshot>>,
}

impl SecretStore {
    /// Build a store from raw configuration strings keyed by receiver name
    pub fn from_config<'a>(config: impl IntoIterator<Item = (&'a String, &'a String)>) -> Result<Self> {
        Ok(Self::new(parse_snapshot(config)?))
    }

    pub fn new(snapshot: SecretSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Current configuration generation
    pub async fn snapshot(&self) -> Arc<SecretSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Resolve the secret for `receiver` and `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no secret is configured for the
    /// pair, or when the configured secret falls outside `bounds`.
    pub async fn resolve(
        &self,
        receiver: &str,
        tenant_id: &str,
        bounds: SecretBounds,
    ) -> Result<SecretString> {
        let snapshot = self.snapshot().await;

        let secret = snapshot
            .get(receiver)
            .and_then(|secrets| secrets.get(tenant_id))
            .ok_or_else(|| {
                WebhookError::configuration(format!(
                    "No secret is configured for receiver '{}' and tenant id '{}'",
                    receiver, tenant_id
                ))
            })?;

        check_length(receiver, tenant_id, secret, bounds)?;
        Ok(secret.clone())
    }

    /// Atomically replace the configuration with a new generation
    pub async fn reload(&self, snapshot: SecretSnapshot) {
        let receivers = snapshot.len();
        *self.snapshot.write().await = Arc::new(snapshot);
        tracing::info!(
            target: "tidehook::webhooks::secrets",
            receivers,
            "Webhook secrets reloaded"
        );
    }
}

/// Parse raw configuration strings into a snapshot
pub fn parse_snapshot<'a>(
    config: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Result<SecretSnapshot> {
    config
        .into_iter()
        .map(|(name, raw)| {
            let secrets = ReceiverSecrets::parse(raw).map_err(|e| match e {
                WebhookError::Configuration(msg) => {
                    WebhookError::configuration(format!("Receiver '{}': {}", name, msg))
                }
                other => other,
            })?;
            Ok((name.to_ascii_lowercase(), secrets))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: SecretBounds = SecretBounds::new(16, 128);

    fn expose(secret: &SecretString) -> &str {
        secret.expose_secret()
    }

    #[test]
    fn test_bounds_inclusive() {
        assert!(BOUNDS.contains(16));
        assert!(BOUNDS.contains(128));
        assert!(!BOUNDS.contains(15));
        assert!(!BOUNDS.contains(129));
    }

    #[test]
    fn test_parse_default_and_tenants() {
        let secrets = ReceiverSecrets::parse("secret0, id1=secret1, id2 = secret2").unwrap();

        assert_eq!(secrets.len(), 3);
        assert_eq!(expose(secrets.get("").unwrap()), "secret0");
        assert_eq!(expose(secrets.get("id1").unwrap()), "secret1");
        assert_eq!(expose(secrets.get("id2").unwrap()), "secret2");
        assert!(secrets.get("id3").is_none());
    }

    #[test]
    fn test_parse_tenant_ids_case_insensitive() {
        let secrets = ReceiverSecrets::parse("Tenant=secret").unwrap();
        assert!(secrets.get("tenant").is_some());
        assert!(secrets.get("TENANT").is_some());
    }

    #[test]
    fn test_tenant_ids() {
        let secrets = ReceiverSecrets::parse("secret0, ID2=secret2, id1=secret1").unwrap();
        let mut ids: Vec<&str> = secrets.tenant_ids().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["", "id1", "id2"]);
    }

    #[test]
    fn test_parse_skips_empty_entries() {
        let secrets = ReceiverSecrets::parse(" , secret0,, ").unwrap();
        assert_eq!(secrets.len(), 1);
        assert!(ReceiverSecrets::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_secret_may_contain_equals() {
        let secrets = ReceiverSecrets::parse("id1=abc=def").unwrap();
        assert_eq!(expose(secrets.get("id1").unwrap()), "abc=def");
    }

    #[test]
    fn test_parse_rejects_invalid_entries() {
        assert!(ReceiverSecrets::parse("=secret").is_err());
        assert!(ReceiverSecrets::parse("id1=").is_err());
        assert!(ReceiverSecrets::parse("id1=a, ID1=b").is_err());
        assert!(ReceiverSecrets::parse("a, b").is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let ok = ReceiverSecrets::parse("0123456789abcdef").unwrap();
        assert!(ok.validate("github", BOUNDS).is_ok());

        let short = ReceiverSecrets::parse("0123456789abcdef, t=short").unwrap();
        let err = short.validate("github", BOUNDS).unwrap_err();
        assert!(matches!(err, WebhookError::Configuration(_)));
        assert!(!err.to_string().contains("short"));

        let long = ReceiverSecrets::parse(&"x".repeat(129)).unwrap();
        assert!(long.validate("github", BOUNDS).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let secrets = ReceiverSecrets::parse("super-secret-value-1").unwrap();
        assert!(!format!("{:?}", secrets).contains("super-secret-value-1"));
    }

    fn store(entries: &[(&str, &str)]) -> SecretStore {
        let config: HashMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SecretStore::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_default_and_tenant() {
        let store = store(&[("github", "default_secret_1234, tenant=tenant_secret_12345")]);

        let default = store.resolve("github", "", BOUNDS).await.unwrap();
        assert_eq!(expose(&default), "default_secret_1234");

        let tenant = store.resolve("github", "tenant", BOUNDS).await.unwrap();
        assert_eq!(expose(&tenant), "tenant_secret_12345");
    }

    #[tokio::test]
    async fn test_resolve_unknown_is_configuration_error() {
        let store = store(&[("github", "default_secret_1234")]);

        let err = store.resolve("github", "missing", BOUNDS).await.unwrap_err();
        assert!(matches!(err, WebhookError::Configuration(_)));

        let err = store.resolve("other", "", BOUNDS).await.unwrap_err();
        assert!(matches!(err, WebhookError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_resolve_checks_bounds() {
        let store = store(&[("github", "tooshort")]);
        let err = store.resolve("github", "", BOUNDS).await.unwrap_err();
        assert!(matches!(err, WebhookError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_receiver_names_are_lowercased() {
        let store = store(&[("GitHub", "default_secret_1234")]);
        assert!(store.resolve("github", "", BOUNDS).await.is_ok());
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let store = store(&[("github", "first_generation_01")]);
        let before = store.snapshot().await;

        let mut next = HashMap::new();
        next.insert(
            "github".to_string(),
            "second_generation_2".to_string(),
        );
        store.reload(parse_snapshot(&next).unwrap()).await;

        let secret = store.resolve("github", "", BOUNDS).await.unwrap();
        assert_eq!(expose(&secret), "second_generation_2");

        // a snapshot taken before the reload is unaffected
        assert_eq!(expose(before["github"].get("").unwrap()), "first_generation_01");
    }

    #[test]
    fn test_parse_snapshot_names_receiver_in_error() {
        let mut config = HashMap::new();
        config.insert("github".to_string(), "id=".to_string());
        let err = parse_snapshot(&config).unwrap_err();
        assert!(err.to_string().contains("'github'"));
    }
}
