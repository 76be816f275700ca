//! Registry of initialized integration clients.
//!
//! The [`IntegrationRegistry`] builds one client per configured integration,
//! initializes it from its [`IntegrationConfig`], and keeps only the clients
//! that came up ready. Integrations that need no credentials are created even
//! without a config entry.
//!
//! A registry is never mutated once shared. Reconfiguring an integration
//! produces a new registry with a freshly built client in that slot, which
//! the manager swaps in wholesale.

use std::collections::HashMap;
use std::sync::Arc;

use reelmatch_common::MediaType;
use tracing::{debug, info, warn};

use super::http::HttpPolicy;
use super::provider::Integration;
use super::providers::{create_integration, KNOWN_INTEGRATIONS};
use crate::config::{IntegrationConfig, MetadataSettings};

/// Ready integration clients keyed by integration id.
#[derive(Clone)]
pub struct IntegrationRegistry {
    integrations: HashMap<String, Arc<dyn Integration>>,
    policy: HttpPolicy,
    language: String,
}

impl std::fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationRegistry")
            .field("integrations", &self.ids())
            .field("policy", &self.policy)
            .field("language", &self.language)
            .finish()
    }
}

impl IntegrationRegistry {
    /// Registry with no integrations.
    pub fn empty(policy: HttpPolicy, language: &str) -> Self {
        Self {
            integrations: HashMap::new(),
            policy,
            language: language.to_string(),
        }
    }

    /// Build and initialize a client for every configured integration plus
    /// every credential-free integration.
    ///
    /// Disabled, unknown and not-ready integrations are logged and left out.
    pub fn build(configs: &[IntegrationConfig], policy: HttpPolicy, language: &str) -> Self {
        let mut registry = Self::empty(policy, language);

        for config in configs {
            if let Some(integration) = registry.initialize(config) {
                registry.register(integration);
            }
        }

        // Keyless integrations work without a config entry.
        for id in KNOWN_INTEGRATIONS {
            if configs.iter().any(|c| c.id == *id) {
                continue;
            }
            if let Some(client) = create_integration(id, policy, language) {
                if !client.requires_api_key() {
                    if let Some(integration) = registry.initialize(&IntegrationConfig::new(*id)) {
                        registry.register(integration);
                    }
                }
            }
        }

        info!(integrations = ?registry.ids(), "Integration registry built");
        registry
    }

    /// Build and initialize one client, or `None` when it is unknown,
    /// disabled, or missing required credentials.
    fn initialize(&self, config: &IntegrationConfig) -> Option<Arc<dyn Integration>> {
        if !config.enabled {
            debug!(integration = %config.id, "Integration disabled in config");
            return None;
        }
        let Some(mut client) = create_integration(&config.id, self.policy, &self.language) else {
            warn!(integration = %config.id, "Unknown integration, skipping");
            return None;
        };

        client.initialize(config);
        if !client.is_ready() {
            warn!(integration = %config.id, "Integration not ready after initialization, skipping");
            return None;
        }
        Some(Arc::from(client))
    }

    /// Add a client, replacing any client with the same id.
    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        self.integrations.insert(integration.id().to_string(), integration);
    }

    /// A copy of this registry with `config.id` rebuilt from `config`.
    ///
    /// If the new config leaves the integration not ready, it is removed.
    #[must_use]
    pub fn with_reconfigured(&self, config: &IntegrationConfig) -> Self {
        let mut next = self.clone();
        next.integrations.remove(&config.id);
        if let Some(integration) = next.initialize(config) {
            next.register(integration);
        }
        next
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Integration>> {
        self.integrations.get(id)
    }

    /// Ids of all ready integrations, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.integrations.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }

    /// Ready integrations allowed by `settings`, sorted by id.
    pub fn enabled<'a>(&'a self, settings: &'a MetadataSettings) -> impl Iterator<Item = &'a Arc<dyn Integration>> + 'a {
        self.ids()
            .into_iter()
            .filter(move |id| settings.is_enabled(id))
            .filter_map(move |id| self.integrations.get(id))
    }

    /// Metadata-capable integrations for `media_type`, in `priority` order.
    ///
    /// Ids that are unknown, not ready, disabled by `settings`, or that do
    /// not serve `media_type` are skipped. Duplicate ids are taken once.
    pub fn metadata_providers(
        &self,
        priority: &[String],
        settings: &MetadataSettings,
        media_type: MediaType,
    ) -> Vec<Arc<dyn Integration>> {
        let mut selected: Vec<Arc<dyn Integration>> = Vec::new();
        for id in priority {
            if selected.iter().any(|i| i.id() == id.as_str()) || !settings.is_enabled(id) {
                continue;
            }
            let Some(integration) = self.integrations.get(id) else {
                continue;
            };
            if integration.as_metadata().is_some() && integration.supports(media_type) {
                selected.push(Arc::clone(integration));
            }
        }
        selected
    }

    /// The policy and language new clients are built with.
    pub fn policy(&self) -> HttpPolicy {
        self.policy
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MetadataSettings {
        MetadataSettings::default()
    }

    fn configs() -> Vec<IntegrationConfig> {
        vec![
            IntegrationConfig::new("tmdb").with_api_key("key"),
            IntegrationConfig::new("tvdb").with_api_key("key"),
            // No key: stays out.
            IntegrationConfig::new("omdb"),
        ]
    }

    #[test]
    fn build_keeps_only_ready_integrations() {
        let registry = IntegrationRegistry::build(&configs(), HttpPolicy::default(), "en-US");
        // AniList needs no key and is added without a config entry.
        assert_eq!(registry.ids(), ["anilist", "tmdb", "tvdb"]);
        assert!(registry.get("omdb").is_none());
    }

    #[test]
    fn disabled_and_unknown_configs_are_skipped() {
        let mut anilist = IntegrationConfig::new("anilist");
        anilist.enabled = false;
        let configs = vec![anilist, IntegrationConfig::new("netflix").with_api_key("k")];

        let registry = IntegrationRegistry::build(&configs, HttpPolicy::default(), "en-US");
        assert!(registry.is_empty());
    }

    #[test]
    fn priority_order_and_media_type_filter() {
        let registry = IntegrationRegistry::build(&configs(), HttpPolicy::default(), "en-US");
        let settings = settings();

        let tv: Vec<_> = registry
            .metadata_providers(&settings.tv_priority, &settings, MediaType::TvShow)
            .iter()
            .map(|i| i.id())
            .collect();
        assert_eq!(tv, ["tvdb", "tmdb"]);

        // TVDB does not serve movies.
        let priority = vec!["tvdb".to_string(), "tmdb".to_string(), "tmdb".to_string()];
        let movies: Vec<_> = registry
            .metadata_providers(&priority, &settings, MediaType::Movie)
            .iter()
            .map(|i| i.id())
            .collect();
        assert_eq!(movies, ["tmdb"]);
    }

    #[test]
    fn enabled_list_filters_selection() {
        let registry = IntegrationRegistry::build(&configs(), HttpPolicy::default(), "en-US");
        let mut settings = settings();
        settings.enabled_integrations = vec!["tmdb".to_string()];

        let tv: Vec<_> = registry
            .metadata_providers(&settings.tv_priority, &settings, MediaType::TvShow)
            .iter()
            .map(|i| i.id())
            .collect();
        assert_eq!(tv, ["tmdb"]);
        assert_eq!(registry.enabled(&settings).count(), 1);
    }

    #[test]
    fn reconfigure_swaps_without_touching_original() {
        let registry = IntegrationRegistry::build(&configs(), HttpPolicy::default(), "en-US");

        let added = registry.with_reconfigured(&IntegrationConfig::new("omdb").with_api_key("k"));
        assert!(added.get("omdb").is_some());
        assert!(registry.get("omdb").is_none());

        let removed = added.with_reconfigured(&IntegrationConfig::new("tmdb"));
        assert!(removed.get("tmdb").is_none());
        assert!(added.get("tmdb").is_some());
    }
}
