use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::{ApiClient, ApiError, Backend};
use crate::auth::{guard, Access, AuthFlows, CredentialSlot, FileSlot, KeyringSlot, Requirement, TokenStore};
use crate::cache::{CacheKey, SessionCache};
use crate::config::{Config, CredentialBackend};
use crate::events::RefreshBus;
use crate::models::{AdminMetrics, ClubCategory, Membership, User};
use crate::notify::NotificationRelay;

use super::fetcher::{CollectionFetcher, FetchOutcome};
use super::mutator::{Mutation, Mutator};
use super::view::{CollectionView, ViewRegistry};

/// Keychain account name for the credential
const KEYRING_ACCOUNT: &str = "session-token";

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub notification_ttl: Duration,
    pub cooldown_secs: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            notification_ttl: crate::notify::DEFAULT_NOTIFICATION_TTL,
            cooldown_secs: 60,
        }
    }
}

/// One client session: the shared credential plus everything scoped to a
/// single page lifetime (cache, mounted views, notifications, topics).
pub struct SyncContext {
    tokens: Arc<TokenStore>,
    cache: Arc<SessionCache>,
    bus: Arc<RefreshBus>,
    relay: NotificationRelay,
    views: Arc<ViewRegistry>,
    fetcher: CollectionFetcher,
    mutator: Mutator,
    auth: AuthFlows,
}

impl SyncContext {
    pub fn new(backend: Arc<dyn Backend>, tokens: Arc<TokenStore>, settings: SyncSettings) -> Self {
        let cache = Arc::new(SessionCache::new());
        let bus = Arc::new(RefreshBus::new());
        let relay = NotificationRelay::new(settings.notification_ttl);
        let views = Arc::new(ViewRegistry::new());

        let fetcher = CollectionFetcher::new(backend.clone(), tokens.clone(), cache.clone());
        let mutator = Mutator::new(fetcher.clone(), views.clone(), bus.clone(), relay.clone());
        let auth = AuthFlows::new(backend, tokens.clone(), cache.clone(), settings.cooldown_secs);

        Self {
            tokens,
            cache,
            bus,
            relay,
            views,
            fetcher,
            mutator,
            auth,
        }
    }

    /// Build the production stack: reqwest client plus the configured slot.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = ApiClient::new(&config.api_base_url, config.request_timeout())
            .context("Failed to build HTTP client")?;

        let slot: Arc<dyn CredentialSlot> = match config.credential_backend {
            CredentialBackend::File => Arc::new(FileSlot::new(config.cache_dir()?)),
            CredentialBackend::Keyring => Arc::new(KeyringSlot::new(KEYRING_ACCOUNT)),
        };
        debug!(api = %config.api_base_url, slot = ?config.credential_backend, "Sync context configured");

        let settings = SyncSettings {
            notification_ttl: config.notification_ttl(),
            cooldown_secs: config.cooldown_secs,
        };
        Ok(Self::new(Arc::new(backend), Arc::new(TokenStore::open(slot)), settings))
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn bus(&self) -> &Arc<RefreshBus> {
        &self.bus
    }

    pub fn notifications(&self) -> &NotificationRelay {
        &self.relay
    }

    pub fn fetcher(&self) -> &CollectionFetcher {
        &self.fetcher
    }

    pub fn auth(&self) -> &AuthFlows {
        &self.auth
    }

    /// Register a view so mutations reload it. Dropping the returned `Arc`
    /// (or calling `unmount`) deregisters it.
    pub fn mount<T>(&self, view: CollectionView<T>) -> Arc<CollectionView<T>>
    where
        T: DeserializeOwned + Serialize + Clone + Send + Sync + 'static,
    {
        let view = Arc::new(view);
        self.views.register(view.clone());
        view
    }

    pub fn mounted_views(&self) -> usize {
        self.views.len()
    }

    /// Cached-or-fetched load for a mounted view.
    pub async fn load<T>(&self, view: &CollectionView<T>) -> Result<FetchOutcome<T>, ApiError>
    where
        T: DeserializeOwned + Serialize + Clone,
    {
        self.fetcher.load(view).await
    }

    /// Club directory grouped by category, cached as "other clubs".
    pub async fn directory(&self) -> Result<Vec<ClubCategory>, ApiError> {
        if let Some(cached) = self.cache.get::<Vec<ClubCategory>>(&CacheKey::other_clubs()) {
            return Ok(cached.data);
        }
        self.fetcher.fetch_categories(&CacheKey::other_clubs(), "clubs").await
    }

    pub async fn admin_metrics(&self) -> Result<AdminMetrics, ApiError> {
        self.fetcher.fetch_object("admin/metrics", Some("metrics")).await
    }

    pub async fn mutate(&self, mutation: &Mutation) -> Result<Value, ApiError> {
        self.mutator.mutate(mutation).await
    }

    pub fn access(&self, user: Option<&User>, memberships: &[Membership], requirement: Requirement) -> Access {
        guard::check(self.tokens.is_set(), user, memberships, requirement)
    }
}
