//! # Lifecycle Manager
//!
//! Governs agent install (pre-warm a fixed manifest of routes), activation
//! (drop caches from other generations) and update signaling to the
//! foreground, plus the page↔agent command protocol.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheKey, CacheNames, CacheStore, StoredResponse};
use crate::classify::ResourceRequest;
use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::origin::Origin;

/// Lifecycle phase of the interception agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Installing,
    Waiting,
    Active,
    Superseded,
}

/// Wire-level command from the page, e.g. `{"action": "skipWaiting"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AgentAction {
    SkipWaiting,
    ClearCache,
    GetCacheSize,
}

/// Reply sent back over the command's reply channel. Serializes to
/// `{"status": ...}` or `{"cacheSize": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentReply {
    Status { status: String },
    CacheSize {
        #[serde(rename = "cacheSize")]
        cache_size: u64,
    },
}

/// A command paired with its reply channel.
#[derive(Debug)]
pub struct AgentCommand {
    pub action: AgentAction,
    pub reply: oneshot::Sender<AgentReply>,
}

/// Install/activate state machine over the cache store.
pub struct LifecycleManager {
    origin: Arc<dyn Origin>,
    store: CacheStore,
    names: CacheNames,
    site_base: Url,
    manifest: Vec<String>,
    phase_tx: watch::Sender<LifecyclePhase>,
}

impl LifecycleManager {
    pub fn new(origin: Arc<dyn Origin>, store: CacheStore, config: &DeliveryConfig) -> Self {
        let (phase_tx, _) = watch::channel(LifecyclePhase::Installing);
        Self {
            origin,
            store,
            names: config.cache_names(),
            site_base: config.site_base.clone(),
            manifest: config.precache_manifest.clone(),
            phase_tx,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase_tx.borrow()
    }

    /// Observe phase transitions (update signaling to the foreground).
    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase_tx.subscribe()
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Pre-warm the manifest into the static cache as an all-or-nothing
    /// batch: every route is fetched concurrently and nothing is written
    /// unless every fetch succeeds, so a retried install starts clean.
    pub async fn install(&self) -> Result<(), DeliveryError> {
        let fetches = self.manifest.iter().map(|route| {
            let origin = Arc::clone(&self.origin);
            let url = self
                .site_base
                .join(route)
                .map_err(|e| DeliveryError::Url(format!("{route}: {e}")));
            let route = route.clone();
            async move {
                let url = url?;
                let request = ResourceRequest::get(url.clone());
                let response = origin.fetch(&request).await.map_err(|e| {
                    DeliveryError::Install {
                        route: route.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if !response.is_success() {
                    return Err(DeliveryError::Install {
                        route,
                        reason: format!("status {}", response.status),
                    });
                }
                Ok::<(CacheKey, StoredResponse), DeliveryError>((CacheKey::get(&url), response))
            }
        });

        let entries = try_join_all(fetches).await?;
        let count = entries.len();
        for (cache_key, response) in entries {
            self.store
                .put(&self.names.static_assets, cache_key, response);
        }

        self.phase_tx.send_replace(LifecyclePhase::Waiting);
        info!(routes = count, "install pre-warm complete, waiting");
        Ok(())
    }

    /// Drop every named cache outside the declared generation set, then
    /// begin intercepting. Claiming the page's traffic is immediate.
    pub fn activate(&self) -> usize {
        let mut dropped = 0;
        for name in self.store.cache_names() {
            if !self.names.contains(&name) {
                info!(cache = %name, "dropping cache from superseded generation");
                self.store.delete_cache(&name);
                dropped += 1;
            }
        }

        self.phase_tx.send_replace(LifecyclePhase::Active);
        info!(dropped, "activated, claiming page traffic");
        dropped
    }

    /// Force immediate activation from the waiting phase.
    pub fn skip_waiting(&self) {
        if self.phase() == LifecyclePhase::Active {
            return;
        }
        debug!("skip-waiting requested, activating now");
        self.activate();
    }

    /// Mark this agent as replaced by a newer generation.
    pub fn supersede(&self) {
        self.phase_tx.send_replace(LifecyclePhase::Superseded);
    }
}

/// Spawn the agent task owning the command receiver. Each command is
/// acknowledged on its reply channel; a dropped reply receiver is not an
/// error.
pub fn spawn_agent(
    manager: Arc<LifecycleManager>,
    mut commands: mpsc::Receiver<AgentCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let reply = match command.action {
                AgentAction::SkipWaiting => {
                    manager.skip_waiting();
                    AgentReply::Status {
                        status: "activating".to_string(),
                    }
                }
                AgentAction::ClearCache => {
                    manager.store().clear();
                    AgentReply::Status {
                        status: "cleared".to_string(),
                    }
                }
                AgentAction::GetCacheSize => AgentReply::CacheSize {
                    cache_size: manager.store().total_size_bytes(),
                },
            };

            if command.reply.send(reply).is_err() {
                warn!(action = ?command.action, "agent reply receiver dropped");
            }
        }
        debug!("agent command channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::{CacheConfig, CacheKind, CacheName, Generation};

    struct ScriptedOrigin {
        calls: AtomicUsize,
        by_path: HashMap<String, Result<StoredResponse, String>>,
    }

    impl ScriptedOrigin {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                by_path: HashMap::new(),
            }
        }

        fn route(mut self, path: &str, outcome: Result<StoredResponse, &str>) -> Self {
            self.by_path
                .insert(path.to_string(), outcome.map_err(|e| e.to_string()));
            self
        }
    }

    #[async_trait]
    impl Origin for ScriptedOrigin {
        async fn fetch(&self, request: &ResourceRequest) -> Result<StoredResponse, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.by_path.get(request.url.path()) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(reason)) => Err(DeliveryError::Generic(reason.clone())),
                None => Ok(response_with(StatusCode::NOT_FOUND, "missing")),
            }
        }
    }

    fn response_with(status: StatusCode, body: &str) -> StoredResponse {
        StoredResponse::new(status, HeaderMap::new(), Bytes::from(body.to_string()))
    }

    fn response(body: &str) -> StoredResponse {
        response_with(StatusCode::OK, body)
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig::builder()
            .with_site_base("https://gallery.test")
            .with_precache_manifest(vec!["/".to_string(), "/offline.html".to_string()])
            .build()
    }

    fn manager(origin: ScriptedOrigin) -> (Arc<LifecycleManager>, CacheStore) {
        let store = CacheStore::new(CacheConfig::default());
        let manager = Arc::new(LifecycleManager::new(
            Arc::new(origin),
            store.clone(),
            &config(),
        ));
        (manager, store)
    }

    fn key(path: &str) -> CacheKey {
        CacheKey::get(&Url::parse(&format!("https://gallery.test{path}")).unwrap())
    }

    #[tokio::test]
    async fn install_prewarms_manifest_and_signals_waiting() {
        let origin = ScriptedOrigin::new()
            .route("/", Ok(response("home")))
            .route("/offline.html", Ok(response("offline")));
        let (manager, store) = manager(origin);
        let mut phases = manager.subscribe();

        assert_eq!(manager.phase(), LifecyclePhase::Installing);
        manager.install().await.unwrap();

        assert_eq!(manager.phase(), LifecyclePhase::Waiting);
        assert!(phases.changed().await.is_ok());

        let names = config().cache_names();
        assert!(store.get(&names.static_assets, &key("/")).is_some());
        assert!(
            store
                .get(&names.static_assets, &key("/offline.html"))
                .is_some()
        );
    }

    #[tokio::test]
    async fn install_is_all_or_nothing() {
        let origin = ScriptedOrigin::new()
            .route("/", Ok(response("home")))
            .route("/offline.html", Err("connection reset"));
        let (manager, store) = manager(origin);

        let err = manager.install().await.unwrap_err();
        assert!(matches!(err, DeliveryError::Install { .. }));
        assert_eq!(manager.phase(), LifecyclePhase::Installing);

        // A partial batch must not leave any writes behind.
        let names = config().cache_names();
        assert_eq!(store.entry_count(&names.static_assets), 0);
    }

    #[tokio::test]
    async fn install_treats_error_status_as_failure() {
        let origin = ScriptedOrigin::new()
            .route("/", Ok(response("home")))
            .route("/offline.html", Ok(response_with(StatusCode::BAD_GATEWAY, "")));
        let (manager, _) = manager(origin);

        let err = manager.install().await.unwrap_err();
        assert!(matches!(err, DeliveryError::Install { .. }));
    }

    #[tokio::test]
    async fn activate_drops_only_foreign_generations() {
        let (manager, store) = manager(ScriptedOrigin::new());
        let names = config().cache_names();
        let stale = CacheName::new(CacheKind::Image, Generation::new("v0"));

        store.put(&stale, key("/images/a"), response("old"));
        store.put(&names.image, key("/images/a"), response("current"));

        let dropped = manager.activate();
        assert_eq!(dropped, 1);
        assert_eq!(manager.phase(), LifecyclePhase::Active);
        assert!(store.get(&stale, &key("/images/a")).is_none());
        assert!(store.get(&names.image, &key("/images/a")).is_some());
    }

    #[tokio::test]
    async fn agent_replies_to_commands() {
        let (manager, store) = manager(ScriptedOrigin::new());
        let names = config().cache_names();
        store.put(&names.runtime, key("/a"), response("abcd"));

        let (tx, rx) = mpsc::channel(4);
        let agent = spawn_agent(Arc::clone(&manager), rx);

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(AgentCommand {
            action: AgentAction::GetCacheSize,
            reply: reply_tx,
        })
        .await
        .unwrap();
        assert_eq!(
            reply_rx.await.unwrap(),
            AgentReply::CacheSize { cache_size: 4 }
        );

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(AgentCommand {
            action: AgentAction::ClearCache,
            reply: reply_tx,
        })
        .await
        .unwrap();
        assert_eq!(
            reply_rx.await.unwrap(),
            AgentReply::Status {
                status: "cleared".to_string()
            }
        );
        assert_eq!(store.total_size_bytes(), 0);

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(AgentCommand {
            action: AgentAction::SkipWaiting,
            reply: reply_tx,
        })
        .await
        .unwrap();
        reply_rx.await.unwrap();
        assert_eq!(manager.phase(), LifecyclePhase::Active);

        drop(tx);
        agent.await.unwrap();
    }

    #[test]
    fn wire_forms_round_trip() {
        let action: AgentAction = serde_json::from_str(r#"{"action":"skipWaiting"}"#).unwrap();
        assert_eq!(action, AgentAction::SkipWaiting);
        assert_eq!(
            serde_json::to_string(&AgentAction::GetCacheSize).unwrap(),
            r#"{"action":"getCacheSize"}"#
        );

        let reply = AgentReply::CacheSize { cache_size: 1024 };
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"cacheSize":1024}"#
        );
        let reply = AgentReply::Status {
            status: "cleared".to_string(),
        };
        assert_eq!(serde_json::to_string(&reply).unwrap(), r#"{"status":"cleared"}"#);
    }
}
