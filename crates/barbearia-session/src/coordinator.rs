//! Single-flight token refresh around every outbound request.
//!
//! [`RefreshCoordinator::dispatch`] attaches the stored access token, and when
//! the server answers 401 it makes sure exactly one refresh call is in flight.
//! Every request that hits a 401 while that call is outstanding waits on it.
//! When the refresh settles, the flight replays the waiting requests once
//! each with the new token, in the order they joined, or fails all of them
//! with [`SessionError::AuthExpired`].
//!
//! ```text
//! IDLE ──first 401──▶ REFRESHING ──settle (ok or err)──▶ IDLE
//!                       │
//!                       └── further 401s join as waiters
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Result, SessionError};
use crate::events::{SessionEvent, SessionEvents};
use crate::store::TokenStore;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::{ApiEnvelope, RefreshRequest, TokenPair};

/// Default login endpoint, relative to the API base URL.
pub const DEFAULT_LOGIN_PATH: &str = "auth/login";

/// Default refresh endpoint, relative to the API base URL.
pub const DEFAULT_REFRESH_PATH: &str = "auth/refresh";

/// Default unauthenticated entry point of the application.
pub const DEFAULT_ENTRY_POINT: &str = "/login";

// ============================================================================
// Configuration
// ============================================================================

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Login endpoint. Never intercepted.
    pub login_path: String,
    /// Refresh endpoint. Never intercepted.
    pub refresh_path: String,
    /// Where the application is sent when the session cannot be renewed.
    pub entry_point: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        }
    }
}

impl CoordinatorConfig {
    fn is_excluded(&self, request: &ApiRequest) -> bool {
        let path = request.normalized_path();
        path == self.login_path.trim_matches('/') || path == self.refresh_path.trim_matches('/')
    }
}

// ============================================================================
// Flight bookkeeping
// ============================================================================

/// A caller suspended on the in-progress refresh.
enum RefreshWaiter {
    /// A request rejected with 401, replayed by the flight with the new token.
    Replay {
        request: ApiRequest,
        resume: oneshot::Sender<Result<ApiResponse>>,
    },
    /// A caller that only needs the new token.
    Token { resume: oneshot::Sender<Result<String>> },
}

impl RefreshWaiter {
    fn replay(request: ApiRequest) -> (Self, oneshot::Receiver<Result<ApiResponse>>) {
        let (resume, rx) = oneshot::channel();
        (Self::Replay { request, resume }, rx)
    }

    fn token() -> (Self, oneshot::Receiver<Result<String>>) {
        let (resume, rx) = oneshot::channel();
        (Self::Token { resume }, rx)
    }

    fn path(&self) -> &str {
        match self {
            Self::Replay { request, .. } => request.path(),
            Self::Token { .. } => "<refresh>",
        }
    }

    fn is_abandoned(&self) -> bool {
        match self {
            Self::Replay { resume, .. } => resume.is_closed(),
            Self::Token { resume } => resume.is_closed(),
        }
    }

    /// Hand over the new token, replaying the request first if there is one.
    async fn resume(self, transport: &dyn Transport, token: &str) {
        if self.is_abandoned() {
            tracing::debug!(path = self.path(), "Waiter abandoned before refresh settled");
            return;
        }

        match self {
            Self::Replay { request, resume } => {
                tracing::debug!(path = request.path(), "Replaying request with refreshed token");
                let replayed = match transport.send(&request.authorized(Some(token))).await {
                    Ok(response) if response.is_unauthorized() => {
                        tracing::warn!(path = request.path(), "Request rejected again after refresh");
                        Err(SessionError::Unauthorized {
                            path: request.path().to_string(),
                        })
                    }
                    other => other,
                };
                let _ = resume.send(replayed);
            }
            Self::Token { resume } => {
                let _ = resume.send(Ok(token.to_string()));
            }
        }
    }

    fn fail(self, reason: &str) {
        let delivered = match self {
            Self::Replay { resume, .. } => resume
                .send(Err(SessionError::AuthExpired(reason.to_string())))
                .is_ok(),
            Self::Token { resume } => resume
                .send(Err(SessionError::AuthExpired(reason.to_string())))
                .is_ok(),
        };
        if !delivered {
            tracing::debug!(reason, "Waiter abandoned before refresh settled");
        }
    }
}

/// The single in-progress refresh and the callers waiting on it, in join order.
struct RefreshFlight {
    waiters: Vec<RefreshWaiter>,
}

enum Admission {
    /// Queued on a flight; `led` is set when this call started it.
    Queued { led: bool },
    /// The store already holds a newer token than the rejected one.
    Rotated {
        token: String,
        waiter: RefreshWaiter,
    },
}

/// Owns a spawned flight. Dropping it before the waiters are drained (a
/// panicking transport, a runtime shut down mid-refresh, a task that never
/// got polled) empties the slot and fails whoever is still queued.
struct FlightTask {
    coordinator: RefreshCoordinator,
    drained: bool,
}

impl FlightTask {
    async fn run(mut self) {
        let settlement = self.coordinator.refresh_and_publish().await;

        // IDLE again before the replays go out.
        let waiters = self.coordinator.take_waiters();
        self.drained = true;

        tracing::debug!(waiters = waiters.len(), "Refresh settled, resuming waiters");
        match settlement {
            Ok(token) => {
                let transport = self.coordinator.inner.transport.clone();
                for waiter in waiters {
                    waiter.resume(transport.as_ref(), &token).await;
                }
            }
            Err(reason) => {
                for waiter in waiters {
                    waiter.fail(&reason);
                }
            }
        }
    }
}

impl Drop for FlightTask {
    fn drop(&mut self) {
        if self.drained {
            return;
        }
        let waiters = self.coordinator.take_waiters();
        tracing::warn!(
            waiters = waiters.len(),
            "Refresh task ended without settling, failing waiters"
        );
        for waiter in waiters {
            waiter.fail("refresh task ended without settling");
        }
    }
}

// ============================================================================
// RefreshCoordinator
// ============================================================================

/// Wraps every outbound request with bearer attachment and refresh-on-401.
///
/// Construct one per application and share it by cloning; clones share the
/// same flight slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    config: CoordinatorConfig,
    events: SessionEvents,
    flight: Mutex<Option<RefreshFlight>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("transport", &self.inner.transport)
            .field("config", &self.inner.config)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, store: TokenStore, config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                transport,
                store,
                config,
                events: SessionEvents::new(),
                flight: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    /// Whether a refresh call is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.inner.flight.lock().is_some()
    }

    /// Send a request, refreshing the session once if it is rejected with 401.
    ///
    /// Non-401 responses are returned unchanged, whatever their status. A
    /// rejected request is replayed by the flight, after every request that
    /// joined before it.
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
        if self.inner.config.is_excluded(&request) {
            return self.inner.transport.send(&request).await;
        }

        let sent = self.inner.store.get_access();
        if sent.is_some() {
            tracing::debug!(path = request.path(), "Attaching bearer token");
        }

        let response = self
            .inner
            .transport
            .send(&request.authorized(sent.as_deref()))
            .await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        tracing::debug!(path = request.path(), "Request rejected with 401");
        let path = request.path().to_string();
        let (waiter, rx) = RefreshWaiter::replay(request);
        match self.admit(waiter, Some(sent.as_deref())) {
            Admission::Rotated { token, waiter } => {
                tracing::debug!(path = %path, "Token already rotated, skipping refresh");
                waiter.resume(self.inner.transport.as_ref(), &token).await;
            }
            Admission::Queued { led: false } => {
                tracing::debug!(path = %path, "Refresh in progress, queuing request");
            }
            Admission::Queued { led: true } => {}
        }
        settle(rx).await
    }

    /// Force a refresh, sharing any flight already in progress.
    pub async fn refresh_now(&self) -> Result<String> {
        let (waiter, rx) = RefreshWaiter::token();
        if let Admission::Rotated { token, waiter } = self.admit(waiter, None) {
            waiter.resume(self.inner.transport.as_ref(), &token).await;
        }
        settle(rx).await
    }

    /// Join the current flight or start one. `rejected` is the token the
    /// caller was refused with; `None` means always refresh.
    ///
    /// Check-then-create happens under one lock with no suspension point.
    fn admit(&self, waiter: RefreshWaiter, rejected: Option<Option<&str>>) -> Admission {
        let mut slot = self.inner.flight.lock();

        if let Some(flight) = slot.as_mut() {
            flight.waiters.push(waiter);
            return Admission::Queued { led: false };
        }

        if let Some(rejected) = rejected
            && let Some(current) = self.inner.store.get_access()
            && Some(current.as_str()) != rejected
        {
            return Admission::Rotated {
                token: current,
                waiter,
            };
        }

        *slot = Some(RefreshFlight {
            waiters: vec![waiter],
        });
        drop(slot);

        // The flight runs on its own task so that dropping the request that
        // started it cannot strand the other waiters.
        let task = FlightTask {
            coordinator: self.clone(),
            drained: false,
        };
        tokio::spawn(task.run());

        Admission::Queued { led: true }
    }

    /// Run the refresh call and announce its outcome. A failure clears the
    /// session.
    async fn refresh_and_publish(&self) -> std::result::Result<String, String> {
        let settlement = self.refresh().await;
        match &settlement {
            Ok(_) => self.inner.events.publish(SessionEvent::Refreshed),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Token refresh failed, clearing session");
                self.inner.store.clear_all();
                self.inner.events.publish(SessionEvent::Expired {
                    redirect_to: self.inner.config.entry_point.clone(),
                });
            }
        }
        settlement
    }

    fn take_waiters(&self) -> Vec<RefreshWaiter> {
        self.inner
            .flight
            .lock()
            .take()
            .map(|flight| flight.waiters)
            .unwrap_or_default()
    }

    /// Exchange the stored refresh token for a new token pair.
    async fn refresh(&self) -> std::result::Result<String, String> {
        let Some(refresh_token) = self.inner.store.get_refresh() else {
            return Err("no refresh token stored".to_string());
        };

        tracing::info!("Access token rejected, refreshing session");
        let request = ApiRequest::post(
            self.inner.config.refresh_path.as_str(),
            &RefreshRequest { refresh_token },
        )
        .map_err(|e| e.to_string())?;

        let response = self
            .inner
            .transport
            .send(&request)
            .await
            .map_err(|e| format!("refresh request failed: {}", e))?;
        if !response.is_success() {
            return Err(format!("refresh endpoint returned HTTP {}", response.status()));
        }

        let pair = response
            .json::<ApiEnvelope<TokenPair>>()
            .map_err(|e| format!("malformed refresh response: {}", e))?
            .data;
        if pair.token.is_empty() {
            return Err("refresh response carried no access token".to_string());
        }

        self.inner
            .store
            .set_tokens(&pair.token, pair.refresh_token.as_deref());
        tracing::info!("Access token refreshed");
        Ok(pair.token)
    }

    #[cfg(test)]
    fn waiter_count(&self) -> usize {
        self.inner
            .flight
            .lock()
            .as_ref()
            .map(|f| f.waiters.len())
            .unwrap_or(0)
    }
}

async fn settle<T>(rx: oneshot::Receiver<Result<T>>) -> Result<T> {
    rx.await.unwrap_or_else(|_| {
        Err(SessionError::AuthExpired(
            "refresh task ended without settling".to_string(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// In-process server: resources accept only `valid_token`; the refresh
    /// endpoint rotates to `A2`/`R2` or fails with `refresh_status`.
    #[derive(Debug)]
    struct ScriptedTransport {
        valid_token: String,
        reject_all: bool,
        refresh_status: u16,
        gate: Option<Notify>,
        panic_on_refresh: bool,
        rotate_on_reject: Option<TokenStore>,
        refresh_calls: AtomicUsize,
        refresh_bodies: parking_lot::Mutex<Vec<serde_json::Value>>,
        seen: parking_lot::Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                valid_token: "A2".to_string(),
                reject_all: false,
                refresh_status: 200,
                gate: None,
                panic_on_refresh: false,
                rotate_on_reject: None,
                refresh_calls: AtomicUsize::new(0),
                refresh_bodies: parking_lot::Mutex::new(Vec::new()),
                seen: parking_lot::Mutex::new(Vec::new()),
            }
        }

        fn gated(mut self) -> Self {
            self.gate = Some(Notify::new());
            self
        }

        fn open_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
        }

        fn refresh_calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }

        fn seen_tokens(&self) -> Vec<Option<String>> {
            self.seen.lock().iter().map(|(_, t)| t.clone()).collect()
        }

        fn paths_sent_with(&self, token: &str) -> Vec<String> {
            self.seen
                .lock()
                .iter()
                .filter(|(_, t)| t.as_deref() == Some(token))
                .map(|(path, _)| path.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            if request.normalized_path() == DEFAULT_REFRESH_PATH {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                self.refresh_bodies
                    .lock()
                    .push(request.body().cloned().unwrap_or_default());
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
                if self.panic_on_refresh {
                    panic!("refresh transport failed hard");
                }
                if self.refresh_status != 200 {
                    return Ok(ApiResponse::new(self.refresh_status, ""));
                }
                return Ok(ApiResponse::json_body(
                    200,
                    &json!({"data": {"token": "A2", "refreshToken": "R2"}}),
                ));
            }

            self.seen.lock().push((
                request.path().to_string(),
                request.bearer().map(str::to_string),
            ));

            if request.normalized_path() == DEFAULT_LOGIN_PATH {
                return Ok(ApiResponse::json_body(401, &json!({"message": "bad credentials"})));
            }

            if !self.reject_all && request.bearer() == Some(self.valid_token.as_str()) {
                return Ok(ApiResponse::json_body(200, &json!({"path": request.path()})));
            }

            if let Some(store) = &self.rotate_on_reject {
                store.set_tokens("A2", Some("R2"));
            }
            Ok(ApiResponse::new(401, ""))
        }
    }

    fn coordinator(transport: Arc<ScriptedTransport>) -> RefreshCoordinator {
        let store = TokenStore::in_memory();
        store.set_tokens("A1", Some("R1"));
        RefreshCoordinator::new(transport, store, CoordinatorConfig::default())
    }

    async fn wait_for_waiters(coordinator: &RefreshCoordinator, expected: usize) {
        for _ in 0..400 {
            if coordinator.waiter_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "expected {} waiters, found {}",
            expected,
            coordinator.waiter_count()
        );
    }

    #[tokio::test]
    async fn test_valid_token_passes_through() {
        let transport = Arc::new(ScriptedTransport::new());
        let coordinator = coordinator(transport.clone());
        coordinator.store().set_access("A2");

        let response = coordinator.dispatch(ApiRequest::get("users")).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(transport.seen_tokens(), vec![Some("A2".to_string())]);
        assert_eq!(transport.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_and_replay() {
        let transport = Arc::new(ScriptedTransport::new());
        let coordinator = coordinator(transport.clone());
        let mut events = coordinator.events().subscribe();

        let response = coordinator.dispatch(ApiRequest::get("users")).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            transport.seen_tokens(),
            vec![Some("A1".to_string()), Some("A2".to_string())]
        );
        assert_eq!(transport.refresh_calls(), 1);
        assert_eq!(
            transport.refresh_bodies.lock()[0],
            json!({"refreshToken": "R1"})
        );
        assert_eq!(coordinator.store().get_access().as_deref(), Some("A2"));
        assert_eq!(coordinator.store().get_refresh().as_deref(), Some("R2"));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let transport = Arc::new(ScriptedTransport::new().gated());
        let coordinator = coordinator(transport.clone());

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.dispatch(ApiRequest::get(format!("items/{}", i))).await })
            })
            .collect();

        wait_for_waiters(&coordinator, 5).await;
        assert!(coordinator.is_refreshing());
        transport.open_gate();

        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.status(), 200);
        }

        assert_eq!(transport.refresh_calls(), 1);
        let replays = transport
            .seen_tokens()
            .into_iter()
            .filter(|t| t.as_deref() == Some("A2"))
            .count();
        assert_eq!(replays, 5);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_second_401_after_replay_is_surfaced() {
        let mut transport = ScriptedTransport::new();
        transport.reject_all = true;
        let transport = Arc::new(transport);
        let coordinator = coordinator(transport.clone());

        let err = coordinator
            .dispatch(ApiRequest::get("admin/reports"))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Unauthorized { ref path } if path == "admin/reports"));
        assert_eq!(transport.refresh_calls(), 1);
        assert_eq!(transport.seen_tokens().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_fails_every_waiter() {
        let mut transport = ScriptedTransport::new().gated();
        transport.refresh_status = 500;
        let transport = Arc::new(transport);
        let coordinator = coordinator(transport.clone());
        let mut events = coordinator.events().subscribe();

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.dispatch(ApiRequest::get(format!("items/{}", i))).await })
            })
            .collect();

        wait_for_waiters(&coordinator, 5).await;
        transport.open_gate();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, SessionError::AuthExpired(_)));
        }

        assert_eq!(transport.refresh_calls(), 1);
        assert!(coordinator.store().get_access().is_none());
        assert!(coordinator.store().get_refresh().is_none());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Expired {
                redirect_to: "/login".to_string()
            }
        );
        // Nothing was replayed.
        assert_eq!(transport.seen_tokens().len(), 5);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_expires_without_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = TokenStore::in_memory();
        store.set_access("A1");
        let coordinator =
            RefreshCoordinator::new(transport.clone(), store, CoordinatorConfig::default());

        let err = coordinator.dispatch(ApiRequest::get("users")).await.unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired(_)));
        assert_eq!(transport.refresh_calls(), 0);
        assert!(coordinator.store().get_access().is_none());
    }

    #[tokio::test]
    async fn test_login_401_is_not_intercepted() {
        let transport = Arc::new(ScriptedTransport::new());
        let coordinator = coordinator(transport.clone());

        let request = ApiRequest::post(
            "/auth/login",
            &json!({"email": "a@b.c", "password": "wrong"}),
        )
        .unwrap();
        let response = coordinator.dispatch(request).await.unwrap();

        assert_eq!(response.status(), 401);
        assert_eq!(transport.refresh_calls(), 0);
        assert_eq!(transport.seen_tokens(), vec![None]);
        assert_eq!(coordinator.store().get_access().as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_rotated_token_is_reused_without_refresh() {
        let mut transport = ScriptedTransport::new();
        let store = TokenStore::in_memory();
        store.set_tokens("A1", Some("R1"));
        transport.rotate_on_reject = Some(store.clone());
        let transport = Arc::new(transport);
        let coordinator =
            RefreshCoordinator::new(transport.clone(), store, CoordinatorConfig::default());

        let response = coordinator.dispatch(ApiRequest::get("users")).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(transport.refresh_calls(), 0);
        assert_eq!(
            transport.seen_tokens(),
            vec![Some("A1".to_string()), Some("A2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_disturb_others() {
        let transport = Arc::new(ScriptedTransport::new().gated());
        let coordinator = coordinator(transport.clone());

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.dispatch(ApiRequest::get(format!("items/{}", i))).await })
            })
            .collect();
        wait_for_waiters(&coordinator, 3).await;

        handles[1].abort();
        transport.open_gate();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await);
        }

        assert!(results[0].as_ref().unwrap().is_ok());
        assert!(results[1].as_ref().unwrap_err().is_cancelled());
        assert!(results[2].as_ref().unwrap().is_ok());
        assert_eq!(transport.refresh_calls(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_now_shares_flight() {
        let transport = Arc::new(ScriptedTransport::new().gated());
        let coordinator = coordinator(transport.clone());

        let first = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.refresh_now().await })
        };
        wait_for_waiters(&coordinator, 1).await;
        let second = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.refresh_now().await })
        };
        wait_for_waiters(&coordinator, 2).await;
        transport.open_gate();

        assert_eq!(first.await.unwrap().unwrap(), "A2");
        assert_eq!(second.await.unwrap().unwrap(), "A2");
        assert_eq!(transport.refresh_calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replays_follow_join_order() {
        let transport = Arc::new(ScriptedTransport::new().gated());
        let coordinator = coordinator(transport.clone());

        let mut handles = Vec::new();
        for i in 0..8 {
            let c = coordinator.clone();
            handles.push(tokio::spawn(async move {
                c.dispatch(ApiRequest::get(format!("items/{}", i))).await
            }));
            wait_for_waiters(&coordinator, i + 1).await;
        }
        transport.open_gate();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status(), 200);
        }

        let expected: Vec<String> = (0..8).map(|i| format!("items/{}", i)).collect();
        assert_eq!(transport.paths_sent_with("A2"), expected);
        assert_eq!(transport.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_panicking_refresh_fails_waiters_and_resets() {
        let mut transport = ScriptedTransport::new();
        transport.panic_on_refresh = true;
        let transport = Arc::new(transport);
        let coordinator = coordinator(transport.clone());

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.dispatch(ApiRequest::get("users")),
        )
        .await
        .expect("dispatch should settle")
        .unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired(_)));
        assert!(!coordinator.is_refreshing());

        // The next 401 starts a new flight instead of joining the dead one.
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.dispatch(ApiRequest::get("users")),
        )
        .await
        .expect("dispatch should settle")
        .unwrap_err();

        assert!(matches!(err, SessionError::AuthExpired(_)));
        assert_eq!(transport.refresh_calls(), 2);
        assert!(!coordinator.is_refreshing());
    }

    #[test]
    fn test_runtime_shutdown_mid_refresh_releases_flight() {
        let transport = Arc::new(ScriptedTransport::new().gated());
        let coordinator = coordinator(transport.clone());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let pending = runtime.block_on(async {
            let c = coordinator.clone();
            let handle = tokio::spawn(async move { c.dispatch(ApiRequest::get("users")).await });
            wait_for_waiters(&coordinator, 1).await;
            handle
        });
        assert!(coordinator.is_refreshing());

        drop(runtime);
        drop(pending);
        assert!(!coordinator.is_refreshing());

        transport.open_gate();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let response = runtime
            .block_on(coordinator.dispatch(ApiRequest::get("users")))
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(transport.refresh_calls(), 2);
        assert_eq!(coordinator.store().get_access().as_deref(), Some("A2"));
    }
}
