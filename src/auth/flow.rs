//! Reconcile-then-route flow run after every external authentication event
//! (password login, OAuth return, one-time code, registration).
//!
//! At most one flow runs per orchestrator. A trigger arriving while a flow is
//! in flight joins it and observes the same outcome; the flow body never runs
//! twice concurrently.

use super::{
    bridge::IdentityBridge,
    identity::IdentityProvider,
    reconciler::TokenReconciler,
    routing::{route, Routes},
    state::{AuthEvent, AuthState},
};
use crate::{
    api::{AuthService, Profile},
    navigation::Navigator,
    session::{Session, SessionStore, Token},
};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, info, instrument, warn};

/// How a flow ended.
#[derive(Clone, Debug, PartialEq)]
pub enum FlowOutcome {
    /// The external provider has no session; nothing to reconcile.
    NoExternalSession,
    /// The login exchange failed. The external session is left in place so
    /// the next trigger can try again.
    ExchangeFailed,
    /// The profile could not be fetched; `status` is the HTTP-equivalent
    /// status when one applies.
    ProfileUnavailable { status: Option<u16> },
    /// The user was sent to `destination`.
    Routed {
        destination: String,
        profile: Profile,
    },
}

type SharedFlow = Shared<BoxFuture<'static, FlowOutcome>>;

/// The slot only holds a weak handle: once every caller has dropped its
/// clone, the flight future is dropped with them and its guard frees the slot.
struct Flight {
    id: u64,
    future: WeakShared<BoxFuture<'static, FlowOutcome>>,
}

pub(super) struct FlowContext {
    pub(super) identity: Arc<dyn IdentityProvider>,
    pub(super) store: Arc<dyn SessionStore>,
    pub(super) reconciler: TokenReconciler,
    pub(super) bridge: IdentityBridge,
    pub(super) service: AuthService,
    pub(super) navigator: Arc<dyn Navigator>,
    pub(super) routes: Routes,
    state: Mutex<AuthState>,
    flight: Mutex<Option<Flight>>,
    flight_ids: AtomicU64,
    /// Held across the refresh-or-exchange step so that two callers never
    /// create two internal sessions.
    exchange: tokio::sync::Mutex<()>,
}

impl FlowContext {
    pub(super) fn apply(&self, event: AuthEvent) -> AuthState {
        let mut state = self.state.lock();
        let next = state.on(event);
        if next != *state {
            debug!(from = %*state, to = %next, ?event, "auth state changed");
        }
        *state = next;
        next
    }

    pub(super) fn state(&self) -> AuthState {
        *self.state.lock()
    }

    /// Valid internal access token, exchanging the external credential when
    /// no internal session can be recovered.
    pub(super) async fn access_token_or_exchange(&self, external: &Token) -> Option<Token> {
        let _exchange = self.exchange.lock().await;
        if let Some(token) = self.reconciler.ensure_valid_access_token().await {
            self.apply(AuthEvent::InternalEstablished);
            return Some(token);
        }
        self.apply(AuthEvent::InternalLost);

        match self.bridge.exchange(external).await {
            Ok(Session {
                access_token: Some(token),
                ..
            }) => {
                self.apply(AuthEvent::InternalEstablished);
                Some(token)
            }
            Ok(_) => {
                warn!("login exchange returned no access token");
                None
            }
            Err(err) => {
                // The external session stays; the next trigger retries.
                warn!("login exchange failed: {err}");
                None
            }
        }
    }

    async fn run(&self, next: Option<&str>) -> FlowOutcome {
        let Some(external) = self.identity.current_session().await else {
            self.apply(AuthEvent::ExternalMissing);
            debug!("no external session, nothing to reconcile");
            return FlowOutcome::NoExternalSession;
        };
        self.apply(AuthEvent::ExternalAuthenticated);

        let Some(access) = self.access_token_or_exchange(&external.access_token).await else {
            return FlowOutcome::ExchangeFailed;
        };

        let profile = match self.service.me(&access).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!("profile fetch failed: {err}");
                return FlowOutcome::ProfileUnavailable {
                    status: err.status(),
                };
            }
        };

        let destination = route(profile.role, next, &self.routes);
        info!(destination, role = ?profile.role, "session reconciled");
        self.navigator.navigate(&destination);

        FlowOutcome::Routed {
            destination,
            profile,
        }
    }
}

/// Releases the flight slot when the flight future finishes, is dropped or
/// panics. A slot already taken over by a newer flight is left alone.
struct FlightGuard {
    context: Arc<FlowContext>,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let finished = {
            let mut slot = self.context.flight.lock();
            if slot.as_ref().is_some_and(|flight| flight.id == self.id) {
                slot.take()
            } else {
                None
            }
        };
        drop(finished);
    }
}

/// Entry point invoked by screens after an external authentication event.
#[derive(Clone)]
pub struct AuthFlowOrchestrator {
    pub(super) context: Arc<FlowContext>,
}

impl AuthFlowOrchestrator {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn SessionStore>,
        service: AuthService,
        navigator: Arc<dyn Navigator>,
        routes: Routes,
    ) -> Self {
        let reconciler = TokenReconciler::new(Arc::clone(&store), service.clone());
        let bridge = IdentityBridge::new(Arc::clone(&store), service.clone());
        Self {
            context: Arc::new(FlowContext {
                identity,
                store,
                reconciler,
                bridge,
                service,
                navigator,
                routes,
                state: Mutex::new(AuthState::Anonymous),
                flight: Mutex::new(None),
                flight_ids: AtomicU64::new(0),
                exchange: tokio::sync::Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn routes(&self) -> &Routes {
        &self.context.routes
    }

    /// Whether a flow is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        // Dropped after the lock: releasing the last handle runs the guard,
        // which takes the lock itself.
        let running = self
            .context
            .flight
            .lock()
            .as_ref()
            .and_then(|flight| flight.future.upgrade());
        running.is_some()
    }

    /// Reconcile the sessions, fetch the profile and navigate to the
    /// destination for the user's role.
    ///
    /// `next` is the page the user originally asked for; it is honored for
    /// renters only, and only when it stays on this origin. A call made while
    /// a flow is running joins that flow and its `next` is ignored.
    #[instrument(skip(self))]
    pub async fn reconcile_and_route(&self, next: Option<&str>) -> FlowOutcome {
        let flight = {
            let mut slot = self.context.flight.lock();
            let running = slot
                .as_ref()
                .and_then(|flight| flight.future.upgrade().map(|future| (flight.id, future)));
            match running {
                Some((id, future)) => {
                    debug!(flight = id, "joining reconciliation in flight");
                    future
                }
                None => {
                    let id = self.context.flight_ids.fetch_add(1, Ordering::Relaxed);
                    let future = self.start_flight(id, next.map(str::to_string));
                    *slot = future.downgrade().map(|weak| Flight { id, future: weak });
                    future
                }
            }
        };

        flight.await
    }

    fn start_flight(&self, id: u64, next: Option<String>) -> SharedFlow {
        let context = Arc::clone(&self.context);
        async move {
            let _guard = FlightGuard {
                context: Arc::clone(&context),
                id,
            };
            context.run(next.as_deref()).await
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for AuthFlowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlowOrchestrator")
            .field("routes", &self.context.routes)
            .field("state", &self.context.state())
            .finish_non_exhaustive()
    }
}
