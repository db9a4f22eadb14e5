//! Session & role router
//!
//! Turns auth state changes into navigation decisions. One event loop task
//! owns all router state: auth changes, profile fetch completions and
//! handle commands all enter through it. Every new session bumps a
//! generation and aborts the fetch started for the previous one, so a slow
//! stale fetch can never redirect backwards.

mod dispatch;
mod state;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::auth::{AuthChange, AuthChangeEvent, AuthProvider, Session, SignUpMetadata};
use crate::config::RouterOptions;
use crate::error::{Error, ValidationErrors};
use crate::onboarding::ChefOnboarding;
use crate::profile::{ChefProfile, NewUserProfile, ProfileStore, UserProfile};
use crate::validation::{check_email, LoginCredentials, Registration};

pub use dispatch::*;
pub use state::*;

/// Dependency-injected router container; call [`SessionRouter::start`] once
/// at application start.
pub struct SessionRouter {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn ProfileStore>,
    navigator: Arc<dyn Navigator>,
    options: RouterOptions,
}

impl SessionRouter {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn ProfileStore>,
        navigator: Arc<dyn Navigator>,
        options: RouterOptions,
    ) -> Self {
        Self {
            auth,
            store,
            navigator,
            options,
        }
    }

    /// Subscribe to auth changes and spawn the event loop.
    ///
    /// A session already held by the auth provider (restored at cold start)
    /// is resolved right away, and the first snapshot already reports it as
    /// unresolved. Must be called inside a tokio runtime.
    pub fn start(self) -> RouterHandle {
        // Subscribe before reading the session so no change slips between
        let events = self.auth.subscribe();
        let initial = self.auth.get_session();

        let state = resolve(initial.as_ref(), &ProfileLookup::Pending);
        let seed = RouterSnapshot {
            state,
            session: initial.filter(|_| state.is_authenticated()),
            ..RouterSnapshot::default()
        };

        let (snapshot_tx, snapshot_rx) = watch::channel(seed);
        let (command_tx, command_rx) = mpsc::channel(8);
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();

        let core = RouterCore {
            auth: self.auth.clone(),
            store: self.store.clone(),
            dispatcher: Dispatcher::new(self.navigator, self.options.routes.clone()),
            retries: self.options.fetch_retries,
            retry_delay: self.options.retry_delay,
            snapshot: snapshot_tx,
            generation: 0,
            in_flight: None,
            rejected: None,
            fetch_tx,
        };

        let task = tokio::spawn(core.run(events, command_rx, fetch_rx));

        RouterHandle {
            auth: self.auth,
            store: self.store,
            snapshot: snapshot_rx,
            commands: command_tx,
            task,
        }
    }
}

enum Command {
    /// Reply once everything queued before it has been handled
    Settle(oneshot::Sender<()>),
    OnboardingCompleted {
        user_id: String,
        chef: ChefProfile,
        reply: oneshot::Sender<RouterState>,
    },
    /// The `users` row of a just registered identity was written
    ProfileCreated {
        profile: UserProfile,
        reply: oneshot::Sender<RouterState>,
    },
}

struct FetchDone {
    generation: u64,
    result: Result<(UserProfile, Option<ChefProfile>), Error>,
}

struct RouterCore {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn ProfileStore>,
    dispatcher: Dispatcher,
    retries: u32,
    retry_delay: Duration,
    snapshot: watch::Sender<RouterSnapshot>,
    generation: u64,
    in_flight: Option<JoinHandle<()>>,
    /// Identity whose profile lookup failed; only a fresh sign-in lets it back
    rejected: Option<String>,
    fetch_tx: mpsc::UnboundedSender<FetchDone>,
}

impl RouterCore {
    async fn run(
        mut self,
        mut events: broadcast::Receiver<AuthChange>,
        mut commands: mpsc::Receiver<Command>,
        mut fetches: mpsc::UnboundedReceiver<FetchDone>,
    ) {
        match self.current().session {
            Some(session) => {
                tracing::debug!(user_id = %session.user_id(), "session router started with restored session");
                self.generation += 1;
                self.spawn_fetch(session);
            }
            None => {
                tracing::debug!("session router started");
                self.publish(RouterSnapshot::default());
            }
        }

        loop {
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Ok(change) => self.on_session(change.event, change.session),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "auth events lagged, resyncing from provider");
                        let session = self.auth.get_session();
                        self.on_session(AuthChangeEvent::InitialSession, session);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("auth provider closed its event stream");
                        break;
                    }
                },
                Some(done) = fetches.recv() => self.on_fetch(done),
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
            }
        }

        self.cancel_fetch();
        tracing::debug!("session router stopped");
    }

    fn current(&self) -> RouterSnapshot {
        self.snapshot.borrow().clone()
    }

    fn publish(&mut self, snapshot: RouterSnapshot) {
        self.dispatcher.dispatch(snapshot.state);
        self.snapshot.send_replace(snapshot);
    }

    fn cancel_fetch(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    fn on_session(&mut self, event: AuthChangeEvent, session: Option<Session>) {
        let current = self.current();

        let session = match session {
            Some(session) if session.is_expired() => {
                tracing::info!(user_id = %session.user_id(), "session expired");
                None
            }
            other => other,
        };

        let Some(session) = session else {
            self.generation += 1;
            self.cancel_fetch();
            self.rejected = None;
            tracing::debug!(?event, "no session");
            self.publish(RouterSnapshot::default());
            return;
        };

        if self.rejected.as_deref() == Some(session.user_id()) && event != AuthChangeEvent::SignedIn {
            tracing::debug!(?event, user_id = %session.user_id(), "ignoring session that must sign in again");
            return;
        }
        self.rejected = None;

        if current.user_id() == Some(session.user_id()) {
            let same_session = current.session.as_ref() == Some(&session);
            let refresh_only = matches!(
                event,
                AuthChangeEvent::TokenRefreshed | AuthChangeEvent::UserUpdated
            );

            if current.state.is_resolved() && (same_session || refresh_only) {
                tracing::trace!(?event, "session unchanged for resolved user");
                self.snapshot.send_modify(|s| s.session = Some(session));
                return;
            }
            if current.state == RouterState::AuthenticatedUnresolved && same_session {
                // The fetch for this exact session is already running
                return;
            }
        }

        self.generation += 1;
        self.cancel_fetch();
        tracing::debug!(
            ?event,
            user_id = %session.user_id(),
            generation = self.generation,
            "resolving profile"
        );

        self.spawn_fetch(session.clone());
        self.publish(RouterSnapshot {
            state: RouterState::AuthenticatedUnresolved,
            session: Some(session),
            profile: None,
            chef_profile: None,
        });
    }

    fn spawn_fetch(&mut self, session: Session) {
        let generation = self.generation;
        let store = self.store.clone();
        let tx = self.fetch_tx.clone();
        let retries = self.retries;
        let delay = self.retry_delay;

        self.in_flight = Some(tokio::spawn(async move {
            let result = lookup_profile(store.as_ref(), &session, retries, delay).await;
            // The loop may already be gone during teardown
            let _ = tx.send(FetchDone { generation, result });
        }));
    }

    fn on_fetch(&mut self, done: FetchDone) {
        if done.generation != self.generation {
            tracing::debug!(
                stale = done.generation,
                current = self.generation,
                "discarding superseded profile fetch"
            );
            return;
        }
        self.in_flight = None;

        let current = self.current();
        match done.result {
            Ok((profile, chef)) => {
                let lookup = ProfileLookup::Found {
                    profile: profile.clone(),
                    chef: chef.clone(),
                };
                let state = resolve(current.session.as_ref(), &lookup);
                if state == RouterState::Unauthenticated {
                    tracing::info!("session expired while resolving profile");
                    self.publish(RouterSnapshot::default());
                    return;
                }
                tracing::info!(
                    user_id = %profile.id,
                    role = %profile.user_role,
                    ?state,
                    "profile resolved"
                );
                self.publish(RouterSnapshot {
                    state,
                    session: current.session,
                    profile: Some(profile),
                    chef_profile: chef,
                });
            }
            Err(e) => {
                tracing::error!(
                    user_id = current.user_id().unwrap_or_default(),
                    error = %e,
                    "profile lookup failed, sending user back to login"
                );
                let state = resolve(current.session.as_ref(), &ProfileLookup::Failed);
                self.rejected = current.user_id().map(str::to_string);
                self.publish(RouterSnapshot {
                    state,
                    ..RouterSnapshot::default()
                });
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Settle(reply) => {
                let _ = reply.send(());
            }
            Command::OnboardingCompleted {
                user_id,
                chef,
                reply,
            } => {
                let current = self.current();
                if current.state == RouterState::AuthenticatedChefIncomplete
                    && current.user_id() == Some(user_id.as_str())
                {
                    let state = if chef.is_profile_complete {
                        RouterState::AuthenticatedChefComplete
                    } else {
                        RouterState::AuthenticatedChefIncomplete
                    };
                    tracing::info!(%user_id, ?state, "chef onboarding saved");
                    self.publish(RouterSnapshot {
                        state,
                        chef_profile: Some(chef),
                        ..current
                    });
                } else {
                    tracing::debug!(%user_id, state = ?current.state, "ignoring onboarding for inactive session");
                }
                let _ = reply.send(self.snapshot.borrow().state);
            }
            Command::ProfileCreated { profile, reply } => {
                self.on_profile_created(profile);
                let _ = reply.send(self.snapshot.borrow().state);
            }
        }
    }

    /// Resolve a just registered identity from the row written for it,
    /// without waiting on (or retrying) the fetch that raced the insert
    fn on_profile_created(&mut self, profile: UserProfile) {
        let current = self.current();
        let waiting = current.state == RouterState::AuthenticatedUnresolved
            && current.user_id() == Some(profile.id.as_str());
        let gave_up = self.rejected.as_deref() == Some(profile.id.as_str());
        if !(waiting || gave_up) {
            tracing::debug!(user_id = %profile.id, state = ?current.state, "profile created for inactive session");
            return;
        }

        let Some(session) = self
            .auth
            .get_session()
            .filter(|s| s.user_id() == profile.id && !s.is_expired())
        else {
            return;
        };

        self.generation += 1;
        self.cancel_fetch();
        self.rejected = None;

        let lookup = ProfileLookup::Found {
            profile: profile.clone(),
            chef: None,
        };
        let state = resolve(Some(&session), &lookup);
        tracing::info!(user_id = %profile.id, role = %profile.user_role, ?state, "registered profile resolved");
        self.publish(RouterSnapshot {
            state,
            session: Some(session),
            profile: Some(profile),
            chef_profile: None,
        });
    }
}

async fn fetch_once(
    store: &dyn ProfileStore,
    session: &Session,
) -> Result<(UserProfile, Option<ChefProfile>), Error> {
    let profile = store
        .fetch_user_profile(session)
        .await?
        .ok_or_else(|| Error::not_found(format!("no users row for {}", session.user_id())))?;

    let chef = if profile.is_chef() {
        store.fetch_chef_profile(session).await?
    } else {
        None
    };

    Ok((profile, chef))
}

async fn lookup_profile(
    store: &dyn ProfileStore,
    session: &Session,
    retries: u32,
    delay: Duration,
) -> Result<(UserProfile, Option<ChefProfile>), Error> {
    let mut attempt = 0;
    loop {
        match fetch_once(store, session).await {
            Ok(found) => return Ok(found),
            Err(e) if attempt < retries && e.is_transient() => {
                attempt += 1;
                tracing::warn!(attempt, error = %e, "profile lookup failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Handle to a running router. Dropping it (or calling
/// [`RouterHandle::shutdown`]) stops the event loop.
pub struct RouterHandle {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn ProfileStore>,
    snapshot: watch::Receiver<RouterSnapshot>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl RouterHandle {
    /// Everything the router currently knows
    pub fn snapshot(&self) -> RouterSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> RouterState {
        self.snapshot.borrow().state
    }

    pub fn session(&self) -> Option<Session> {
        self.snapshot.borrow().session.clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.snapshot.borrow().profile.clone()
    }

    pub fn chef_profile(&self) -> Option<ChefProfile> {
        self.snapshot.borrow().chef_profile.clone()
    }

    /// Receiver notified on every snapshot change
    pub fn changes(&self) -> watch::Receiver<RouterSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until the snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<RouterSnapshot, Error>
    where
        F: FnMut(&RouterSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| Error::general("session router stopped"))?;
        Ok(snapshot.clone())
    }

    /// Resolves once every auth change delivered before the call has been
    /// handled by the event loop
    pub async fn settle(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Settle(tx)).await?;
        rx.await.map_err(|_| Error::general("session router stopped"))
    }

    async fn send(&self, command: Command) -> Result<(), Error> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::general("session router stopped"))
    }

    /// Validate the credentials and sign in; the router follows the
    /// resulting auth change
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        let credentials = LoginCredentials::new(email, password);
        credentials.validate()?;

        self.auth
            .sign_in_with_password(&credentials.email, &credentials.password)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "sign in failed");
                e
            })
    }

    /// Validate the registration form and create the account.
    ///
    /// When the service signs the new account in right away, its `users`
    /// row is written and the router resolves from it. `Ok(None)` means the
    /// account waits for email confirmation.
    pub async fn sign_up(&self, registration: &Registration) -> Result<Option<Session>, Error> {
        registration.validate()?;

        let full_name = registration.full_name.trim();
        let email = registration.email.trim();
        let phone = registration.phone.trim();
        let metadata = SignUpMetadata {
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            user_role: registration.role.as_str().to_string(),
        };

        let session = self
            .auth
            .sign_up(email, &registration.password, &metadata)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "sign up failed");
                e
            })?;

        let Some(session) = session else {
            return Ok(None);
        };

        let row = NewUserProfile {
            id: session.user_id().to_string(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            phone_number: Some(phone.to_string()).filter(|p| !p.is_empty()),
            user_role: registration.role,
        };
        let profile = self
            .store
            .create_user_profile(&session, &row)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %row.id, error = %e, "creating user profile failed");
                e
            })?;

        let (reply, rx) = oneshot::channel();
        self.send(Command::ProfileCreated { profile, reply }).await?;
        rx.await.map_err(|_| Error::general("session router stopped"))?;

        Ok(Some(session))
    }

    /// Ask for another sign-up confirmation email
    pub async fn resend_signup_confirmation(&self, email: &str) -> Result<(), Error> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, email.trim());
        errors.into_result()?;

        self.auth
            .resend_signup_confirmation(email.trim())
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "resending confirmation failed");
                e
            })
    }

    /// Sign out; the router clears its state when the provider reports it
    pub async fn sign_out(&self) -> Result<(), Error> {
        self.auth.sign_out().await.map_err(|e| {
            tracing::error!(error = %e, "sign out failed");
            e
        })
    }

    /// Save a finished chef onboarding and move on to the chef dashboard
    pub async fn submit_onboarding(&self, onboarding: &ChefOnboarding) -> Result<RouterState, Error> {
        let current = self.snapshot();
        if current.state != RouterState::AuthenticatedChefIncomplete {
            return Err(Error::general(
                "onboarding is only open to chefs with an incomplete profile",
            ));
        }
        let session = current.session.ok_or_else(|| Error::auth("Not logged in"))?;

        onboarding.validate()?;

        let chef = self
            .store
            .save_chef_onboarding(&session, onboarding)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %session.user_id(), error = %e, "saving chef profile failed");
                e
            })?;

        let (reply, rx) = oneshot::channel();
        self.send(Command::OnboardingCompleted {
            user_id: session.user_id().to_string(),
            chef,
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::general("session router stopped"))
    }

    /// Unsubscribe and stop the event loop, aborting any in-flight fetch
    pub async fn shutdown(self) {
        let RouterHandle { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "session router task ended abnormally");
        }
    }
}
