#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use cookease::auth::{AuthChange, AuthChangeEvent, AuthProvider, Session, SignUpMetadata, User};
use cookease::config::RouterOptions;
use cookease::error::Error;
use cookease::onboarding::{ChefOnboarding, PayoutMethod};
use cookease::profile::{ChefProfile, NewUserProfile, ProfileStore, UserProfile, UserRole};
use cookease::router::{Navigator, RouterHandle, SessionRouter};

pub fn session(user_id: &str) -> Session {
    session_with_token(user_id, &format!("token-{}", user_id))
}

pub fn session_with_token(user_id: &str, token: &str) -> Session {
    let user = User {
        id: user_id.to_string(),
        email: Some(format!("{}@example.com", user_id.to_lowercase())),
        ..Default::default()
    };
    Session::new(token.to_string(), format!("refresh-{}", user_id), user, 3600)
}

pub fn user_profile(id: &str, role: UserRole) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        full_name: format!("User {}", id),
        email: format!("{}@example.com", id.to_lowercase()),
        phone_number: None,
        user_role: role,
        created_at: Utc::now(),
    }
}

pub fn chef_profile(id: &str, complete: bool) -> ChefProfile {
    ChefProfile {
        id: id.to_string(),
        bio: String::new(),
        specialties: Vec::new(),
        experience: String::new(),
        hourly_rate: 0.0,
        location: String::new(),
        profile_video: None,
        is_profile_complete: complete,
    }
}

pub fn onboarding_form() -> ChefOnboarding {
    let mut availability = BTreeMap::new();
    availability.insert("friday".to_string(), vec!["17:00-22:00".to_string()]);

    ChefOnboarding {
        full_name: "Marta Home".to_string(),
        phone_number: "5550001111".to_string(),
        location: "Porto".to_string(),
        specialties: vec!["Mediterranean".to_string()],
        experience: "5-10 years".to_string(),
        bio: "Slow-cooked stews and fresh bread.".to_string(),
        dish_images: vec!["https://cdn.example.com/stew.jpg".to_string()],
        availability,
        hourly_rate: 60.0,
        service_types: vec!["Meal Prep".to_string()],
        service_radius: "20 km".to_string(),
        payout_method: Some(PayoutMethod::Bank),
        government_id: "id-42".to_string(),
        terms_accepted: true,
        ..Default::default()
    }
}

/// Records every path the router navigates to
#[derive(Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.paths().iter().filter(|p| p.as_str() == path).count()
    }

    pub fn last(&self) -> Option<String> {
        self.paths().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
}

/// In-memory auth provider; tests drive it with `emit`
pub struct FakeAuth {
    session: Mutex<Option<Session>>,
    changes: broadcast::Sender<AuthChange>,
    accounts: Mutex<HashMap<String, (String, String)>>,
    sign_in_calls: AtomicUsize,
    sign_ups: Mutex<Vec<(String, String)>>,
    /// Identity that sign-up signs in right away, skipping email confirmation
    sign_up_user: Mutex<Option<String>>,
    resends: Mutex<Vec<String>>,
    fail_sign_out: AtomicBool,
}

impl FakeAuth {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(64);
        Arc::new(Self {
            session: Mutex::new(None),
            changes,
            accounts: Mutex::new(HashMap::new()),
            sign_in_calls: AtomicUsize::new(0),
            sign_ups: Mutex::new(Vec::new()),
            sign_up_user: Mutex::new(None),
            resends: Mutex::new(Vec::new()),
            fail_sign_out: AtomicBool::new(false),
        })
    }

    /// Provider that restored a persisted session before the router starts
    pub fn with_session(session: Session) -> Arc<Self> {
        let auth = Self::new();
        *auth.session.lock().unwrap() = Some(session);
        auth
    }

    pub fn add_account(&self, email: &str, password: &str, user_id: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user_id.to_string()));
    }

    pub fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        *self.session.lock().unwrap() = session.clone();
        let _ = self.changes.send(AuthChange::new(event, session));
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub fn sign_ups(&self) -> Vec<(String, String)> {
        self.sign_ups.lock().unwrap().clone()
    }

    pub fn sign_up_signs_in_as(&self, user_id: &str) {
        *self.sign_up_user.lock().unwrap() = Some(user_id.to_string());
    }

    pub fn resends(&self) -> Vec<String> {
        self.resends.lock().unwrap().clone()
    }

    pub fn fail_next_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    fn get_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let account = self.accounts.lock().unwrap().get(email).cloned();
        match account {
            Some((expected, user_id)) if expected == password => {
                let session = session(&user_id);
                self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
                Ok(session)
            }
            _ => Err(Error::auth("Invalid login credentials")),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Option<Session>, Error> {
        self.sign_ups
            .lock()
            .unwrap()
            .push((email.to_string(), metadata.user_role.clone()));

        let user_id = self.sign_up_user.lock().unwrap().clone();
        match user_id {
            Some(user_id) => {
                let session = session(&user_id);
                self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn resend_signup_confirmation(&self, email: &str) -> Result<(), Error> {
        self.resends.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), Error> {
        if self.fail_sign_out.swap(false, Ordering::SeqCst) {
            return Err(Error::Status {
                status: 500,
                body: "logout failed".to_string(),
            });
        }
        if self.get_session().is_none() {
            return Err(Error::auth("Not logged in"));
        }
        self.emit(AuthChangeEvent::SignedOut, None);
        Ok(())
    }
}

/// In-memory profile tables with failure injection
#[derive(Default)]
pub struct FakeStore {
    users: Mutex<HashMap<String, UserProfile>>,
    chefs: Mutex<HashMap<String, ChefProfile>>,
    /// Remaining lookups that answer "row missing" before the row shows up
    missing: Mutex<HashMap<String, usize>>,
    /// Users whose lookups fail with a 503
    unavailable: Mutex<Vec<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, profile: UserProfile) {
        self.users.lock().unwrap().insert(profile.id.clone(), profile);
    }

    pub fn add_chef(&self, chef: ChefProfile) {
        self.chefs.lock().unwrap().insert(chef.id.clone(), chef);
    }

    pub fn missing_for(&self, user_id: &str, lookups: usize) {
        self.missing.lock().unwrap().insert(user_id.to_string(), lookups);
    }

    pub fn unavailable_for(&self, user_id: &str) {
        self.unavailable.lock().unwrap().push(user_id.to_string());
    }

    pub fn delay(&self, user_id: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(user_id.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ProfileStore for FakeStore {
    async fn fetch_user_profile(&self, session: &Session) -> Result<Option<UserProfile>, Error> {
        let id = session.user_id().to_string();
        self.record(format!("users:{}", id));

        let delay = self.delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.lock().unwrap().contains(&id) {
            return Err(Error::Status {
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }

        {
            let mut missing = self.missing.lock().unwrap();
            if let Some(remaining) = missing.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(None);
                }
            }
        }

        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn create_user_profile(
        &self,
        session: &Session,
        profile: &NewUserProfile,
    ) -> Result<UserProfile, Error> {
        self.record(format!("create:{}", session.user_id()));

        let row = UserProfile {
            id: profile.id.clone(),
            full_name: profile.full_name.clone(),
            email: profile.email.clone(),
            phone_number: profile.phone_number.clone(),
            user_role: profile.user_role,
            created_at: Utc::now(),
        };
        self.add_user(row.clone());
        Ok(row)
    }

    async fn fetch_chef_profile(&self, session: &Session) -> Result<Option<ChefProfile>, Error> {
        let id = session.user_id().to_string();
        self.record(format!("chefs:{}", id));
        Ok(self.chefs.lock().unwrap().get(&id).cloned())
    }

    async fn save_chef_onboarding(
        &self,
        session: &Session,
        onboarding: &ChefOnboarding,
    ) -> Result<ChefProfile, Error> {
        let id = session.user_id().to_string();
        self.record(format!("save:{}", id));

        let chef = ChefProfile {
            id: id.clone(),
            bio: onboarding.bio.clone(),
            specialties: onboarding.specialties.clone(),
            experience: onboarding.experience.clone(),
            hourly_rate: onboarding.hourly_rate,
            location: onboarding.location.clone(),
            profile_video: onboarding.profile_video.clone(),
            is_profile_complete: true,
        };
        self.add_chef(chef.clone());
        Ok(chef)
    }
}

/// Fast retries so failure paths finish quickly
pub fn test_options() -> RouterOptions {
    RouterOptions::default()
        .with_fetch_retries(1)
        .with_retry_delay(Duration::from_millis(10))
}

pub fn start_router(
    auth: &Arc<FakeAuth>,
    store: &Arc<FakeStore>,
    navigator: &Arc<RecordingNavigator>,
) -> RouterHandle {
    SessionRouter::new(auth.clone(), store.clone(), navigator.clone(), test_options()).start()
}
