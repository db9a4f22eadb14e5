//! Router states and the pure session/profile → state resolution

use crate::auth::Session;
use crate::config::RouteTable;
use crate::profile::{ChefProfile, UserProfile, UserRole};

/// Where the session router currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RouterState {
    #[default]
    Unauthenticated,
    /// Session known, profile not fetched yet
    AuthenticatedUnresolved,
    AuthenticatedClient,
    AuthenticatedChefIncomplete,
    AuthenticatedChefComplete,
}

/// Navigation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    ClientDashboard,
    ChefOnboarding,
    ChefDashboard,
}

impl Route {
    /// Path of the route in `routes`
    pub fn path<'a>(&self, routes: &'a RouteTable) -> &'a str {
        match self {
            Route::Login => &routes.login,
            Route::ClientDashboard => &routes.client_dashboard,
            Route::ChefOnboarding => &routes.chef_onboarding,
            Route::ChefDashboard => &routes.chef_dashboard,
        }
    }
}

impl RouterState {
    /// The redirect issued on entering this state; `None` while unresolved
    pub fn route(&self) -> Option<Route> {
        match self {
            RouterState::Unauthenticated => Some(Route::Login),
            RouterState::AuthenticatedUnresolved => None,
            RouterState::AuthenticatedClient => Some(Route::ClientDashboard),
            RouterState::AuthenticatedChefIncomplete => Some(Route::ChefOnboarding),
            RouterState::AuthenticatedChefComplete => Some(Route::ChefDashboard),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, RouterState::Unauthenticated)
    }

    /// Whether a redirect belongs to this state
    pub fn is_resolved(&self) -> bool {
        self.route().is_some()
    }
}

/// Progress of the profile lookup for the current session
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    /// Not fetched yet, or in flight
    Pending,
    /// The lookup failed; the user has to sign in again
    Failed,
    Found {
        profile: UserProfile,
        /// `None` for clients, and for chefs whose row does not exist yet
        chef: Option<ChefProfile>,
    },
}

/// Map a session and its profile lookup to a router state.
///
/// A chef without a `chefs` row is sent to onboarding: right after sign-up
/// the row legitimately does not exist yet.
pub fn resolve(session: Option<&Session>, lookup: &ProfileLookup) -> RouterState {
    let Some(session) = session else {
        return RouterState::Unauthenticated;
    };
    if session.is_expired() {
        return RouterState::Unauthenticated;
    }

    match lookup {
        ProfileLookup::Pending => RouterState::AuthenticatedUnresolved,
        ProfileLookup::Failed => RouterState::Unauthenticated,
        ProfileLookup::Found { profile, chef } => match profile.user_role {
            UserRole::Client => RouterState::AuthenticatedClient,
            UserRole::Chef => match chef {
                Some(chef) if chef.is_profile_complete => RouterState::AuthenticatedChefComplete,
                _ => RouterState::AuthenticatedChefIncomplete,
            },
        },
    }
}

/// Everything the router knows, published after every change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouterSnapshot {
    pub state: RouterState,
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
    pub chef_profile: Option<ChefProfile>,
}

impl RouterSnapshot {
    /// Identity of the session, if any
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id())
    }
}
