//! Navigation side effect, kept apart from state resolution

use std::sync::Arc;

use crate::config::RouteTable;
use crate::router::state::{Route, RouterState};

/// The navigation host
pub trait Navigator: Send + Sync {
    /// Replace the current screen with `path`
    fn replace(&self, path: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn replace(&self, path: &str) {
        self(path)
    }
}

/// Issues at most one redirect per resolved-state entry
pub struct Dispatcher {
    navigator: Arc<dyn Navigator>,
    routes: RouteTable,
    last: Option<Route>,
}

impl Dispatcher {
    pub fn new(navigator: Arc<dyn Navigator>, routes: RouteTable) -> Self {
        Self {
            navigator,
            routes,
            last: None,
        }
    }

    /// The last route navigated to
    pub fn last(&self) -> Option<Route> {
        self.last
    }

    /// Navigate for `state`. Returns the route when a redirect was issued.
    ///
    /// Unresolved states never navigate and do not reset the guard, so a
    /// session that re-resolves to the same place stays put.
    pub fn dispatch(&mut self, state: RouterState) -> Option<Route> {
        let route = state.route()?;
        if self.last == Some(route) {
            tracing::trace!(?route, "already there, skipping redirect");
            return None;
        }

        let path = route.path(&self.routes);
        tracing::info!(?state, path, "redirecting");
        self.navigator.replace(path);
        self.last = Some(route);
        Some(route)
    }
}
