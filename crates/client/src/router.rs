//! Role router.
//!
//! A pure decision function from `(path, signed-in role)` to either the view
//! to render or where to redirect. Navigation mechanics are left to the
//! front end; only the guard rules live here.

use mediplus_core::Role;

use crate::session::SessionContext;

/// Every view the client knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    Profile,
    Doctor,
    Patient,
    Pharmacist,
    Admin,
}

impl Route {
    pub const ALL: [Self; 8] = [
        Self::Home,
        Self::Login,
        Self::Register,
        Self::Profile,
        Self::Doctor,
        Self::Patient,
        Self::Pharmacist,
        Self::Admin,
    ];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Profile => "/profile",
            Self::Doctor => "/doctor",
            Self::Patient => "/patient",
            Self::Pharmacist => "/pharmacist",
            Self::Admin => "/admin",
        }
    }

    /// Match a path, ignoring a query string, fragment and trailing slash.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        let trimmed = path.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Self::ALL.into_iter().find(|r| r.path() == normalized)
    }

    /// Reachable without signing in.
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Home | Self::Login | Self::Register)
    }

    /// The only role allowed on this route, for role workspaces.
    #[must_use]
    pub const fn required_role(self) -> Option<Role> {
        match self {
            Self::Doctor => Some(Role::Doctor),
            Self::Patient => Some(Role::Patient),
            Self::Pharmacist => Some(Role::Pharmacist),
            Self::Admin => Some(Role::Admin),
            Self::Home | Self::Login | Self::Register | Self::Profile => None,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render(Route),
    Redirect(Route),
}

impl RouteDecision {
    /// The view that ends up on screen.
    #[must_use]
    pub const fn target(self) -> Route {
        match self {
            Self::Render(route) | Self::Redirect(route) => route,
        }
    }
}

/// The single landing workspace for `role`.
#[must_use]
pub const fn landing_for(role: Role) -> Route {
    match role {
        Role::Doctor => Route::Doctor,
        Role::Patient => Route::Patient,
        Role::Pharmacist => Route::Pharmacist,
        Role::Admin => Route::Admin,
    }
}

/// Decide what to show for `path` given the signed-in role (if any).
#[must_use]
pub fn resolve(path: &str, role: Option<Role>) -> RouteDecision {
    let Some(route) = Route::from_path(path) else {
        return RouteDecision::Redirect(Route::Home);
    };

    if route.is_public() {
        return RouteDecision::Render(route);
    }

    let Some(role) = role else {
        return RouteDecision::Redirect(Route::Login);
    };

    match route.required_role() {
        Some(required) if required != role => RouteDecision::Redirect(landing_for(role)),
        _ => RouteDecision::Render(route),
    }
}

/// [`resolve`] against the current session.
pub async fn resolve_for(session: &SessionContext, path: &str) -> RouteDecision {
    resolve(path, session.role().await)
}
