//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers and the gate middleware via the
//! `State` extractor. It holds the session resolver (and through it the auth
//! provider) plus the static route table. Nothing in it is mutated after
//! startup; every request works from its own session snapshot.

use std::sync::Arc;

use crate::gate::RouteTable;
use crate::provider::AuthProvider;
use crate::session::SessionResolver;

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub resolver: SessionResolver,
    pub routes: Arc<RouteTable>,
    /// Whether session cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
}

impl AppState {
    #[must_use]
    pub fn new(resolver: SessionResolver, routes: RouteTable, cookie_secure: bool) -> Self {
        Self { resolver, routes: Arc::new(routes), cookie_secure }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        self.resolver.provider()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
