//! Route gate — maps a session snapshot and a request path to a disposition.
//!
//! DESIGN
//! ======
//! Every page route falls into exactly one `RouteCategory`. The decision is
//! an ordered list of named rules evaluated first-match-wins against a
//! `GateInput` built from `(session present, onboarding completed, category)`.
//! The last rule always applies, so the table is total.
//!
//! Evaluation is pure: no I/O, no shared state. The session snapshot is
//! resolved beforehand by `crate::session::SessionResolver`.

use std::collections::BTreeSet;

use crate::session::Session;

pub const LOGIN_PATH: &str = "/login";
pub const ONBOARDING_PATH: &str = "/onboarding";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Paths reachable without a session.
pub const DEFAULT_PUBLIC_PATHS: [&str; 3] = ["/", LOGIN_PATH, "/signup"];

// =============================================================================
// ROUTE CLASSIFICATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteCategory {
    /// No authentication required.
    Public,
    /// The onboarding wizard itself.
    Onboarding,
    /// Everything else.
    Protected,
}

/// Static path classification. Public paths and the onboarding path are
/// matched as exact strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    public: BTreeSet<String>,
    onboarding: String,
}

impl RouteTable {
    #[must_use]
    pub fn new<I, S>(public: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { public: public.into_iter().map(Into::into).collect(), onboarding: ONBOARDING_PATH.to_owned() }
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> RouteCategory {
        if self.public.contains(path) {
            RouteCategory::Public
        } else if path == self.onboarding {
            RouteCategory::Onboarding
        } else {
            RouteCategory::Protected
        }
    }

    /// Classify `path` and evaluate the rule table for `session`.
    #[must_use]
    pub fn decide(&self, path: &str, session: Option<&Session>) -> Decision {
        evaluate(&GateInput::new(session, self.classify(path)))
    }

    pub fn public_paths(&self) -> impl Iterator<Item = &str> {
        self.public.iter().map(String::as_str)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATHS)
    }
}

// =============================================================================
// DISPOSITION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Login,
    Onboarding,
    Dashboard,
}

impl RedirectTarget {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => LOGIN_PATH,
            Self::Onboarding => ONBOARDING_PATH,
            Self::Dashboard => DASHBOARD_PATH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Pass the request through unmodified.
    Allow,
    Redirect(RedirectTarget),
}

// =============================================================================
// RULE TABLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateInput {
    pub session_present: bool,
    pub onboarding_completed: bool,
    pub category: RouteCategory,
}

impl GateInput {
    /// An absent or anonymous session never counts as onboarded.
    #[must_use]
    pub fn new(session: Option<&Session>, category: RouteCategory) -> Self {
        let session = session.filter(|s| s.is_authenticated());
        Self {
            session_present: session.is_some(),
            onboarding_completed: session.is_some_and(|s| s.onboarding_completed),
            category,
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&GateInput) -> bool,
    pub outcome: Disposition,
}

/// Evaluated top to bottom; first match wins.
pub const RULES: [Rule; 5] = [
    Rule {
        name: "public_route",
        applies: |input| input.category == RouteCategory::Public,
        outcome: Disposition::Allow,
    },
    Rule {
        name: "no_session",
        applies: |input| !input.session_present,
        outcome: Disposition::Redirect(RedirectTarget::Login),
    },
    Rule {
        name: "onboarding_pending",
        applies: |input| !input.onboarding_completed && input.category != RouteCategory::Onboarding,
        outcome: Disposition::Redirect(RedirectTarget::Onboarding),
    },
    Rule {
        name: "onboarding_done",
        applies: |input| input.onboarding_completed && input.category == RouteCategory::Onboarding,
        outcome: Disposition::Redirect(RedirectTarget::Dashboard),
    },
    Rule { name: "otherwise", applies: |_| true, outcome: Disposition::Allow },
];

/// Outcome of a gate evaluation, tagged with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub rule: &'static str,
    pub disposition: Disposition,
}

#[must_use]
pub fn evaluate(input: &GateInput) -> Decision {
    RULES
        .iter()
        .find(|rule| (rule.applies)(input))
        .map_or(Decision { rule: "otherwise", disposition: Disposition::Allow }, |rule| Decision {
            rule: rule.name,
            disposition: rule.outcome,
        })
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
