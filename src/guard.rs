//! Navigation guard: leaves blocked video routes for the homepage.

use std::rc::Rc;

use tracing::{info, warn};
use url::Url;

use crate::dom::Navigator;
use crate::rules::RuleTable;

/// Redirect target shared by the guard and the click interceptor.
pub struct Redirect<N: Navigator> {
    navigator: Rc<N>,
    target: Url,
}

impl<N: Navigator> Redirect<N> {
    pub fn new(navigator: Rc<N>, target: Url) -> Self {
        Self { navigator, target }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// `location.replace(target)`: no history entry.
    pub fn redirect(&self) {
        self.navigator.replace(self.target.as_str());
    }
}

#[derive(Debug, Clone)]
pub struct NavigationGuard {
    blocked_paths: Vec<String>,
}

impl NavigationGuard {
    pub fn new(rules: &RuleTable) -> Self {
        Self {
            blocked_paths: rules.blocked_paths.clone(),
        }
    }

    /// Substring containment, not prefix: `/groups/1/videos/` is blocked too.
    pub fn is_blocked_path(&self, path: &str) -> bool {
        self.blocked_paths.iter().any(|p| path.contains(p.as_str()))
    }

    /// Redirects if the current location is a blocked route.
    /// Returns whether a redirect was issued.
    pub fn check_and_redirect<N: Navigator>(&self, redirect: &Redirect<N>) -> bool {
        let href = redirect.navigator().href();
        let url = match Url::parse(&href) {
            Ok(url) => url,
            Err(e) => {
                warn!(href = %href, error = %e, "Unparseable location, guard skipped");
                return false;
            }
        };

        let path = url.path();
        if !self.is_blocked_path(path) {
            return false;
        }

        info!("Blocked {path} -> redirecting to homepage");
        redirect.redirect();
        true
    }
}
