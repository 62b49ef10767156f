//! Post-login destinations.

use crate::session::Role;

/// Sign-in page the browser is sent to when its session has expired.
pub const DEFAULT_SIGN_IN_PATH: &str = "/connexion";

/// Destination per role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routes {
    pub admin: String,
    pub owner: String,
    pub default: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            admin: "/admin".to_string(),
            owner: "/proprietaire".to_string(),
            default: "/".to_string(),
        }
    }
}

/// Pick where to send a freshly reconciled user.
///
/// Admins and owners always land on their dashboards. Everyone else goes to
/// `next` when it is a same-origin path, otherwise to the default page.
#[must_use]
pub fn route(role: Option<Role>, next: Option<&str>, routes: &Routes) -> String {
    match role {
        Some(Role::Admin) => routes.admin.clone(),
        Some(Role::Proprietaire) => routes.owner.clone(),
        _ => next
            .filter(|candidate| is_same_origin_path(candidate))
            .map_or_else(|| routes.default.clone(), str::to_string),
    }
}

/// A path that cannot escape the current origin: it starts with exactly one
/// `/`, is not protocol-relative (`//` or `/\`) and holds no control
/// characters.
#[must_use]
pub fn is_same_origin_path(path: &str) -> bool {
    let mut chars = path.chars();
    if chars.next() != Some('/') {
        return false;
    }
    if matches!(chars.next(), Some('/' | '\\')) {
        return false;
    }
    !path.chars().any(char::is_control)
}
