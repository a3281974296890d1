//! Route guards: decide whether a view may load before it calls the backend.

use crate::models::{Membership, User, UserRole};

/// What a view needs before it may fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    /// Global role at least this high (`Student < Officer < Adviser < Admin`).
    Role(UserRole),
    /// The user's own approved officer or adviser row for the club, or an admin.
    ClubManager(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Send the user to the login page.
    Unauthenticated,
    /// Render the unauthorized page.
    Forbidden,
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted)
    }
}

/// Evaluate `requirement` for the current session.
///
/// `user` is `None` while the profile has not been loaded yet; only
/// `Authenticated` can be granted without it.
pub fn check(
    has_credential: bool,
    user: Option<&User>,
    memberships: &[Membership],
    requirement: Requirement,
) -> Access {
    if !has_credential {
        return Access::Unauthenticated;
    }

    match requirement {
        Requirement::Authenticated => Access::Granted,
        Requirement::Role(min) => match user {
            Some(user) if user.role >= min => Access::Granted,
            _ => Access::Forbidden,
        },
        Requirement::ClubManager(club_id) => match user {
            Some(user) if user.is_admin() => Access::Granted,
            Some(user)
                if memberships
                    .iter()
                    .any(|m| m.club_id == club_id && m.user_id == user.id && m.can_manage()) =>
            {
                Access::Granted
            }
            _ => Access::Forbidden,
        },
    }
}
