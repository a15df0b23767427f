//! External identity signal.
//!
//! The cache never resolves sessions itself; the surrounding application
//! feeds the current signal into
//! [`QueryBinding::observe`](crate::binding::QueryBinding::observe).
//! Cached per-user data is invalidated when the signal moves from one
//! known user to a different one, or when the session is lost.

/// The current state of the authenticated identity, as seen by the
/// session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySignal {
    /// The session is still being resolved; consumers stay pending and
    /// no fetch is issued.
    Resolving,

    /// The session is gone. Cached data for the binding's key is cleared
    /// and all retry state resets.
    SignedOut,

    /// A known authenticated user.
    User(String),
}

impl IdentitySignal {
    /// The user id carried by the signal, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id),
            Self::Resolving | Self::SignedOut => None,
        }
    }
}
