//! The persisted identity record and its consistency rule.

/// In-memory view of the three persisted identity fields.
///
/// `Default` is the fresh (never-registered) state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRecord {
    pub email: Option<String>,
    pub identifier: Option<String>,
    pub is_authenticated: bool,
}

impl IdentityRecord {
    /// Consistency rule over the three fields. Pure and total.
    ///
    /// Valid shapes:
    /// - authenticated with both identity fields present
    /// - pending: both identity fields present, flag false
    /// - fresh: everything absent
    ///
    /// Exactly one identity field present — or an authenticated flag with
    /// a missing field — is corruption and must trigger a full erase.
    pub fn is_valid(&self) -> bool {
        if self.is_authenticated {
            return self.email.is_some() && self.identifier.is_some();
        }
        if self.email.is_some() && self.identifier.is_some() {
            return true;
        }
        self.email.is_none() && self.identifier.is_none()
    }

    /// Registered but not yet verified.
    pub fn is_pending(&self) -> bool {
        !self.is_authenticated && self.email.is_some() && self.identifier.is_some()
    }

    /// Never registered (or wiped).
    pub fn is_fresh(&self) -> bool {
        self.email.is_none() && self.identifier.is_none() && !self.is_authenticated
    }
}
