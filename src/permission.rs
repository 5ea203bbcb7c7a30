use serde::{Deserialize, Serialize};

/// Permission level reported by the server for the current note, as part of
/// the snapshot and `refresh`/`permission` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Anyone may edit, authenticated or not.
    Freely,
    /// Any authenticated user may edit.
    Editable,
    /// Any authenticated user may edit; intended for wider but tracked access.
    Limited,
    /// Only the owner may edit; everyone else can read.
    Locked,
    /// Only the owner may even view the note.
    Private,
    /// Only the owner may edit; similar to `Locked` for write purposes.
    Protected,
}

impl Permission {
    /// `true` iff a user holding `self` and the given credentials is allowed
    /// to submit edits.
    ///
    /// `freely` always allows writes. `editable`/`limited` require the
    /// caller to be authenticated. `locked`/`protected`/`private` require
    /// the caller to be the note's owner.
    pub fn can_edit(self, authenticated: bool, is_owner: bool) -> bool {
        match self {
            Permission::Freely => true,
            Permission::Editable | Permission::Limited => authenticated,
            Permission::Locked | Permission::Protected | Permission::Private => is_owner,
        }
    }
}

/// The credentials a `Client` was constructed with, used to evaluate
/// [`Permission::can_edit`] against the currently negotiated permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct Credentials {
    pub authenticated: bool,
    pub is_owner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freely_always_editable() {
        assert!(Permission::Freely.can_edit(false, false));
    }

    #[test]
    fn editable_requires_auth() {
        assert!(!Permission::Editable.can_edit(false, false));
        assert!(Permission::Editable.can_edit(true, false));
    }

    #[test]
    fn locked_requires_owner() {
        assert!(!Permission::Locked.can_edit(true, false));
        assert!(Permission::Locked.can_edit(true, true));
    }

    #[test]
    fn private_requires_owner_even_if_authenticated() {
        assert!(!Permission::Private.can_edit(true, false));
        assert!(Permission::Private.can_edit(false, true));
    }
}
