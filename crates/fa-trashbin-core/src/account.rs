//! Account identity and role derivation.
//!
//! Storage ids have the form `<backend>::<uid>`. A uid carrying the
//! functional-account prefix belongs to a non-human account that owns a
//! folder shared downstream to a project owner.

pub const FUNCTIONAL_ACCOUNT_PREFIX: &str = "f_";

const STORAGE_ID_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountType {
    Functional,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub uid: String,
    pub account_type: AccountType,
}

impl AccountIdentity {
    pub fn is_functional(&self) -> bool {
        self.account_type == AccountType::Functional
    }
}

/// The part an account plays in one propagated trash event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    FunctionalAccount,
    Owner,
    User,
}

pub fn is_functional(uid: &str) -> bool {
    uid.starts_with(FUNCTIONAL_ACCOUNT_PREFIX)
}

pub fn account_type(uid: &str) -> AccountType {
    if is_functional(uid) {
        AccountType::Functional
    } else {
        AccountType::User
    }
}

/// Derive the owning account from a storage id. Returns `None` for anything
/// that does not split into exactly two `::` separated segments.
pub fn resolve(storage_id: &str) -> Option<AccountIdentity> {
    let fragments: Vec<&str> = storage_id.split(STORAGE_ID_SEPARATOR).collect();
    if fragments.len() != 2 || fragments[1].is_empty() {
        return None;
    }
    let uid = fragments[1];
    Some(AccountIdentity {
        uid: uid.to_string(),
        account_type: account_type(uid),
    })
}

pub fn storage_id(backend: &str, uid: &str) -> String {
    format!("{}{}{}", backend, STORAGE_ID_SEPARATOR, uid)
}

/// Classify the owner of a trash record. The functional account is
/// recognised by prefix; of the remaining accounts the one that deleted the
/// node is the user, anyone else is the project owner.
pub fn classify(account_uid: &str, deleted_by: &str) -> Role {
    if is_functional(account_uid) {
        Role::FunctionalAccount
    } else if account_uid != deleted_by {
        Role::Owner
    } else {
        Role::User
    }
}
