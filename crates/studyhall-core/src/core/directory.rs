//! Directory service: register users, look up and change roles.
//!
//! The other services call [`require_user`], [`require_role`] and
//! [`require_moderator`] to authorize actions.

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::model::{Role, User};
use crate::store::{self, users, Store};

use super::{CoreError, CoreResult};

const MAX_USERNAME_LEN: usize = 64;

/// Service for user and role operations.
pub struct DirectoryService<'a> {
    store: &'a Store,
}

impl<'a> DirectoryService<'a> {
    pub(crate) const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Register a new user with at least one role.
    ///
    /// The first user registers themselves and must take the admin role.
    /// After that only admins may register users.
    pub fn register(&self, actor: &str, username: &str, roles: &[Role]) -> CoreResult<User> {
        validate_username(username)?;
        if roles.is_empty() {
            return Err(CoreError::validation("roles", "at least one role is required"));
        }

        let tx = self.store.begin_immediate().map_err(CoreError::storage)?;
        if users::count_users(&tx).map_err(CoreError::storage)? == 0 {
            if actor != username || !roles.contains(&Role::Admin) {
                return Err(CoreError::validation(
                    "roles",
                    "the first user must register themselves with the admin role",
                ));
            }
        } else {
            require_role(&tx, actor, Role::Admin, "register users")?;
        }
        if users::user_exists(&tx, username).map_err(CoreError::storage)? {
            return Err(CoreError::UserAlreadyExists {
                username: username.to_string(),
            });
        }
        users::insert_user(&tx, username, &store::now()).map_err(CoreError::storage)?;
        for role in roles {
            users::add_role(&tx, username, *role).map_err(CoreError::storage)?;
        }
        let user = require_user(&tx, username)?;
        store::commit(tx).map_err(CoreError::storage)?;

        tracing::info!(actor, username, roles = ?user.roles, "registered user");
        Ok(user)
    }

    /// Get a user.
    ///
    /// Returns `Err(CoreError::UserNotFound)` if the user does not exist.
    pub fn get(&self, username: &str) -> CoreResult<User> {
        require_user(self.store.conn(), username)
    }

    /// Get a user, returning `None` if not found.
    pub fn get_optional(&self, username: &str) -> CoreResult<Option<User>> {
        users::get_user(self.store.conn(), username).map_err(CoreError::storage)
    }

    /// The set of roles a user holds.
    pub fn roles(&self, username: &str) -> CoreResult<BTreeSet<Role>> {
        Ok(self.get(username)?.roles.into_iter().collect())
    }

    pub fn has_role(&self, username: &str, role: Role) -> CoreResult<bool> {
        Ok(self.get(username)?.has_role(role))
    }

    /// Grant a role. Returns false if the user already had it.
    pub fn grant(&self, actor: &str, username: &str, role: Role) -> CoreResult<bool> {
        let conn = self.store.conn();
        require_role(conn, actor, Role::Admin, "change roles")?;
        require_user(conn, username)?;
        let added = users::add_role(conn, username, role).map_err(CoreError::storage)?;
        if added {
            tracing::info!(actor, username, %role, "granted role");
        }
        Ok(added)
    }

    /// Revoke a role. A user must keep at least one role.
    pub fn revoke(&self, actor: &str, username: &str, role: Role) -> CoreResult<bool> {
        let conn = self.store.conn();
        require_role(conn, actor, Role::Admin, "change roles")?;
        let user = require_user(conn, username)?;
        if !user.has_role(role) {
            return Ok(false);
        }
        if user.roles.len() == 1 {
            return Err(CoreError::validation(
                "roles",
                format!("cannot revoke {role}: {username} would have no roles left"),
            ));
        }
        let removed = users::remove_role(conn, username, role).map_err(CoreError::storage)?;
        tracing::info!(actor, username, %role, "revoked role");
        Ok(removed)
    }

    /// List users, optionally only those holding `role`.
    pub fn list(&self, role: Option<Role>) -> CoreResult<Vec<User>> {
        users::list_users(self.store.conn(), role).map_err(CoreError::storage)
    }
}

fn validate_username(username: &str) -> CoreResult<()> {
    if username.is_empty() {
        return Err(CoreError::validation("username", "must not be empty"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(CoreError::validation(
            "username",
            format!("must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(CoreError::validation(
            "username",
            format!("contains invalid character '{bad}'"),
        ));
    }
    Ok(())
}

/// Load a user or fail with `UserNotFound`.
pub(crate) fn require_user(conn: &Connection, username: &str) -> CoreResult<User> {
    users::get_user(conn, username)
        .map_err(CoreError::storage)?
        .ok_or_else(|| CoreError::UserNotFound {
            username: username.to_string(),
        })
}

/// Load a user and check they hold `role`.
pub(crate) fn require_role(
    conn: &Connection,
    username: &str,
    role: Role,
    action: &'static str,
) -> CoreResult<User> {
    let user = require_user(conn, username)?;
    if !user.has_role(role) {
        return Err(CoreError::MissingRole {
            username: username.to_string(),
            required: role,
            action,
        });
    }
    Ok(user)
}

/// Load a user and check they may moderate (staff, instructor, or admin).
pub(crate) fn require_moderator(
    conn: &Connection,
    username: &str,
    action: &'static str,
) -> CoreResult<User> {
    let user = require_user(conn, username)?;
    if !user.roles.iter().any(|r| r.can_moderate()) {
        return Err(CoreError::MissingRole {
            username: username.to_string(),
            required: Role::Staff,
            action,
        });
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, Services};

    /// Services with the bootstrap admin "dean" registered.
    fn services_with_admin() -> Services {
        let services = Services::in_memory().unwrap();
        services.users().register("dean", "dean", &[Role::Admin]).unwrap();
        services
    }

    #[test]
    fn test_register_and_lookup() {
        let services = services_with_admin();
        let users = services.users();

        let user = users
            .register("dean", "alex", &[Role::Reviewer, Role::Student])
            .unwrap();
        assert_eq!(user.roles, vec![Role::Student, Role::Reviewer]);

        let roles = users.roles("alex").unwrap();
        assert!(roles.contains(&Role::Reviewer));
        assert!(users.has_role("alex", Role::Student).unwrap());
        assert!(!users.has_role("alex", Role::Staff).unwrap());
    }

    #[test]
    fn test_register_duplicate() {
        let services = services_with_admin();
        services.users().register("dean", "alex", &[Role::Reviewer]).unwrap();
        let err = services
            .users()
            .register("dean", "alex", &[Role::Student])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_register_validation() {
        let services = Services::in_memory().unwrap();
        let users = services.users();
        assert_eq!(
            users.register("", "", &[Role::Admin]).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            users
                .register("bad name", "bad name", &[Role::Admin])
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            users.register("noroles", "noroles", &[]).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert!(users.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_first_user_must_be_self_registered_admin() {
        let services = Services::in_memory().unwrap();
        let users = services.users();

        // a non-admin first user would leave nobody able to register others
        assert_eq!(
            users.register("maan", "maan", &[Role::Student]).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            users.register("maan", "dean", &[Role::Admin]).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert!(users.list(None).unwrap().is_empty());

        users.register("dean", "dean", &[Role::Admin]).unwrap();
        assert!(users.has_role("dean", Role::Admin).unwrap());
    }

    #[test]
    fn test_only_admins_register_after_bootstrap() {
        let services = services_with_admin();
        let users = services.users();
        users.register("dean", "maan", &[Role::Student]).unwrap();

        let err = users.register("maan", "me", &[Role::Staff]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = users.register("ghost", "me", &[Role::Staff]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(users.get_optional("me").unwrap().is_none());
    }

    #[test]
    fn test_grant_and_revoke() {
        let services = services_with_admin();
        let users = services.users();
        users.register("dean", "sam", &[Role::Student]).unwrap();

        assert!(users.grant("dean", "sam", Role::Staff).unwrap());
        assert!(!users.grant("dean", "sam", Role::Staff).unwrap());
        assert_eq!(users.list(Some(Role::Staff)).unwrap().len(), 1);

        assert!(users.revoke("dean", "sam", Role::Student).unwrap());
        assert!(!users.revoke("dean", "sam", Role::Student).unwrap());
        // last role cannot be revoked
        assert_eq!(
            users.revoke("dean", "sam", Role::Staff).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_role_changes_require_admin() {
        let services = services_with_admin();
        let users = services.users();
        users.register("dean", "maan", &[Role::Student]).unwrap();
        users.register("dean", "sam", &[Role::Staff, Role::Student]).unwrap();

        // nobody promotes themselves
        match users.grant("maan", "maan", Role::Staff) {
            Err(CoreError::MissingRole {
                username, required, ..
            }) => {
                assert_eq!(username, "maan");
                assert_eq!(required, Role::Admin);
            }
            other => panic!("expected MissingRole, got {other:?}"),
        }
        // staff moderate content, not roles
        assert_eq!(
            users.revoke("sam", "maan", Role::Student).unwrap_err().kind(),
            ErrorKind::Forbidden
        );
        assert!(!users.has_role("maan", Role::Staff).unwrap());
    }

    #[test]
    fn test_unknown_user() {
        let services = Services::in_memory().unwrap();
        match services.users().get("nobody") {
            Err(CoreError::UserNotFound { username }) => assert_eq!(username, "nobody"),
            other => panic!("expected UserNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_require_moderator() {
        let services = services_with_admin();
        let users = services.users();
        users.register("dean", "sam", &[Role::Staff]).unwrap();
        users.register("dean", "prof", &[Role::Instructor]).unwrap();
        users.register("dean", "maan", &[Role::Student]).unwrap();

        let conn = services.store().conn();
        assert!(require_moderator(conn, "sam", "resolve flags").is_ok());
        assert!(require_moderator(conn, "prof", "resolve flags").is_ok());
        assert!(require_moderator(conn, "dean", "resolve flags").is_ok());
        assert_eq!(
            require_moderator(conn, "maan", "resolve flags").unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }
}
