//! User accounts: signup, credential checks, profile and password changes.

pub mod sessions;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::crypto::{hash_password, verify_password};
use crate::db::repository;
use crate::models::enums::Role;
use crate::models::User;
use crate::workflow::intake::is_plausible_email;
use crate::workflow::{Actor, WorkflowError};

pub use sessions::SessionRegistry;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: Role,
    pub district_id: Option<Uuid>,
}

/// Profile changes. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub district_id: Option<Uuid>,
}

impl Actor {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            district_id: user.district_id,
        }
    }
}

fn check_password(password: &str) -> Result<(), WorkflowError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WorkflowError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn check_phone(phone: &Option<String>) -> Result<Option<String>, WorkflowError> {
    match phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) if p.len() == 10 && p.chars().all(|c| c.is_ascii_digit()) => Ok(Some(p.to_string())),
        Some(_) => Err(WorkflowError::validation("Phone must be 10 digits")),
        None => Ok(None),
    }
}

/// District-scoped roles need a district that exists.
fn check_district(conn: &Connection, role: Role, district_id: Option<Uuid>) -> Result<(), WorkflowError> {
    match district_id {
        Some(id) => {
            if repository::get_district(conn, &id)?.is_none() {
                return Err(WorkflowError::validation("Unknown district"));
            }
            Ok(())
        }
        None if matches!(role, Role::Sdm | Role::Dm) => Err(WorkflowError::validation(format!(
            "Role {role} requires a district"
        ))),
        None => Ok(()),
    }
}

pub fn signup(conn: &Connection, request: SignupRequest, now: DateTime<Utc>) -> Result<User, WorkflowError> {
    if request.role == Role::Admin {
        return Err(WorkflowError::forbidden("The ADMIN role cannot be self-assigned"));
    }
    create_user(conn, request, now)
}

/// Insert a user with any role. Callers decide who may create admins.
pub fn create_user(conn: &Connection, request: SignupRequest, now: DateTime<Utc>) -> Result<User, WorkflowError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(WorkflowError::validation("Name is required"));
    }
    let email = request.email.trim();
    if !is_plausible_email(email) {
        return Err(WorkflowError::validation("Email is not valid"));
    }
    check_password(&request.password)?;
    let phone = check_phone(&request.phone)?;
    check_district(conn, request.role, request.district_id)?;

    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        phone,
        role: request.role,
        district_id: request.district_id,
        password_hash: hash_password(&request.password),
        created_at: now,
    };
    repository::insert_user(conn, &user)?;
    tracing::info!(user_id = %user.id, role = %user.role, "Account created");
    Ok(user)
}

/// Check credentials. `None` means unknown email or wrong password.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> Result<Option<User>, WorkflowError> {
    let Some(user) = repository::get_user_by_email(conn, email.trim())? else {
        return Ok(None);
    };
    if verify_password(password, &user.password_hash) {
        Ok(Some(user))
    } else {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        Ok(None)
    }
}

fn require_self_or_admin(id: &Uuid, actor: &Actor) -> Result<(), WorkflowError> {
    if actor.user_id == *id || actor.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::forbidden("You may only access your own account"))
    }
}

pub fn get_profile(conn: &Connection, id: &Uuid, actor: &Actor) -> Result<User, WorkflowError> {
    require_self_or_admin(id, actor)?;
    repository::get_user(conn, id)?.ok_or_else(|| WorkflowError::not_found("User", id))
}

/// Apply a profile update. Only an admin may change role or district.
pub fn update_profile(
    conn: &Connection,
    id: &Uuid,
    update: ProfileUpdate,
    actor: &Actor,
) -> Result<User, WorkflowError> {
    let mut user = get_profile(conn, id, actor)?;

    let changes_scope = update.role.is_some_and(|r| r != user.role)
        || update.district_id.is_some_and(|d| Some(d) != user.district_id);
    if changes_scope && !actor.is_admin() {
        return Err(WorkflowError::forbidden("Only an administrator may change role or district"));
    }

    if let Some(name) = update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::validation("Name is required"));
        }
        user.name = name.to_string();
    }
    if update.phone.is_some() {
        user.phone = check_phone(&update.phone)?;
    }
    if let Some(role) = update.role {
        user.role = role;
    }
    if update.district_id.is_some() {
        user.district_id = update.district_id;
    }
    check_district(conn, user.role, user.district_id)?;

    repository::update_user_profile(conn, &user)?;
    tracing::info!(user_id = %user.id, by = %actor.user_id, "Account updated");
    Ok(user)
}

pub fn change_password(
    conn: &Connection,
    id: &Uuid,
    current: &str,
    new_password: &str,
    actor: &Actor,
) -> Result<(), WorkflowError> {
    if actor.user_id != *id {
        return Err(WorkflowError::forbidden("You may only change your own password"));
    }
    let user = repository::get_user(conn, id)?.ok_or_else(|| WorkflowError::not_found("User", id))?;
    if !verify_password(current, &user.password_hash) {
        return Err(WorkflowError::validation("Current password is incorrect"));
    }
    check_password(new_password)?;
    repository::update_password_hash(conn, id, &hash_password(new_password))?;
    tracing::info!(user_id = %id, "Password changed");
    Ok(())
}

/// Create the bootstrap administrator if no account uses that email yet.
pub fn ensure_admin(conn: &Connection, email: &str, password: &str, now: DateTime<Utc>) -> Result<bool, WorkflowError> {
    if repository::get_user_by_email(conn, email)?.is_some() {
        return Ok(false);
    }
    create_user(
        conn,
        SignupRequest {
            name: "Administrator".into(),
            email: email.into(),
            phone: None,
            password: password.into(),
            role: Role::Admin,
            district_id: None,
        },
        now,
    )?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_support::seed_directory;

    fn request(role: Role, district_id: Option<Uuid>, email: &str) -> SignupRequest {
        SignupRequest {
            name: "Meera Rawat".into(),
            email: email.into(),
            phone: Some("9876543210".into()),
            password: "s3cure-pass".into(),
            role,
            district_id,
        }
    }

    #[test]
    fn signup_then_login() {
        let conn = open_memory_database().unwrap();
        let dir = seed_directory(&conn);
        let user = signup(&conn, request(Role::Sdm, Some(dir.district.id), "sdm@example.org"), Utc::now()).unwrap();
        assert_ne!(user.password_hash, "s3cure-pass");

        let found = authenticate(&conn, "SDM@example.org", "s3cure-pass").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(authenticate(&conn, "sdm@example.org", "wrong-pass").unwrap().is_none());
        assert!(authenticate(&conn, "nobody@example.org", "s3cure-pass").unwrap().is_none());
    }

    #[test]
    fn signup_rules() {
        let conn = open_memory_database().unwrap();
        let dir = seed_directory(&conn);
        let now = Utc::now();

        let admin = signup(&conn, request(Role::Admin, None, "a@example.org"), now).unwrap_err();
        assert!(matches!(admin, WorkflowError::Forbidden(_)));

        let no_district = signup(&conn, request(Role::Dm, None, "dm@example.org"), now).unwrap_err();
        assert!(matches!(no_district, WorkflowError::Validation(_)));

        let bogus_district = signup(&conn, request(Role::Dm, Some(Uuid::new_v4()), "dm@example.org"), now).unwrap_err();
        assert!(matches!(bogus_district, WorkflowError::Validation(_)));

        let mut short = request(Role::Cmo, None, "cmo@example.org");
        short.password = "short".into();
        assert!(matches!(signup(&conn, short, now), Err(WorkflowError::Validation(_))));

        signup(&conn, request(Role::Cmo, Some(dir.district.id), "cmo@example.org"), now).unwrap();
        let dup = signup(&conn, request(Role::Support, None, "CMO@example.org"), now).unwrap_err();
        assert!(matches!(dup, WorkflowError::Conflict(_)));
    }

    #[test]
    fn profile_access_and_scope_changes() {
        let conn = open_memory_database().unwrap();
        let dir = seed_directory(&conn);
        let now = Utc::now();
        let cmo = signup(&conn, request(Role::Cmo, None, "cmo@example.org"), now).unwrap();
        let other = signup(&conn, request(Role::Support, None, "ops@example.org"), now).unwrap();
        ensure_admin(&conn, "admin@example.org", "admin-pass", now).unwrap();
        let admin = repository::get_user_by_email(&conn, "admin@example.org").unwrap().unwrap();

        let me = Actor::from_user(&cmo);
        assert!(get_profile(&conn, &cmo.id, &me).is_ok());
        assert!(matches!(get_profile(&conn, &other.id, &me), Err(WorkflowError::Forbidden(_))));

        let renamed = update_profile(
            &conn,
            &cmo.id,
            ProfileUpdate { name: Some("Dr. Meera".into()), ..Default::default() },
            &me,
        )
        .unwrap();
        assert_eq!(renamed.name, "Dr. Meera");

        let escalate_self = update_profile(
            &conn,
            &cmo.id,
            ProfileUpdate { role: Some(Role::Dm), district_id: Some(dir.district.id), ..Default::default() },
            &me,
        );
        assert!(matches!(escalate_self, Err(WorkflowError::Forbidden(_))));

        let promoted = update_profile(
            &conn,
            &cmo.id,
            ProfileUpdate { role: Some(Role::Dm), district_id: Some(dir.district.id), ..Default::default() },
            &Actor::from_user(&admin),
        )
        .unwrap();
        assert_eq!(promoted.role, Role::Dm);

        let missing = update_profile(
            &conn,
            &other.id,
            ProfileUpdate { role: Some(Role::Sdm), ..Default::default() },
            &Actor::from_user(&admin),
        );
        assert!(matches!(missing, Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn password_change_is_self_only() {
        let conn = open_memory_database().unwrap();
        let now = Utc::now();
        let user = signup(&conn, request(Role::Support, None, "ops@example.org"), now).unwrap();
        let me = Actor::from_user(&user);
        let stranger = Actor { user_id: Uuid::new_v4(), role: Role::Admin, district_id: None };

        assert!(matches!(
            change_password(&conn, &user.id, "s3cure-pass", "new-password", &stranger),
            Err(WorkflowError::Forbidden(_))
        ));
        assert!(matches!(
            change_password(&conn, &user.id, "not-current", "new-password", &me),
            Err(WorkflowError::Validation(_))
        ));
        change_password(&conn, &user.id, "s3cure-pass", "new-password", &me).unwrap();
        assert!(authenticate(&conn, "ops@example.org", "new-password").unwrap().is_some());
        assert!(authenticate(&conn, "ops@example.org", "s3cure-pass").unwrap().is_none());
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let conn = open_memory_database().unwrap();
        assert!(ensure_admin(&conn, "admin@example.org", "admin-pass", Utc::now()).unwrap());
        assert!(!ensure_admin(&conn, "admin@example.org", "admin-pass", Utc::now()).unwrap());
    }
}
