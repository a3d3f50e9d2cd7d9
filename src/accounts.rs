//! Account lifecycle: registration, login, profile lookup, the admin user list and
//! the startup admin bootstrap.

use chrono::Utc;

use crate::{
    auth::{self, AuthUser},
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        ListUsersQuery, LoginRequest, LoginResponse, NewUser, RegisterUserRequest, Role,
        UserResponse,
    },
    password,
    policy::{self, Capability},
    repository::Repository,
    validation,
};

/// register
///
/// Creates a user with an Argon2id password hash. Admin accounts can only be
/// self-registered when `allow_admin_registration` is on.
pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    request: RegisterUserRequest,
) -> AppResult<UserResponse> {
    let role = request.user_type.parse::<Role>()?;
    validation::username(&request.username)?;
    validation::password(&request.password)?;
    validation::required("full_name", &request.full_name, 100)?;
    validation::optional("phone_number", request.phone_number.as_deref(), 20)?;

    if role == Role::Admin && !config.allow_admin_registration {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    // Fast path; the unique constraint still decides under concurrent registration.
    if repo.find_user_by_username(&request.username).await?.is_some() {
        return Err(AppError::Validation("Username already exists".to_string()));
    }

    let user = repo
        .create_user(NewUser {
            username: request.username,
            password_hash: password::hash_password(&request.password)?,
            full_name: request.full_name,
            role,
            phone_number: request.phone_number.filter(|p| !p.trim().is_empty()),
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, role = user.role.as_str(), "user registered");
    Ok(UserResponse::from(user))
}

/// login
///
/// Unknown usernames and wrong passwords fail identically.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    request: LoginRequest,
) -> AppResult<LoginResponse> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let Some(user) = repo.find_user_by_username(&request.username).await? else {
        tracing::warn!(username = %request.username, "login for unknown user");
        return Err(invalid());
    };
    if !password::verify_password(&request.password, &user.password_hash)? {
        tracing::warn!(user_id = user.id, "login with wrong password");
        return Err(invalid());
    }

    let user = repo
        .record_login(user.id, Utc::now())
        .await?
        .ok_or_else(invalid)?;
    let access_token = auth::issue_token(&user, config)?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: config.token_ttl_hours * 3600,
        user: UserResponse::from(user),
    })
}

pub async fn me(repo: &dyn Repository, actor: &AuthUser) -> AppResult<UserResponse> {
    repo.get_user(actor.id)
        .await?
        .map(UserResponse::from)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn list_users(
    repo: &dyn Repository,
    actor: &AuthUser,
    query: ListUsersQuery,
) -> AppResult<Vec<UserResponse>> {
    policy::authorize(actor, Capability::ListUsers)?;
    let page = validation::page(query.skip, query.limit)?;
    let users = repo.list_users(page).await?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

/// ensure_default_admin
///
/// Creates the configured bootstrap admin if no user with that username exists.
/// Returns whether an account was created.
pub async fn ensure_default_admin(repo: &dyn Repository, config: &AppConfig) -> AppResult<bool> {
    let Some(seed) = &config.default_admin else {
        return Ok(false);
    };
    if repo.find_user_by_username(&seed.username).await?.is_some() {
        tracing::debug!(username = %seed.username, "default admin already present");
        return Ok(false);
    }

    let user = repo
        .create_user(NewUser {
            username: seed.username.clone(),
            password_hash: password::hash_password(&seed.password)?,
            full_name: seed.full_name.clone(),
            role: Role::Admin,
            phone_number: None,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "default admin created");
    Ok(true)
}
