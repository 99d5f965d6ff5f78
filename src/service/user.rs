use tracing::info;

use crate::auth::{self, TokenType};
use crate::error::ApiError;
use crate::models::*;
use crate::repo::RepoError;
use crate::routes::AppState;

pub async fn signup(state: &AppState, creds: Credentials) -> Result<SignupResponse, ApiError> {
    creds.validate()?;
    let password_hash = auth::hash_password(&creds.password)?;
    let user = state
        .repo
        .create_user(NewUser { username: creds.username, password_hash, role: Role::Normal })
        .await
        .map_err(|e| match e {
            RepoError::Conflict => ApiError::Conflict("username already taken".into()),
            other => other.into(),
        })?;
    info!(user_id = user.id, "user signed up");
    Ok(SignupResponse { user_id: user.id, username: user.username })
}

pub async fn login(state: &AppState, creds: Credentials) -> Result<TokenPair, ApiError> {
    creds.validate()?;
    let rejected = || ApiError::Unauthorized("invalid username or password".into());
    let user = match state.repo.find_user_by_username(&creds.username).await {
        Ok(u) => u,
        Err(RepoError::NotFound) => return Err(rejected()),
        Err(e) => return Err(e.into()),
    };
    if !auth::verify_password(&creds.password, &user.password_hash) {
        return Err(rejected());
    }
    issue_tokens(state, &user).await
}

/// Exchange the stored refresh token for a new pair.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<TokenPair, ApiError> {
    let claims = auth::decode_typed(refresh_token, TokenType::Refresh)?;
    let user_id = claims.user_id()?;
    let user = match state.repo.get_user(user_id).await {
        Ok(u) => u,
        Err(RepoError::NotFound) => return Err(ApiError::Unauthorized("unknown user".into())),
        Err(e) => return Err(e.into()),
    };
    if user.refresh_token.as_deref() != Some(refresh_token) {
        return Err(ApiError::Unauthorized("refresh token revoked".into()));
    }
    issue_tokens(state, &user).await
}

async fn issue_tokens(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let access_token = auth::create_access_token(user)?;
    let refresh_token = auth::create_refresh_token(user)?;
    state.repo.set_refresh_token(user.id, Some(&refresh_token)).await?;
    Ok(TokenPair { access_token, refresh_token })
}
