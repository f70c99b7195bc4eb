//! 会话轮换
//!
//! 受信任的 token 以缓存中的值为准：签名有效但与缓存不一致的 token 一律拒绝。
//! 刷新没有使用 compare-and-swap，两个并发刷新都通过校验时后写入者生效，
//! 先返回的那一对随即失效。

use std::time::Duration;

use quizzler_cache_core::{SessionTokenCache, TokenPair};
use quizzler_common::UserId;
use quizzler_errors::{AppError, AppResult};
use tracing::{info, warn};

use crate::{Claims, TokenService};

/// 登录、刷新、鉴权与登出
#[derive(Clone)]
pub struct SessionRotation {
    tokens: TokenService,
    sessions: SessionTokenCache,
}

impl SessionRotation {
    pub fn new(tokens: TokenService, sessions: SessionTokenCache) -> Self {
        Self { tokens, sessions }
    }

    /// 由 token 服务的过期设置推导会话缓存的 TTL
    pub fn session_ttls(tokens: &TokenService) -> (Duration, Duration) {
        let secs = |s: i64| Duration::from_secs(u64::try_from(s).unwrap_or(0));
        (
            secs(tokens.access_token_expires_in()),
            secs(tokens.refresh_token_expires_in()),
        )
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn sessions(&self) -> &SessionTokenCache {
        &self.sessions
    }

    /// 签发新的一对 token 并覆盖缓存中的旧会话
    pub async fn sign_in(&self, user_id: &UserId) -> AppResult<TokenPair> {
        let pair = self.issue(user_id)?;
        self.sessions.set_token_pair(user_id, &pair).await?;
        info!(user_id = %user_id, "Session started");
        Ok(pair)
    }

    /// 用 refresh token 换取新的一对
    ///
    /// 与缓存中的 refresh token 不一致时清空整个会话并拒绝。
    pub async fn refresh(&self, presented: &str) -> AppResult<TokenPair> {
        let claims = self.tokens.validate_refresh_token(presented)?;
        let user_id = claims.user_id()?;

        let cached = self.sessions.refresh_token(&user_id).await?;
        if cached != presented {
            warn!(user_id = %user_id, "Refresh token mismatch, clearing session");
            if let Err(e) = self.sessions.clear_user_data(&user_id).await {
                warn!(user_id = %user_id, error = %e, "Failed to clear session");
            }
            return Err(AppError::unauthorized("Refresh token is no longer valid"));
        }

        let pair = self.issue(&user_id)?;
        self.sessions.set_token_pair(&user_id, &pair).await?;
        info!(user_id = %user_id, "Session refreshed");
        Ok(pair)
    }

    /// 校验 access token 并确认它仍是缓存中的那一个
    pub async fn authenticate(&self, access_token: &str) -> AppResult<Claims> {
        let claims = self.tokens.validate_access_token(access_token)?;
        let user_id = claims.user_id()?;

        let cached = self.sessions.access_token(&user_id).await?;
        if cached != access_token {
            return Err(AppError::unauthenticated("Access token has been superseded"));
        }

        Ok(claims)
    }

    pub async fn logout(&self, user_id: &UserId) -> AppResult<()> {
        self.sessions.clear_user_data(user_id).await
    }

    fn issue(&self, user_id: &UserId) -> AppResult<TokenPair> {
        Ok(TokenPair::new(
            self.tokens.generate_access_token(user_id)?,
            self.tokens.generate_refresh_token(user_id)?,
        ))
    }
}
