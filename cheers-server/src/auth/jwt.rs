//! JWT 令牌校验
//!
//! 令牌由外部认证服务签发，这里只负责校验并解析出调用者身份。

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 开发环境兜底密钥，生产环境启动时会被拒绝
const DEV_FALLBACK_SECRET: &str = "cheers-dev-secret-do-not-use-in-production";

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// 共享密钥 (至少 32 字节)
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        let secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if secret.len() >= 32 => secret,
            Ok(_) => {
                tracing::warn!("JWT_SECRET shorter than 32 characters, using development key");
                DEV_FALLBACK_SECRET.to_string()
            }
            Err(_) => {
                tracing::warn!("JWT_SECRET not set, using development key");
                DEV_FALLBACK_SECRET.to_string()
            }
        };

        Self {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "cheers-auth".to_string()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "cheers-clients".to_string()),
        }
    }

    pub fn for_tests() -> Self {
        Self {
            secret: "test-secret-for-cheers-server-0123456789".to_string(),
            issuer: "cheers-auth".to_string(),
            audience: "cheers-clients".to_string(),
        }
    }

    /// 是否仍在使用开发兜底密钥
    pub fn uses_fallback_secret(&self) -> bool {
        self.secret == DEV_FALLBACK_SECRET
    }
}

/// 令牌中的 Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID
    pub sub: String,
    #[serde(default)]
    pub username: String,
    /// 角色: "user" | "admin"
    #[serde(default = "default_role")]
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("无效令牌: {0}")]
    InvalidToken(String),

    #[error("令牌已过期")]
    ExpiredToken,

    #[error("无效签名")]
    InvalidSignature,
}

/// JWT 校验服务
#[derive(Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn with_config(config: JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            decoding_key,
        }
    }

    /// 验证并解码令牌
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iss", "aud"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// 从 Authorization 头提取令牌
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

/// 当前调用者 (actor)
///
/// 由认证中间件注入请求扩展
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

impl CurrentUser {
    /// 管理员 (`role == "admin"`) 可绕过库存不足的放置限制
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn sign(config: &JwtConfig, sub: &str, role: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            username: format!("{sub}-name"),
            role: role.to_string(),
            exp: now + exp_offset,
            iat: now,
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_roundtrip() {
        let config = JwtConfig::for_tests();
        let service = JwtService::with_config(config.clone());
        let token = sign(&config, "u1", "admin", 3600);

        let user = CurrentUser::from(service.validate_token(&token).unwrap());
        assert_eq!(user.id, "u1");
        assert!(user.is_admin());
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig::for_tests();
        let service = JwtService::with_config(config.clone());
        let token = sign(&config, "u1", "user", -3600);

        assert!(matches!(
            service.validate_token(&token),
            Err(JwtError::ExpiredToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let config = JwtConfig::for_tests();
        let service = JwtService::with_config(config.clone());
        let other = JwtConfig {
            secret: "another-secret-another-secret-another".to_string(),
            ..config
        };
        let token = sign(&other, "u1", "user", 3600);

        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
    }
}
