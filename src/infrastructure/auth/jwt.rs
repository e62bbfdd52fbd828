use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer token claims resolved before the WebSocket handshake begins;
/// authentication rides on the HTTP upgrade request, not a post-connect
/// message.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Decodes an HS256 bearer token and returns the authenticated user id,
/// or `None` for a missing/expired/malformed token — the caller then
/// treats the connection as anonymous rather than failing the upgrade
/// outright — an anonymous connection still reaches the rate limiter,
/// keyed by IP instead of user id.
pub fn decode_user_id(secret: &str, token: &str) -> Option<Uuid> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    Uuid::parse_str(&data.claims.sub).ok()
}

/// Extracts a bearer token from, in order: the `Authorization: Bearer`
/// header, an `?token=`/`?access_token=` query parameter, or an
/// `access_token` cookie — needed because a browser WebSocket client
/// cannot set a custom `Authorization` header, so query/cookie are the
/// realistic fallbacks.
pub fn extract_token(
    authorization_header: Option<&str>,
    query_token: Option<&str>,
    cookie_header: Option<&str>,
) -> Option<String> {
    if let Some(auth) = authorization_header {
        if let Some(t) = auth.strip_prefix("Bearer ") {
            return Some(t.to_string());
        }
    }
    if let Some(t) = query_token {
        if !t.is_empty() {
            return Some(t.to_string());
        }
    }
    if let Some(cookie_hdr) = cookie_header {
        for part in cookie_hdr.split(';') {
            let kv = part.trim();
            if let Some((k, v)) = kv.split_once('=') {
                if k.trim() == "access_token" {
                    return Some(v.trim().to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token_for(secret: &str, sub: &str, exp: usize) -> String {
        encode(&Header::default(), &Claims { sub: sub.into(), exp }, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn decodes_valid_token() {
        let user = Uuid::new_v4();
        let secret = "test-secret";
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = token_for(secret, &user.to_string(), exp);
        assert_eq!(decode_user_id(secret, &token), Some(user));
    }

    #[test]
    fn rejects_wrong_secret() {
        let user = Uuid::new_v4();
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = token_for("secret-a", &user.to_string(), exp);
        assert_eq!(decode_user_id("secret-b", &token), None);
    }

    #[test]
    fn rejects_expired_token() {
        let user = Uuid::new_v4();
        let secret = "test-secret";
        let token = token_for(secret, &user.to_string(), 1);
        assert_eq!(decode_user_id(secret, &token), None);
    }

    #[test]
    fn extract_token_prefers_header_then_query_then_cookie() {
        assert_eq!(extract_token(Some("Bearer abc"), Some("def"), Some("access_token=ghi")), Some("abc".into()));
        assert_eq!(extract_token(None, Some("def"), Some("access_token=ghi")), Some("def".into()));
        assert_eq!(extract_token(None, None, Some("access_token=ghi")), Some("ghi".into()));
        assert_eq!(extract_token(None, None, None), None);
    }
}
