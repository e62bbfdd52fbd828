pub mod errors;

use std::sync::RwLock;
use std::time::Duration;

use uuid::Uuid;

use crate::application::ports::permission_repository::PageContext;
use crate::application::ports::rate_limiter::{rate_limit_key_for_ip, rate_limit_key_for_user, RateLimiter};
use crate::application::ports::room_hub::ControlMessage;
use crate::application::services::permission_resolver::PermissionResolver;
use crate::domain::access::AccessLevel;
use errors::SessionError;

/// Fixed-window rate-limit knobs.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_connections: u64,
    pub window: Duration,
}

/// Per-connection state machine. Owns the identity and cached access level
/// a connected client resolved to; the WebSocket itself and its room
/// membership are owned by the presentation layer, which drives a Session
/// through these methods so the decision logic is testable without a live
/// socket (mirroring how PermissionResolver and Hydrator are tested).
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
    pub room_id: String,
    access_level: RwLock<AccessLevel>,
}

/// What the presentation layer must do in response to an inbound
/// [`ControlMessage`] delivered through RoomHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Not addressed to this session, or addressed but access still holds.
    Ignored,
    /// Send `{code: "access_revoked"}` then close with 4001.
    CloseWithAccessRevoked,
    /// Relay a links-updated notification to the client as-is.
    ForwardLinksUpdated { page_external_id: String },
}

/// What the presentation layer must do in response to an inbound mutation
/// frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Apply to the in-memory doc, append to UpdateStore, broadcast.
    Admit,
    /// Send `{code: "read_only", ...}`; do not apply/append/broadcast.
    Reject,
}

impl Session {
    pub fn new(session_id: Uuid, user_id: Option<Uuid>, room_id: String, level: AccessLevel) -> Self {
        Self { session_id, user_id, room_id, access_level: RwLock::new(level) }
    }

    pub fn access_level(&self) -> AccessLevel {
        *self.access_level.read().unwrap()
    }

    fn set_access_level(&self, level: AccessLevel) {
        *self.access_level.write().unwrap() = level;
    }

    /// Handshake step 2. `user_id` is `None` for an anonymous connection
    /// (IP-keyed bucket). Errs with [`SessionError::RateLimited`] when the
    /// caller should accept-then-close with 4029.
    pub async fn check_rate_limit(
        limiter: &dyn RateLimiter,
        user_id: Option<Uuid>,
        client_ip: &str,
        cfg: &RateLimitConfig,
    ) -> Result<(), SessionError> {
        let key = match user_id {
            Some(uid) => rate_limit_key_for_user(&uid.to_string()),
            None => rate_limit_key_for_ip(client_ip),
        };
        let count = limiter.increment(&key, cfg.window).await?;
        if count > cfg.max_connections {
            return Err(SessionError::RateLimited);
        }
        Ok(())
    }

    /// Handshake step 4. Errs with [`SessionError::Forbidden`] when the
    /// resolved level is `none`.
    pub async fn authorize(
        resolver: &PermissionResolver,
        ctx: &PageContext,
        user_id: Uuid,
    ) -> Result<AccessLevel, SessionError> {
        let level = resolver.resolve(ctx, user_id).await?;
        if level == AccessLevel::None {
            return Err(SessionError::Forbidden);
        }
        Ok(level)
    }

    /// Serving-loop rule for an inbound mutation frame.
    pub fn evaluate_write(&self) -> WriteOutcome {
        if self.access_level().can_write() {
            WriteOutcome::Admit
        } else {
            WriteOutcome::Reject
        }
    }

    /// Applies one inbound control message, re-evaluating access against
    /// the resolver when the message targets this session's user. Dual
    /// access paths mean an `access_revoked` publish does not always imply
    /// the session should close: only a re-resolved `none` does.
    pub async fn handle_control(
        &self,
        message: &ControlMessage,
        resolver: &PermissionResolver,
        ctx: &PageContext,
    ) -> anyhow::Result<ControlOutcome> {
        let Some(user_id) = self.user_id else {
            return Ok(ControlOutcome::Ignored);
        };

        match message {
            ControlMessage::AccessRevoked { user_id: target } if *target == user_id => {
                let level = resolver.resolve(ctx, user_id).await?;
                if level == AccessLevel::None {
                    Ok(ControlOutcome::CloseWithAccessRevoked)
                } else {
                    self.set_access_level(level);
                    Ok(ControlOutcome::Ignored)
                }
            }
            ControlMessage::WritePermissionRevoked { user_id: target } if *target == user_id => {
                let level = resolver.resolve(ctx, user_id).await?;
                self.set_access_level(level);
                Ok(ControlOutcome::Ignored)
            }
            ControlMessage::LinksUpdated { page_external_id } => {
                Ok(ControlOutcome::ForwardLinksUpdated { page_external_id: page_external_id.clone() })
            }
            _ => Ok(ControlOutcome::Ignored),
        }
    }
}
