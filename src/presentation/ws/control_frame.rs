use serde::Serialize;

/// Text-frame control messages sent to the client, shape `{code, message?,
/// ...}`. Distinct from [`ControlMessage`](crate::application::ports::room_hub::ControlMessage),
/// which is the internal, Hub-routed representation of `access_revoked`/
/// `write_permission_revoked`/`links_updated`; this enum additionally
/// carries the close-path-adjacent frames those never produce
/// (`rate_limited`, `read_only`) plus `write_failed`, sent to the single
/// session whose mutation a storage failure rejected, and is what
/// actually goes over the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum OutboundControlFrame {
    RateLimited { message: String },
    ReadOnly { message: String },
    AccessRevoked,
    LinksUpdated { page_external_id: String },
    WriteFailed { message: String },
}

impl OutboundControlFrame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"code\":\"internal_error\"}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_code_tag() {
        let frame = OutboundControlFrame::ReadOnly { message: "view-only access".into() };
        assert_eq!(frame.to_json(), r#"{"code":"read_only","message":"view-only access"}"#);
    }

    #[test]
    fn unit_variants_serialize_without_extra_fields() {
        assert_eq!(OutboundControlFrame::AccessRevoked.to_json(), r#"{"code":"access_revoked"}"#);
    }
}
