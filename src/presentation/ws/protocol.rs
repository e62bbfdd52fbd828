//! Minimal binary framing for the WebSocket endpoint: binary frames
//! carry CRDT protocol messages as-is, with one leading tag byte
//! distinguishing a state-vector exchange from a mutation.

const TAG_STATE_VECTOR: u8 = 0;
const TAG_UPDATE: u8 = 1;

/// A decoded inbound binary frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Sync step 1: the peer's state vector, always answerable regardless
    /// of write access.
    StateVector(Vec<u8>),
    /// Sync step 2 / mutation: a CRDT update to admit (editor/admin) or
    /// reject (viewer).
    Update(Vec<u8>),
}

pub fn decode_client_frame(bytes: &[u8]) -> Option<ClientFrame> {
    let (tag, payload) = bytes.split_first()?;
    match *tag {
        TAG_STATE_VECTOR => Some(ClientFrame::StateVector(payload.to_vec())),
        TAG_UPDATE => Some(ClientFrame::Update(payload.to_vec())),
        _ => None,
    }
}

/// Frames the server's own state vector, sent once right after join so
/// the client can compute and send back what the server is missing
/// right after join, before any mutation is admitted.
pub fn encode_state_vector(state_vector: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(state_vector.len() + 1);
    out.push(TAG_STATE_VECTOR);
    out.extend_from_slice(state_vector);
    out
}

/// Frames a mergeable CRDT update: a peer's broadcast update, or the
/// diff computed in reply to a client's `StateVector` request.
pub fn encode_update(update: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(update.len() + 1);
    out.push(TAG_UPDATE);
    out.extend_from_slice(update);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_state_vector() {
        let framed = encode_state_vector(&[1, 2, 3]);
        assert_eq!(decode_client_frame(&framed), Some(ClientFrame::StateVector(vec![1, 2, 3])));
    }

    #[test]
    fn round_trips_update() {
        let framed = encode_update(&[9, 9]);
        assert_eq!(decode_client_frame(&framed), Some(ClientFrame::Update(vec![9, 9])));
    }

    #[test]
    fn rejects_empty_and_unknown_tag() {
        assert_eq!(decode_client_frame(&[]), None);
        assert_eq!(decode_client_frame(&[7, 1, 2]), None);
    }
}
