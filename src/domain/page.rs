/// Room id used by RoomHub/UpdateStore: `page_<external_id>`.
pub fn room_id_for(external_id: &str) -> String {
    format!("page_{external_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_prefixes_external_id() {
        assert_eq!(room_id_for("abc123"), "page_abc123");
    }
}
