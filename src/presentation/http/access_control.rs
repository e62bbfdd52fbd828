use std::sync::Arc;

use uuid::Uuid;

use crate::application::ports::room_hub::{ControlMessage, RoomHub};
use crate::domain::page::room_id_for;

/// Entry points the (out-of-scope) REST layer is required to call after
/// mutating membership:
///
/// - `POST /api/pages/{id}/editors/{user_id}/` downgrading a page editor
///   from "editor" to "viewer" must call [`publish_write_permission_revoked`].
/// - Removing a project editor or org member must call
///   [`publish_access_revoked`] for every page in the affected project.
///
/// Neither endpoint is implemented here (§1 "Out of scope (external
/// collaborators)"); these functions are this crate's public surface for
/// whatever REST handler does implement them.
pub async fn publish_access_revoked(
    hub: &Arc<dyn RoomHub>,
    page_external_id: &str,
    user_id: Uuid,
) -> anyhow::Result<()> {
    hub.send_control(&room_id_for(page_external_id), ControlMessage::AccessRevoked { user_id }).await
}

pub async fn publish_write_permission_revoked(
    hub: &Arc<dyn RoomHub>,
    page_external_id: &str,
    user_id: Uuid,
) -> anyhow::Result<()> {
    hub.send_control(&room_id_for(page_external_id), ControlMessage::WritePermissionRevoked { user_id }).await
}

pub async fn publish_links_updated(hub: &Arc<dyn RoomHub>, page_external_id: &str) -> anyhow::Result<()> {
    hub.send_control(
        &room_id_for(page_external_id),
        ControlMessage::LinksUpdated { page_external_id: page_external_id.to_string() },
    )
    .await
}

/// Fan-out helper for the project-removal case: publishes `access_revoked`
/// for `user_id` across every page external id in the affected project.
pub async fn publish_access_revoked_for_project(
    hub: &Arc<dyn RoomHub>,
    project_page_external_ids: &[String],
    user_id: Uuid,
) -> anyhow::Result<()> {
    for page_external_id in project_page_external_ids {
        publish_access_revoked(hub, page_external_id, user_id).await?;
    }
    Ok(())
}
