use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use http::HeaderMap;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::ports::room_hub::OutboundMessage;
use crate::application::session::errors::{CloseReason, SessionError};
use crate::application::session::{ControlOutcome, Session, WriteOutcome};
use crate::bootstrap::app_context::AppContext;
use crate::domain::page::room_id_for;
use crate::infrastructure::auth;
use crate::presentation::ws::control_frame::OutboundControlFrame;
use crate::presentation::ws::protocol::{decode_client_frame, encode_state_vector, encode_update, ClientFrame};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
    access_token: Option<String>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new().route("/ws/pages/:external_id", get(ws_entry)).with_state(ctx)
}

async fn ws_entry(
    Path(external_id): Path<String>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(ctx): State<AppContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx, external_id, query, headers, peer))
}

/// Every close path names a reason before giving up the socket: the close
/// codes themselves (1000/4001/4003/4004/4029) are the only signal the
/// client gets for *why*, so they must never collapse to a generic abort.
async fn close_with(socket: &mut WebSocket, reason: CloseReason) {
    let frame = CloseFrame { code: reason.code(), reason: Cow::Borrowed("") };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

async fn handle_socket(
    mut socket: WebSocket,
    ctx: AppContext,
    external_id: String,
    query: WsQuery,
    headers: HeaderMap,
    peer: SocketAddr,
) {
    let token = auth::jwt::extract_token(
        headers.get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
        query.token.as_deref().or(query.access_token.as_deref()),
        headers.get(http::header::COOKIE).and_then(|v| v.to_str().ok()),
    );
    let user_id = token.and_then(|t| auth::jwt::decode_user_id(&ctx.cfg.jwt_secret, &t));
    let client_ip = auth::client_ip(&headers, peer);

    if let Err(SessionError::RateLimited) =
        Session::check_rate_limit(ctx.rate_limiter().as_ref(), user_id, &client_ip, &ctx.cfg.rate_limit_config())
            .await
    {
        let frame = OutboundControlFrame::RateLimited { message: "too many connection attempts".into() };
        let _ = socket.send(Message::Text(frame.to_json())).await;
        close_with(&mut socket, CloseReason::RateLimited).await;
        return;
    }

    // Page existence is checked before the access check, for every
    // connection including anonymous ones, so a nonexistent/deleted page
    // always reports 4004 rather than being masked by a 4003 an
    // unauthenticated client would otherwise hit first.
    let page_ctx = match ctx.permission_repo().page_context(&external_id).await {
        Ok(Some(page_ctx)) => page_ctx,
        Ok(None) => {
            close_with(&mut socket, CloseReason::PageNotFound).await;
            return;
        }
        Err(e) => {
            tracing::error!(page_external_id = %external_id, error = ?e, "page_context_lookup_failed");
            close_with(&mut socket, CloseReason::Normal).await;
            return;
        }
    };

    let Some(user_id) = user_id else {
        close_with(&mut socket, CloseReason::Forbidden).await;
        return;
    };

    let access_level = match Session::authorize(ctx.permission_resolver(), &page_ctx, user_id).await {
        Ok(level) => level,
        Err(SessionError::Forbidden) => {
            close_with(&mut socket, CloseReason::Forbidden).await;
            return;
        }
        Err(e) => {
            tracing::error!(page_external_id = %external_id, error = ?e, "authorize_failed");
            close_with(&mut socket, CloseReason::Normal).await;
            return;
        }
    };

    let room_id = room_id_for(&external_id);
    let session_id = Uuid::new_v4();
    let session = Session::new(session_id, Some(user_id), room_id.clone(), access_level);

    let (outbox_tx, mut outbox_rx) = tokio::sync::mpsc::channel(256);
    let (handle, state_vector) = match ctx.room_hub().join(&room_id, session_id, outbox_tx).await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::error!(room_id = %room_id, error = ?e, "room_join_failed");
            close_with(&mut socket, CloseReason::Normal).await;
            return;
        }
    };

    if socket.send(Message::Binary(encode_state_vector(&state_vector))).await.is_err() {
        handle.leave().await;
        return;
    }

    let meta = serde_json::json!({ "user_id": user_id }).to_string().into_bytes();
    let mut close_reason = CloseReason::Normal;

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Binary(bytes))) => {
                        match decode_client_frame(&bytes) {
                            Some(ClientFrame::StateVector(sv)) => {
                                match handle.sync_step1(sv).await {
                                    Ok(diff) => {
                                        if socket.send(Message::Binary(encode_update(&diff))).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => tracing::error!(room_id = %room_id, error = ?e, "sync_step1_failed"),
                                }
                            }
                            Some(ClientFrame::Update(update)) => match session.evaluate_write() {
                                WriteOutcome::Admit => {
                                    if let Err(e) = handle.apply_update(update, meta.clone()).await {
                                        tracing::error!(room_id = %room_id, error = ?e, "apply_update_failed");
                                        let frame = OutboundControlFrame::WriteFailed {
                                            message: "your last edit could not be saved, please retry".into(),
                                        };
                                        if socket.send(Message::Text(frame.to_json())).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                                WriteOutcome::Reject => {
                                    let frame = OutboundControlFrame::ReadOnly { message: "you do not have write access".into() };
                                    if socket.send(Message::Text(frame.to_json())).await.is_err() {
                                        break;
                                    }
                                }
                            },
                            None => tracing::warn!(room_id = %room_id, "malformed_ws_frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(room_id = %room_id, error = ?e, "ws_recv_error");
                        break;
                    }
                }
            }
            outbound = outbox_rx.recv() => {
                match outbound {
                    Some(OutboundMessage::Binary(update)) => {
                        if socket.send(Message::Binary(encode_update(&update))).await.is_err() {
                            break;
                        }
                    }
                    Some(OutboundMessage::Control(message)) => {
                        match session.handle_control(&message, ctx.permission_resolver(), &page_ctx).await {
                            Ok(ControlOutcome::Ignored) => {}
                            Ok(ControlOutcome::CloseWithAccessRevoked) => {
                                let frame = OutboundControlFrame::AccessRevoked;
                                let _ = socket.send(Message::Text(frame.to_json())).await;
                                close_reason = CloseReason::AccessRevoked;
                                break;
                            }
                            Ok(ControlOutcome::ForwardLinksUpdated { page_external_id }) => {
                                let frame = OutboundControlFrame::LinksUpdated { page_external_id };
                                if socket.send(Message::Text(frame.to_json())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::error!(room_id = %room_id, error = ?e, "handle_control_failed"),
                        }
                    }
                    None => break,
                }
            }
        }
    }

    handle.leave().await;
    close_with(&mut socket, close_reason).await;
}
