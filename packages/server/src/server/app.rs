//! Application setup and server configuration.

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::{
    accept_invitation_handler, authenticate_handler, create_invitation_handler,
    create_room_handler, delete_invitation_handler, health_handler, invite_to_room_handler,
    leave_room_handler, list_invitations_handler, list_messages_handler, list_partners_handler,
    list_rooms_handler, list_users_handler, mark_messages_read_handler, mark_room_read_handler,
    me_handler, post_message_handler, rename_room_handler, room_users_handler,
    show_message_handler, stream_handler, update_status_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub deps: ServerDeps,
}

/// Build the Axum application router.
pub fn build_app(deps: ServerDeps) -> Router {
    let jwt_service = deps.jwt_service.clone();
    let app_state = AxumAppState { deps };

    // Clients are mobile apps and the web dashboard on another origin
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        // Socket grants and the live stream they unlock
        .route("/authenticate", post(authenticate_handler))
        .route("/streams/:channel", get(stream_handler))
        // Rooms
        .route(
            "/chat-rooms",
            get(list_rooms_handler).post(create_room_handler),
        )
        .route("/chat-rooms/:room_id", put(rename_room_handler))
        .route(
            "/chat-rooms/:room_id/messages",
            get(list_messages_handler).post(post_message_handler),
        )
        .route(
            "/chat-rooms/:room_id/messages/mark-as-read",
            put(mark_room_read_handler),
        )
        .route(
            "/chat-rooms/:room_id/invitations",
            post(invite_to_room_handler),
        )
        .route("/chat-rooms/:room_id/users", get(room_users_handler))
        .route(
            "/chat-rooms/:room_id/users/:user_id",
            delete(leave_room_handler),
        )
        // Messages
        .route("/messages/mark-as-read", put(mark_messages_read_handler))
        .route("/messages/:message_id", get(show_message_handler))
        // Invitations
        .route(
            "/invitations",
            get(list_invitations_handler).post(create_invitation_handler),
        )
        .route(
            "/invitations/:invitation_id/accept",
            put(accept_invitation_handler),
        )
        .route(
            "/invitations/:invitation_id",
            delete(delete_invitation_handler),
        )
        // Directory and status
        .route("/users", get(list_users_handler))
        .route("/users/me", get(me_handler))
        .route("/partners", get(list_partners_handler))
        .route("/user-status", put(update_status_handler))
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), req, next)
        }))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
