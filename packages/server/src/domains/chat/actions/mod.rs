//! Chat domain actions
//!
//! Every caller-side operation takes the acting user explicitly and returns
//! `Result<_, ChatError>`. Validation and authorization run before any
//! write. State changes go through the event processor in `record_event`.

pub mod directory;
pub mod invitations;
pub mod membership;
pub mod messages;
pub mod partner_sync;
pub mod read_state;
pub mod record_event;
pub mod rooms;
pub mod status;

pub use directory::{chat_users, current_user, list_partners, list_users, ChatUser, CurrentUser};
pub use invitations::{
    accept_invitation, create_invitation, delete_invitation, pending_invitations,
    CreateInvitation,
};
pub use membership::{join_room, leave_room, require_member, room_users};
pub use messages::{page_messages, post_message, show_message, MessagesQuery, PostMessage};
pub use partner_sync::{user_added_to_partner, user_removed_from_partner};
pub use read_state::{
    mark_messages_read, mark_room_read, unread_count, unread_counts, MarkMessagesRead,
};
pub use record_event::{display_name, emit, record_event, record_message, RecordedEvent};
pub use rooms::{create_room, list_rooms, rename_room, CreateRoom, RenameRoom, RoomSummary};
pub use status::{update_status, UpdateStatus};
