pub mod event;
pub mod invitation;
pub mod message;
pub mod profile;
pub mod room;

pub use event::ChatEvent;
pub use invitation::{ChatRoomInvitation, InvitationState};
pub use message::{
    ChatMessage, ChatMessageType, MessagePage, PageDirection, PageQuery, ReadState, UnreadScope,
    DEFAULT_PER_PAGE,
};
pub use profile::{ChatStatus, ChatUserProfile};
pub use room::{ChatRoom, MembershipState, RoomMember};
