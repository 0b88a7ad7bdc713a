//! Auth domain - caller identity and channel authorization
//!
//! Responsibilities:
//! - JWT verification for HTTP callers (tokens are issued by the platform)
//! - Channel subscription grants (HMAC-signed) for the real-time transport

pub mod jwt;
pub mod socket;

pub use jwt::{Claims, JwtService};
pub use socket::{
    authorize_channel, parse_channel, presence_partner_channel, private_user_channel,
    ChannelGrant, ChannelName, SocketSigner, OVERFLOW_CHANNEL,
};
