//! Audience resolution: recorded event -> ordered channel list.
//!
//! Recipients are collected per scope, deduplicated in first-seen order,
//! mapped to their private channels and capped. An empty audience still
//! yields one channel (the overflow channel) so a publish always happens.

use anyhow::Result;
use tracing::warn;

use crate::common::UserId;
use crate::domains::auth::{private_user_channel, OVERFLOW_CHANNEL};
use crate::domains::chat::events::{BroadcastScope, ChatEventPayload};
use crate::domains::chat::models::ChatEvent;
use crate::kernel::ServerDeps;

/// Users an event is delivered to, before capping.
pub async fn resolve_recipients(event: &ChatEvent, deps: &ServerDeps) -> Result<Vec<UserId>> {
    let payload = event.payload()?;
    let mut recipients = Vec::new();

    match event.event_type.scope() {
        BroadcastScope::Room => {
            if let Some(room_id) = payload.chat_room_id() {
                for member in deps.store.members(room_id).await? {
                    if member.is_active() {
                        push_unique(&mut recipients, member.user_id);
                    }
                }
            }
            // The leaver is already detached but still has to hear about it.
            if let ChatEventPayload::RoomLeft(_) = payload {
                push_unique(&mut recipients, event.user_id);
            }
        }
        BroadcastScope::User => {
            let target = match payload.invitation() {
                Some(p) => deps
                    .store
                    .find_invitation(p.chat_room_invitation_id)
                    .await?
                    .map(|invitation| invitation.user_id)
                    .unwrap_or(event.user_id),
                None => event.user_id,
            };
            push_unique(&mut recipients, target);
        }
        BroadcastScope::Partner => {
            if let ChatEventPayload::UserAddedToPartner(p)
            | ChatEventPayload::UserRemovedFromPartner(p) = &payload
            {
                for user_id in deps.partners.flat_user_list(p.partner_id).await? {
                    push_unique(&mut recipients, user_id);
                }
                push_unique(&mut recipients, p.user_id);
            }
        }
        BroadcastScope::UserPartners => {
            if deps.settings.broadcast_user_partners {
                for partner_id in deps.users.partner_ids_for_user(event.user_id).await? {
                    for user_id in deps.partners.flat_user_list(partner_id).await? {
                        push_unique(&mut recipients, user_id);
                    }
                }
            }
        }
    }

    Ok(recipients)
}

pub async fn resolve_channels(event: &ChatEvent, deps: &ServerDeps) -> Result<Vec<String>> {
    let recipients = resolve_recipients(event, deps).await?;
    Ok(channels_for(&recipients, deps.settings.channel_limit))
}

/// Private channels for `recipients`, at most `limit` of them, or the
/// overflow channel when there is nobody to deliver to.
pub fn channels_for(recipients: &[UserId], limit: usize) -> Vec<String> {
    if recipients.is_empty() {
        return vec![OVERFLOW_CHANNEL.to_string()];
    }

    let limit = limit.max(1);
    if recipients.len() > limit {
        warn!(
            recipients = recipients.len(),
            limit, "broadcast audience over channel limit, truncating"
        );
    }

    recipients
        .iter()
        .take(limit)
        .map(|user_id| private_user_channel(*user_id))
        .collect()
}

fn push_unique(recipients: &mut Vec<UserId>, user_id: UserId) {
    if !recipients.contains(&user_id) {
        recipients.push(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_audience_goes_to_overflow() {
        assert_eq!(channels_for(&[], 100), vec![OVERFLOW_CHANNEL.to_string()]);
    }

    #[test]
    fn test_audience_is_capped_in_order() {
        let users: Vec<UserId> = (0..150).map(|_| UserId::new()).collect();
        let channels = channels_for(&users, 100);

        assert_eq!(channels.len(), 100);
        assert_eq!(channels[0], private_user_channel(users[0]));
        assert_eq!(channels[99], private_user_channel(users[99]));
    }

    #[test]
    fn test_small_audience_is_untouched() {
        let users = vec![UserId::new(), UserId::new()];
        assert_eq!(
            channels_for(&users, 100),
            vec![private_user_channel(users[0]), private_user_channel(users[1])]
        );
    }

    #[test]
    fn test_push_unique_keeps_first_position() {
        let a = UserId::new();
        let b = UserId::new();
        let mut recipients = vec![a, b];
        push_unique(&mut recipients, a);
        assert_eq!(recipients, vec![a, b]);
    }
}
