//! Channel permission resolution.
//!
//! Mirrors the platform's algorithm: guild-level role permissions first,
//! then the channel's `@everyone`, role and member overwrites in that order.

use crate::types::{Channel, Guild, PermissionOverwrite};

pub const ADMINISTRATOR: u64 = 1 << 3;
pub const VIEW_CHANNEL: u64 = 1 << 10;
pub const SEND_MESSAGES: u64 = 1 << 11;
pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;

/// Permissions granted by guild roles alone.
pub fn base_permissions(guild: &Guild, user_id: u64, member_roles: &[u64]) -> u64 {
    if guild.owner_id == Some(user_id) {
        return u64::MAX;
    }

    // The @everyone role shares the guild's ID.
    let perms = guild
        .roles
        .iter()
        .filter(|role| role.id == guild.id || member_roles.contains(&role.id))
        .fold(0, |acc, role| acc | role.permissions);

    if perms & ADMINISTRATOR != 0 {
        u64::MAX
    } else {
        perms
    }
}

/// Apply a channel's overwrites on top of the base permissions.
pub fn channel_permissions(
    base: u64,
    guild_id: u64,
    user_id: u64,
    member_roles: &[u64],
    overwrites: &[PermissionOverwrite],
) -> u64 {
    if base & ADMINISTRATOR != 0 {
        return u64::MAX;
    }

    let mut perms = base;

    if let Some(everyone) = overwrites.iter().find(|o| o.id == guild_id) {
        perms &= !everyone.deny;
        perms |= everyone.allow;
    }

    let (allow, deny) = overwrites
        .iter()
        .filter(|o| o.kind == PermissionOverwrite::ROLE && member_roles.contains(&o.id))
        .fold((0, 0), |(allow, deny), o| (allow | o.allow, deny | o.deny));
    perms &= !deny;
    perms |= allow;

    if let Some(member) = overwrites
        .iter()
        .find(|o| o.kind == PermissionOverwrite::MEMBER && o.id == user_id)
    {
        perms &= !member.deny;
        perms |= member.allow;
    }

    perms
}

/// Whether the permission set allows paging through message history.
pub fn can_read_history(perms: u64) -> bool {
    perms & ADMINISTRATOR != 0
        || (perms & VIEW_CHANNEL != 0 && perms & READ_MESSAGE_HISTORY != 0)
}

/// Whether `@everyone` is already denied sending in this channel.
pub fn everyone_denied_send(channel: &Channel, guild_id: u64) -> bool {
    channel
        .permission_overwrites
        .iter()
        .any(|o| o.id == guild_id && o.deny & SEND_MESSAGES != 0)
}
