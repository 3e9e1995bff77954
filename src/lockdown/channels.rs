use poise::serenity_prelude::{self as serenity, ChannelId};

use super::permissions::EveryoneOverwrite;
use crate::state::LockdownScope;

/// Channel kinds as far as lockdown is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Announcement,
    Forum,
    Media,
    Voice,
    Stage,
    Category,
    Thread,
    Other,
}

impl ChannelKind {
    /// Text, announcement, forum and media channels. Never voice, stage,
    /// categories or threads.
    pub fn is_lockable(self) -> bool {
        matches!(
            self,
            ChannelKind::Text | ChannelKind::Announcement | ChannelKind::Forum | ChannelKind::Media
        )
    }
}

impl From<serenity::ChannelType> for ChannelKind {
    fn from(kind: serenity::ChannelType) -> Self {
        match kind {
            serenity::ChannelType::Text => ChannelKind::Text,
            serenity::ChannelType::News => ChannelKind::Announcement,
            serenity::ChannelType::Forum => ChannelKind::Forum,
            serenity::ChannelType::Voice => ChannelKind::Voice,
            serenity::ChannelType::Stage => ChannelKind::Stage,
            serenity::ChannelType::Category => ChannelKind::Category,
            serenity::ChannelType::PublicThread
            | serenity::ChannelType::PrivateThread
            | serenity::ChannelType::NewsThread => ChannelKind::Thread,
            // GUILD_MEDIA (16) is not a named variant in every serenity release
            other if u8::from(other) == 16 => ChannelKind::Media,
            _ => ChannelKind::Other,
        }
    }
}

/// What the engine needs to know about a guild channel
#[derive(Debug, Clone, PartialEq)]
pub struct GuildChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub position: u16,

    /// Current `@everyone` overwrite, if the channel has one
    pub everyone: Option<EveryoneOverwrite>,
}

impl GuildChannelInfo {
    pub fn is_lockable(&self) -> bool {
        self.kind.is_lockable()
    }
}

/// Read access to a guild's channel tree.
///
/// Implementations return channels in a stable order (position, then ID).
pub trait ChannelTree {
    fn channel(&self, id: ChannelId) -> Option<GuildChannelInfo>;

    fn children_of(&self, category: ChannelId) -> Vec<GuildChannelInfo>;

    fn all_channels(&self) -> Vec<GuildChannelInfo>;
}

/// Resolve the channels a lockdown of `scope` should act on.
///
/// Never errors: an empty list means nothing matched.
pub fn resolve_targets<T: ChannelTree + ?Sized>(
    scope: LockdownScope,
    current: &GuildChannelInfo,
    tree: &T,
) -> Vec<GuildChannelInfo> {
    match scope {
        LockdownScope::Channel => {
            if current.is_lockable() {
                vec![current.clone()]
            } else {
                Vec::new()
            }
        }
        LockdownScope::Category => match current.parent_id {
            Some(parent) => tree
                .children_of(parent)
                .into_iter()
                .filter(GuildChannelInfo::is_lockable)
                .collect(),
            None => Vec::new(),
        },
        LockdownScope::All => tree
            .all_channels()
            .into_iter()
            .filter(GuildChannelInfo::is_lockable)
            .collect(),
    }
}
