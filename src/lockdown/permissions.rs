use poise::serenity_prelude::Permissions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Channel permissions the lockdown engine is allowed to touch.
///
/// The set is closed: it is part of the persisted schema, so adding a key
/// changes the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PermissionKey {
    SendMessages,
    AddReactions,
    CreatePublicThreads,
    CreatePrivateThreads,
    #[serde(alias = "SendMessageInThreads")]
    SendMessagesInThreads,
}

impl PermissionKey {
    pub const ALL: [PermissionKey; 5] = [
        PermissionKey::SendMessages,
        PermissionKey::AddReactions,
        PermissionKey::CreatePublicThreads,
        PermissionKey::CreatePrivateThreads,
        PermissionKey::SendMessagesInThreads,
    ];

    /// Discord permission bit for this key
    pub fn bit(self) -> Permissions {
        match self {
            PermissionKey::SendMessages => Permissions::SEND_MESSAGES,
            PermissionKey::AddReactions => Permissions::ADD_REACTIONS,
            PermissionKey::CreatePublicThreads => Permissions::CREATE_PUBLIC_THREADS,
            PermissionKey::CreatePrivateThreads => Permissions::CREATE_PRIVATE_THREADS,
            PermissionKey::SendMessagesInThreads => Permissions::SEND_MESSAGES_IN_THREADS,
        }
    }

    /// Union of every lockdown bit
    pub fn all_bits() -> Permissions {
        Self::ALL
            .iter()
            .fold(Permissions::empty(), |acc, key| acc | key.bit())
    }
}

/// Explicit allow, explicit deny, or no overwrite (inherited).
///
/// Persisted as `true` / `false` / `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum TriState {
    Allow,
    Deny,
    #[default]
    Unset,
}

impl TriState {
    /// Read the tri-state value of `bit` from an overwrite
    pub fn from_overwrite(overwrite: Option<&EveryoneOverwrite>, bit: Permissions) -> Self {
        match overwrite {
            Some(ow) if ow.allow.contains(bit) => TriState::Allow,
            Some(ow) if ow.deny.contains(bit) => TriState::Deny,
            _ => TriState::Unset,
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => TriState::Allow,
            Some(false) => TriState::Deny,
            None => TriState::Unset,
        }
    }
}

impl From<TriState> for Option<bool> {
    fn from(value: TriState) -> Self {
        match value {
            TriState::Allow => Some(true),
            TriState::Deny => Some(false),
            TriState::Unset => None,
        }
    }
}

/// The allow/deny bit pair of a role overwrite on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EveryoneOverwrite {
    pub allow: Permissions,
    pub deny: Permissions,
}

impl EveryoneOverwrite {
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }
}

/// Tri-state values keyed by [`PermissionKey`].
///
/// Used both as the `before` snapshot of a channel and as the patch written
/// back to it. Keys absent from the map read as [`TriState::Unset`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriStateMap(BTreeMap<PermissionKey, TriState>);

impl TriStateMap {
    /// Capture the current values of every lockdown key
    pub fn capture(overwrite: Option<&EveryoneOverwrite>) -> Self {
        Self(
            PermissionKey::ALL
                .iter()
                .map(|key| (*key, TriState::from_overwrite(overwrite, key.bit())))
                .collect(),
        )
    }

    /// Patch denying every lockdown key
    pub fn lockdown() -> Self {
        Self(
            PermissionKey::ALL
                .iter()
                .map(|key| (*key, TriState::Deny))
                .collect(),
        )
    }

    pub fn get(&self, key: PermissionKey) -> TriState {
        self.0.get(&key).copied().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn set(&mut self, key: PermissionKey, value: TriState) {
        self.0.insert(key, value);
    }

    /// Merge the patch into an existing overwrite.
    ///
    /// Only lockdown keys are touched; `Unset` clears both bits. Returns
    /// `None` when the result carries no bits at all, meaning the overwrite
    /// should be removed.
    pub fn merge_into(&self, existing: Option<EveryoneOverwrite>) -> Option<EveryoneOverwrite> {
        let mut merged = existing.unwrap_or(EveryoneOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::empty(),
        });

        for key in PermissionKey::ALL {
            let bit = key.bit();
            match self.get(key) {
                TriState::Allow => {
                    merged.allow.insert(bit);
                    merged.deny.remove(bit);
                }
                TriState::Deny => {
                    merged.allow.remove(bit);
                    merged.deny.insert(bit);
                }
                TriState::Unset => {
                    merged.allow.remove(bit);
                    merged.deny.remove(bit);
                }
            }
        }

        if merged.is_empty() {
            None
        } else {
            Some(merged)
        }
    }

    /// Whether an overwrite still denies every lockdown key
    pub fn is_locked(overwrite: Option<&EveryoneOverwrite>) -> bool {
        PermissionKey::ALL
            .iter()
            .all(|key| TriState::from_overwrite(overwrite, key.bit()) == TriState::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tristate_from_overwrite() {
        let ow = EveryoneOverwrite {
            allow: Permissions::SEND_MESSAGES,
            deny: Permissions::ADD_REACTIONS,
        };

        assert_eq!(
            TriState::from_overwrite(Some(&ow), Permissions::SEND_MESSAGES),
            TriState::Allow
        );
        assert_eq!(
            TriState::from_overwrite(Some(&ow), Permissions::ADD_REACTIONS),
            TriState::Deny
        );
        assert_eq!(
            TriState::from_overwrite(Some(&ow), Permissions::CREATE_PUBLIC_THREADS),
            TriState::Unset
        );
        assert_eq!(
            TriState::from_overwrite(None, Permissions::SEND_MESSAGES),
            TriState::Unset
        );
    }

    #[test]
    fn test_tristate_serializes_as_nullable_bool() {
        let mut map = TriStateMap::default();
        map.set(PermissionKey::SendMessages, TriState::Allow);
        map.set(PermissionKey::AddReactions, TriState::Deny);
        map.set(PermissionKey::CreatePublicThreads, TriState::Unset);

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["SendMessages"], serde_json::json!(true));
        assert_eq!(json["AddReactions"], serde_json::json!(false));
        assert_eq!(json["CreatePublicThreads"], serde_json::Value::Null);
    }

    #[test]
    fn test_legacy_key_alias_and_missing_keys() {
        let json = r#"{ "SendMessages": false, "SendMessageInThreads": true }"#;
        let map: TriStateMap = serde_json::from_str(json).unwrap();

        assert_eq!(map.get(PermissionKey::SendMessages), TriState::Deny);
        assert_eq!(map.get(PermissionKey::SendMessagesInThreads), TriState::Allow);
        assert_eq!(map.get(PermissionKey::AddReactions), TriState::Unset);
    }

    #[test]
    fn test_lockdown_patch_preserves_unrelated_bits() {
        let existing = EveryoneOverwrite {
            allow: Permissions::SEND_MESSAGES | Permissions::ATTACH_FILES,
            deny: Permissions::VIEW_CHANNEL,
        };

        let merged = TriStateMap::lockdown().merge_into(Some(existing)).unwrap();
        assert_eq!(merged.allow, Permissions::ATTACH_FILES);
        assert_eq!(merged.deny, Permissions::VIEW_CHANNEL | PermissionKey::all_bits());
        assert!(TriStateMap::is_locked(Some(&merged)));
    }

    #[test]
    fn test_restoring_unset_removes_instead_of_allowing() {
        let before = TriStateMap::capture(None);
        let locked = TriStateMap::lockdown().merge_into(None);
        assert!(TriStateMap::is_locked(locked.as_ref()));

        // Nothing was set before the lockdown, so the overwrite goes away
        let restored = before.merge_into(locked);
        assert_eq!(restored, None);
        assert_eq!(TriStateMap::capture(restored.as_ref()), before);
    }

    #[test]
    fn test_round_trip_mixed_values() {
        let original = EveryoneOverwrite {
            allow: Permissions::ADD_REACTIONS | Permissions::EMBED_LINKS,
            deny: Permissions::CREATE_PRIVATE_THREADS,
        };
        let before = TriStateMap::capture(Some(&original));

        let locked = TriStateMap::lockdown().merge_into(Some(original));
        let restored = before.merge_into(locked);

        assert_eq!(restored, Some(original));
    }
}
