//! Newtypes for guild and user identifiers.

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::model::id::{GuildId as ModelGuild, UserId as ModelUser};

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct GuildId(pub u64);

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct UserId(pub u64);

impl Display for GuildId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for GuildId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<GuildId> for ModelGuild {
    fn from(id: GuildId) -> Self {
        Self(id.0)
    }
}

impl From<ModelGuild> for GuildId {
    fn from(id: ModelGuild) -> Self {
        Self(id.0)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<UserId> for ModelUser {
    fn from(id: UserId) -> Self {
        Self(id.0)
    }
}

impl From<ModelUser> for UserId {
    fn from(id: ModelUser) -> Self {
        Self(id.0)
    }
}
