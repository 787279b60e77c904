// SPDX-License-Identifier: MIT OR Apache-2.0

/// Highest group change epoch this implementation understands.
///
/// Changes carrying a higher epoch may use fields we can't decrypt and are ignored.
pub const HIGHEST_KNOWN_EPOCH: u32 = 5;

/// The default maximum number of members, pending and requesting members excluded.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 1001;

/// The default number of entries the ban list holds before the oldest ones get evicted.
pub const DEFAULT_MAX_BANNED_MEMBERS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupsV2Config {
    /// Groups larger than this can't be created.
    pub max_group_size: usize,

    /// Capacity of the ban list.
    ///
    /// Banning more identities than this evicts the entries with the oldest timestamps in the
    /// same change.
    pub max_banned_members: usize,

    /// Changes with a higher epoch decrypt to nothing.
    pub highest_known_epoch: u32,
}

impl Default for GroupsV2Config {
    fn default() -> Self {
        Self {
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
            max_banned_members: DEFAULT_MAX_BANNED_MEMBERS,
            highest_known_epoch: HIGHEST_KNOWN_EPOCH,
        }
    }
}
