// Hard limits and default window sizes.

/// Window applied to free-text search when no explicit limit is given.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Window applied to view history when no explicit limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Max user ids in a single leave query.
pub const MAX_IN_CLAUSE_IDS: usize = 10_000;

/// Max length of a user, team, or pod display name.
pub const MAX_NAME_LEN: usize = 256;

/// Max length of a leave note.
pub const MAX_NOTE_LEN: usize = 2_048;
