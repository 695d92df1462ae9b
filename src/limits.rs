/// Longest accepted request line on the wire, in bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_ISSUE_TYPE_LEN: usize = 100;
pub const MAX_ERROR_DETAIL_LEN: usize = 500;
pub const MAX_LANGUAGE_LEN: usize = 16;

/// First and last bookable hour in the day grid (inclusive).
pub const FIRST_SLOT_HOUR: u32 = 6;
pub const LAST_SLOT_HOUR: u32 = 22;
