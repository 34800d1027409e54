// src/policy.rs

//! The permission policy enforced on every entry of the watched tree.
//!
//! The policy is deliberately fixed: anything that is executable by someone
//! becomes `rwxrwxrwx`, everything else becomes at least `rw-rw-rw-`. Bits
//! outside the low nine permission bits (setuid, setgid, sticky and the
//! file-type bits of `st_mode`) are passed through untouched.

pub const S_ISUID: u32 = 0o4000;
pub const S_ISGID: u32 = 0o2000;
pub const S_ISVTX: u32 = 0o1000;
pub const S_IRUSR: u32 = 0o0400;
pub const S_IWUSR: u32 = 0o0200;
pub const S_IXUSR: u32 = 0o0100;
pub const S_IRGRP: u32 = 0o0040;
pub const S_IWGRP: u32 = 0o0020;
pub const S_IXGRP: u32 = 0o0010;
pub const S_IROTH: u32 = 0o0004;
pub const S_IWOTH: u32 = 0o0002;
pub const S_IXOTH: u32 = 0o0001;

/// Any execute bit (owner, group or other).
pub const ANY_EXEC: u32 = S_IXUSR | S_IXGRP | S_IXOTH;

/// `rw-rw-rw-`
pub const OPEN_READ_WRITE: u32 =
    S_IRUSR | S_IWUSR | S_IRGRP | S_IWGRP | S_IROTH | S_IWOTH;

/// `rwxrwxrwx`
pub const OPEN_ALL: u32 = OPEN_READ_WRITE | ANY_EXEC;

/// Compute the mode an entry should have given its current mode.
///
/// The result only ever adds bits, so `corrected_mode(m) & m == m`, and it is
/// idempotent. A directory without any execute bit only receives `0o666`,
/// which leaves it non-traversable; that case is kept as-is.
pub fn corrected_mode(mode: u32) -> u32 {
    if mode & ANY_EXEC != 0 {
        mode | OPEN_ALL
    } else {
        mode | OPEN_READ_WRITE
    }
}

/// Whether `mode` differs from what the policy wants.
pub fn needs_correction(mode: u32) -> bool {
    corrected_mode(mode) != mode
}
