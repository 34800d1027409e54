use proptest::prelude::*;

use permwatch::policy::{corrected_mode, needs_correction, ANY_EXEC, OPEN_ALL, OPEN_READ_WRITE};

// Full st_mode range: type bits, special bits and permission bits.
fn any_mode() -> impl Strategy<Value = u32> {
    0u32..0o200000
}

proptest! {
    #[test]
    fn executable_modes_open_everything(mode in any_mode()) {
        prop_assume!(mode & ANY_EXEC != 0);
        prop_assert_eq!(corrected_mode(mode), mode | OPEN_ALL);
    }

    #[test]
    fn non_executable_modes_only_gain_read_write(mode in any_mode().prop_map(|m| m & !ANY_EXEC)) {
        prop_assert_eq!(corrected_mode(mode), mode | OPEN_READ_WRITE);
    }

    #[test]
    fn correction_is_idempotent(mode in any_mode()) {
        let once = corrected_mode(mode);
        prop_assert_eq!(corrected_mode(once), once);
        prop_assert!(!needs_correction(once));
    }

    #[test]
    fn correction_never_removes_bits(mode in any_mode()) {
        prop_assert_eq!(corrected_mode(mode) & mode, mode);
    }

    #[test]
    fn bits_above_permissions_are_preserved(mode in any_mode()) {
        prop_assert_eq!(corrected_mode(mode) & !0o777, mode & !0o777);
    }
}
