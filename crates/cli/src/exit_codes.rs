//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | CLI usage error (bad arguments)                      |
//! | 3    | No usable input (every file failed or was empty)     |
//! | 4    | Configuration error (settings, lookup tables, AI key) |
//! | 5    | Output could not be written                          |
//!
//! A run that merely degraded (oracle fallbacks, unresolved authorities)
//! still exits 0; the report says what degraded.

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// None of the input files produced a table.
pub const EXIT_NO_INPUT: u8 = 3;

/// Settings file, lookup tables, or AI key are unusable.
pub const EXIT_CONFIG: u8 = 4;

/// Output table or report could not be written.
pub const EXIT_OUTPUT: u8 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_NO_INPUT,
            EXIT_CONFIG,
            EXIT_OUTPUT,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
