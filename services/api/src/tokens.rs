//! Random opaque token generation
//!
//! App tokens and password-reset tokens are bearer secrets, so they are
//! drawn from the thread-local CSPRNG.

use rand::{Rng, distributions::Alphanumeric};

/// Length of app tokens and password-reset tokens.
pub const SECRET_TOKEN_LENGTH: usize = 32;

/// Length of the random suffix appended to uploaded file names.
pub const FILE_SUFFIX_LENGTH: usize = 7;

/// Generate a random alphanumeric string of the given length.
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
