pub mod health;
pub use self::health::health;

pub mod login;
pub use self::login::login;

pub mod account;
pub use self::account::account;

// common functions for the handlers
use regex::Regex;

/// Usernames and passwords share one shape: 6 to 32 printable characters
/// from a fixed set.
pub fn valid_credential(value: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9!@#$%^&*()_+\-=]{6,32}$").map_or(false, |re| re.is_match(value))
}
