//! Keygen command - print a fresh signing key.

use medgate_core::SigningSecret;

/// Print a random base64 signing key on stdout.
///
/// Only the key goes to stdout so the output can be captured directly.
pub fn run_keygen() {
    println!("{}", SigningSecret::generate_base64());
}
