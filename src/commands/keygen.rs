//! `generate-keys`: create a VAPID keypair for operators.
//!
//! Prints both halves as URL-safe unpadded base64, once as shell exports and
//! once as `.env` lines. The running service never calls this.
//!
//! ```bash
//! webpush-relay generate-keys
//! ```

use crate::notifications::VapidKeys;

/// Generate a keypair and print it to stdout.
pub fn run() {
    print!("{}", render(&VapidKeys::generate()));
}

/// Operator-facing text for `keys`.
pub fn render(keys: &VapidKeys) -> String {
    let public = keys.public_key_base64url();
    let private = keys.private_key_base64url();
    format!(
        "=== VAPID keys generated ===\n\
         \n\
         Add them to the environment:\n\
         \n\
         export VAPID_PUBLIC_KEY={public}\n\
         export VAPID_PRIVATE_KEY={private}\n\
         \n\
         Or to a .env file:\n\
         \n\
         VAPID_PUBLIC_KEY={public}\n\
         VAPID_PRIVATE_KEY={private}\n"
    )
}
