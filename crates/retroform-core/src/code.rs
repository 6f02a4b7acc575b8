//! Shareable form codes.
//!
//! A form is shared by a short alphanumeric code rather than its row id.
//! Generation draws uniformly from `[A-Za-z0-9]` and retries while the
//! caller's existence check reports the candidate taken. The storage layer's
//! UNIQUE constraint remains the authoritative guard; this loop only keeps the
//! happy path collision-free.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::{Error, Result};

/// Length of a form's public code.
pub const CODE_LENGTH: usize = 8;

/// Retry bound for generation. At expected scale collisions are negligible,
/// so hitting this means the code space is effectively exhausted or the
/// existence check is broken.
pub const MAX_ATTEMPTS: u32 = 100;

/// Generate a random alphanumeric code of `length` characters that
/// `exists_check` reports as unused.
///
/// Fails with [`Error::CodeGenerationExhausted`] after [`MAX_ATTEMPTS`]
/// taken candidates, and propagates any error from the existence check.
pub fn generate_unique_code<F>(length: usize, mut exists_check: F) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_ATTEMPTS {
        let code: String = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        if !exists_check(&code)? {
            return Ok(code);
        }
    }
    Err(Error::CodeGenerationExhausted(MAX_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_respects_length() {
        let code = generate_unique_code(CODE_LENGTH, |_| Ok(false)).unwrap();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_retries_until_free() {
        // First 3 candidates are reported taken; the 4th is free.
        let mut attempts = 0;
        let code = generate_unique_code(8, |_| {
            attempts += 1;
            Ok(attempts <= 3)
        })
        .unwrap();
        assert_eq!(attempts, 4);
        assert_eq!(code.len(), 8);
    }

    #[test]
    fn test_exhaustion_is_bounded() {
        let mut attempts = 0;
        let err = generate_unique_code(8, |_| {
            attempts += 1;
            Ok(true)
        })
        .unwrap_err();
        assert!(matches!(err, Error::CodeGenerationExhausted(MAX_ATTEMPTS)));
        assert_eq!(attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn test_check_error_propagates() {
        let err = generate_unique_code(8, |_| {
            Err(Error::InvalidArgument("boom".into()))
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
