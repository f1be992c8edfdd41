use rand::seq::IndexedRandom;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// Length of generated workspace passwords.
pub const PASSWORD_LEN: usize = 24;

/// Fresh random password for a workspace login.
pub fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LEN)
        .filter_map(|_| CHARSET.choose(&mut rng).map(|&b| char::from(b)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_shape() {
        let password = generate_password();
        assert_eq!(password.len(), PASSWORD_LEN);
        assert!(password.bytes().all(|b| CHARSET.contains(&b)));
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(), generate_password());
    }
}
