//! Random post identifiers.

use rand::Rng;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+-";

/// Characters per identifier. Six bits each, 60 bits total.
pub const ID_LEN: usize = 10;

/// Returns a fresh identifier drawn from the thread-local CSPRNG.
pub fn uniq() -> String {
    let mut bytes = [0u8; ID_LEN];
    rand::rng().fill(&mut bytes[..]);
    bytes
        .iter()
        .map(|b| ALPHABET[(b & 0b11_1111) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_have_fixed_length_and_alphabet() {
        let id = uniq();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids: HashSet<String> = (0..10_000).map(|_| uniq()).collect();
        assert_eq!(ids.len(), 10_000);
    }
}
