use rand::Rng;

use crate::constants::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN};

/// Generate a random human-shareable room code, e.g. `ABC123`.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form used for lookups: trimmed and uppercased.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn codes_are_six_alphanumeric_uppercase_chars() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1000 {
            let code = generate_room_code(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_cover_the_whole_alphabet() {
        let mut rng = StdRng::seed_from_u64(10);
        let seen: HashSet<char> = (0..500).flat_map(|_| generate_room_code(&mut rng).chars().collect::<Vec<_>>()).collect();
        assert_eq!(seen.len(), 36);
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_room_code("  ab12cd "), "AB12CD");
    }
}
