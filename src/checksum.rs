//! Verhoeff checksum validation for concept identifiers.
//!
//! Every identifier accepted by the batch import parser must carry a valid
//! Verhoeff check digit as its last digit. Validation is a pure function and
//! never panics: malformed input is simply invalid.

/// Dihedral group D5 multiplication table.
const D: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

/// Position-dependent permutation table.
const P: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

/// Multiplicative inverses in D5.
const INV: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

fn digits(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() {
        return None;
    }
    s.bytes()
        .map(|b| if b.is_ascii_digit() { Some(b - b'0') } else { None })
        .collect()
}

/// Computes the Verhoeff check digit for `payload`.
///
/// Returns `None` if the payload is empty or contains a non-digit.
#[must_use]
pub fn compute_check_digit(payload: &str) -> Option<u8> {
    let digits = digits(payload)?;
    let mut c = 0u8;
    for (i, &digit) in digits.iter().rev().enumerate() {
        c = D[usize::from(c)][usize::from(P[(i + 1) % 8][usize::from(digit)])];
    }
    Some(INV[usize::from(c)])
}

/// Returns true if the last digit of `s` is the Verhoeff check digit of the
/// digits before it.
///
/// Strings shorter than two characters, or containing anything other than
/// ASCII digits, are invalid.
///
/// # Examples
///
/// ```
/// use authoring::checksum::is_valid_checksum;
///
/// assert!(is_valid_checksum("64572001"));
/// assert!(!is_valid_checksum("64572002"));
/// assert!(!is_valid_checksum(""));
/// ```
#[must_use]
pub fn is_valid_checksum(s: &str) -> bool {
    if s.len() < 2 {
        return false;
    }
    let Some(digits) = digits(s) else {
        return false;
    };
    let mut c = 0u8;
    for (i, &digit) in digits.iter().rev().enumerate() {
        c = D[usize::from(c)][usize::from(P[i % 8][usize::from(digit)])];
    }
    c == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_GOOD: &[&str] = &[
        "64572001",
        "363698007",
        "38848004",
        "116676008",
        "24551003",
        "246454002",
        "255399007",
        "116680003",
        "138875005",
        "410662002",
        "900000000000207008",
        "2363",
    ];

    const KNOWN_BAD: &[&str] = &[
        "64572002",
        "363698008",
        "38848005",
        "116676009",
        "12345",
    ];

    #[test]
    fn accepts_known_good_identifiers() {
        for id in KNOWN_GOOD {
            assert!(is_valid_checksum(id), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_known_bad_identifiers() {
        for id in KNOWN_BAD {
            assert!(!is_valid_checksum(id), "{id} should be invalid");
        }
    }

    #[test]
    fn malformed_input_is_invalid_not_a_panic() {
        assert!(!is_valid_checksum(""));
        assert!(!is_valid_checksum("0"));
        assert!(!is_valid_checksum("6457200a"));
        assert!(!is_valid_checksum(" 64572001"));
        assert!(!is_valid_checksum("64572001 "));
        assert!(!is_valid_checksum("６４"));
        assert_eq!(compute_check_digit(""), None);
        assert_eq!(compute_check_digit("12x"), None);
    }

    #[test]
    fn check_digit_matches_validation() {
        assert_eq!(compute_check_digit("236"), Some(3));
        assert_eq!(compute_check_digit("6457200"), Some(1));
        assert_eq!(compute_check_digit("11668000"), Some(3));

        for id in KNOWN_GOOD {
            let (payload, check) = id.split_at(id.len() - 1);
            let expected = check.parse::<u8>().unwrap();
            assert_eq!(compute_check_digit(payload), Some(expected), "{id}");
        }
    }

    #[test]
    fn every_single_digit_substitution_is_detected() {
        let id = "116676008";
        for pos in 0..id.len() {
            for replacement in b'0'..=b'9' {
                let mut bytes = id.as_bytes().to_vec();
                if bytes[pos] == replacement {
                    continue;
                }
                bytes[pos] = replacement;
                let mutated = String::from_utf8(bytes).unwrap();
                assert!(!is_valid_checksum(&mutated), "{mutated} slipped through");
            }
        }
    }

    #[test]
    fn adjacent_transpositions_are_detected() {
        let id = "246454002";
        let bytes = id.as_bytes();
        for pos in 0..bytes.len() - 1 {
            if bytes[pos] == bytes[pos + 1] {
                continue;
            }
            let mut swapped = bytes.to_vec();
            swapped.swap(pos, pos + 1);
            let mutated = String::from_utf8(swapped).unwrap();
            assert!(!is_valid_checksum(&mutated), "{mutated} slipped through");
        }
    }
}
