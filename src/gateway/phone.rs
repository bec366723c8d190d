//! Brazilian phone-number normalization.
//!
//! The gateway addresses recipients by full international number, but the
//! same subscriber can be registered under either the 10-digit local scheme
//! (DDD + 8) or the 11-digit mobile scheme with the extra ninth digit
//! (DDD + 9). The sender tries the primary form first and falls back to the
//! alternate on an unknown-recipient fault.

use crate::error::GatewayError;

const COUNTRY_PREFIX: &str = "55";

/// Destination number in both addressing schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedNumber {
    /// Full international form of the number as given.
    pub primary: String,
    /// Same subscriber with the ninth digit toggled.
    pub alternate: String,
}

/// Normalize a raw destination into the international form plus its
/// ninth-digit alternate.
///
/// Accepts punctuation and an optional leading country prefix; the national
/// part must be DDD (2 digits) plus 8 or 9 subscriber digits. The 11-digit
/// scheme additionally requires the ninth digit to be 9.
pub fn normalize(raw: &str) -> Result<NormalizedNumber, GatewayError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = match digits.len() {
        12 | 13 if digits.starts_with(COUNTRY_PREFIX) => &digits[2..],
        10 | 11 => digits.as_str(),
        _ => return Err(GatewayError::InvalidNumber(raw.to_string())),
    };

    let (ddd, subscriber) = national.split_at(2);

    let alternate_national = match subscriber.len() {
        8 => format!("{}9{}", ddd, subscriber),
        9 => {
            if !subscriber.starts_with('9') {
                return Err(GatewayError::InvalidNumber(raw.to_string()));
            }
            format!("{}{}", ddd, &subscriber[1..])
        }
        _ => return Err(GatewayError::InvalidNumber(raw.to_string())),
    };

    Ok(NormalizedNumber {
        primary: format!("{}{}", COUNTRY_PREFIX, national),
        alternate: format!("{}{}", COUNTRY_PREFIX, alternate_national),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleven_digit_mobile() {
        let n = normalize("11987654321").unwrap();
        assert_eq!(n.primary, "5511987654321");
        assert_eq!(n.alternate, "551187654321");
    }

    #[test]
    fn test_ten_digit_gains_ninth_digit_in_alternate() {
        let n = normalize("1187654321").unwrap();
        assert_eq!(n.primary, "551187654321");
        assert_eq!(n.alternate, "5511987654321");
    }

    #[test]
    fn test_country_prefix_and_punctuation_stripped() {
        let n = normalize("+55 (11) 98765-4321").unwrap();
        assert_eq!(n.primary, "5511987654321");
    }

    #[test]
    fn test_eleven_digits_without_ninth_digit_rejected() {
        assert!(matches!(
            normalize("11887654321"),
            Err(GatewayError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_wrong_length_rejected() {
        for raw in ["123", "119876543210000", ""] {
            assert!(matches!(
                normalize(raw),
                Err(GatewayError::InvalidNumber(_))
            ));
        }
    }
}
