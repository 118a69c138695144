use regex::Regex;

/// Phone numbers: optional leading "+", 10-15 digits.
pub fn validate_phone(phone: &str) -> bool {
    let re = Regex::new(r"^\+?\d{10,15}$").unwrap();
    re.is_match(phone.trim())
}

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    re.is_match(email)
}

/// Arithmetic mean over review ratings. Zero reviews means 0.0.
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64
}

/// The displayed form: mean rounded to one decimal.
pub fn display_rating(ratings: &[i32]) -> f64 {
    (average_rating(ratings) * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_phone_numbers() {
        assert!(validate_phone("+23051234567"));
        assert!(validate_phone("2305123456"));
        assert!(validate_phone("123456789012345"));
        assert!(validate_phone("  +23051234567  "));
    }

    #[test]
    fn rejects_invalid_phone_numbers() {
        assert!(!validate_phone("123456789")); // too short
        assert!(!validate_phone("1234567890123456")); // too long
        assert!(!validate_phone("+230 5123 4567")); // spaces inside
        assert!(!validate_phone("230-512-3456"));
        assert!(!validate_phone("++23051234567"));
        assert!(!validate_phone(""));
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("rider@example.com"));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
    }

    #[test]
    fn average_of_no_ratings_is_zero() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(display_rating(&[]), 0.0);
    }

    #[test]
    fn average_is_arithmetic_mean() {
        assert_eq!(average_rating(&[4]), 4.0);
        assert_eq!(average_rating(&[1, 2, 3, 4, 5]), 3.0);
        assert_eq!(average_rating(&[5, 4]), 4.5);
    }

    #[test]
    fn display_rounds_to_one_decimal() {
        // 2/3 -> 3.666... -> 3.7
        assert_eq!(display_rating(&[3, 4, 4]), 3.7);
        assert_eq!(display_rating(&[5, 4, 4]), 4.3);
        assert_eq!(display_rating(&[1, 1, 2]), 1.3);
    }
}
