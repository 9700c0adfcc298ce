//! Utility functions

pub fn mask_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let (local, domain) = email.split_at(at_pos);
        let keep: String = local.chars().take(if local.chars().count() <= 2 { 1 } else { 2 }).collect();
        format!("{}***{}", keep, domain)
    } else {
        "***".to_string()
    }
}

/// Keeps only the last three digits of a phone number for log output.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 3 {
        return "***".to_string();
    }
    let tail: String = digits[digits.len() - 3..].iter().collect();
    format!("***{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("budi@example.com"), "bu***@example.com");
        assert_eq!(mask_email("a@example.com"), "a***@example.com");
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+62 812-3456-7890"), "***890");
        assert_eq!(mask_phone("12"), "***");
    }
}
