//! Field checks shared by the registration, profile and application forms.

/// Loose email shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Phone numbers may contain `+`, `-` and spaces; 7 to 15 digits must remain.
pub fn is_valid_phone(phone: &str) -> bool {
    let stripped: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' '))
        .collect();
    (7..=15).contains(&stripped.len()) && stripped.chars().all(|c| c.is_ascii_digit())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("sita@example.com"));
        assert!(is_valid_email(" sita.sharma@mail.example.np "));
        assert!(!is_valid_email("sita"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("sita@localhost"));
        assert!(!is_valid_email("sita@@example.com"));
        assert!(!is_valid_email("si ta@example.com"));
    }

    #[test]
    fn phone_digits_after_stripping_separators() {
        assert!(is_valid_phone("+977 980-0000000"));
        assert!(is_valid_phone("1234567"));
        assert!(!is_valid_phone("123456"));
        assert!(!is_valid_phone("1234567890123456"));
        assert!(!is_valid_phone("98000abc00"));
        assert!(!is_valid_phone("(980) 0000000"));
    }
}
