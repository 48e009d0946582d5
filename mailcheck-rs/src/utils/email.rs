use crate::error::{MailCheckError, Result};

/// Basic email validation
pub fn validate_email(email: &str) -> Result<()> {
    extract_domain(email).map(|_| ())
}

/// Return the normalized domain part of an address
///
/// The address is split at its last `@`. The domain is lowercased and a
/// trailing root dot is dropped.
pub fn extract_domain(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(MailCheckError::InvalidEmail("Email is empty".to_string()));
    }

    let (local, domain) = email.rsplit_once('@').ok_or_else(|| {
        MailCheckError::InvalidEmail(format!("{}: email must contain @", email))
    })?;

    if local.is_empty() || domain.is_empty() {
        return Err(MailCheckError::InvalidEmail(format!(
            "{}: email parts cannot be empty",
            email
        )));
    }

    let domain = normalize_domain(domain);

    if domain.chars().any(char::is_whitespace) || domain.contains('@') {
        return Err(MailCheckError::InvalidEmail(format!(
            "{}: domain contains invalid characters",
            email
        )));
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.contains("..") {
        return Err(MailCheckError::InvalidEmail(format!(
            "{}: domain must contain a dot",
            email
        )));
    }

    Ok(domain)
}

/// Lowercase a host name and strip the trailing root dot
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}

/// Split pasted or uploaded text into addresses
///
/// Entries may be separated by newlines, commas or semicolons. Blank
/// entries are skipped, as is a leading `email` header line.
pub fn split_email_list(text: &str) -> Vec<String> {
    let mut emails: Vec<String> = text
        .split(['\n', '\r', ',', ';'])
        .map(|e| e.trim().trim_matches('"').trim())
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect();

    if emails
        .first()
        .map(|first| first.eq_ignore_ascii_case("email"))
        .unwrap_or(false)
    {
        emails.remove(0);
    }

    emails
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("user.name@example.co.uk").is_ok());
    }

    #[test]
    fn test_invalid_email() {
        assert!(validate_email("").is_err());
        assert!(validate_email("test").is_err());
        assert!(validate_email("test@").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("test@domain").is_err());
        assert!(validate_email("test@exa mple.com").is_err());
    }

    #[test]
    fn test_extract_domain_normalizes() {
        assert_eq!(extract_domain("a@X.COM").unwrap(), "x.com");
        assert_eq!(extract_domain("  a@example.org.  ").unwrap(), "example.org");
        assert_eq!(extract_domain("\"a@b\"@example.net").unwrap(), "example.net");
    }

    #[test]
    fn test_extract_domain_error_kind() {
        assert!(matches!(
            extract_domain("bad-email"),
            Err(MailCheckError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_split_email_list() {
        let text = "email\r\na@x.com, b@y.com;c@z.com\n\n \"d@w.com\" \n";
        assert_eq!(
            split_email_list(text),
            vec!["a@x.com", "b@y.com", "c@z.com", "d@w.com"]
        );
        assert!(split_email_list(" \n,;").is_empty());
    }
}
