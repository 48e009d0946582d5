//! DKIM key record parsing (RFC 6376 section 3.6.1)
//!
//! DKIM keys live at `{selector}._domainkey.{domain}`. Only one selector is
//! queried per domain, so a missing record does not prove the domain lacks
//! DKIM; callers report that case as unknown.

use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DkimParseError {
    #[error("malformed tag: {0}")]
    MalformedTag(String),
    #[error("duplicate tag: {0}")]
    DuplicateTag(String),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),
    #[error("v= tag must come first")]
    VersionNotFirst,
    #[error("missing public key (p=)")]
    MissingKey,
    #[error("key has been revoked (empty p=)")]
    Revoked,
}

/// Parsed DKIM key record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimKey {
    /// Key type (`k=`), defaults to "rsa"
    pub key_type: String,
    /// Base64 public key data with whitespace removed
    pub public_key: String,
    /// Acceptable hash algorithms (`h=`)
    pub hash_algorithms: Vec<String>,
    /// Flags (`t=`), e.g. "y" for testing mode
    pub flags: Vec<String>,
}

impl DkimKey {
    /// Domain is testing DKIM (`t=y`)
    pub fn is_testing(&self) -> bool {
        self.flags.iter().any(|f| f == "y")
    }
}

/// Location of the key record for a selector
pub fn dkim_record_name(selector: &str, domain: &str) -> String {
    format!("{}._domainkey.{}", selector, domain)
}

/// Split a `tag=value; tag=value` list
///
/// Whitespace inside values is removed, matching how DKIM folds keys.
pub(crate) fn parse_tag_list(record: &str) -> Result<Vec<(String, String)>, DkimParseError> {
    let mut tags = Vec::new();
    let mut seen = HashSet::new();

    for pair in record.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| DkimParseError::MalformedTag(pair.to_string()))?;
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(DkimParseError::MalformedTag(pair.to_string()));
        }
        if !seen.insert(name.clone()) {
            return Err(DkimParseError::DuplicateTag(name));
        }

        let value: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        tags.push((name, value));
    }

    Ok(tags)
}

/// Parse a DKIM key record
///
/// `v=` is optional but when present must be the first tag and equal
/// `DKIM1`. `p=` is required; an empty value means the key was revoked.
pub fn parse_dkim(record: &str) -> Result<DkimKey, DkimParseError> {
    let tags = parse_tag_list(record)?;

    if let Some(pos) = tags.iter().position(|(name, _)| name == "v") {
        if pos != 0 {
            return Err(DkimParseError::VersionNotFirst);
        }
        if tags[pos].1 != "DKIM1" {
            return Err(DkimParseError::UnsupportedVersion(tags[pos].1.clone()));
        }
    }

    let mut key = DkimKey {
        key_type: "rsa".to_string(),
        public_key: String::new(),
        hash_algorithms: Vec::new(),
        flags: Vec::new(),
    };
    let mut has_key = false;

    for (name, value) in tags {
        match name.as_str() {
            "p" => {
                has_key = true;
                key.public_key = value;
            }
            "k" => key.key_type = value.to_lowercase(),
            "h" => key.hash_algorithms = split_colon_list(&value),
            "t" => key.flags = split_colon_list(&value),
            _ => {}
        }
    }

    if !has_key {
        return Err(DkimParseError::MissingKey);
    }
    if key.public_key.is_empty() {
        return Err(DkimParseError::Revoked);
    }

    Ok(key)
}

fn split_colon_list(value: &str) -> Vec<String> {
    value
        .split(':')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dkim_record_name() {
        assert_eq!(
            dkim_record_name("default", "example.com"),
            "default._domainkey.example.com"
        );
    }

    #[test]
    fn test_parse_dkim_record() {
        let key = parse_dkim("v=DKIM1; k=rsa; p=MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQ").unwrap();
        assert_eq!(key.key_type, "rsa");
        assert_eq!(key.public_key, "MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQ");
        assert!(!key.is_testing());
    }

    #[test]
    fn test_parse_dkim_folded_key_and_flags() {
        let key = parse_dkim("v=DKIM1; k=ed25519; t=y:s; p=11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo= ").unwrap();
        assert_eq!(key.key_type, "ed25519");
        assert!(key.is_testing());
        assert_eq!(key.flags, vec!["y", "s"]);

        let key = parse_dkim("p=MIGf MA0G\tCSqG").unwrap();
        assert_eq!(key.public_key, "MIGfMA0GCSqG");
    }

    #[test]
    fn test_parse_dkim_without_version() {
        assert!(parse_dkim("k=rsa; p=MIGfMA0").is_ok());
    }

    #[test]
    fn test_parse_dkim_errors() {
        assert_eq!(parse_dkim("v=DKIM1; p="), Err(DkimParseError::Revoked));
        assert_eq!(parse_dkim("v=DKIM1; k=rsa"), Err(DkimParseError::MissingKey));
        assert_eq!(
            parse_dkim("k=rsa; v=DKIM1; p=abc"),
            Err(DkimParseError::VersionNotFirst)
        );
        assert_eq!(
            parse_dkim("v=DKIM2; p=abc"),
            Err(DkimParseError::UnsupportedVersion("DKIM2".to_string()))
        );
        assert!(matches!(
            parse_dkim("hello world"),
            Err(DkimParseError::MalformedTag(_))
        ));
        assert!(matches!(
            parse_dkim("p=abc; p=def"),
            Err(DkimParseError::DuplicateTag(_))
        ));
    }
}
