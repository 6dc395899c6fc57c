//! Reversible substitution cipher used to frame identities before they go into a barcode.
//!
//! This is obfuscation only. The local part is shifted through a fixed character set and
//! wrapped in prefix/suffix literals, the remote part follows a two character separator.

use crate::config::CipherConfig;
use crate::error::{GhostmarkError, Result};
use std::fmt;

/// A framed, shifted identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherPayload {
    wire: String,
}

impl CipherPayload {
    pub fn as_str(&self) -> &str {
        &self.wire
    }

    pub fn into_string(self) -> String {
        self.wire
    }
}

impl fmt::Display for CipherPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire)
    }
}

#[derive(Debug, Clone)]
pub struct SubstitutionCipher {
    charset: Vec<char>,
    shift: usize,
    prefix: String,
    suffix: String,
    separator: String,
    default_domain: String,
}

impl SubstitutionCipher {
    pub fn new(config: &CipherConfig) -> Self {
        let charset: Vec<char> = config.charset.chars().collect();
        let shift = if charset.is_empty() {
            0
        } else {
            config.shift % charset.len()
        };
        Self {
            charset,
            shift,
            prefix: config.prefix.clone(),
            suffix: config.suffix.clone(),
            separator: config.separator.clone(),
            default_domain: config.default_domain.clone(),
        }
    }

    pub fn charset_len(&self) -> usize {
        self.charset.len()
    }

    pub fn encode(&self, identity: &str) -> CipherPayload {
        let (local, domain) = match identity.split_once('@') {
            Some((local, domain)) => (local, domain),
            None => (identity, self.default_domain.as_str()),
        };

        let wire = format!(
            "{}{}{}{}{}",
            self.prefix,
            self.shift_text(local, self.shift),
            self.suffix,
            self.separator,
            self.shift_text(domain, self.shift),
        );
        CipherPayload { wire }
    }

    pub fn decode(&self, payload: &str) -> Result<String> {
        let (framed, domain) = match payload.split_once(self.separator.as_str()) {
            Some((framed, domain)) => (framed, Some(domain)),
            None => (payload, None),
        };

        let local = framed
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_suffix(self.suffix.as_str()))
            .ok_or_else(|| {
                GhostmarkError::MalformedPayload(format!(
                    "expected payload framed by '{}' and '{}'",
                    self.prefix, self.suffix
                ))
            })?;

        let local = self.shift_text(local, self.reverse_shift());
        let domain = match domain {
            Some(domain) => self.shift_text(domain, self.reverse_shift()),
            None => self.default_domain.clone(),
        };
        Ok(format!("{local}@{domain}"))
    }

    fn reverse_shift(&self) -> usize {
        if self.charset.is_empty() {
            0
        } else {
            self.charset.len() - self.shift
        }
    }

    fn shift_text(&self, text: &str, by: usize) -> String {
        text.chars()
            .map(|c| match self.charset.iter().position(|&x| x == c) {
                Some(index) => self.charset[(index + by) % self.charset.len()],
                None => c,
            })
            .collect()
    }
}
