//! Ring tokens
//!
//! A token is a hash-derived value ordering partitions around a distributed
//! ring. Token ranges approximate partition-key ranges: restricting by token
//! keeps the scan contiguous even when the concrete keys are unknown.
//!
//! The minimum token is a sentinel marking the ring origin. A bound equal to
//! the minimum token behaves as an open end, never as a real position, so
//! open-ended scans at the ring origin are never spuriously emptied.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::expr::Value;

/// A position on the token ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Token(pub i64);

impl Token {
    /// The ring origin sentinel
    pub const MINIMUM: Token = Token(i64::MIN);

    /// Returns true for the ring origin sentinel
    pub fn is_minimum(&self) -> bool {
        *self == Token::MINIMUM
    }

    /// Derives the token of a partition key.
    ///
    /// The key values are serialized deterministically and hashed; the first
    /// eight digest bytes form the token. The minimum token is reserved as a
    /// sentinel and never produced by hashing.
    pub fn for_key(key: &[Value]) -> Token {
        let mut hasher = Sha256::new();
        let encoded = serde_json::to_vec(key).unwrap_or_default();
        hasher.update(&encoded);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let raw = i64::from_be_bytes(bytes);
        if raw == i64::MIN {
            Token(i64::MIN + 1)
        } else {
            Token(raw)
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_minimum() {
            write!(f, "min")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One end of a token interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBound {
    /// Bound position
    pub token: Token,
    /// Whether the bound itself is part of the interval
    pub inclusive: bool,
}

impl TokenBound {
    /// Creates an inclusive bound
    pub fn inclusive(token: Token) -> Self {
        Self {
            token,
            inclusive: true,
        }
    }

    /// Creates an exclusive bound
    pub fn exclusive(token: Token) -> Self {
        Self {
            token,
            inclusive: false,
        }
    }
}

/// A token interval; `None` ends are open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    /// Lower end, open when `None`
    pub start: Option<TokenBound>,
    /// Upper end, open when `None`
    pub end: Option<TokenBound>,
}

impl TokenRange {
    /// The full ring
    pub fn full() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Returns true when the interval cannot contain any token.
    ///
    /// The interval is empty iff both ends are finite and non-minimal and
    /// either start > end, or start == end with at least one exclusive bound.
    /// A bound at the minimum token marks an open end, so it never makes the
    /// interval empty.
    pub fn is_empty(&self) -> bool {
        let (start, end) = match (self.start, self.end) {
            (Some(s), Some(e)) => (s, e),
            _ => return false,
        };
        if start.token.is_minimum() || end.token.is_minimum() {
            return false;
        }
        match start.token.cmp(&end.token) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => !(start.inclusive && end.inclusive),
            std::cmp::Ordering::Less => false,
        }
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(b) => write!(f, "{}{}", if b.inclusive { "[" } else { "(" }, b.token)?,
            None => write!(f, "(")?,
        }
        write!(f, ", ")?;
        match self.end {
            Some(b) => write!(f, "{}{}", b.token, if b.inclusive { "]" } else { ")" }),
            None => write!(f, ")"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: (i64, bool), end: (i64, bool)) -> TokenRange {
        TokenRange {
            start: Some(TokenBound {
                token: Token(start.0),
                inclusive: start.1,
            }),
            end: Some(TokenBound {
                token: Token(end.0),
                inclusive: end.1,
            }),
        }
    }

    #[test]
    fn test_token_hash_deterministic() {
        let key = vec![Value::Int(1), Value::text("x")];
        assert_eq!(Token::for_key(&key), Token::for_key(&key));
        assert_ne!(Token::for_key(&key), Token::for_key(&[Value::Int(2)]));
    }

    #[test]
    fn test_token_hash_never_minimum() {
        for i in 0..64 {
            assert!(!Token::for_key(&[Value::Int(i)]).is_minimum());
        }
    }

    #[test]
    fn test_ordered_interval_not_empty() {
        assert!(!range((1, true), (5, true)).is_empty());
        assert!(!range((1, false), (5, false)).is_empty());
    }

    #[test]
    fn test_inverted_interval_empty() {
        assert!(range((5, true), (1, true)).is_empty());
    }

    #[test]
    fn test_point_interval() {
        assert!(!range((3, true), (3, true)).is_empty());
        assert!(range((3, false), (3, true)).is_empty());
        assert!(range((3, true), (3, false)).is_empty());
        assert!(range((3, false), (3, false)).is_empty());
    }

    #[test]
    fn test_minimum_token_never_empties() {
        // start above end, but end is the ring origin: stays open-ended
        let r = TokenRange {
            start: Some(TokenBound::exclusive(Token(100))),
            end: Some(TokenBound::inclusive(Token::MINIMUM)),
        };
        assert!(!r.is_empty());

        let r = TokenRange {
            start: Some(TokenBound::inclusive(Token::MINIMUM)),
            end: Some(TokenBound::exclusive(Token(-500))),
        };
        assert!(!r.is_empty());
    }

    #[test]
    fn test_open_ended_not_empty() {
        let r = TokenRange {
            start: Some(TokenBound::exclusive(Token(7))),
            end: None,
        };
        assert!(!r.is_empty());
        assert!(!TokenRange::full().is_empty());
    }
}
