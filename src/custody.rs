//! Chain-of-custody ledger.
//!
//! Each successfully fetched page is recorded with the SHA-256 of its raw
//! response bytes. The ledger's master hash is the SHA-256 of all page digests
//! concatenated in fetch order with no delimiter. Every digest is exactly
//! [`DIGEST_HEX_LEN`] lowercase hex characters, which is what makes the
//! undelimited concatenation unambiguous. Reordering pages changes the master
//! hash.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const DIGEST_HEX_LEN: usize = 64;
pub const TOKEN_SCOPE: &str = "Chat.Read";
pub const EXPORT_METHOD: &str = "Microsoft Graph API v1.0";
pub const CAPTURE_METHOD: &str = "Microsoft Graph API";
pub const RESPONSIBLE_PARTY: &str = "Automated Export System";

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHashRecord {
    pub page: usize,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    pub response_hash: String,
    pub messages_count: usize,
}

impl PageHashRecord {
    pub fn new(page: usize, url: &str, status_code: u16, raw: &[u8], messages_count: usize) -> Self {
        Self {
            page,
            url: url.to_string(),
            timestamp: Utc::now(),
            status_code,
            response_hash: sha256_hex(raw),
            messages_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: Uuid,
    pub chat_id: String,
    pub export_timestamp: DateTime<Utc>,
    pub api_endpoint: String,
    pub token_scope: String,
    pub user_agent: String,
    pub export_method: String,
}

impl SessionMetadata {
    pub fn start(chat_id: &str) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            chat_id: chat_id.to_string(),
            export_timestamp: Utc::now(),
            api_endpoint: format!("/chats/{chat_id}/messages"),
            token_scope: TOKEN_SCOPE.to_string(),
            user_agent: CAPTURE_METHOD.to_string(),
            export_method: EXPORT_METHOD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyLedger {
    pub page_hashes: Vec<PageHashRecord>,
    pub session_metadata: SessionMetadata,
    pub total_messages: usize,
    pub total_pages: usize,
    pub export_completion_time: DateTime<Utc>,
    pub responsible_party: String,
    pub capture_method: String,
    pub master_hash: String,
}

impl CustodyLedger {
    pub fn build(
        page_hashes: Vec<PageHashRecord>,
        session_metadata: SessionMetadata,
        total_messages: usize,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let master_hash = master_hash(&page_hashes);
        Self {
            total_pages: page_hashes.len(),
            page_hashes,
            session_metadata,
            total_messages,
            export_completion_time: completed_at,
            responsible_party: RESPONSIBLE_PARTY.to_string(),
            capture_method: CAPTURE_METHOD.to_string(),
            master_hash,
        }
    }

    /// Re-check the ledger's internal consistency. Empty means consistent.
    pub fn verify(&self) -> Vec<Discrepancy> {
        let mut found = Vec::new();

        for (i, record) in self.page_hashes.iter().enumerate() {
            if record.page != i + 1 {
                found.push(Discrepancy::PageNumbering {
                    position: i + 1,
                    recorded: record.page,
                });
            }
            if !is_digest(&record.response_hash) {
                found.push(Discrepancy::MalformedDigest { page: record.page });
            }
        }

        if self.total_pages != self.page_hashes.len() {
            found.push(Discrepancy::PageCount {
                recorded: self.total_pages,
                actual: self.page_hashes.len(),
            });
        }

        let summed: usize = self.page_hashes.iter().map(|p| p.messages_count).sum();
        if self.total_messages != summed {
            found.push(Discrepancy::MessageCount {
                recorded: self.total_messages,
                actual: summed,
            });
        }

        let expected = master_hash(&self.page_hashes);
        if self.master_hash != expected {
            found.push(Discrepancy::MasterHash {
                recorded: self.master_hash.clone(),
                expected,
            });
        }

        found
    }
}

pub fn master_hash(pages: &[PageHashRecord]) -> String {
    let combined: String = pages.iter().map(|p| p.response_hash.as_str()).collect();
    sha256_hex(combined.as_bytes())
}

fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    PageNumbering { position: usize, recorded: usize },
    MalformedDigest { page: usize },
    PageCount { recorded: usize, actual: usize },
    MessageCount { recorded: usize, actual: usize },
    MasterHash { recorded: String, expected: String },
}

impl std::fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discrepancy::PageNumbering { position, recorded } => {
                write!(f, "record #{position} is numbered page {recorded}")
            }
            Discrepancy::MalformedDigest { page } => {
                write!(f, "page {page} digest is not a 64-character lowercase hex string")
            }
            Discrepancy::PageCount { recorded, actual } => {
                write!(f, "total_pages is {recorded} but {actual} pages are recorded")
            }
            Discrepancy::MessageCount { recorded, actual } => {
                write!(f, "total_messages is {recorded} but pages sum to {actual}")
            }
            Discrepancy::MasterHash { recorded, expected } => {
                write!(f, "master hash {recorded} does not match recomputed {expected}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(page: usize, body: &str, count: usize) -> PageHashRecord {
        PageHashRecord::new(page, &format!("https://x/p{page}"), 200, body.as_bytes(), count)
    }

    fn ledger(pages: Vec<PageHashRecord>) -> CustodyLedger {
        let total = pages.iter().map(|p| p.messages_count).sum();
        CustodyLedger::build(pages, SessionMetadata::start("19:abc"), total, Utc::now())
    }

    #[test]
    fn digest_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn master_hash_is_hash_of_concatenated_digests() {
        let pages = vec![record(1, "one", 2), record(2, "two", 1), record(3, "three", 0)];
        let concatenated = format!(
            "{}{}{}",
            sha256_hex(b"one"),
            sha256_hex(b"two"),
            sha256_hex(b"three")
        );
        let ledger = ledger(pages);
        assert_eq!(ledger.master_hash, sha256_hex(concatenated.as_bytes()));
        assert_eq!(ledger.total_pages, 3);
        assert_eq!(ledger.total_messages, 3);
    }

    #[test]
    fn master_hash_is_order_sensitive() {
        let a = vec![record(1, "one", 1), record(2, "two", 1)];
        let b = vec![record(1, "two", 1), record(2, "one", 1)];
        assert_ne!(master_hash(&a), master_hash(&b));
    }

    #[test]
    fn master_hash_is_deterministic() {
        let a = vec![record(1, "one", 1), record(2, "two", 1)];
        let b = a.clone();
        assert_eq!(master_hash(&a), master_hash(&b));
    }

    #[test]
    fn fresh_ledger_verifies() {
        let ledger = ledger(vec![record(1, "one", 5), record(2, "two", 0)]);
        assert!(ledger.verify().is_empty());
    }

    #[test]
    fn tampering_is_reported() {
        let mut ledger = ledger(vec![record(1, "one", 5), record(2, "two", 3)]);
        ledger.page_hashes[1].response_hash = sha256_hex(b"forged");
        ledger.total_messages = 9;
        let found = ledger.verify();
        assert!(found.iter().any(|d| matches!(d, Discrepancy::MasterHash { .. })));
        assert!(found.contains(&Discrepancy::MessageCount {
            recorded: 9,
            actual: 8
        }));
    }

    #[test]
    fn malformed_digest_and_numbering_are_reported() {
        let mut ledger = ledger(vec![record(1, "one", 1), record(2, "two", 1)]);
        ledger.page_hashes[0].response_hash = "ABC".into();
        ledger.page_hashes[1].page = 7;
        ledger.master_hash = master_hash(&ledger.page_hashes);
        let found = ledger.verify();
        assert!(found.contains(&Discrepancy::MalformedDigest { page: 1 }));
        assert!(found.contains(&Discrepancy::PageNumbering {
            position: 2,
            recorded: 7
        }));
        assert!(!found.iter().any(|d| matches!(d, Discrepancy::MasterHash { .. })));
    }

    #[test]
    fn ledger_survives_json_round_trip() {
        let ledger = ledger(vec![record(1, "one", 1)]);
        let json = serde_json::to_string(&ledger).unwrap();
        let back: CustodyLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
        assert!(back.verify().is_empty());
    }
}
