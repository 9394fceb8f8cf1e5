//! Golden checksum vectors.
//!
//! The issuing tool and every validator build must produce exactly these
//! checksums. A change here invalidates every code already handed out.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use entitle_core::{compute_checksum, CodeType, CHECKSUM_VERSION};

/// A known base code and the checksum it must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumVector {
    pub name: String,
    pub code_type: CodeType,
    /// Prefix plus payload (10 characters).
    pub base: String,
    /// First four hex digits of SHA-256(base).
    pub digest_prefix: String,
    pub checksum: String,
}

impl ChecksumVector {
    fn new(
        name: &str,
        code_type: CodeType,
        base: &str,
        digest_prefix: &str,
        checksum: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            code_type,
            base: base.to_string(),
            digest_prefix: digest_prefix.to_string(),
            checksum: checksum.to_string(),
        }
    }

    /// The full 12-character code.
    pub fn code(&self) -> String {
        format!("{}{}", self.base, self.checksum)
    }
}

/// Checksum algorithm version these vectors were recorded against.
pub const VECTORS_VERSION: u32 = 1;

/// All golden vectors.
pub fn all_vectors() -> Vec<ChecksumVector> {
    vec![
        ChecksumVector::new("reviewer", CodeType::Reviewer, "RV3F7K9P2Q", "79e9", "HB"),
        ChecksumVector::new("reviewer repeated", CodeType::Reviewer, "RVAAAAAAAA", "aecb", "RB"),
        ChecksumVector::new("press", CodeType::Press, "PR3F7K9P2Q", "9d2b", "DB"),
        ChecksumVector::new("press digits", CodeType::Press, "PR23456789", "1b75", "2A"),
        ChecksumVector::new("demo", CodeType::Demo, "DMABCDEFGH", "587c", "AB"),
        ChecksumVector::new("demo tail", CodeType::Demo, "DMKMNPQRST", "8043", "RA"),
        ChecksumVector::new("unlimited", CodeType::Unlimited, "UNZZZZZZZZ", "fa13", "7A"),
        ChecksumVector::new("unlimited mid", CodeType::Unlimited, "UNHJKLMNPQ", "80a7", "3A"),
        ChecksumVector::new("special access", CodeType::SpecialAccess, "SAWXYZ2345", "f69f", "PB"),
        ChecksumVector::new("special nines", CodeType::SpecialAccess, "SA99999999", "dacd", "SB"),
    ]
}

/// Check one vector against the current implementation.
pub fn verify_vector(vector: &ChecksumVector) -> Result<(), String> {
    let digest = hex::encode(Sha256::digest(vector.base.as_bytes()));
    if !digest.starts_with(&vector.digest_prefix) {
        return Err(format!(
            "{}: digest prefix {} != {}",
            vector.name,
            &digest[..4],
            vector.digest_prefix
        ));
    }

    let checksum = compute_checksum(&vector.base);
    if checksum != vector.checksum {
        return Err(format!(
            "{}: checksum {} != {}",
            vector.name, checksum, vector.checksum
        ));
    }
    Ok(())
}

/// Whether the vectors still describe the checksum algorithm in use.
pub fn vectors_current() -> bool {
    VECTORS_VERSION == CHECKSUM_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitle_core::validate_format;

    #[test]
    fn test_all_vectors_verify() {
        assert!(vectors_current());
        for vector in all_vectors() {
            verify_vector(&vector).unwrap();
        }
    }

    #[test]
    fn test_vector_codes_validate() {
        for vector in all_vectors() {
            let code = validate_format(&vector.code()).unwrap();
            assert_eq!(code.code_type(), vector.code_type, "{}", vector.name);
        }
    }

    #[test]
    fn test_vectors_serialize() {
        let json = serde_json::to_string_pretty(&all_vectors()).unwrap();
        let parsed: Vec<ChecksumVector> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), all_vectors().len());
        assert!(json.contains("\"specialAccess\""));
    }
}
