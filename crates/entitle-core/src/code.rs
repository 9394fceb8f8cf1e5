//! Access code format, checksum, and issuing.
//!
//! A code is exactly twelve characters from a 32-symbol alphabet that omits
//! visually ambiguous glyphs (`0`, `1`, `O`, `I`):
//!
//! ```text
//!   RV 3F7K9P2Q HB
//!   ── ──────── ──
//!   │  │        └─ checksum over the first ten characters
//!   │  └────────── random payload
//!   └───────────── type prefix
//! ```
//!
//! The checksum catches transcription errors. It is not a signature: anyone
//! holding this module can mint a valid code. Redemption limits live in the
//! store, not in the code string.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FormatError, Result};
use crate::feature::{FeatureSet, PremiumFeature};
use crate::time::DAY_MS;

/// The code alphabet. The index of a symbol is its checksum value.
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of the type prefix.
pub const PREFIX_LEN: usize = 2;

/// Length of the random payload.
pub const PAYLOAD_LEN: usize = 8;

/// Length of the trailing checksum.
pub const CHECKSUM_LEN: usize = 2;

/// Total length of a normalized code.
pub const CODE_LEN: usize = PREFIX_LEN + PAYLOAD_LEN + CHECKSUM_LEN;

/// Version of the checksum algorithm implemented by [`compute_checksum`].
///
/// Bumping this invalidates every code already in circulation.
pub const CHECKSUM_VERSION: u32 = 1;

/// The family a code belongs to. Determines its default grant parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodeType {
    Reviewer,
    Press,
    Demo,
    Unlimited,
    SpecialAccess,
}

impl CodeType {
    /// Every code type.
    pub const ALL: [CodeType; 5] = [
        CodeType::Reviewer,
        CodeType::Press,
        CodeType::Demo,
        CodeType::Unlimited,
        CodeType::SpecialAccess,
    ];

    /// The two-character prefix identifying this type.
    pub const fn prefix(self) -> &'static str {
        match self {
            CodeType::Reviewer => "RV",
            CodeType::Press => "PR",
            CodeType::Demo => "DM",
            CodeType::Unlimited => "UN",
            CodeType::SpecialAccess => "SA",
        }
    }

    /// Look up a type by its prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }

    /// Validity window from first redemption, `None` if the type never expires.
    pub const fn duration_days(self) -> Option<u32> {
        match self {
            CodeType::Reviewer => Some(30),
            CodeType::Press => Some(90),
            CodeType::Demo => Some(7),
            CodeType::Unlimited => None,
            CodeType::SpecialAccess => Some(365),
        }
    }

    /// Maximum number of activations, `None` if unlimited.
    pub const fn usage_limit(self) -> Option<u32> {
        match self {
            CodeType::Reviewer => Some(50),
            CodeType::Press => Some(25),
            CodeType::Demo => Some(1),
            CodeType::Unlimited => None,
            CodeType::SpecialAccess => Some(1),
        }
    }

    /// Features granted by this type when nothing overrides them.
    pub fn default_features(self) -> FeatureSet {
        match self {
            CodeType::Reviewer | CodeType::Unlimited | CodeType::SpecialAccess => {
                PremiumFeature::all()
            }
            CodeType::Press => [
                PremiumFeature::GrowthPathCollections,
                PremiumFeature::AdvancedIllustrations,
            ]
            .into_iter()
            .collect(),
            CodeType::Demo => [
                PremiumFeature::UnlimitedStoryGeneration,
                PremiumFeature::GrowthPathCollections,
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Stable identifier used for persistence.
    pub const fn as_str(self) -> &'static str {
        match self {
            CodeType::Reviewer => "reviewer",
            CodeType::Press => "press",
            CodeType::Demo => "demo",
            CodeType::Unlimited => "unlimited",
            CodeType::SpecialAccess => "specialAccess",
        }
    }

    /// Parse the persisted identifier.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structurally valid, checksum-verified access code.
///
/// Immutable once created. Obtain one from [`validate_format`], or from
/// [`AccessCode::from_parts`] when loading a previously persisted record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCode {
    code: String,
    code_type: CodeType,
    granted_features: FeatureSet,
    duration_days: Option<u32>,
    usage_limit: Option<u32>,
}

impl AccessCode {
    /// Build a code with the default parameters of its type.
    fn with_type_defaults(code: String, code_type: CodeType) -> Self {
        Self {
            code,
            code_type,
            granted_features: code_type.default_features(),
            duration_days: code_type.duration_days(),
            usage_limit: code_type.usage_limit(),
        }
    }

    /// Reassemble a code from persisted fields. Performs no validation.
    pub fn from_parts(
        code: String,
        code_type: CodeType,
        granted_features: FeatureSet,
        duration_days: Option<u32>,
        usage_limit: Option<u32>,
    ) -> Self {
        Self {
            code,
            code_type,
            granted_features,
            duration_days,
            usage_limit,
        }
    }

    /// Replace the granted features. Only meaningful for `SpecialAccess` codes,
    /// whose features come from the synced code list rather than the prefix.
    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.granted_features = features;
        self
    }

    /// The normalized code string.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn code_type(&self) -> CodeType {
        self.code_type
    }

    pub fn granted_features(&self) -> &FeatureSet {
        &self.granted_features
    }

    pub fn duration_days(&self) -> Option<u32> {
        self.duration_days
    }

    pub fn usage_limit(&self) -> Option<u32> {
        self.usage_limit
    }

    /// When a code redeemed at `redeemed_at` stops being valid.
    pub fn expires_at(&self, redeemed_at: i64) -> Option<i64> {
        self.duration_days
            .map(|days| redeemed_at.saturating_add(i64::from(days) * DAY_MS))
    }

    /// A form of the code that is safe to write to logs.
    pub fn redacted(&self) -> String {
        redact(&self.code)
    }
}

impl fmt::Debug for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCode")
            .field("code", &self.redacted())
            .field("code_type", &self.code_type)
            .field("granted_features", &self.granted_features)
            .field("duration_days", &self.duration_days)
            .field("usage_limit", &self.usage_limit)
            .finish()
    }
}

/// Hide the payload of a code, keeping prefix and checksum for support triage.
pub fn redact(code: &str) -> String {
    if code.len() == CODE_LEN && code.is_ascii() {
        format!(
            "{}********{}",
            &code[..PREFIX_LEN],
            &code[PREFIX_LEN + PAYLOAD_LEN..]
        )
    } else {
        "<malformed>".to_string()
    }
}

/// Normalize user input: drop separators and whitespace, uppercase ASCII.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn in_alphabet(c: char) -> bool {
    c.is_ascii() && ALPHABET.contains(&(c as u8))
}

/// Compute the two-character checksum of a base code (prefix + payload).
///
/// SHA-256 over the UTF-8 bytes, sum the first four hex nibbles of the
/// digest, then map `sum mod 32` and `(sum / 32) mod 32` into the alphabet.
pub fn compute_checksum(base_code: &str) -> String {
    let digest = Sha256::digest(base_code.as_bytes());
    let hex_digest = hex::encode(digest);

    let value: u32 = hex_digest
        .chars()
        .take(4)
        .filter_map(|c| c.to_digit(16))
        .sum();

    let size = ALPHABET.len() as u32;
    let first = ALPHABET[(value % size) as usize] as char;
    let second = ALPHABET[((value / size) % size) as usize] as char;

    [first, second].iter().collect()
}

/// Check the structure and checksum of a user-entered code.
///
/// Normalizes the input first, so `rv3f-7k9p-2qhb` is accepted.
pub fn validate_format(input: &str) -> Result<AccessCode> {
    let code = normalize(input);

    let len = code.chars().count();
    if len != CODE_LEN {
        return Err(FormatError::InvalidFormat(format!(
            "expected {} characters, got {}",
            CODE_LEN, len
        )));
    }

    if let Some(bad) = code.chars().find(|c| !in_alphabet(*c)) {
        return Err(FormatError::InvalidFormat(format!(
            "character {:?} is not allowed",
            bad
        )));
    }

    // Every character is ASCII from here on, so byte slicing is safe.
    let prefix = &code[..PREFIX_LEN];
    let code_type = CodeType::from_prefix(prefix)
        .ok_or_else(|| FormatError::UnknownTypePrefix(prefix.to_string()))?;

    let base = &code[..PREFIX_LEN + PAYLOAD_LEN];
    let checksum = &code[PREFIX_LEN + PAYLOAD_LEN..];
    if compute_checksum(base) != checksum {
        return Err(FormatError::ChecksumMismatch);
    }

    Ok(AccessCode::with_type_defaults(code, code_type))
}

/// Issue a code of the given type with a caller-chosen payload.
///
/// The payload must be exactly eight alphabet characters.
pub fn issue_code_with_payload(code_type: CodeType, payload: &str) -> Result<String> {
    if payload.chars().count() != PAYLOAD_LEN || !payload.chars().all(in_alphabet) {
        return Err(FormatError::InvalidFormat(format!(
            "payload must be {} characters from the code alphabet",
            PAYLOAD_LEN
        )));
    }

    let base = format!("{}{}", code_type.prefix(), payload);
    let checksum = compute_checksum(&base);
    Ok(base + &checksum)
}

/// Issue a fresh random code of the given type.
pub fn issue_code<R: Rng + ?Sized>(code_type: CodeType, rng: &mut R) -> String {
    let mut base = String::with_capacity(CODE_LEN);
    base.push_str(code_type.prefix());
    for _ in 0..PAYLOAD_LEN {
        base.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
    }

    let checksum = compute_checksum(&base);
    base + &checksum
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_alphabet_excludes_confusables() {
        assert_eq!(ALPHABET.len(), 32);
        for c in [b'0', b'1', b'O', b'I'] {
            assert!(!ALPHABET.contains(&c));
        }
    }

    #[test]
    fn test_known_checksum() {
        // sha256("RV3F7K9P2Q") starts 79e9: 7 + 9 + 14 + 9 = 39 -> (7, 1) -> "HB"
        assert_eq!(compute_checksum("RV3F7K9P2Q"), "HB");
    }

    #[test]
    fn test_scenario_code_validates() {
        let code = validate_format("RV3F7K9P2QHB").unwrap();
        assert_eq!(code.code_type(), CodeType::Reviewer);
        assert_eq!(code.duration_days(), Some(30));
        assert_eq!(code.usage_limit(), Some(50));
        assert_eq!(code.granted_features(), &PremiumFeature::all());
    }

    #[test]
    fn test_normalizes_separators_and_case() {
        let code = validate_format("  rv3f-7k9p-2qhb ").unwrap();
        assert_eq!(code.code(), "RV3F7K9P2QHB");
    }

    #[test]
    fn test_short_input_is_invalid_format() {
        let err = validate_format("RV3F7K9P2QX").unwrap_err();
        assert!(matches!(err, FormatError::InvalidFormat(_)));
    }

    #[test]
    fn test_confusable_character_is_invalid_format() {
        // 'O' and '0' are outside the alphabet
        let err = validate_format("RV3F7K9P2OHB").unwrap_err();
        assert!(matches!(err, FormatError::InvalidFormat(_)));
        let err = validate_format("RV3F7K9P20HB").unwrap_err();
        assert!(matches!(err, FormatError::InvalidFormat(_)));
    }

    #[test]
    fn test_non_ascii_input_is_invalid_format() {
        let err = validate_format("RV3F7K9P2QHÉ").unwrap_err();
        assert!(matches!(err, FormatError::InvalidFormat(_)));
    }

    #[test]
    fn test_unknown_prefix() {
        let base = "ZZ3F7K9P2Q";
        let code = format!("{}{}", base, compute_checksum(base));
        assert_eq!(
            validate_format(&code).unwrap_err(),
            FormatError::UnknownTypePrefix("ZZ".to_string())
        );
    }

    #[test]
    fn test_checksum_mismatch() {
        assert_eq!(
            validate_format("RV3F7K9P2QXZ").unwrap_err(),
            FormatError::ChecksumMismatch
        );
    }

    #[test]
    fn test_expires_at() {
        let code = validate_format("RV3F7K9P2QHB").unwrap();
        assert_eq!(code.expires_at(1_000), Some(1_000 + 30 * DAY_MS));

        let unlimited = issue_code_with_payload(CodeType::Unlimited, "ZZZZZZZZ").unwrap();
        let unlimited = validate_format(&unlimited).unwrap();
        assert_eq!(unlimited.expires_at(1_000), None);
        assert_eq!(unlimited.usage_limit(), None);
    }

    #[test]
    fn test_issue_with_payload() {
        assert_eq!(
            issue_code_with_payload(CodeType::Reviewer, "3F7K9P2Q").unwrap(),
            "RV3F7K9P2QHB"
        );
        assert!(issue_code_with_payload(CodeType::Reviewer, "3F7K9P2").is_err());
        assert!(issue_code_with_payload(CodeType::Reviewer, "3F7K9P20").is_err());
    }

    #[test]
    fn test_redacted() {
        let code = validate_format("RV3F7K9P2QHB").unwrap();
        assert_eq!(code.redacted(), "RV********HB");
        assert!(!format!("{:?}", code).contains("3F7K9P2Q"));
        assert_eq!(redact("short"), "<malformed>");
    }

    #[test]
    fn test_code_type_persisted_names() {
        for t in CodeType::ALL {
            assert_eq!(CodeType::parse(t.as_str()), Some(t));
            assert_eq!(CodeType::from_prefix(t.prefix()), Some(t));
            assert!(t.prefix().chars().all(in_alphabet));
        }
    }

    #[test]
    fn test_single_character_flips_are_mostly_detected() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut flips = 0u32;
        let mut detected = 0u32;

        for _ in 0..100 {
            let code_type = CodeType::ALL[rng.gen_range(0..CodeType::ALL.len())];
            let code = issue_code(code_type, &mut rng);
            let bytes = code.as_bytes();

            for pos in 0..CODE_LEN {
                for &sym in ALPHABET.iter() {
                    if sym == bytes[pos] {
                        continue;
                    }
                    let mut tampered = bytes.to_vec();
                    tampered[pos] = sym;
                    let tampered = String::from_utf8(tampered).unwrap();

                    flips += 1;
                    match validate_format(&tampered) {
                        Err(FormatError::UnknownTypePrefix(_)) => {
                            assert!(pos < PREFIX_LEN);
                            detected += 1;
                        }
                        Err(FormatError::ChecksumMismatch) => detected += 1,
                        Err(FormatError::InvalidFormat(msg)) => {
                            panic!("in-alphabet flip reported as structural: {}", msg)
                        }
                        Ok(_) => {}
                    }
                }
            }
        }

        let rate = f64::from(detected) / f64::from(flips);
        assert!(rate > 0.9, "detection rate {} too low", rate);
    }

    proptest! {
        #[test]
        fn test_checksum_deterministic(payload in "[A-HJ-NP-Z2-9]{8}", idx in 0usize..5) {
            let base = format!("{}{}", CodeType::ALL[idx].prefix(), payload);
            prop_assert_eq!(compute_checksum(&base), compute_checksum(&base));
            prop_assert_eq!(compute_checksum(&base).len(), CHECKSUM_LEN);
        }

        #[test]
        fn test_issued_codes_validate(seed in any::<u64>(), idx in 0usize..5) {
            let code_type = CodeType::ALL[idx];
            let mut rng = StdRng::seed_from_u64(seed);
            let code = issue_code(code_type, &mut rng);

            let parsed = validate_format(&code).unwrap();
            prop_assert_eq!(parsed.code(), code.as_str());
            prop_assert_eq!(parsed.code_type(), code_type);
            prop_assert_eq!(parsed.granted_features(), &code_type.default_features());
        }

        #[test]
        fn test_checksum_flip_always_detected(
            seed in any::<u64>(),
            pos in 10usize..12,
            sym in 0usize..32,
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let code = issue_code(CodeType::Demo, &mut rng);
            let mut tampered = code.clone().into_bytes();
            prop_assume!(tampered[pos] != ALPHABET[sym]);
            tampered[pos] = ALPHABET[sym];
            let tampered = String::from_utf8(tampered).unwrap();

            prop_assert_eq!(validate_format(&tampered).unwrap_err(), FormatError::ChecksumMismatch);
        }
    }
}
