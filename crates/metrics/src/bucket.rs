//! Input-size buckets.

use serde::{Deserialize, Serialize};

/// Fixed prompt-token ranges used to partition statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum SizeBucket {
    /// Up to 256 prompt tokens
    #[serde(rename = "0-256")]
    Tiny,
    /// 257 to 1024
    #[serde(rename = "257-1024")]
    Small,
    /// 1025 to 4096
    #[serde(rename = "1025-4096")]
    Medium,
    /// 4097 to 8192
    #[serde(rename = "4097-8192")]
    Large,
    /// More than 8192
    #[serde(rename = "8192+")]
    Huge,
}

impl SizeBucket {
    /// Every bucket, smallest first.
    pub const ALL: [SizeBucket; 5] = [
        SizeBucket::Tiny,
        SizeBucket::Small,
        SizeBucket::Medium,
        SizeBucket::Large,
        SizeBucket::Huge,
    ];

    /// The bucket a prompt of `tokens` tokens falls in.
    pub fn for_tokens(tokens: u64) -> Self {
        match tokens {
            0..=256 => Self::Tiny,
            257..=1024 => Self::Small,
            1025..=4096 => Self::Medium,
            4097..=8192 => Self::Large,
            _ => Self::Huge,
        }
    }

    /// The persisted label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Tiny => "0-256",
            Self::Small => "257-1024",
            Self::Medium => "1025-4096",
            Self::Large => "4097-8192",
            Self::Huge => "8192+",
        }
    }
}

impl std::fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries() {
        assert_eq!(SizeBucket::for_tokens(0), SizeBucket::Tiny);
        assert_eq!(SizeBucket::for_tokens(256), SizeBucket::Tiny);
        assert_eq!(SizeBucket::for_tokens(257), SizeBucket::Small);
        assert_eq!(SizeBucket::for_tokens(1024), SizeBucket::Small);
        assert_eq!(SizeBucket::for_tokens(1025), SizeBucket::Medium);
        assert_eq!(SizeBucket::for_tokens(4096), SizeBucket::Medium);
        assert_eq!(SizeBucket::for_tokens(4097), SizeBucket::Large);
        assert_eq!(SizeBucket::for_tokens(8192), SizeBucket::Large);
        assert_eq!(SizeBucket::for_tokens(8193), SizeBucket::Huge);
    }

    #[test]
    fn label_matches_serde() {
        for bucket in SizeBucket::ALL {
            let json = serde_json::to_string(&bucket).unwrap();
            assert_eq!(json, format!("\"{}\"", bucket.label()));
        }
    }
}
