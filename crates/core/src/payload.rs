//! Selection of which stored audio payload a caller wants.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;

/// MIME type of every payload the service stores or produces.
pub const AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// One of the two binary payloads attached to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// The bytes the client uploaded.
    Original,
    /// The enhancement result; only present once the job is `enhanced`.
    Enhanced,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Original => "original",
            PayloadKind::Enhanced => "enhanced",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(PayloadKind::Original),
            "enhanced" => Ok(PayloadKind::Enhanced),
            other => Err(CoreError::Validation(format!(
                "Invalid audio type '{other}'. Expected 'original' or 'enhanced'"
            ))),
        }
    }
}

/// Build the download name for an enhanced payload: `song.wav` becomes
/// `song_enhanced.wav`.
pub fn enhanced_filename(original: &str) -> String {
    let stem = match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => original,
    };
    format!("{stem}_enhanced.wav")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds() {
        assert_eq!("original".parse::<PayloadKind>().unwrap(), PayloadKind::Original);
        assert_eq!("enhanced".parse::<PayloadKind>().unwrap(), PayloadKind::Enhanced);
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = "both".parse::<PayloadKind>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn enhanced_filename_replaces_extension() {
        assert_eq!(enhanced_filename("voice memo.wav"), "voice memo_enhanced.wav");
        assert_eq!(enhanced_filename("a.b.WAV"), "a.b_enhanced.wav");
        assert_eq!(enhanced_filename("noext"), "noext_enhanced.wav");
        assert_eq!(enhanced_filename(".wav"), ".wav_enhanced.wav");
    }
}
