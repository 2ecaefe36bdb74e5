use std::fmt;
use std::path::Path;

/// Sensitivity tag assigned per file during backup. Informational only:
/// it shows up in logs but never influences storage or indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    /// Keys and secrets.
    Critical,
    /// Source code and configuration.
    High,
    /// Documents.
    Medium,
    /// Binaries, archives, media, everything else.
    Low,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: u8,
}

/// Classify a file by extension.
pub fn analyze_file(path: &Path) -> RiskAssessment {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pem" | "key" | "kdbx" | "env" | "gpg" | "pfx" | "p12" | "ovpn" | "ssh" => {
            RiskAssessment {
                level: RiskLevel::Critical,
                score: 100,
            }
        }
        "go" | "rs" | "py" | "js" | "ts" | "c" | "cpp" | "h" | "java" | "json" | "yaml"
        | "yml" | "toml" | "xml" | "conf" | "ini" | "sql" | "tf" => RiskAssessment {
            level: RiskLevel::High,
            score: 80,
        },
        "pdf" | "docx" | "xlsx" | "pptx" | "md" | "txt" | "csv" => RiskAssessment {
            level: RiskLevel::Medium,
            score: 50,
        },
        _ => RiskAssessment {
            level: RiskLevel::Low,
            score: 10,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_critical() {
        assert_eq!(
            analyze_file(Path::new("/home/user/.ssh/id_ed25519.pem")).level,
            RiskLevel::Critical
        );
        assert_eq!(
            analyze_file(Path::new("server.KEY")).level,
            RiskLevel::Critical
        );
    }

    #[test]
    fn source_and_config_are_high() {
        assert_eq!(analyze_file(Path::new("main.rs")).level, RiskLevel::High);
        assert_eq!(analyze_file(Path::new("app.toml")).level, RiskLevel::High);
    }

    #[test]
    fn documents_are_medium() {
        assert_eq!(analyze_file(Path::new("notes.md")).level, RiskLevel::Medium);
    }

    #[test]
    fn unknown_and_media_are_low() {
        assert_eq!(analyze_file(Path::new("video.mp4")).level, RiskLevel::Low);
        assert_eq!(analyze_file(Path::new("no_extension")).level, RiskLevel::Low);
    }
}
