use crate::error::Result;
use ristretto_classfile::Version;
use serde::Deserialize;

/// Class-file version to emit.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetVersion {
    #[default]
    Java8,
    Java11,
    Java17,
    Java21,
}

impl TargetVersion {
    pub fn class_file_version(self) -> Version {
        match self {
            TargetVersion::Java8 => Version::Java8 { minor: 0 },
            TargetVersion::Java11 => Version::Java11 { minor: 0 },
            TargetVersion::Java17 => Version::Java17 { minor: 0 },
            TargetVersion::Java21 => Version::Java21 { minor: 0 },
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilerOptions {
    pub target: TargetVersion,
    pub generic_signatures: bool,
    /// When off, every truthiness conversion goes through the runtime helper.
    pub optimize_truthiness: bool,
    pub array_index_rewrite: bool,
    pub source_file: Option<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            target: TargetVersion::default(),
            generic_signatures: true,
            optimize_truthiness: true,
            array_index_rewrite: true,
            source_file: None,
        }
    }
}

impl CompilerOptions {
    pub fn from_json(text: &str) -> Result<Self> {
        let options: CompilerOptions = serde_json::from_str(text)?;
        breadcrumbs::log!(
            breadcrumbs::LogLevel::Info,
            "sc-transform",
            format!("compiler options loaded: {:?}", options)
        );
        Ok(options)
    }
}
