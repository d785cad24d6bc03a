//! The packaging policy: a closed, table-driven mapping from platform
//! classifier to rename/compress/content-type rules.
//!
//! Per-platform branching lives entirely in this table; packaging is a pure
//! function of `(classifier, artifact)`, so publish stages may be retried
//! safely up to the upload step.

mod archive;

use crate::core::{Artifact, PackagedAsset};
use crate::errors::{ShipflowError, UnknownPlatformPolicyError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Content type used for all binary release assets.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Classifier for the Apple multi-arch library bundle.
pub const APPLE_BUNDLE: &str = "apple-universal";

/// Classifier for the Android multi-arch library bundle.
pub const ANDROID_BUNDLE: &str = "android-universal";

/// Compression applied to a raw artifact during packaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Gzip the raw payload.
    Gzip,
    /// Wrap the payload in a zip archive.
    Zip,
    /// Ship the payload unchanged.
    None,
}

/// Platform family a classifier resolves to; the policy table is keyed by
/// family so target triples never need individual rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    /// Windows target triples.
    Windows,
    /// Any other desktop/server target triple.
    Desktop,
    /// The Apple multi-arch library bundle.
    AppleBundle,
    /// The Android multi-arch library bundle.
    AndroidBundle,
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Desktop => write!(f, "desktop"),
            Self::AppleBundle => write!(f, "apple-bundle"),
            Self::AndroidBundle => write!(f, "android-bundle"),
        }
    }
}

impl PlatformFamily {
    /// Resolves a platform classifier to its family.
    ///
    /// Bundle classifiers are exact keys; anything containing `windows` is a
    /// Windows target; any other string shaped like a target triple falls
    /// into the desktop/server family. Everything else is unrecognized.
    #[must_use]
    pub fn classify(classifier: &str) -> Option<Self> {
        match classifier {
            APPLE_BUNDLE => Some(Self::AppleBundle),
            ANDROID_BUNDLE => Some(Self::AndroidBundle),
            c if c.contains("windows") => Some(Self::Windows),
            c if c.split('-').count() >= 3 => Some(Self::Desktop),
            _ => None,
        }
    }

    /// The bundle label used in artifact names, for bundle families.
    #[must_use]
    pub fn bundle_label(&self) -> Option<&'static str> {
        match self {
            Self::AppleBundle => Some("xcframework"),
            Self::AndroidBundle => Some("aar"),
            Self::Windows | Self::Desktop => None,
        }
    }
}

/// One row of the packaging policy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRule {
    /// Append `.exe` to the entry name before archiving.
    pub append_exe: bool,
    /// Compression applied during packaging.
    pub compression: Compression,
    /// Content type reported on upload.
    pub content_type: String,
}

impl AssetRule {
    /// Creates a rule with the given compression and the standard binary
    /// content type.
    #[must_use]
    pub fn new(compression: Compression) -> Self {
        Self {
            append_exe: false,
            compression,
            content_type: OCTET_STREAM.to_string(),
        }
    }

    /// Appends `.exe` to the archived entry name.
    #[must_use]
    pub fn with_exe_suffix(mut self) -> Self {
        self.append_exe = true;
        self
    }

    /// Overrides the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// The packaging policy table.
///
/// Lookup on an unregistered classifier fails with
/// [`UnknownPlatformPolicyError`]; packaging is never silently skipped.
#[derive(Debug, Clone)]
pub struct PackagingPolicy {
    rules: HashMap<PlatformFamily, AssetRule>,
}

impl Default for PackagingPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl PackagingPolicy {
    /// Creates an empty policy with no rules.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Creates the standard release policy:
    ///
    /// | family | rule |
    /// |---|---|
    /// | windows | append `.exe`, wrap in zip |
    /// | desktop/server | gzip the raw binary |
    /// | apple bundle | zip archive |
    /// | android bundle | zip archive |
    #[must_use]
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(
                PlatformFamily::Windows,
                AssetRule::new(Compression::Zip).with_exe_suffix(),
            )
            .with_rule(PlatformFamily::Desktop, AssetRule::new(Compression::Gzip))
            .with_rule(PlatformFamily::AppleBundle, AssetRule::new(Compression::Zip))
            .with_rule(
                PlatformFamily::AndroidBundle,
                AssetRule::new(Compression::Zip),
            )
    }

    /// Registers or replaces the rule for a platform family.
    #[must_use]
    pub fn with_rule(mut self, family: PlatformFamily, rule: AssetRule) -> Self {
        self.rules.insert(family, rule);
        self
    }

    /// Looks up the rule for a classifier.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlatformPolicyError` when the classifier does not
    /// resolve to a family or the family has no registered rule.
    pub fn lookup(&self, classifier: &str) -> Result<&AssetRule, UnknownPlatformPolicyError> {
        let family = PlatformFamily::classify(classifier)
            .ok_or_else(|| UnknownPlatformPolicyError::new(classifier))?;
        self.rules
            .get(&family)
            .ok_or_else(|| UnknownPlatformPolicyError::new(classifier))
    }

    /// Packages a raw artifact into its final distributable asset.
    ///
    /// Deterministic: the same classifier and artifact always produce the
    /// same bytes. Bundle artifacts whose name already carries a `.zip`
    /// suffix were archived by the build step and pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlatformPolicy` for unregistered classifiers, or an
    /// internal error if in-memory archiving fails.
    pub fn package(
        &self,
        classifier: &str,
        artifact: &Artifact,
    ) -> Result<PackagedAsset, ShipflowError> {
        let rule = self.lookup(classifier)?;

        let (name, payload) = match rule.compression {
            Compression::Gzip => (
                format!("{}.gz", artifact.name),
                archive::gzip(&artifact.payload)?,
            ),
            Compression::Zip => {
                if artifact.name.ends_with(".zip") {
                    (artifact.name.clone(), artifact.payload.clone())
                } else {
                    let entry = if rule.append_exe {
                        format!("{}.exe", artifact.name)
                    } else {
                        artifact.name.clone()
                    };
                    let bytes = archive::zip_single_entry(&entry, &artifact.payload)
                        .map_err(|e| {
                            ShipflowError::Internal(format!("zip packaging failed: {e}"))
                        })?;
                    (format!("{}.zip", artifact.name), bytes)
                }
            }
            Compression::None => (artifact.name.clone(), artifact.payload.clone()),
        };

        Ok(PackagedAsset::new(name, rule.content_type.clone(), payload))
    }
}

/// Derives the conventional artifact name for a product/classifier pair:
/// `{product}-{target}` for binaries, `{product}.<bundle>.zip` for
/// multi-arch bundles.
///
/// # Errors
///
/// Returns `UnknownPlatformPolicyError` for unrecognized classifiers.
pub fn artifact_name(
    product: &str,
    classifier: &str,
) -> Result<String, UnknownPlatformPolicyError> {
    let family = PlatformFamily::classify(classifier)
        .ok_or_else(|| UnknownPlatformPolicyError::new(classifier))?;

    Ok(match family.bundle_label() {
        Some(label) => format!("{product}.{label}.zip"),
        None => format!("{product}-{classifier}"),
    })
}
