//! Deployment targets and compatibility grading
//!
//! A [`Target`] is an immutable set of [`TargetTag`]s. Tags form a small
//! hierarchy (a `gwt` build is also a `web` build, an `android` build is
//! also `gluon`, `openjfx`, `java` and `mobile`), and compatibility is
//! computed from that relation, never from identity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const EMULATION_SUFFIX: &str = "-emul";

/// Platform tag identifying one deployment flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetTag {
    /// JVM bytecode host
    Java,
    /// Plain JRE runtime
    Jre,
    /// OpenJFX desktop toolkit
    OpenJfx,
    /// Desktop-packaged application (jpackage style)
    Desktop,
    /// GraalVM native image via Gluon
    Gluon,
    /// Any native mobile platform
    Mobile,
    Android,
    Ios,
    /// Any web target transpiled from bytecode or source
    Web,
    Gwt,
    J2cl,
    TeaVm,
}

impl TargetTag {
    pub const ALL: [TargetTag; 12] = [
        TargetTag::Java,
        TargetTag::Jre,
        TargetTag::OpenJfx,
        TargetTag::Desktop,
        TargetTag::Gluon,
        TargetTag::Mobile,
        TargetTag::Android,
        TargetTag::Ios,
        TargetTag::Web,
        TargetTag::Gwt,
        TargetTag::J2cl,
        TargetTag::TeaVm,
    ];

    /// Tags directly implied by this one
    pub fn parents(self) -> &'static [TargetTag] {
        match self {
            TargetTag::Java | TargetTag::Mobile | TargetTag::Web => &[],
            TargetTag::Jre | TargetTag::OpenJfx => &[TargetTag::Java],
            TargetTag::Desktop | TargetTag::Gluon => &[TargetTag::OpenJfx],
            TargetTag::Android | TargetTag::Ios => &[TargetTag::Gluon, TargetTag::Mobile],
            TargetTag::Gwt | TargetTag::J2cl | TargetTag::TeaVm => &[TargetTag::Web],
        }
    }

    /// Specificity: 1 for hierarchy roots, one more than the deepest parent otherwise
    pub fn depth(self) -> i32 {
        1 + self
            .parents()
            .iter()
            .map(|parent| parent.depth())
            .max()
            .unwrap_or(0)
    }

    /// Whether this tag is compiled to JavaScript
    pub fn is_web(self) -> bool {
        self == TargetTag::Web || self.parents().iter().any(|p| p.is_web())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetTag::Java => "java",
            TargetTag::Jre => "jre",
            TargetTag::OpenJfx => "openjfx",
            TargetTag::Desktop => "desktop",
            TargetTag::Gluon => "gluon",
            TargetTag::Mobile => "mobile",
            TargetTag::Android => "android",
            TargetTag::Ios => "ios",
            TargetTag::Web => "web",
            TargetTag::Gwt => "gwt",
            TargetTag::J2cl => "j2cl",
            TargetTag::TeaVm => "teavm",
        }
    }

    /// Parse a module name token (case-insensitive)
    pub fn from_token(token: &str) -> Option<TargetTag> {
        let token = token.to_ascii_lowercase();
        TargetTag::ALL.into_iter().find(|tag| tag.as_str() == token)
    }
}

impl fmt::Display for TargetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable set of platform tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target {
    tags: BTreeSet<TargetTag>,
}

impl Target {
    /// Target without tags: runs anywhere
    pub fn universal() -> Self {
        Self::default()
    }

    pub fn new<I: IntoIterator<Item = TargetTag>>(tags: I) -> Self {
        Self {
            tags: tags.into_iter().collect(),
        }
    }

    pub fn single(tag: TargetTag) -> Self {
        Self::new([tag])
    }

    /// Infer a target from the `-`-separated tokens of a module name
    ///
    /// `webfx-platform-storage-gwt` runs on `{gwt}`; a name without any tag
    /// token is universal. Emulation modules (`*-emul`) name the platform
    /// they emulate, not the one they run on, so they stay universal.
    pub fn from_module_name(name: &str) -> Self {
        if name.ends_with(EMULATION_SUFFIX) {
            return Self::universal();
        }
        Self::new(name.split('-').filter_map(TargetTag::from_token))
    }

    pub fn tags(&self) -> impl Iterator<Item = TargetTag> + '_ {
        self.tags.iter().copied()
    }

    pub fn is_universal(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn has_tag(&self, tag: TargetTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Every tag this target implies, including its own
    pub fn implied_tags(&self) -> BTreeSet<TargetTag> {
        let mut implied = BTreeSet::new();
        let mut pending: Vec<TargetTag> = self.tags.iter().copied().collect();
        while let Some(tag) = pending.pop() {
            if implied.insert(tag) {
                pending.extend_from_slice(tag.parents());
            }
        }
        implied
    }

    /// Whether a build for `self` counts as a build for `tag`
    pub fn satisfies(&self, tag: TargetTag) -> bool {
        self.implied_tags().contains(&tag)
    }

    pub fn is_web(&self) -> bool {
        self.satisfies(TargetTag::Web)
    }

    /// Grade how well a module built for `self` matches `required`
    ///
    /// The module's tags are the platforms it supports. Negative means none
    /// of them is implied by the required target. Otherwise the sum of the
    /// depths of the matching tags: a universal module grades 0, and a more
    /// specific compatible module always grades higher than a more general
    /// one.
    pub fn grade(&self, required: &Target) -> i32 {
        if self.tags.is_empty() {
            return 0;
        }
        let implied = required.implied_tags();
        let matching: Vec<TargetTag> = self
            .tags
            .iter()
            .copied()
            .filter(|tag| implied.contains(tag))
            .collect();
        if matching.is_empty() {
            return -1;
        }
        matching.iter().map(|tag| tag.depth()).sum()
    }

    pub fn is_compatible_with(&self, required: &Target) -> bool {
        self.grade(required) >= 0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            return f.write_str("*");
        }
        let names: Vec<&str> = self.tags.iter().map(|t| t.as_str()).collect();
        f.write_str(&names.join("+"))
    }
}

impl FromIterator<TargetTag> for Target {
    fn from_iter<I: IntoIterator<Item = TargetTag>>(iter: I) -> Self {
        Self::new(iter)
    }
}
