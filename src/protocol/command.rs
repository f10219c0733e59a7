//! Inbound command vocabulary.
//!
//! The controller sends bare text frames. Matching is exact and
//! case-sensitive:
//!
//! | Text | Kind |
//! |------|------|
//! | `picture` | [`CommandKind::Picture`] |
//! | `video` | [`CommandKind::Video`] |
//! | `zoom-in` | [`CommandKind::ZoomIn`] |
//! | `zoom-out` | [`CommandKind::ZoomOut`] |
//! | anything else | [`CommandKind::Unknown`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// CommandKind
// ============================================================================

/// Recognized command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Capture a still photo.
    Picture,
    /// Toggle video recording.
    Video,
    /// Increase zoom by one step.
    ZoomIn,
    /// Decrease zoom by one step.
    ZoomOut,
    /// Text outside the vocabulary.
    Unknown,
}

impl CommandKind {
    /// All kinds that map to an action.
    pub const KNOWN: [Self; 4] = [Self::Picture, Self::Video, Self::ZoomIn, Self::ZoomOut];

    /// Maps frame text to a kind.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        match text {
            "picture" => Self::Picture,
            "video" => Self::Video,
            "zoom-in" => Self::ZoomIn,
            "zoom-out" => Self::ZoomOut,
            _ => Self::Unknown,
        }
    }

    /// Returns the wire text, or `None` for [`CommandKind::Unknown`].
    #[inline]
    #[must_use]
    pub const fn wire_name(&self) -> Option<&'static str> {
        match self {
            Self::Picture => Some("picture"),
            Self::Video => Some("video"),
            Self::ZoomIn => Some("zoom-in"),
            Self::ZoomOut => Some("zoom-out"),
            Self::Unknown => None,
        }
    }

    /// Returns `true` unless this is [`CommandKind::Unknown`].
    #[inline]
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

// ============================================================================
// Command
// ============================================================================

/// A command decoded from one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    raw: String,
    kind: CommandKind,
}

impl Command {
    /// Decodes a text frame.
    #[must_use]
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let kind = CommandKind::from_text(&raw);
        Self { raw, kind }
    }

    /// Returns the frame text as received.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the recognized kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        self.kind
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ============================================================================
// Tests
// ============================================================================
