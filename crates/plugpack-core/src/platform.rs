use std::ops::BitOr;

/// Platform tag attached to a source. Sources tagged for a platform the
/// current runtime cannot run are dropped at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Generic,
    Unknown,
    Windows,
    Win32,
    Win64,
    Darwin,
    Darwin32,
    Darwin64,
    Linux,
    Linux32,
    Linux64,
}

impl Platform {
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "" | "all" => Self::Generic,
            "windows" => Self::Windows,
            "win32" => Self::Win32,
            "win64" => Self::Win64,
            "darwin" => Self::Darwin,
            "darwin32" => Self::Darwin32,
            "darwin64" => Self::Darwin64,
            "linux" => Self::Linux,
            "linux32" => Self::Linux32,
            "linux64" => Self::Linux64,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "all",
            Self::Unknown => "unknown",
            Self::Windows => "windows",
            Self::Win32 => "win32",
            Self::Win64 => "win64",
            Self::Darwin => "darwin",
            Self::Darwin32 => "darwin32",
            Self::Darwin64 => "darwin64",
            Self::Linux => "linux",
            Self::Linux32 => "linux32",
            Self::Linux64 => "linux64",
        }
    }

    /// Whether a source tagged with this platform can run on the current
    /// runtime's OS/pointer-width capability set.
    pub fn is_compatible(self) -> bool {
        match self {
            Self::Generic => true,
            Self::Unknown => false,
            Self::Windows => cfg!(windows),
            Self::Win32 => cfg!(all(windows, target_pointer_width = "32")),
            Self::Win64 => cfg!(all(windows, target_pointer_width = "64")),
            Self::Darwin => cfg!(target_os = "macos"),
            Self::Darwin32 => cfg!(all(target_os = "macos", target_pointer_width = "32")),
            Self::Darwin64 => cfg!(all(target_os = "macos", target_pointer_width = "64")),
            Self::Linux => cfg!(target_os = "linux"),
            Self::Linux32 => cfg!(all(target_os = "linux", target_pointer_width = "32")),
            Self::Linux64 => cfg!(all(target_os = "linux", target_pointer_width = "64")),
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::Generic
    }
}

/// Bitmask of host integration sections a file registers into. Only used
/// by the host-registration side channel after a transaction commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sections(u8);

impl Sections {
    pub const NONE: Self = Self(0);
    pub const MAIN: Self = Self(1);
    pub const EDITOR: Self = Self(1 << 1);
    pub const INLINE_EDITOR: Self = Self(1 << 2);

    /// Parses the index format's `main` attribute: `"true"` marks the main
    /// section alone, otherwise a space-separated list of section names.
    /// Unknown names are ignored.
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "" | "false" => Self::NONE,
            "true" => Self::MAIN,
            list => list
                .split_ascii_whitespace()
                .map(|token| match token {
                    "main" => Self::MAIN,
                    "editor" => Self::EDITOR,
                    "inline_editor" => Self::INLINE_EDITOR,
                    _ => Self::NONE,
                })
                .fold(Self::NONE, BitOr::bitor),
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::MAIN.0 | Self::EDITOR.0 | Self::INLINE_EDITOR.0))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Sections {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
