//! Static language profiles: file extension and invocation template per tag.

/// Extension for tags with no profile.
pub const DEFAULT_EXTENSION: &str = ".txt";

/// How a materialized source file is turned into a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// `<program> <args..> <source>`; the runtime reads the file in place.
    Interpret {
        program: &'static str,
        /// Replacement program name on Windows.
        windows_program: Option<&'static str>,
        args: &'static [&'static str],
    },
    /// `javac <source>` then `java -cp <dir> <stem>`.
    JavaClass,
    /// `<compiler> -o <artifact> <source>`; the artifact is not run.
    Compile { compiler: &'static str },
    /// No runner; hand the file to the OS default application.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProfile {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Includes the leading dot.
    pub extension: &'static str,
    pub invocation: Invocation,
}

impl LanguageProfile {
    pub fn matches(&self, tag: &str) -> bool {
        self.name == tag || self.aliases.contains(&tag)
    }

    /// Whether running this language requires a compile step.
    pub fn is_compiled(&self) -> bool {
        matches!(
            self.invocation,
            Invocation::JavaClass | Invocation::Compile { .. }
        )
    }
}

const fn interpret(program: &'static str, args: &'static [&'static str]) -> Invocation {
    Invocation::Interpret {
        program,
        windows_program: None,
        args,
    }
}

pub static LANGUAGES: &[LanguageProfile] = &[
    LanguageProfile {
        name: "python",
        aliases: &["py"],
        extension: ".py",
        invocation: Invocation::Interpret {
            program: "python3",
            windows_program: Some("python"),
            args: &[],
        },
    },
    LanguageProfile {
        name: "javascript",
        aliases: &["js"],
        extension: ".js",
        invocation: interpret("node", &[]),
    },
    LanguageProfile {
        name: "java",
        aliases: &[],
        extension: ".java",
        invocation: Invocation::JavaClass,
    },
    LanguageProfile {
        name: "cpp",
        aliases: &["c++"],
        extension: ".cpp",
        invocation: Invocation::Compile { compiler: "g++" },
    },
    LanguageProfile {
        name: "c",
        aliases: &[],
        extension: ".c",
        invocation: Invocation::Compile { compiler: "gcc" },
    },
    LanguageProfile {
        name: "csharp",
        aliases: &[],
        extension: ".cs",
        invocation: Invocation::Open,
    },
    LanguageProfile {
        name: "go",
        aliases: &[],
        extension: ".go",
        invocation: interpret("go", &["run"]),
    },
    LanguageProfile {
        name: "rust",
        aliases: &[],
        extension: ".rs",
        invocation: Invocation::Compile { compiler: "rustc" },
    },
    LanguageProfile {
        name: "php",
        aliases: &[],
        extension: ".php",
        invocation: interpret("php", &[]),
    },
    LanguageProfile {
        name: "ruby",
        aliases: &[],
        extension: ".rb",
        invocation: interpret("ruby", &[]),
    },
    LanguageProfile {
        name: "bash",
        aliases: &["sh"],
        extension: ".sh",
        invocation: interpret("bash", &[]),
    },
    LanguageProfile {
        name: "powershell",
        aliases: &[],
        extension: ".ps1",
        invocation: interpret("powershell", &["-ExecutionPolicy", "Bypass", "-File"]),
    },
    LanguageProfile {
        name: "sql",
        aliases: &[],
        extension: ".sql",
        invocation: Invocation::Open,
    },
    LanguageProfile {
        name: "html",
        aliases: &[],
        extension: ".html",
        invocation: Invocation::Open,
    },
    LanguageProfile {
        name: "css",
        aliases: &[],
        extension: ".css",
        invocation: Invocation::Open,
    },
];

/// Read-only view over the profile table.
#[derive(Debug, Clone, Copy)]
pub struct LanguageTable {
    profiles: &'static [LanguageProfile],
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::new(LANGUAGES)
    }
}

impl LanguageTable {
    pub fn new(profiles: &'static [LanguageProfile]) -> Self {
        Self { profiles }
    }

    /// Look up a tag, case-insensitively.
    pub fn lookup(&self, tag: &str) -> Option<&'static LanguageProfile> {
        let tag = tag.to_lowercase();
        self.profiles.iter().find(|p| p.matches(&tag))
    }

    pub fn extension_for(&self, tag: &str) -> &'static str {
        self.lookup(tag)
            .map(|p| p.extension)
            .unwrap_or(DEFAULT_EXTENSION)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static LanguageProfile> {
        self.profiles.iter()
    }
}
