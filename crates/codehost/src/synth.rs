//! Command synthesis: materialize request source to disk and plan how to run it.
//!
//! Source text only ever reaches a process through the file on disk. Every
//! argument in a synthesized command is either a fixed program/flag or derived
//! from the materialized path, and no strategy goes through a shell.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SynthError;
use crate::language::{Invocation, LanguageProfile, LanguageTable};
use crate::platform::OsFamily;

/// Prefix for generated temp file names. Kept a valid Java identifier so the
/// file stem can double as a class name.
pub const TEMP_PREFIX: &str = "codehost_";

/// Program name plus arguments, executed without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argv(Vec<String>);

impl Argv {
    pub fn new(program: impl Into<String>) -> Self {
        Self(vec![program.into()])
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.0.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn program(&self) -> &str {
        &self.0[0]
    }

    pub fn arguments(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Argv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// How the Process Runner should execute a synthesized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Single process; output captured.
    Direct(Argv),
    /// Ordered steps; each runs only if the previous one exited 0.
    Pipeline(Vec<Argv>),
    /// Compile step only. The produced artifact is left for a later request.
    CompileOnly(Argv),
    /// Hand the file to the OS default application, detached.
    Open(Argv),
}

impl ExecutionStrategy {
    /// Human-readable command line.
    pub fn render(&self) -> String {
        match self {
            Self::Direct(argv) | Self::CompileOnly(argv) | Self::Open(argv) => argv.to_string(),
            Self::Pipeline(steps) => steps
                .iter()
                .map(Argv::to_string)
                .collect::<Vec<_>>()
                .join(" && "),
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

/// A materialized source file and the plan to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesized {
    pub source: PathBuf,
    pub strategy: ExecutionStrategy,
}

impl Synthesized {
    /// Detached openers read the file after we reply; its removal is deferred.
    pub fn defers_cleanup(&self) -> bool {
        self.strategy.is_detached()
    }
}

/// Maps `(code, language, filename?)` to a materialized file and an [`ExecutionStrategy`].
#[derive(Debug, Clone)]
pub struct Synthesizer {
    languages: LanguageTable,
    os: OsFamily,
    opener: Option<Argv>,
    temp_dir: PathBuf,
}

impl Synthesizer {
    pub fn new(
        languages: LanguageTable,
        os: OsFamily,
        opener: Option<Argv>,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            languages,
            os,
            opener,
            temp_dir,
        }
    }

    pub fn synthesize(
        &self,
        code: &str,
        language: &str,
        filename: Option<&str>,
    ) -> Result<Synthesized, SynthError> {
        let tag = language.to_lowercase();
        let profile = self.languages.lookup(&tag);
        let extension = self.languages.extension_for(&tag);

        let source = self.materialize(code, extension, filename)?;

        match plan(profile, &source, self.os, self.opener.as_ref()) {
            Some(strategy) => {
                tracing::debug!(
                    language = %tag,
                    source = %source.display(),
                    command = %strategy.render(),
                    "Synthesized command"
                );
                Ok(Synthesized { source, strategy })
            }
            None => {
                remove_artifact(&source);
                Err(SynthError::Unsupported(language.to_string()))
            }
        }
    }

    /// Write `code` verbatim to a file inside the temp directory.
    fn materialize(
        &self,
        code: &str,
        extension: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, SynthError> {
        match filename {
            Some(name) => {
                let path = self.temp_dir.join(sanitize_filename(name)?);
                std::fs::write(&path, code).map_err(|source| SynthError::Materialize {
                    path: path.clone(),
                    source,
                })?;
                Ok(path)
            }
            None => {
                let materialize_err = |source: std::io::Error| SynthError::Materialize {
                    path: self.temp_dir.clone(),
                    source,
                };
                let mut file = tempfile::Builder::new()
                    .prefix(TEMP_PREFIX)
                    .suffix(extension)
                    .tempfile_in(&self.temp_dir)
                    .map_err(materialize_err)?;
                file.write_all(code.as_bytes()).map_err(materialize_err)?;
                let (_, path) = file.keep().map_err(|e| materialize_err(e.error))?;
                Ok(path)
            }
        }
    }
}

/// Keep only the final path component of a caller-supplied name.
///
/// Both `/` and `\` count as separators regardless of host so a name can never
/// climb out of the temp directory.
pub fn sanitize_filename(name: &str) -> Result<&str, SynthError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => Err(SynthError::InvalidFilename(name.to_string())),
        base if base.contains(':') || base.contains('\0') => {
            Err(SynthError::InvalidFilename(name.to_string()))
        }
        base => Ok(base),
    }
}

/// Build the execution strategy for a materialized source file.
///
/// Unknown languages and profiles without a runner fall back to `opener`
/// (see [`default_opener`]). `None` only when there is no opener either.
pub fn plan(
    profile: Option<&LanguageProfile>,
    source: &Path,
    os: OsFamily,
    opener: Option<&Argv>,
) -> Option<ExecutionStrategy> {
    let invocation = profile.map(|p| p.invocation).unwrap_or(Invocation::Open);

    let strategy = match invocation {
        Invocation::Interpret {
            program,
            windows_program,
            args,
        } => {
            let program = match (os, windows_program) {
                (OsFamily::Windows, Some(windows)) => windows,
                _ => program,
            };
            ExecutionStrategy::Direct(Argv::new(program).args(args.iter().copied()).path(source))
        }
        Invocation::JavaClass => {
            let dir = source.parent().unwrap_or_else(|| Path::new("."));
            let class_name = file_stem(source);
            ExecutionStrategy::Pipeline(vec![
                Argv::new("javac").path(source),
                Argv::new("java").arg("-cp").path(dir).arg(class_name),
            ])
        }
        Invocation::Compile { compiler } => {
            let artifact = artifact_path(source, os);
            ExecutionStrategy::CompileOnly(
                Argv::new(compiler).arg("-o").path(&artifact).path(source),
            )
        }
        Invocation::Open => ExecutionStrategy::Open(opener?.clone().path(source)),
    };
    Some(strategy)
}

/// OS command that opens a file with its default application.
pub fn default_opener(os: OsFamily) -> Option<Argv> {
    match os {
        OsFamily::Windows => Some(Argv::new("cmd").args(["/C", "start", ""])),
        OsFamily::MacOs => Some(Argv::new("open")),
        OsFamily::Linux => Some(Argv::new("xdg-open")),
        OsFamily::Other => None,
    }
}

/// Compiler output next to `source`; never the source path itself.
fn artifact_path(source: &Path, os: OsFamily) -> PathBuf {
    let artifact = source.with_extension(os.executable_suffix());
    if artifact == source {
        source.with_extension("out")
    } else {
        artifact
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Advisory cleanup: failures are logged, never surfaced to the caller.
pub fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::trace!(path = %path.display(), "Removed temp artifact"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp artifact")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizer(dir: &Path, os: OsFamily) -> Synthesizer {
        Synthesizer::new(
            LanguageTable::default(),
            os,
            default_opener(os),
            dir.to_path_buf(),
        )
    }

    #[test]
    fn python_is_direct_interpreter_over_materialized_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = synthesizer(dir.path(), OsFamily::Linux)
            .synthesize("print(1+1)", "Python", None)
            .unwrap();

        assert_eq!(s.source.parent(), Some(dir.path()));
        assert_eq!(std::fs::read_to_string(&s.source).unwrap(), "print(1+1)");
        match &s.strategy {
            ExecutionStrategy::Direct(argv) => {
                assert_eq!(argv.program(), "python3");
                assert_eq!(argv.arguments(), [s.source.to_string_lossy().into_owned()]);
            }
            other => panic!("expected direct strategy, got {other:?}"),
        }
        assert!(!s.defers_cleanup());
    }

    #[test]
    fn python_uses_plain_python_on_windows() {
        let dir = tempfile::tempdir().unwrap();
        let s = synthesizer(dir.path(), OsFamily::Windows)
            .synthesize("print(1)", "py", None)
            .unwrap();
        match &s.strategy {
            ExecutionStrategy::Direct(argv) => assert_eq!(argv.program(), "python"),
            other => panic!("expected direct strategy, got {other:?}"),
        }
    }

    #[test]
    fn recognized_tags_end_with_registered_extension() {
        let dir = tempfile::tempdir().unwrap();
        let synth = synthesizer(dir.path(), OsFamily::Linux);
        let table = LanguageTable::default();

        for profile in table.iter() {
            for tag in std::iter::once(&profile.name).chain(profile.aliases) {
                let s = synth.synthesize("x", tag, None).unwrap();
                let consuming = match &s.strategy {
                    ExecutionStrategy::Direct(argv)
                    | ExecutionStrategy::CompileOnly(argv)
                    | ExecutionStrategy::Open(argv) => argv.clone(),
                    ExecutionStrategy::Pipeline(steps) => steps[0].clone(),
                };
                assert!(
                    consuming.last().ends_with(profile.extension),
                    "{tag}: {consuming}"
                );
                assert_eq!(consuming.last(), s.source.to_string_lossy());
                remove_artifact(&s.source);
            }
        }
    }

    #[test]
    fn generated_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let synth = synthesizer(dir.path(), OsFamily::Linux);
        let a = synth.synthesize("print(1)", "python", None).unwrap();
        let b = synth.synthesize("print(1)", "python", None).unwrap();
        assert_ne!(a.source, b.source);
        assert!(a.source.exists() && b.source.exists());
    }

    #[test]
    fn java_compiles_then_runs_class_named_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = synthesizer(dir.path(), OsFamily::Linux)
            .synthesize("class Main {}", "java", Some("Main.java"))
            .unwrap();

        assert_eq!(s.source, dir.path().join("Main.java"));
        let source = s.source.to_string_lossy().into_owned();
        let parent = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            s.strategy,
            ExecutionStrategy::Pipeline(vec![
                Argv::new("javac").arg(source.clone()),
                Argv::new("java").args(["-cp", parent.as_str(), "Main"]),
            ])
        );
        assert_eq!(
            s.strategy.render(),
            format!("javac {source} && java -cp {parent} Main")
        );
    }

    #[test]
    fn c_family_and_rust_compile_only() {
        let dir = tempfile::tempdir().unwrap();
        let synth = synthesizer(dir.path(), OsFamily::Linux);

        for (tag, compiler) in [("c", "gcc"), ("cpp", "g++"), ("rust", "rustc")] {
            let s = synth.synthesize("", tag, None).unwrap();
            let artifact = s.source.with_extension("");
            assert_eq!(
                s.strategy,
                ExecutionStrategy::CompileOnly(
                    Argv::new(compiler)
                        .arg("-o")
                        .path(&artifact)
                        .path(&s.source)
                )
            );
        }
    }

    #[test]
    fn compile_artifact_gets_exe_on_windows() {
        let strategy = plan(
            LanguageTable::default().lookup("c"),
            Path::new("C:/Temp/prog.c"),
            OsFamily::Windows,
            None,
        )
        .unwrap();
        assert_eq!(strategy.render(), "gcc -o C:/Temp/prog.exe C:/Temp/prog.c");
    }

    #[test]
    fn extensionless_filename_does_not_compile_over_itself() {
        let dir = tempfile::tempdir().unwrap();
        let s = synthesizer(dir.path(), OsFamily::Linux)
            .synthesize("int main(){return 0;}", "c", Some("prog"))
            .unwrap();

        let source = dir.path().join("prog");
        assert_eq!(s.source, source);
        assert_eq!(
            s.strategy,
            ExecutionStrategy::CompileOnly(
                Argv::new("gcc")
                    .arg("-o")
                    .path(&dir.path().join("prog.out"))
                    .path(&source)
            )
        );

        let windows = plan(
            LanguageTable::default().lookup("c"),
            Path::new("C:/Temp/prog.exe"),
            OsFamily::Windows,
            None,
        )
        .unwrap();
        assert_eq!(windows.render(), "gcc -o C:/Temp/prog.out C:/Temp/prog.exe");
    }

    #[test]
    fn unknown_language_falls_back_to_opener() {
        let dir = tempfile::tempdir().unwrap();
        let s = synthesizer(dir.path(), OsFamily::Linux)
            .synthesize("IDENTIFICATION DIVISION.", "cobol", None)
            .unwrap();

        assert!(s.source.to_string_lossy().ends_with(".txt"));
        assert_eq!(
            s.strategy,
            ExecutionStrategy::Open(Argv::new("xdg-open").path(&s.source))
        );
        assert!(s.defers_cleanup());
    }

    #[test]
    fn opener_per_os() {
        let path = Path::new("/tmp/a.html");
        let render = |os| {
            plan(
                LanguageTable::default().lookup("html"),
                path,
                os,
                default_opener(os).as_ref(),
            )
                .unwrap()
                .render()
        };
        assert_eq!(render(OsFamily::Linux), "xdg-open /tmp/a.html");
        assert_eq!(render(OsFamily::MacOs), "open /tmp/a.html");
        assert_eq!(render(OsFamily::Windows), "cmd /C start  /tmp/a.html");
    }

    #[test]
    fn no_opener_is_unsupported_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let err = synthesizer(dir.path(), OsFamily::Other)
            .synthesize("x", "Cobol", None)
            .unwrap_err();

        assert!(matches!(&err, SynthError::Unsupported(tag) if tag == "Cobol"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn caller_filename_is_confined_to_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let synth = synthesizer(dir.path(), OsFamily::Linux);

        let s = synth
            .synthesize("echo hi", "bash", Some("../../etc/evil.sh"))
            .unwrap();
        assert_eq!(s.source, dir.path().join("evil.sh"));

        let s = synth
            .synthesize("echo hi", "bash", Some("..\\win\\evil2.sh"))
            .unwrap();
        assert_eq!(s.source, dir.path().join("evil2.sh"));
    }

    #[test]
    fn unusable_filenames_are_rejected() {
        for name in ["", ".", "..", "dir/", "a/..", "C:evil.py"] {
            assert!(
                matches!(sanitize_filename(name), Err(SynthError::InvalidFilename(_))),
                "{name:?} should be rejected"
            );
        }
        assert_eq!(sanitize_filename("main.py").unwrap(), "main.py");
    }

    #[test]
    fn code_is_never_part_of_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let code = "$(rm -rf /) && echo pwned";
        let s = synthesizer(dir.path(), OsFamily::Linux)
            .synthesize(code, "bash", None)
            .unwrap();
        assert!(!s.strategy.render().contains("pwned"));
        assert_eq!(std::fs::read_to_string(&s.source).unwrap(), code);
    }
}
