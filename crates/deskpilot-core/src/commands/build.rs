use super::{joined, keys, CommandContext, CommandHandler};
use crate::config::BUILD_FAILURE_TAIL_CHARS;
use crate::error::CommandError;
use crate::process::{Invocation, ProcessError, ProcessRequest};
use crate::reply::ReplyChannel;
use crate::utils::tail_diagnostic;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Most entries listed by `/apk list`.
const APK_LIST_LIMIT: usize = 10;

/// An APK found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApkFile {
    /// Full path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

impl ApkFile {
    fn file_name(&self) -> String {
        file_name(&self.path)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// APKs under `dirs` matching `pattern`, newest first.
///
/// `filter` is a case-insensitive substring of the file name. Unreadable
/// entries and invalid patterns are skipped.
#[must_use]
pub fn find_apks(dirs: &[PathBuf], pattern: &str, filter: Option<&str>) -> Vec<ApkFile> {
    let filter = filter.map(str::to_lowercase);
    let mut found = Vec::new();

    for dir in dirs {
        let full = dir.join(pattern);
        let paths = match glob::glob(&full.to_string_lossy()) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(pattern = %full.display(), error = %e, "Invalid APK pattern");
                continue;
            }
        };
        for path in paths.flatten() {
            if let Some(filter) = &filter {
                if !file_name(&path).to_lowercase().contains(filter.as_str()) {
                    continue;
                }
            }
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            found.push(ApkFile {
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                path,
            });
        }
    }

    found.sort_by(|a, b| b.modified.cmp(&a.modified));
    found
}

async fn search_apks(ctx: &CommandContext, filter: Option<String>) -> Vec<ApkFile> {
    let dirs = ctx.settings.apk_search_dirs();
    let pattern = ctx.settings.apk_glob.clone();
    tokio::task::spawn_blocking(move || find_apks(&dirs, &pattern, filter.as_deref()))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "APK search task failed");
            Vec::new()
        })
}

/// Send a file as an attachment, refusing anything over the size cap.
async fn send_file(
    ctx: &CommandContext,
    path: &Path,
    reply: &dyn ReplyChannel,
) -> Result<(), CommandError> {
    let not_found = || CommandError::StateValidationFailed(format!("File not found: {}", path.display()));
    let meta = tokio::fs::metadata(path).await.map_err(|_| not_found())?;
    if !meta.is_file() {
        return Err(not_found());
    }

    let size = meta.len();
    let limit = ctx.settings.max_file_size;
    if size > limit {
        return Err(CommandError::InvalidArgument(format!(
            "File too large: {}MB (limit {}MB)",
            size / 1024 / 1024,
            limit / 1024 / 1024
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CommandError::StateValidationFailed(format!("{}: {e}", path.display())))?;
    let name = file_name(path);
    reply
        .send_document(&name, bytes, &format!("{name} ({}KB)", size / 1024))
        .await
        .map_err(CommandError::Transport)?;
    info!(path = %path.display(), size, "Sent file");
    Ok(())
}

/// `/build [apk] [dir]`: run the gradle wrapper.
pub struct BuildCommand;

impl BuildCommand {
    /// Absolute project dir and the wrapper inside it.
    ///
    /// The wrapper path is absolute so it does not get resolved a second time
    /// against the child's working directory.
    fn wrapper_location(
        dir: Option<&Path>,
        wrapper: &str,
    ) -> std::io::Result<(PathBuf, PathBuf)> {
        let cwd = std::path::absolute(dir.unwrap_or_else(|| Path::new(".")))?;
        let wrapper = cwd.join(wrapper);
        Ok((cwd, wrapper))
    }

    fn last_line(stdout: &str) -> &str {
        stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
    }
}

#[async_trait]
impl CommandHandler for BuildCommand {
    fn name(&self) -> &'static str {
        "build"
    }

    fn usage(&self) -> &'static str {
        "/build [apk] [dir] — Gradle debug build (apk: send result)"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::BUILD)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let (send_apk, rest) = match args.split_first() {
            Some((first, rest)) if first.eq_ignore_ascii_case("apk") => (true, rest),
            _ => (false, args),
        };
        let dir = if rest.is_empty() {
            ctx.settings.project_dir.clone()
        } else {
            Some(PathBuf::from(joined(rest)))
        };
        let (cwd, wrapper) =
            Self::wrapper_location(dir.as_deref(), &ctx.settings.build_wrapper).map_err(|e| {
                CommandError::InvalidArgument(format!("Bad project directory: {e}"))
            })?;
        debug!(cwd = %cwd.display(), send_apk, "Starting build");

        reply
            .send_text("Building...")
            .await
            .map_err(CommandError::Transport)?;

        let mut request = ProcessRequest::new(
            Invocation::argv(
                wrapper.to_string_lossy(),
                [ctx.settings.build_task.clone()],
            ),
            Duration::from_secs(ctx.settings.build_timeout_secs),
        );
        request.cwd = Some(cwd);

        let output = ctx.runner.run(request).await.map_err(|e| match e {
            ProcessError::ExecutionFailed { exit_code, output } => {
                CommandError::ExternalNonZeroExit {
                    tool: "Build".to_string(),
                    exit_code,
                    output: tail_diagnostic(&output, BUILD_FAILURE_TAIL_CHARS),
                }
            }
            other => CommandError::from_process(
                "Build",
                "Gradle wrapper missing; check PROJECT_DIR or pass a project directory.",
                other,
            ),
        })?;

        reply
            .send_text(&format!("Build SUCCESS\n{}", Self::last_line(&output.stdout)))
            .await
            .map_err(CommandError::Transport)?;

        if send_apk {
            match search_apks(ctx, Some("debug".to_string())).await.first() {
                Some(apk) => send_file(ctx, &apk.path, reply).await?,
                None => reply
                    .send_text("Build done but no APK found.")
                    .await
                    .map_err(CommandError::Transport)?,
            }
        }
        Ok(())
    }
}

/// `/apk [filter|list]`: send or list built APKs.
pub struct ApkCommand;

#[async_trait]
impl CommandHandler for ApkCommand {
    fn name(&self) -> &'static str {
        "apk"
    }

    fn usage(&self) -> &'static str {
        "/apk [filter|list] — Send newest APK"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::APK)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let filter = args.first().map(|f| f.to_lowercase());

        if filter.as_deref() == Some("list") {
            let apks = search_apks(ctx, None).await;
            let text = if apks.is_empty() {
                "No APKs found.".to_string()
            } else {
                let lines: Vec<String> = apks
                    .iter()
                    .take(APK_LIST_LIMIT)
                    .map(|a| format!("  {} ({}KB)", a.file_name(), a.size / 1024))
                    .collect();
                format!("APKs found:\n{}", lines.join("\n"))
            };
            return reply.send_text(&text).await.map_err(CommandError::Transport);
        }

        let apks = search_apks(ctx, filter.clone()).await;
        let Some(newest) = apks.first() else {
            let text = match &filter {
                Some(f) => format!("No APK matching '{f}'.\nTry: /apk list"),
                None => "No APK found.\nTry: /apk list".to_string(),
            };
            return Err(CommandError::StateValidationFailed(text));
        };
        send_file(ctx, &newest.path, reply).await
    }
}

/// `/file <path>`: send any file.
pub struct FileCommand;

#[async_trait]
impl CommandHandler for FileCommand {
    fn name(&self) -> &'static str {
        "file"
    }

    fn usage(&self) -> &'static str {
        "/file <path> — Send a file"
    }

    fn cooldown_key(&self, _args: &[String]) -> Option<&'static str> {
        Some(keys::FILE)
    }

    async fn handle(
        &self,
        ctx: &CommandContext,
        args: &[String],
        reply: &dyn ReplyChannel,
    ) -> Result<(), CommandError> {
        let path = joined(args);
        if path.is_empty() {
            return Err(CommandError::InvalidArgument("Usage: /file <path>".to_string()));
        }
        send_file(ctx, Path::new(&path), reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerSettings;
    use crate::testing::{MockDesktop, RecordingReply, Sent};
    use std::fs::File;

    fn touch(path: &Path, bytes: usize, modified: SystemTime) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, vec![0u8; bytes]).expect("write");
        File::options()
            .write(true)
            .open(path)
            .expect("open")
            .set_modified(modified)
            .expect("set mtime");
    }

    #[test]
    fn test_find_apks_newest_first_with_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = SystemTime::now() - Duration::from_secs(600);
        touch(&dir.path().join("a/app-debug.apk"), 10, base);
        touch(
            &dir.path().join("b/app-release.apk"),
            10,
            base + Duration::from_secs(60),
        );
        touch(
            &dir.path().join("c/lib-debug.apk"),
            10,
            base + Duration::from_secs(120),
        );
        touch(&dir.path().join("c/notes.txt"), 10, base);

        let dirs = vec![dir.path().to_path_buf()];
        let names = |apks: Vec<ApkFile>| -> Vec<String> {
            apks.iter().map(ApkFile::file_name).collect()
        };

        assert_eq!(
            names(find_apks(&dirs, "**/*.apk", None)),
            vec!["lib-debug.apk", "app-release.apk", "app-debug.apk"]
        );
        assert_eq!(
            names(find_apks(&dirs, "**/*.apk", Some("DEBUG"))),
            vec!["lib-debug.apk", "app-debug.apk"]
        );
        assert!(find_apks(&[dir.path().join("missing")], "**/*.apk", None).is_empty());
    }

    #[tokio::test]
    async fn test_file_sends_document_with_size_caption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.txt");
        std::fs::write(&path, vec![b'x'; 4096]).expect("write");
        let ctx = MockDesktop::default().into_context(ControllerSettings::default(), dir.path());
        let reply = RecordingReply::new();

        FileCommand
            .handle(&ctx, &[path.display().to_string()], &reply)
            .await
            .expect("file");
        assert_eq!(
            reply.sent(),
            vec![Sent::Document {
                file_name: "log.txt".to_string(),
                bytes: vec![b'x'; 4096],
                caption: "log.txt (4KB)".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_file_missing_and_oversized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![0u8; 2048]).expect("write");
        let settings = ControllerSettings {
            max_file_size: 1024,
            ..ControllerSettings::default()
        };
        let ctx = MockDesktop::default().into_context(settings, dir.path());
        let reply = RecordingReply::new();

        let err = FileCommand
            .handle(&ctx, &[dir.path().join("nope").display().to_string()], &reply)
            .await
            .expect_err("missing");
        assert!(err.to_string().starts_with("File not found:"));

        let err = FileCommand
            .handle(&ctx, &[path.display().to_string()], &reply)
            .await
            .expect_err("too large");
        assert!(err.to_string().starts_with("File too large"));
        assert!(reply.sent().is_empty());
    }

    #[tokio::test]
    async fn test_apk_list_and_missing_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(
            &dir.path().join("out/app-debug.apk"),
            3072,
            SystemTime::now(),
        );
        let settings = ControllerSettings {
            apk_search_dirs_str: Some(dir.path().display().to_string()),
            ..ControllerSettings::default()
        };
        let ctx = MockDesktop::default().into_context(settings, dir.path());
        let reply = RecordingReply::new();

        ApkCommand
            .handle(&ctx, &["list".to_string()], &reply)
            .await
            .expect("list");
        assert_eq!(reply.texts(), vec!["APKs found:\n  app-debug.apk (3KB)"]);

        let err = ApkCommand
            .handle(&ctx, &["release".to_string()], &reply)
            .await
            .expect_err("no release apk");
        assert_eq!(err.to_string(), "No APK matching 'release'.\nTry: /apk list");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_failure_reports_output_tail() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let wrapper = dir.path().join("gradlew");
        std::fs::write(&wrapper, "#!/bin/sh\necho \"FAILURE: $1 broke\" >&2\nexit 1\n")
            .expect("write");
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let settings = ControllerSettings {
            build_wrapper: "gradlew".to_string(),
            ..ControllerSettings::default()
        };
        let ctx = MockDesktop::default().into_context(settings, dir.path());
        let reply = RecordingReply::new();

        let err = BuildCommand
            .handle(&ctx, &[dir.path().display().to_string()], &reply)
            .await
            .expect_err("build fails");
        assert_eq!(reply.texts(), vec!["Building..."]);
        assert_eq!(
            err.to_string(),
            "Build failed (code 1)\nFAILURE: assembleDebug broke\n"
        );
    }

    #[test]
    fn test_relative_project_dir_is_resolved_once() {
        let here = std::env::current_dir().expect("cwd");
        let (cwd, wrapper) =
            BuildCommand::wrapper_location(Some(Path::new("android/app")), "gradlew")
                .expect("absolute");
        assert_eq!(cwd, here.join("android/app"));
        assert_eq!(wrapper, here.join("android/app/gradlew"));
        assert!(wrapper.is_absolute());

        let (cwd, wrapper) = BuildCommand::wrapper_location(None, "gradlew").expect("absolute");
        assert!(cwd.is_absolute());
        assert_eq!(wrapper.parent(), Some(cwd.as_path()));
    }

    #[test]
    fn test_last_line_skips_blank_lines() {
        assert_eq!(
            BuildCommand::last_line("> Task :app\nBUILD SUCCESSFUL in 3s\n\n  \n"),
            "BUILD SUCCESSFUL in 3s"
        );
        assert_eq!(BuildCommand::last_line(""), "");
    }
}
