//! Compiler invocation: run the LaTeX engine inside the scratch directory.
//!
//! The engine runs with `-interaction=nonstopmode` and a closed stdin so it
//! never waits for terminal input, and with stdout discarded because
//! `pdflatex` echoes its whole transcript there. The transcript is still
//! available in `<job>.log`, which we tail when compilation fails.
//!
//! On unix the engine leads its own process group. When the timeout fires,
//! or the request is dropped mid-compile, the whole group is killed, which
//! also takes out helpers the engine forked (`mktexpk`, `mktextfm`) and the
//! real engine behind a wrapper script. Elsewhere only the direct child is
//! killed, via `kill_on_drop`.

use crate::config::{ExitStatusPolicy, RenderConfig};
use crate::error::RenderError;
use crate::pipeline::source::Workspace;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Number of trailing log lines kept in [`RenderError::CompilationFailed`].
pub const LOG_TAIL_LINES: usize = 20;

/// A PDF produced by one compiler run.
#[derive(Debug, Clone)]
pub struct CompiledPdf {
    /// Path of `<job>.pdf` inside the scratch directory.
    pub path: PathBuf,
    /// Compiler exit code (None if killed by a signal).
    pub exit_code: Option<i32>,
    /// Wall-clock compile time.
    pub duration_ms: u64,
}

/// Compile the workspace's source into `<job>.pdf`.
///
/// # Errors
/// - [`RenderError::CompilerNotFound`] / [`RenderError::CompilerSpawn`] if the
///   engine cannot be started
/// - [`RenderError::CompileTimeout`] if it runs past the configured limit
/// - [`RenderError::CompilationFailed`] per [`ExitStatusPolicy`]
/// - [`RenderError::PdfMissing`] if it exits 0 without writing a PDF
pub async fn compile(workspace: &Workspace, config: &RenderConfig) -> Result<CompiledPdf, RenderError> {
    let start = Instant::now();
    let program = &config.latex_program;

    let mut cmd = Command::new(program);
    cmd.arg(format!("-jobname={}", config.job_name))
        .arg("-interaction=nonstopmode")
        .args(&config.extra_args)
        .arg(workspace.source_path())
        .current_dir(workspace.dir())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    debug!("Running {} in {}", program, workspace.dir().display());

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RenderError::CompilerNotFound {
                program: program.clone(),
            }
        } else {
            RenderError::CompilerSpawn {
                program: program.clone(),
                source: e,
            }
        }
    })?;
    let mut group = ProcessGroupGuard::new(child.id());

    let output = match tokio::time::timeout(config.compile_timeout(), child.wait_with_output()).await {
        Ok(result) => result
            .map_err(|e| RenderError::Internal(format!("Waiting for {program} failed: {e}")))?,
        Err(_) => {
            warn!(
                "{} exceeded {}s, killed",
                program, config.compile_timeout_secs
            );
            return Err(RenderError::CompileTimeout {
                secs: config.compile_timeout_secs,
            });
        }
    };

    group.disarm();

    let duration_ms = start.elapsed().as_millis() as u64;
    let pdf_path = workspace.artifact(&config.pdf_file_name());
    let produced = tokio::fs::try_exists(&pdf_path).await.unwrap_or(false);
    let exit_code = output.status.code();

    if output.status.success() {
        if !produced {
            return Err(RenderError::PdfMissing { path: pdf_path });
        }
    } else if config.exit_status_policy == ExitStatusPolicy::Lenient && produced {
        warn!(
            "{} exited with {:?}; keeping the PDF it wrote",
            program, exit_code
        );
    } else {
        let log_path = workspace.artifact(&config.log_file_name());
        let log_tail = read_log_tail(&log_path, &output.stderr).await;
        return Err(RenderError::CompilationFailed {
            code: exit_code,
            log_tail,
        });
    }

    info!("Compiled {} in {}ms", pdf_path.display(), duration_ms);

    Ok(CompiledPdf {
        path: pdf_path,
        exit_code,
        duration_ms,
    })
}

/// Kills the engine's process group on drop unless disarmed.
struct ProcessGroupGuard {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // The leader was spawned with process_group(0), so its pid is the pgid.
            let result = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
            if result == 0 {
                debug!(pgid, "Killed engine process group");
            } else {
                debug!(pgid, "Engine process group already gone");
            }
        }
    }
}

/// Last [`LOG_TAIL_LINES`] lines of the compiler log, or of stderr when the
/// engine died before opening its log.
async fn read_log_tail(log_path: &Path, stderr: &[u8]) -> String {
    // TeX logs are written in the engine's 8-bit encoding, not UTF-8.
    match tokio::fs::read(log_path).await {
        Ok(bytes) => tail_lines(&String::from_utf8_lossy(&bytes), LOG_TAIL_LINES),
        Err(_) => tail_lines(&String::from_utf8_lossy(stderr), LOG_TAIL_LINES),
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines[skip..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_lines_keeps_last_n() {
        let text = "a\nb\nc\nd\n";
        assert_eq!(tail_lines(text, 2), "c\nd");
        assert_eq!(tail_lines(text, 10), "a\nb\nc\nd");
        assert_eq!(tail_lines("", 3), "");
    }

    #[tokio::test]
    async fn missing_program_is_reported_by_name() {
        let ws = crate::pipeline::source::materialize("x", None).await.unwrap();
        let config = RenderConfig::builder()
            .latex_program("definitely-not-a-latex-engine-7c1f")
            .build()
            .unwrap();
        let err = compile(&ws, &config).await.unwrap_err();
        match err {
            RenderError::CompilerNotFound { program } => {
                assert_eq!(program, "definitely-not-a-latex-engine-7c1f")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    mod fake_engine {
        use super::*;
        use crate::pipeline::source::materialize;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Write an executable shell script standing in for pdflatex.
        fn fake_engine(body: &str) -> (TempDir, PathBuf) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("fake-latex");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            (dir, path)
        }

        fn config_for(engine: &Path, policy: ExitStatusPolicy, timeout: u64) -> RenderConfig {
            RenderConfig::builder()
                .latex_program(engine.to_string_lossy())
                .exit_status_policy(policy)
                .compile_timeout_secs(timeout)
                .build()
                .unwrap()
        }

        #[tokio::test]
        async fn success_passes_nonstop_args_and_runs_in_scratch_dir() {
            let (_guard, engine) = fake_engine(
                "printf '%s\\n' \"$@\" > args.txt\nprintf '%%PDF-1.4\\n' > output.pdf",
            );
            let ws = materialize("hello", None).await.unwrap();
            let pdf = compile(&ws, &config_for(&engine, ExitStatusPolicy::Strict, 10))
                .await
                .unwrap();

            assert_eq!(pdf.path, ws.artifact("output.pdf"));
            assert_eq!(pdf.exit_code, Some(0));

            let args = std::fs::read_to_string(ws.artifact("args.txt")).unwrap();
            let args: Vec<&str> = args.lines().collect();
            assert_eq!(args[0], "-jobname=output");
            assert_eq!(args[1], "-interaction=nonstopmode");
            assert!(args[2].ends_with("input.tex"), "got {args:?}");
        }

        #[tokio::test]
        async fn timeout_kills_the_engine() {
            let (_guard, engine) = fake_engine("exec sleep 30");
            let ws = materialize("x", None).await.unwrap();
            let start = Instant::now();
            let err = compile(&ws, &config_for(&engine, ExitStatusPolicy::Lenient, 1))
                .await
                .unwrap_err();
            assert!(matches!(err, RenderError::CompileTimeout { secs: 1 }), "got {err:?}");
            assert!(start.elapsed().as_secs() < 10);
        }

        /// True while `pid` exists and is not a zombie.
        #[cfg(target_os = "linux")]
        fn is_running(pid: &str) -> bool {
            match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Ok(stat) => stat
                    .rsplit_once(") ")
                    .map(|(_, rest)| !rest.starts_with('Z'))
                    .unwrap_or(false),
                Err(_) => false,
            }
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn timeout_kills_processes_the_engine_started() {
            let (_guard, engine) = fake_engine("sleep 30 &\necho $! > sleeper.pid\nwait $!");
            let ws = materialize("x", None).await.unwrap();
            let err = compile(&ws, &config_for(&engine, ExitStatusPolicy::Lenient, 1))
                .await
                .unwrap_err();
            assert!(matches!(err, RenderError::CompileTimeout { secs: 1 }), "got {err:?}");

            let pid = std::fs::read_to_string(ws.artifact("sleeper.pid")).unwrap();
            let pid = pid.trim();
            let deadline = Instant::now() + std::time::Duration::from_secs(5);
            while is_running(pid) && Instant::now() < deadline {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            assert!(!is_running(pid), "sleep {pid} outlived the compile timeout");
        }

        #[tokio::test]
        async fn nonzero_without_pdf_fails_under_both_policies() {
            let (_guard, engine) = fake_engine(
                "echo 'This is pdfTeX' > output.log\necho '! Undefined control sequence.' >> output.log\nexit 1",
            );
            for policy in [ExitStatusPolicy::Lenient, ExitStatusPolicy::Strict] {
                let ws = materialize("\\bogus", None).await.unwrap();
                let err = compile(&ws, &config_for(&engine, policy, 10))
                    .await
                    .unwrap_err();
                match err {
                    RenderError::CompilationFailed { code, log_tail } => {
                        assert_eq!(code, Some(1));
                        assert!(log_tail.contains("Undefined control sequence"));
                    }
                    other => panic!("unexpected error: {other:?}"),
                }
            }
        }

        #[tokio::test]
        async fn nonzero_with_pdf_depends_on_policy() {
            let (_guard, engine) = fake_engine("printf '%%PDF-1.4\\n' > output.pdf\nexit 1");

            let ws = materialize("x", None).await.unwrap();
            let pdf = compile(&ws, &config_for(&engine, ExitStatusPolicy::Lenient, 10))
                .await
                .unwrap();
            assert_eq!(pdf.exit_code, Some(1));

            let ws = materialize("x", None).await.unwrap();
            let err = compile(&ws, &config_for(&engine, ExitStatusPolicy::Strict, 10))
                .await
                .unwrap_err();
            assert!(matches!(err, RenderError::CompilationFailed { code: Some(1), .. }));
        }

        #[tokio::test]
        async fn success_without_pdf_is_pdf_missing() {
            let (_guard, engine) = fake_engine("exit 0");
            let ws = materialize("x", None).await.unwrap();
            let err = compile(&ws, &config_for(&engine, ExitStatusPolicy::Lenient, 10))
                .await
                .unwrap_err();
            assert!(matches!(err, RenderError::PdfMissing { .. }), "got {err:?}");
        }

        #[tokio::test]
        async fn stderr_is_used_when_no_log_exists() {
            let (_guard, engine) = fake_engine("echo 'fatal: no format file' >&2\nexit 3");
            let ws = materialize("x", None).await.unwrap();
            let err = compile(&ws, &config_for(&engine, ExitStatusPolicy::Lenient, 10))
                .await
                .unwrap_err();
            match err {
                RenderError::CompilationFailed { code, log_tail } => {
                    assert_eq!(code, Some(3));
                    assert!(log_tail.contains("no format file"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
