use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use log::{info, warn};

use crate::config::schema::BulkImportConfig;
use crate::error::{SinkError, StorageError};
use crate::sink::csv_sink::CsvHandoffSink;
use crate::sink::plan::HandoffPlan;
use crate::sink::{DownstreamSink, SinkReport};
use crate::storage::filesystem::ensure_directory;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Writes the import-ready CSV, then hands it to an external import
/// command (typically `msaccess.exe <db> /x <macro> /cmd <csv>`).
pub struct CommandSink {
    csv: CsvHandoffSink,
    config: BulkImportConfig,
    log_directory: PathBuf,
}

impl CommandSink {
    pub fn new<P: AsRef<Path>>(csv: CsvHandoffSink, config: BulkImportConfig, log_directory: P) -> Self {
        Self {
            csv,
            config,
            log_directory: log_directory.as_ref().to_path_buf(),
        }
    }

    /// Checks that the command and the target database exist.
    pub fn check(&self) -> Result<(), SinkError> {
        if !self.config.command.exists() {
            return Err(SinkError::CommandNotFound(self.config.command.clone()));
        }
        if !self.config.database.exists() {
            return Err(SinkError::DatabaseNotFound(self.config.database.clone()));
        }
        Ok(())
    }

    /// Arguments after the command itself.
    pub fn arguments(&self, csv_path: &Path) -> Vec<String> {
        let mut args = vec![self.config.database.display().to_string()];
        if let Some(import_macro) = self.config.r#macro.as_deref().filter(|m| !m.is_empty()) {
            args.push("/x".to_string());
            args.push(import_macro.to_string());
        }
        if self.config.use_cmd_argument {
            args.push("/cmd".to_string());
            args.push(csv_path.display().to_string());
        }
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    fn log_path(&self) -> PathBuf {
        self.log_directory.join(format!(
            "bulk_import_{}.log",
            Local::now().format("%Y%m%d_%H%M%S")
        ))
    }

    fn run(&self, args: &[String]) -> Result<CommandOutcome, SinkError> {
        let mut command = Command::new(&self.config.command);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(workdir) = &self.config.workdir {
            command.current_dir(workdir);
        }

        let mut child = command.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, Duration::from_secs(self.config.timeout_sec))?;

        Ok(CommandOutcome {
            code: status.and_then(|s| s.code()),
            timed_out: status.is_none(),
            success: status.is_some_and(|s| s.success()),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }

    fn write_log(&self, path: &Path, args: &[String], outcome: &CommandOutcome) -> Result<(), SinkError> {
        ensure_directory(&self.log_directory)?;

        let write_err = |source| {
            SinkError::Storage(StorageError::WriteFile {
                path: path.to_path_buf(),
                source,
            })
        };
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(write_err)?;

        let mut entry = format!(
            "Command: {} {}\n",
            self.config.command.display(),
            args.join(" ")
        );
        match (outcome.timed_out, outcome.code) {
            (true, _) => entry.push_str(&format!("Timed out after {}s\n", self.config.timeout_sec)),
            (false, Some(code)) => entry.push_str(&format!("Return code: {}\n", code)),
            (false, None) => entry.push_str("Terminated by signal\n"),
        }
        if !outcome.stdout.is_empty() {
            entry.push_str(&format!("--- stdout ---\n{}\n", outcome.stdout));
        }
        if !outcome.stderr.is_empty() {
            entry.push_str(&format!("--- stderr ---\n{}\n", outcome.stderr));
        }

        log.write_all(entry.as_bytes()).map_err(write_err)
    }
}

struct CommandOutcome {
    code: Option<i32>,
    timed_out: bool,
    success: bool,
    stdout: String,
    stderr: String,
}

/// Reads a pipe to the end on its own thread so the child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut out = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut out);
        }
        String::from_utf8_lossy(&out).into_owned()
    })
}

/// Waits for the child; kills it and returns `None` once `timeout` passes.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl DownstreamSink for CommandSink {
    fn name(&self) -> &str {
        "command"
    }

    fn deliver(&self, plan: &HandoffPlan) -> Result<SinkReport, SinkError> {
        let _span = tracing::info_span!("sink.command", rows = plan.approved.len()).entered();

        self.csv.write(plan)?;
        self.check()?;

        let args = self.arguments(self.csv.path());
        let log_path = self.log_path();
        info!(
            "Running bulk import for {} approved row(s)",
            plan.approved.len()
        );

        let outcome = self.run(&args)?;
        let written = match self.write_log(&log_path, &args, &outcome) {
            Ok(()) => Some(log_path.clone()),
            Err(e) => {
                warn!("Failed to write import log: {}", e);
                None
            }
        };

        if outcome.timed_out {
            return Err(SinkError::Timeout {
                seconds: self.config.timeout_sec,
                log_path: written,
            });
        }
        if !outcome.success {
            return Err(SinkError::CommandFailed {
                code: outcome.code,
                stderr: outcome.stderr.trim().to_string(),
                log_path: written,
            });
        }

        let mut report = SinkReport::all_consumed(
            plan,
            format!("import completed with return code {}", outcome.code.unwrap_or(0)),
        );
        report.log_path = Some(log_path);
        report.return_code = outcome.code;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(command: PathBuf, database: PathBuf) -> BulkImportConfig {
        BulkImportConfig {
            command,
            database,
            r#macro: Some("ImportCases".to_string()),
            timeout_sec: 600,
            use_cmd_argument: true,
            extra_args: vec!["/nostartup".to_string()],
            workdir: None,
        }
    }

    #[test]
    fn test_arguments_order() {
        let sink = CommandSink::new(
            CsvHandoffSink::new("/out/access.csv"),
            config(PathBuf::from("/bin/msaccess"), PathBuf::from("/db/cases.accdb")),
            "/logs",
        );

        assert_eq!(
            sink.arguments(Path::new("/out/access.csv")),
            vec![
                "/db/cases.accdb",
                "/x",
                "ImportCases",
                "/cmd",
                "/out/access.csv",
                "/nostartup"
            ]
        );
    }

    #[test]
    fn test_arguments_without_macro_or_cmd() {
        let mut cfg = config(PathBuf::from("/bin/msaccess"), PathBuf::from("/db/cases.accdb"));
        cfg.r#macro = None;
        cfg.use_cmd_argument = false;
        cfg.extra_args.clear();
        let sink = CommandSink::new(CsvHandoffSink::new("/out/access.csv"), cfg, "/logs");

        assert_eq!(sink.arguments(Path::new("/out/access.csv")), vec!["/db/cases.accdb"]);
    }

    #[test]
    fn test_check_reports_missing_command() {
        let temp_dir = TempDir::new().unwrap();
        let sink = CommandSink::new(
            CsvHandoffSink::new(temp_dir.path().join("access.csv")),
            config(temp_dir.path().join("missing.exe"), temp_dir.path().join("db.accdb")),
            temp_dir.path().join("logs"),
        );

        assert!(matches!(sink.check(), Err(SinkError::CommandNotFound(_))));
    }

    #[test]
    fn test_check_reports_missing_database() {
        let temp_dir = TempDir::new().unwrap();
        let command = temp_dir.path().join("import.exe");
        std::fs::write(&command, b"").unwrap();
        let sink = CommandSink::new(
            CsvHandoffSink::new(temp_dir.path().join("access.csv")),
            config(command, temp_dir.path().join("db.accdb")),
            temp_dir.path().join("logs"),
        );

        assert!(matches!(sink.check(), Err(SinkError::DatabaseNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_command_is_logged() {
        let temp_dir = TempDir::new().unwrap();
        // sh runs the database path as a script
        let database = temp_dir.path().join("db.accdb");
        std::fs::write(&database, b"echo import broke >&2\nexit 3\n").unwrap();
        let mut cfg = config(PathBuf::from("/bin/sh"), database);
        cfg.r#macro = None;
        cfg.use_cmd_argument = false;
        cfg.extra_args.clear();
        let logs = temp_dir.path().join("logs");
        let sink = CommandSink::new(CsvHandoffSink::new(temp_dir.path().join("access.csv")), cfg, &logs);

        let log = match sink.deliver(&HandoffPlan::default()) {
            Err(SinkError::CommandFailed {
                code,
                stderr,
                log_path,
            }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "import broke");
                log_path.unwrap()
            }
            other => panic!("Expected CommandFailed, got {:?}", other),
        };

        let written = std::fs::read_dir(&logs).unwrap().next().unwrap().unwrap().path();
        assert_eq!(log, written);
        let content = std::fs::read_to_string(log).unwrap();
        assert!(content.contains("Return code: 3"));
        assert!(content.contains("import broke"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_keeps_log_path() {
        let temp_dir = TempDir::new().unwrap();
        let database = temp_dir.path().join("db.accdb");
        std::fs::write(&database, b"sleep 5\n").unwrap();
        let mut cfg = config(PathBuf::from("/bin/sh"), database);
        cfg.r#macro = None;
        cfg.use_cmd_argument = false;
        cfg.extra_args.clear();
        cfg.timeout_sec = 1;
        let logs = temp_dir.path().join("logs");
        let sink = CommandSink::new(CsvHandoffSink::new(temp_dir.path().join("access.csv")), cfg, &logs);

        let err = sink.deliver(&HandoffPlan::default()).unwrap_err();

        assert!(matches!(err, SinkError::Timeout { seconds: 1, .. }));
        let log = err.log_path().unwrap();
        assert!(log.starts_with(&logs));
        assert!(std::fs::read_to_string(log).unwrap().contains("Timed out after 1s"));
    }
}
