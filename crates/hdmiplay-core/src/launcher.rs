//! Backend fallback for the external player.
//!
//! Candidates are tried strictly in order. Each attempt starts the player
//! with that backend's environment, hands it to the probe policy, and either
//! becomes the play session or is cleaned up before the next one starts.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{Backend, VIDEO_DRIVER_VAR};
use crate::config::AppConfig;
use crate::error::LaunchError;
use crate::probe::{LivenessProbe, ProbePolicy, ProbeVerdict};

/// The player executable and the flags placed before the video path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    pub executable: String,
    pub args: Vec<String>,
}

/// Handle to a player released to the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachedPlayer {
    pub pid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    /// The player ran in the foreground until it exited.
    /// `None` means it was terminated by a signal.
    Finished { exit_code: Option<i32> },
    Detached(DetachedPlayer),
}

/// Why one candidate did not become the session.
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error("could not start player: {0}")]
    Spawn(io::Error),

    #[error("player exited during probe (rc={})", exit_code_label(.code))]
    ExitedEarly { code: Option<i32> },

    #[error("probe rejected player: {0}")]
    Rejected(String),

    #[error("lost track of player: {0}")]
    Wait(io::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".into())
}

#[derive(Debug)]
pub struct FailedAttempt {
    pub backend: Backend,
    pub failure: AttemptFailure,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "backend {}: {}", self.backend, self.failure)
    }
}

/// The backend that became the session, plus everything that failed first.
#[derive(Debug)]
pub struct LaunchOutcome {
    pub backend: Backend,
    pub session: Session,
    pub failed: Vec<FailedAttempt>,
}

pub struct Launcher<P = LivenessProbe> {
    player: PlayerCommand,
    framebuffer: PathBuf,
    probe: P,
}

impl Launcher<LivenessProbe> {
    pub fn new(player: PlayerCommand, framebuffer: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            player,
            framebuffer: framebuffer.into(),
            probe: LivenessProbe::new(window),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.player_command(),
            config.backends.framebuffer_device.clone(),
            config.probe_window(),
        )
    }
}

impl<P: ProbePolicy> Launcher<P> {
    /// Swap the probe policy, keeping everything else.
    pub fn with_probe<Q: ProbePolicy>(self, probe: Q) -> Launcher<Q> {
        Launcher {
            player: self.player,
            framebuffer: self.framebuffer,
            probe,
        }
    }

    /// Try `candidates` in order until one passes the probe.
    ///
    /// The caller is expected to have checked that `video` exists. With
    /// `detach`, an accepted player is left running in its own process group
    /// and only its pid is returned; otherwise this blocks until it exits.
    pub fn launch(
        &self,
        video: &Path,
        candidates: &[Backend],
        detach: bool,
    ) -> Result<LaunchOutcome, LaunchError> {
        let executable = which::which(&self.player.executable)
            .map_err(|_| LaunchError::ExecutableMissing(self.player.executable.clone()))?;

        let mut failed = Vec::new();
        for &backend in candidates {
            match self.attempt(&executable, video, backend, detach) {
                Ok(session) => {
                    return Ok(LaunchOutcome {
                        backend,
                        session,
                        failed,
                    })
                }
                Err(failure) => {
                    warn!(%backend, %failure, "Backend appeared to fail; trying next backend");
                    failed.push(FailedAttempt { backend, failure });
                }
            }
        }

        Err(LaunchError::AllBackendsFailed { attempts: failed })
    }

    fn attempt(
        &self,
        executable: &Path,
        video: &Path,
        backend: Backend,
        detach: bool,
    ) -> Result<Session, AttemptFailure> {
        let overlay = backend.env_overlay(&self.framebuffer);
        let driver = overlay
            .iter()
            .find(|(k, _)| *k == VIDEO_DRIVER_VAR)
            .map(|(_, v)| v.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<default>".into());

        let mut cmd = Command::new(executable);
        cmd.args(&self.player.args)
            .arg(video)
            .envs(overlay)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        if detach {
            cmd.stdin(Stdio::null());
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                cmd.process_group(0);
            }
        }

        info!(%backend, "Launching player with {VIDEO_DRIVER_VAR}={driver}");
        let mut child = cmd.spawn().map_err(AttemptFailure::Spawn)?;

        let verdict = match self.probe.probe(&mut child) {
            Ok(verdict) => verdict,
            Err(e) => {
                stop(&mut child);
                return Err(AttemptFailure::Wait(e));
            }
        };

        match verdict {
            ProbeVerdict::Accepted if detach => {
                let pid = child.id();
                info!(%backend, pid, "Player started detached; the session can be closed");
                Ok(Session::Detached(DetachedPlayer { pid }))
            }
            ProbeVerdict::Accepted => {
                debug!(%backend, pid = child.id(), "Player passed probe; waiting for it to finish");
                let status = child.wait().map_err(AttemptFailure::Wait)?;
                Ok(Session::Finished {
                    exit_code: status.code(),
                })
            }
            ProbeVerdict::Exited(status) => Err(AttemptFailure::ExitedEarly {
                code: status.code(),
            }),
            ProbeVerdict::Rejected(reason) => {
                stop(&mut child);
                Err(AttemptFailure::Rejected(reason))
            }
        }
    }
}

/// Kill and reap a player that will not become the session.
fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(pid = child.id(), error = %e, "Player already gone");
    }
    if let Err(e) = child.wait() {
        warn!(pid = child.id(), error = %e, "Failed to reap player");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;
    use tempfile::TempDir;

    const PROBE: Duration = Duration::from_millis(500);

    struct Fixture {
        dir: TempDir,
        video: PathBuf,
        log: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let video = dir.path().join("movie.mp4");
            std::fs::write(&video, b"not really a movie").unwrap();
            let log = dir.path().join("drivers.log");
            Self { dir, video, log }
        }

        /// Fake player script: records the driver it was given, then runs `body`.
        fn launcher(&self, body: &str) -> Launcher {
            let path = self.dir.path().join("fake-ffplay");
            let script = format!(
                "#!/bin/sh\necho \"${{SDL_VIDEODRIVER:-default}}\" >> '{}'\n{body}\n",
                self.log.display()
            );
            std::fs::write(&path, script).unwrap();

            // Run through sh so the freshly written file is never exec'd
            // while another test thread may still hold it open.
            let player = PlayerCommand {
                executable: "sh".into(),
                args: vec![path.to_string_lossy().into_owned()],
            };
            Launcher::new(player, self.dir.path().join("no-fb0"), PROBE)
        }

        fn drivers_tried(&self) -> Vec<String> {
            std::fs::read_to_string(&self.log)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn test_stops_at_first_surviving_backend() {
        let fx = Fixture::new();
        let launcher = fx.launcher(
            "[ \"$SDL_VIDEODRIVER\" = kmsdrm ] && exit 1\nsleep 1\nexit 7",
        );

        let outcome = launcher
            .launch(&fx.video, &Backend::AUTO_ORDER, false)
            .unwrap();

        assert_eq!(outcome.backend, Backend::Fbcon);
        assert_eq!(outcome.session, Session::Finished { exit_code: Some(7) });
        assert_eq!(outcome.failed.len(), 1);
        assert!(matches!(
            outcome.failed[0].failure,
            AttemptFailure::ExitedEarly { code: Some(1) }
        ));
        assert_eq!(fx.drivers_tried(), vec!["kmsdrm", "fbcon"]);
    }

    #[test]
    fn test_foreground_returns_player_exit_code() {
        let fx = Fixture::new();
        let launcher = fx.launcher("sleep 1\nexit 0");

        let outcome = launcher.launch(&fx.video, &[Backend::Kmsdrm], false).unwrap();
        assert_eq!(outcome.session, Session::Finished { exit_code: Some(0) });
        assert!(outcome.failed.is_empty());
    }

    #[test]
    fn test_quick_exit_counts_as_failure() {
        let fx = Fixture::new();
        let launcher = fx.launcher("exit 0");

        let err = launcher
            .launch(&fx.video, &Backend::AUTO_ORDER, false)
            .unwrap_err();
        match err {
            LaunchError::AllBackendsFailed { attempts } => {
                assert_eq!(attempts.len(), 3);
                let order: Vec<Backend> = attempts.iter().map(|a| a.backend).collect();
                assert_eq!(order, Backend::AUTO_ORDER.to_vec());
            }
            other => panic!("expected AllBackendsFailed, got {other:?}"),
        }
        assert_eq!(fx.drivers_tried(), vec!["kmsdrm", "fbcon", "default"]);
    }

    #[test]
    fn test_all_failed_reports_last_error() {
        let fx = Fixture::new();
        let launcher = fx.launcher("exit 3");

        let err = launcher
            .launch(&fx.video, &[Backend::Kmsdrm, Backend::Default], false)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("backend default"), "{message}");
        assert!(message.contains("rc=3"), "{message}");
    }

    #[test]
    fn test_missing_executable_fails_before_any_attempt() {
        let fx = Fixture::new();
        let player = PlayerCommand {
            executable: fx.dir.path().join("no-such-player").to_string_lossy().into_owned(),
            args: vec![],
        };
        let launcher = Launcher::new(player, "/dev/fb0", PROBE);

        let err = launcher
            .launch(&fx.video, &Backend::AUTO_ORDER, false)
            .unwrap_err();
        assert!(matches!(err, LaunchError::ExecutableMissing(_)));
        assert!(fx.drivers_tried().is_empty());
    }

    #[test]
    fn test_detached_returns_without_waiting() {
        let fx = Fixture::new();
        let launcher = fx.launcher("exec sleep 30");

        let started = Instant::now();
        let outcome = launcher.launch(&fx.video, &[Backend::Kmsdrm], true).unwrap();
        let elapsed = started.elapsed();

        let Session::Detached(player) = outcome.session else {
            panic!("expected detached session, got {:?}", outcome.session);
        };
        assert!(player.pid > 0);
        assert!(elapsed < Duration::from_secs(10), "launch blocked for {elapsed:?}");

        #[cfg(target_os = "linux")]
        let group = process_group(player.pid);
        Command::new("kill").arg(player.pid.to_string()).status().unwrap();

        #[cfg(target_os = "linux")]
        {
            assert_eq!(group, player.pid, "detached player should lead its own group");
            assert_ne!(group, process_group(std::process::id()));
        }
    }

    /// Process group id from field 5 of `/proc/<pid>/stat`.
    #[cfg(target_os = "linux")]
    fn process_group(pid: u32) -> u32 {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap();
        // comm may contain spaces; fields after it are plain.
        let (_, rest) = stat.rsplit_once(')').unwrap();
        rest.split_whitespace().nth(2).unwrap().parse().unwrap()
    }

    /// Accepts every player after noting the group it runs in.
    #[cfg(target_os = "linux")]
    #[derive(Default)]
    struct RecordGroup {
        groups: Mutex<Vec<u32>>,
    }

    #[cfg(target_os = "linux")]
    impl ProbePolicy for &RecordGroup {
        fn probe(&self, child: &mut Child) -> io::Result<ProbeVerdict> {
            self.groups.lock().unwrap().push(process_group(child.id()));
            Ok(ProbeVerdict::Accepted)
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_foreground_player_stays_in_caller_group() {
        let fx = Fixture::new();
        let policy = RecordGroup::default();
        let launcher = fx.launcher("sleep 1").with_probe(&policy);

        let outcome = launcher.launch(&fx.video, &[Backend::Kmsdrm], false).unwrap();
        assert_eq!(outcome.session, Session::Finished { exit_code: Some(0) });

        let groups = policy.groups.lock().unwrap();
        assert_eq!(*groups, vec![process_group(std::process::id())]);
    }

    #[test]
    fn test_player_arguments_and_video_path() {
        let fx = Fixture::new();
        let args_file = fx.dir.path().join("args");
        let mut launcher =
            fx.launcher(&format!("echo \"$@\" > '{}'\nsleep 1", args_file.display()));
        launcher.player.args.extend(["-fs", "-autoexit"].map(String::from));

        launcher.launch(&fx.video, &[Backend::Default], false).unwrap();

        let args = std::fs::read_to_string(&args_file).unwrap();
        assert_eq!(args.trim(), format!("-fs -autoexit {}", fx.video.display()));
    }

    /// Rejects every running player and remembers which pids it saw.
    #[derive(Default)]
    struct RejectRunning {
        seen: Mutex<Vec<u32>>,
    }

    impl ProbePolicy for &RejectRunning {
        fn probe(&self, child: &mut Child) -> io::Result<ProbeVerdict> {
            self.seen.lock().unwrap().push(child.id());
            Ok(ProbeVerdict::Rejected("black screen".into()))
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_rejected_players_are_stopped_before_next_attempt() {
        let fx = Fixture::new();
        let policy = RejectRunning::default();
        let launcher = fx.launcher("exec sleep 30").with_probe(&policy);

        let err = launcher
            .launch(&fx.video, &[Backend::Kmsdrm, Backend::Fbcon], false)
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::AllBackendsFailed { ref attempts } if attempts.len() == 2
        ));

        let seen = policy.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for pid in seen.iter() {
            assert!(!Path::new(&format!("/proc/{pid}")).exists(), "pid {pid} still running");
        }
    }

    /// Loses track of every player it is handed.
    #[derive(Default)]
    struct FailingProbe {
        seen: Mutex<Vec<u32>>,
    }

    impl ProbePolicy for &FailingProbe {
        fn probe(&self, child: &mut Child) -> io::Result<ProbeVerdict> {
            self.seen.lock().unwrap().push(child.id());
            Err(io::Error::other("display went away"))
        }
    }

    #[test]
    fn test_probe_error_stops_player_and_tries_next() {
        let fx = Fixture::new();
        let policy = FailingProbe::default();
        let launcher = fx.launcher("exec sleep 30").with_probe(&policy);

        let started = Instant::now();
        let err = launcher
            .launch(&fx.video, &[Backend::Kmsdrm, Backend::Fbcon], false)
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(10));

        let attempts = match err {
            LaunchError::AllBackendsFailed { attempts } => attempts,
            other => panic!("expected AllBackendsFailed, got {other:?}"),
        };
        let order: Vec<Backend> = attempts.iter().map(|a| a.backend).collect();
        assert_eq!(order, vec![Backend::Kmsdrm, Backend::Fbcon]);
        assert!(attempts
            .iter()
            .all(|a| matches!(a.failure, AttemptFailure::Wait(_))));
        assert!(attempts[1].to_string().contains("display went away"));
        assert_eq!(policy.seen.lock().unwrap().len(), 2);

        #[cfg(target_os = "linux")]
        for pid in policy.seen.lock().unwrap().iter() {
            assert!(!Path::new(&format!("/proc/{pid}")).exists(), "pid {pid} still running");
        }
    }
}
