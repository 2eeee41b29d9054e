//! Single build stage execution.
//!
//! A stage is one external command with a working directory, an
//! environment overlay and a fixed failure policy. Running a stage never
//! returns `Err`: a non-zero exit is a normal outcome the pipeline
//! branches on, and a command that cannot even be spawned is the distinct
//! `NotLaunchable` kind rather than "ran and failed".

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// How many trailing stderr lines a `StageOutcome` retains.
const STDERR_TAIL_LINES: usize = 20;

/// What the pipeline does when this stage fails. Fixed at construction;
/// no ad-hoc decisions at run time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnFailure {
    /// The rest of the pipeline is meaningless without this stage.
    Abort,
    /// Report and continue.
    Warn,
    /// Fall through to the next strategy in the stage's fallback chain.
    TrySecondary,
}

/// Declarative description of one invocable step. Never mutated after
/// construction.
#[derive(Clone, Debug)]
pub struct StageSpec {
    pub name: &'static str,
    pub command: Vec<String>,
    pub working_dir: PathBuf,
    /// Layered over the inherited process environment; explicit values win.
    pub env: Vec<(String, String)>,
    pub optional: bool,
    pub on_failure: OnFailure,
}

#[derive(Debug)]
pub enum ExitInfo {
    Ran { code: i32 },
    NotLaunchable { error: String },
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ran { code } => write!(f, "exit code {code}"),
            Self::NotLaunchable { error } => write!(f, "could not launch: {error}"),
        }
    }
}

/// Produced by [`run`], consumed immediately by the pipeline.
#[derive(Debug)]
pub struct StageOutcome {
    pub stage_name: &'static str,
    pub succeeded: bool,
    pub exit: ExitInfo,
    pub stderr_tail: Vec<String>,
}

/// Execute one stage to completion, blocking. Stdout is inherited; stderr
/// is streamed through line by line so failures are diagnosable in place,
/// with the last lines retained as the outcome's tail.
pub fn run(spec: &StageSpec) -> StageOutcome {
    eprintln!("[step] {}: {}", spec.name, spec.command.join(" "));

    let not_launchable = |error: String| StageOutcome {
        stage_name: spec.name,
        succeeded: false,
        exit: ExitInfo::NotLaunchable { error },
        stderr_tail: Vec::new(),
    };

    let Some(program) = spec.command.first() else {
        return not_launchable("empty command".to_string());
    };

    let mut cmd = Command::new(program);
    cmd.args(&spec.command[1..])
        .current_dir(&spec.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped());
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return not_launchable(e.to_string()),
    };

    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    if let Some(stderr) = child.stderr.take() {
        for line in BufReader::new(stderr).lines() {
            let Ok(line) = line else { break };
            eprintln!("{line}");
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }

    match child.wait() {
        Ok(status) => StageOutcome {
            stage_name: spec.name,
            succeeded: status.success(),
            exit: ExitInfo::Ran {
                code: status.code().unwrap_or(-1),
            },
            stderr_tail: tail.into(),
        },
        Err(e) => not_launchable(e.to_string()),
    }
}
