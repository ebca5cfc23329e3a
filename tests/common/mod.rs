#![allow(dead_code)]

//! Shared test doubles for driving pipeline stages without touching the host.

use async_trait::async_trait;
use bridgectl::{CommandOutput, CommandRunner, ProgressReporter};
use std::sync::Mutex;

struct Rule {
    prefix: Vec<String>,
    replies: Vec<CommandOutput>,
    served: usize,
}

/// Command runner that answers from canned rules and records every call.
///
/// Rules match on an argv prefix and the first matching rule answers. A rule
/// with several replies serves them in order, then sticks on the last one.
/// Unscripted commands fail with an IO error so a test cannot silently run
/// something it did not expect.
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer commands starting with `prefix` with a single sticky reply.
    pub fn on(self, prefix: &[&str], reply: CommandOutput) -> Self {
        self.on_seq(prefix, vec![reply])
    }

    /// Answer commands starting with `prefix` with `replies` in order.
    pub fn on_seq(self, prefix: &[&str], replies: Vec<CommandOutput>) -> Self {
        assert!(!replies.is_empty(), "a rule needs at least one reply");
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.iter().map(|part| part.to_string()).collect(),
            replies,
            served: 0,
        });
        self
    }

    /// Every argv this runner has executed, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of executed commands starting with `prefix`.
    pub fn count_calls(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|argv| starts_with(argv, prefix))
            .count()
    }
}

fn starts_with(argv: &[String], prefix: &[&str]) -> bool {
    argv.len() >= prefix.len() && prefix.iter().zip(argv).all(|(expected, got)| got == expected)
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, argv: &[String]) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            let prefix: Vec<&str> = rule.prefix.iter().map(String::as_str).collect();
            if starts_with(argv, &prefix) {
                let index = rule.served.min(rule.replies.len() - 1);
                rule.served += 1;
                return Ok(rule.replies[index].clone());
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("unscripted command: {}", argv.join(" ")),
        ))
    }
}

/// Progress reporter that keeps emitted lines for assertions.
pub struct RecordingReporter {
    lines: Mutex<Vec<(u32, String)>>,
    failures: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<(u32, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn emit(&self, percentage: u32, message: String) {
        self.lines.lock().unwrap().push((percentage, message));
    }

    fn emit_failure(&self, message: String) {
        self.failures.lock().unwrap().push(message);
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn fail(exit_code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
