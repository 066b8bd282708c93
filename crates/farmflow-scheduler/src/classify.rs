//! Fight result classification.
//!
//! The engine reports farming results as free text. Everything that reads
//! that text lives here so the patterns can be tested in isolation.

use farmflow_core::types::CommandOutput;

/// Prefixes followed by the number of completed runs.
pub const RUN_COUNT_MARKERS: &[&str] = &["runs:", "times:", "次数:"];

/// Engine lines that mark a finished task list.
pub const COMPLETION_MARKERS: &[&str] = &["AllTasksCompleted", "All tasks completed", "任务全部完成"];

/// Stage names whose completion output is ambiguous once the weekly reward is claimed.
pub const BONUS_CLEAR_PATTERNS: &[&str] = &["annihilation", "剿灭"];

pub const SANITY_EXHAUSTED: &str = "sanity exhausted";

/// Outcome of one `(stage, runs)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FightVerdict {
    Completed { runs: Option<u32> },
    /// Later pairs of the same task are skipped with this reason.
    SanityExhausted(String),
    Failed(String),
}

/// All run counts reported in `text`, in order of appearance.
pub fn run_counts(text: &str) -> Vec<u32> {
    let mut counts = Vec::new();
    for line in text.lines() {
        for marker in RUN_COUNT_MARKERS {
            let Some(pos) = line.find(marker) else {
                continue;
            };
            let rest = line[pos + marker.len()..].trim_start();
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = digits.parse() {
                counts.push(n);
            }
        }
    }
    counts
}

pub fn is_bonus_clear(stage: &str) -> bool {
    let lower = stage.to_lowercase();
    BONUS_CLEAR_PATTERNS.iter().any(|p| lower.contains(p))
}

pub fn reports_completion(text: &str) -> bool {
    COMPLETION_MARKERS.iter().any(|m| text.contains(m))
}

/// Classify the output of one farming pair.
///
/// A non-zero exit code is a failure. Zero reported runs means sanity ran
/// out. So does a completion marker with no run count at all, except on
/// bonus-clear stages: those print the same thing once their reward was
/// already claimed, and the two cases cannot be told apart from text.
pub fn classify_fight_output(stage: &str, output: &CommandOutput) -> FightVerdict {
    if !output.success() {
        return FightVerdict::Failed(output.failure_reason());
    }
    match run_counts(&output.stdout).last().copied() {
        Some(0) => FightVerdict::SanityExhausted(format!("{SANITY_EXHAUSTED} (0 runs on {stage})")),
        Some(n) => FightVerdict::Completed { runs: Some(n) },
        None if reports_completion(&output.stdout) && !is_bonus_clear(stage) => {
            let reason = format!("{SANITY_EXHAUSTED} (no runs reported on {stage})");
            FightVerdict::SanityExhausted(reason)
        }
        None => FightVerdict::Completed { runs: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: 2,
        }
    }

    #[test]
    fn test_run_counts_all_markers() {
        let text = "[Fight] stage 1-7 runs: 6\nlater times: 2 done\n作战 次数: 0\nno marker 9";
        assert_eq!(run_counts(text), vec![6, 2, 0]);
    }

    #[test]
    fn test_marker_without_number_ignored() {
        assert!(run_counts("runs: unknown").is_empty());
    }

    #[test]
    fn test_completed_with_count() {
        let out = CommandOutput::ok("runs: 4\nAllTasksCompleted");
        assert_eq!(
            classify_fight_output("1-7", &out),
            FightVerdict::Completed { runs: Some(4) }
        );
        assert!(reports_completion(&out.stdout));
    }

    #[test]
    fn test_completion_marker_without_count_is_exhausted() {
        let out = CommandOutput::ok("任务全部完成");
        match classify_fight_output("1-7", &out) {
            FightVerdict::SanityExhausted(reason) => assert!(reason.contains("no runs reported")),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_zero_runs_means_sanity_exhausted() {
        let out = CommandOutput::ok("runs: 0");
        match classify_fight_output("CE-6", &out) {
            FightVerdict::SanityExhausted(reason) => assert!(reason.starts_with(SANITY_EXHAUSTED)),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_bonus_clear_marker_without_count_is_completed() {
        let out = CommandOutput::ok("AllTasksCompleted");
        assert_eq!(
            classify_fight_output("Annihilation", &out),
            FightVerdict::Completed { runs: None }
        );
        assert!(is_bonus_clear("剿灭作战"));
    }

    #[test]
    fn test_no_marker_no_count_is_completed() {
        let out = CommandOutput::ok("farming finished");
        assert_eq!(classify_fight_output("1-7", &out), FightVerdict::Completed { runs: None });
    }

    #[test]
    fn test_nonzero_exit_is_failure() {
        assert_eq!(
            classify_fight_output("1-7", &failed("device offline")),
            FightVerdict::Failed("device offline".into())
        );
    }
}
