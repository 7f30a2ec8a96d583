//! Line-level diffing between the local and remote copies of an artifact.
//!
//! Wraps `similar`'s LCS-based text diff into a small change-script model:
//! an ordered list of hunks tagged unchanged/added/removed. The script is
//! built once per sync, rendered into the confirmation prompt, and dropped.

use similar::{ChangeTag, TextDiff};

/// Tag for a single hunk of the change script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkKind {
    /// Present in both the local and remote text.
    Unchanged,
    /// Present only in the remote text.
    Added,
    /// Present only in the local text.
    Removed,
}

/// A run of consecutive lines sharing one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub kind: HunkKind,
    pub text: String,
}

/// Ordered sequence of hunks describing how the local text differs from the
/// remote text. Identical inputs produce an empty script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeScript {
    hunks: Vec<Hunk>,
}

impl ChangeScript {
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// True when the inputs were identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Reconstruct the local input (unchanged + removed hunks).
    pub fn local_text(&self) -> String {
        self.replay(HunkKind::Removed)
    }

    /// Reconstruct the remote input (unchanged + added hunks).
    pub fn remote_text(&self) -> String {
        self.replay(HunkKind::Added)
    }

    fn replay(&self, keep: HunkKind) -> String {
        self.hunks
            .iter()
            .filter(|h| h.kind == HunkKind::Unchanged || h.kind == keep)
            .map(|h| h.text.as_str())
            .collect()
    }
}

/// Compute the line-level change script between the local text and the
/// remote text. Deterministic: the same inputs always yield the same script.
pub fn compute_changes(local: &str, remote: &str) -> ChangeScript {
    let diff = TextDiff::from_lines(local, remote);

    let mut hunks: Vec<Hunk> = Vec::new();
    let mut changed = false;

    for change in diff.iter_all_changes() {
        let kind = match change.tag() {
            ChangeTag::Equal => HunkKind::Unchanged,
            ChangeTag::Insert => HunkKind::Added,
            ChangeTag::Delete => HunkKind::Removed,
        };
        if kind != HunkKind::Unchanged {
            changed = true;
        }

        // Fold consecutive lines with the same tag into one hunk.
        match hunks.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(change.value()),
            _ => hunks.push(Hunk {
                kind,
                text: change.value().to_string(),
            }),
        }
    }

    if !changed {
        return ChangeScript::default();
    }

    ChangeScript { hunks }
}

/// Render the script into the user-facing summary: added lines prefixed
/// with `+ `, removed lines with `- `, unchanged hunks omitted. Line content
/// is preserved verbatim. An empty script renders as an empty string.
pub fn render_summary(script: &ChangeScript) -> String {
    let mut out = String::new();
    for hunk in script.hunks() {
        let marker = match hunk.kind {
            HunkKind::Unchanged => continue,
            HunkKind::Added => '+',
            HunkKind::Removed => '-',
        };
        for line in hunk.text.lines() {
            out.push(marker);
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_yield_empty_script() {
        let script = compute_changes("a\nb\nc\n", "a\nb\nc\n");
        assert!(script.is_empty());
        assert_eq!(render_summary(&script), "");
    }

    #[test]
    fn single_line_replacement() {
        let script = compute_changes("a\nb\nc\n", "a\nx\nc\n");

        let removed: Vec<&Hunk> = script
            .hunks()
            .iter()
            .filter(|h| h.kind == HunkKind::Removed)
            .collect();
        let added: Vec<&Hunk> = script
            .hunks()
            .iter()
            .filter(|h| h.kind == HunkKind::Added)
            .collect();

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].text, "b\n");
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].text, "x\n");

        let summary = render_summary(&script);
        assert!(summary.lines().any(|l| l == "- b"));
        assert!(summary.lines().any(|l| l == "+ x"));
    }

    #[test]
    fn replay_reconstructs_both_inputs() {
        let local = "fn main() {\n    println!(\"one\");\n}\n";
        let remote = "fn main() {\n    println!(\"two\");\n    run();\n}\n";

        let script = compute_changes(local, remote);
        assert_eq!(script.local_text(), local);
        assert_eq!(script.remote_text(), remote);
    }

    #[test]
    fn replay_handles_missing_trailing_newline() {
        let local = "a\nb";
        let remote = "a\nc";

        let script = compute_changes(local, remote);
        assert_eq!(script.local_text(), local);
        assert_eq!(script.remote_text(), remote);
    }

    #[test]
    fn consecutive_lines_fold_into_one_hunk() {
        let script = compute_changes("a\n", "a\nb\nc\n");
        let added: Vec<&Hunk> = script
            .hunks()
            .iter()
            .filter(|h| h.kind == HunkKind::Added)
            .collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].text, "b\nc\n");
    }

    #[test]
    fn summary_preserves_line_content_verbatim() {
        let script = compute_changes("  indented\n", "\ttabbed\n");
        let summary = render_summary(&script);
        assert!(summary.contains("-   indented\n"));
        assert!(summary.contains("+ \ttabbed\n"));
    }
}
