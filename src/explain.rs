//! Human-readable trace of how a lookup was resolved.

use std::fmt::Write as _;

const INDENT: &str = "  ";

/// Collects an indented trace of tiers, levels, paths and results.
#[derive(Debug, Clone, Default)]
pub struct Explainer {
    lines: Vec<(usize, String)>,
    depth: usize,
}

impl Explainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one line at the current depth.
    pub fn text(&mut self, line: impl Into<String>) {
        self.lines.push((self.depth, line.into()));
    }

    /// Record a line and indent everything recorded until the matching
    /// [`Explainer::leave`].
    pub fn enter(&mut self, line: impl Into<String>) {
        self.text(line);
        self.depth += 1;
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (depth, line) in &self.lines {
            let _ = writeln!(out, "{}{}", INDENT.repeat(*depth), line);
        }
        out
    }
}
