//! Capture of structured responses from the console stream.
//!
//! The device answers `/ls` and `/cat` with ordinary console output, framed
//! only by loose markers: a header or banner before the body, the prompt (or
//! a count/EOF line) after it. A [`Collector`] reads a [`LineTap`] and
//! keeps the lines between those markers. Every line still reaches the data
//! callback; capturing never steals output from the terminal.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::event::LineTap;
use crate::protocol::listing::is_entry_line;

/// Prompt printed by the stock firmware when idle.
pub const DEFAULT_PROMPT: &str = "WebScreen>";

/// Default capture window for directory listings.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(2);

/// Default capture window for file reads.
pub const FILE_TIMEOUT: Duration = Duration::from_secs(5);

static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[=\-]{3,}$").expect("separator pattern is valid"));

static COUNT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:total\b|\d+\s+files?\b)").expect("count pattern is valid")
});

static FILE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:---|---\s*(?:end|eof)\s*-*|\[?eof\]?|end of file\b.*)$")
        .expect("end-of-file pattern is valid")
});

/// Classification of one console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Response starts here. `include` keeps the line itself.
    Start { include: bool },
    /// Response ended.
    End,
    /// Decoration inside the response, dropped.
    Noise,
    /// Ordinary content.
    Body,
}

type Classifier = Box<dyn Fn(&str, bool) -> LineKind + Send + Sync>;

/// Predicate deciding where a response starts and ends.
///
/// The classifier receives the line and whether capture has started.
pub struct CaptureRule {
    name: &'static str,
    classify: Classifier,
}

impl fmt::Debug for CaptureRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Returns true if the line is the idle prompt.
#[must_use]
pub fn is_prompt(line: &str, prompt: &str) -> bool {
    let line = line.trim();
    line == ">" || (!prompt.is_empty() && line.starts_with(prompt))
}

impl CaptureRule {
    /// Creates a rule from a classifier.
    pub fn new(
        name: &'static str,
        classify: impl Fn(&str, bool) -> LineKind + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            classify: Box::new(classify),
        }
    }

    /// Rule for `/ls` output.
    ///
    /// Starts on a header (a line mentioning "listing" or a `===`/`---`
    /// separator) or on the first entry line, which is kept. Ends on the
    /// prompt or a `Total ...`/`N files` summary.
    #[must_use]
    pub fn listing(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self::new("listing", move |line, collecting| {
            let trimmed = line.trim();
            if is_prompt(trimmed, &prompt) || COUNT_LINE.is_match(trimmed) {
                return LineKind::End;
            }
            if is_entry_line(trimmed) {
                return if collecting {
                    LineKind::Body
                } else {
                    LineKind::Start { include: true }
                };
            }
            let header =
                trimmed.to_lowercase().contains("listing") || SEPARATOR.is_match(trimmed);
            match (header, collecting) {
                (true, false) => LineKind::Start { include: false },
                (true, true) => LineKind::Noise,
                (false, _) => LineKind::Body,
            }
        })
    }

    /// Rule for `/cat` output.
    ///
    /// Starts on the `--- <path>` banner, which is dropped. Ends on the
    /// prompt, a closing `---` banner, or an `EOF`/`End of file` marker.
    #[must_use]
    pub fn file(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self::new("file", move |line, collecting| {
            let trimmed = line.trim();
            if collecting {
                if is_prompt(trimmed, &prompt) || FILE_END.is_match(trimmed) {
                    LineKind::End
                } else {
                    LineKind::Body
                }
            } else if trimmed.starts_with("--- ") && !FILE_END.is_match(trimmed) {
                LineKind::Start { include: false }
            } else {
                LineKind::Body
            }
        })
    }

    /// Rule name, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Classifies a line.
    #[must_use]
    pub fn classify(&self, line: &str, collecting: bool) -> LineKind {
        (self.classify)(line, collecting)
    }
}

/// Capture state for one structured request.
#[derive(Debug)]
pub struct Collector {
    rule: CaptureRule,
    collecting: bool,
    finished: bool,
    lines: Vec<String>,
}

impl Collector {
    /// Creates an idle collector.
    #[must_use]
    pub const fn new(rule: CaptureRule) -> Self {
        Self {
            rule,
            collecting: false,
            finished: false,
            lines: Vec::new(),
        }
    }

    /// Feeds one line. Returns true when the end marker is seen.
    pub fn observe(&mut self, line: &str) -> bool {
        if self.finished {
            return false;
        }
        match self.rule.classify(line, self.collecting) {
            LineKind::Start { include } if !self.collecting => {
                self.collecting = true;
                if include {
                    self.lines.push(line.to_owned());
                }
            }
            _ if !self.collecting => {}
            LineKind::End => {
                self.collecting = false;
                self.finished = true;
                return true;
            }
            LineKind::Noise => {}
            LineKind::Start { .. } | LineKind::Body => self.lines.push(line.to_owned()),
        }
        false
    }

    /// Returns true while between the start and end markers.
    #[must_use]
    pub const fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Returns true once the end marker was seen.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Lines captured so far.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consumes the collector, returning the captured lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Settings for structured captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Capture window for `/ls`.
    pub listing_timeout: Duration,
    /// Capture window for `/cat`.
    pub file_timeout: Duration,
    /// Prompt text marking the end of a response.
    pub prompt: String,
    /// Return as soon as the end marker is seen instead of waiting out the
    /// whole window.
    pub stop_at_end_marker: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listing_timeout: LISTING_TIMEOUT,
            file_timeout: FILE_TIMEOUT,
            prompt: DEFAULT_PROMPT.to_owned(),
            stop_at_end_marker: true,
        }
    }
}

impl CollectorConfig {
    /// Sets the listing window.
    #[must_use]
    pub const fn listing_timeout(mut self, timeout: Duration) -> Self {
        self.listing_timeout = timeout;
        self
    }

    /// Sets the file read window.
    #[must_use]
    pub const fn file_timeout(mut self, timeout: Duration) -> Self {
        self.file_timeout = timeout;
        self
    }

    /// Sets the prompt text.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Sets whether capture stops at the end marker.
    #[must_use]
    pub const fn stop_at_end_marker(mut self, stop: bool) -> Self {
        self.stop_at_end_marker = stop;
        self
    }
}

/// Runs a capture until the end marker (when `stop_at_end` is set) or until
/// `window` elapses, whichever is first.
///
/// Never fails: a capture that saw no end marker returns what it has.
pub async fn collect(
    mut tap: LineTap,
    mut collector: Collector,
    window: Duration,
    stop_at_end: bool,
) -> Vec<String> {
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => {
                if !collector.is_finished() {
                    tracing::debug!(
                        "{} capture window elapsed with {} lines",
                        collector.rule.name(),
                        collector.lines().len()
                    );
                }
                break;
            }
            line = tap.next_line() => {
                let Some(line) = line else { break };
                if collector.observe(&line) && stop_at_end {
                    break;
                }
            }
        }
    }

    collector.into_lines()
}
