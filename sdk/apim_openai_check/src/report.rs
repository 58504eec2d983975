//! Human-readable transcript formatting.

use crate::config::CheckConfig;
use apim_openai_core::models::Usage;
use std::io::{self, Write};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Print the opening banner with the endpoint and deployment under test.
pub fn banner(out: &mut dyn Write, config: &CheckConfig) -> io::Result<()> {
    writeln!(out, "{}", rule())?;
    writeln!(out, "Testing Azure OpenAI API via APIM Gateway")?;
    writeln!(out, "{}", rule())?;
    writeln!(out, "Endpoint: {}", config.endpoint())?;
    writeln!(out, "Deployment: {}", config.deployment())?;
    writeln!(out, "{}", rule())
}

/// Print the `[n/total]` header that precedes a check.
pub fn check_header(out: &mut dyn Write, index: usize, total: usize, label: &str) -> io::Result<()> {
    writeln!(out, "\n[{index}/{total}] Testing {label}...")
}

/// Print the three usage counters.
pub fn usage(out: &mut dyn Write, usage: &Usage) -> io::Result<()> {
    writeln!(out, "\nUsage:")?;
    writeln!(out, "  Prompt tokens: {}", usage.prompt_tokens)?;
    writeln!(out, "  Completion tokens: {}", usage.completion_tokens)?;
    writeln!(out, "  Total tokens: {}", usage.total_tokens)
}

/// Count of passed checks out of those run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub total: usize,
}

impl Summary {
    pub fn from_results(results: &[bool]) -> Self {
        Self {
            passed: results.iter().filter(|ok| **ok).count(),
            total: results.len(),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// Process exit code: 0 when every check passed, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

/// Print the closing summary block.
pub fn summary(out: &mut dyn Write, summary: &Summary) -> io::Result<()> {
    writeln!(out, "\n{}", rule())?;
    writeln!(
        out,
        "Results: {}/{} tests passed",
        summary.passed, summary.total
    )?;
    writeln!(out, "{}", rule())
}
