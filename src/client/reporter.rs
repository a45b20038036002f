use crate::client::constants::{ACCEPTABLE_LATENCY_US, EXCELLENT_LATENCY_US};
use crate::client::error::Result;
use crate::client::sampling::{Decision, GenerationSummary, RunSummary};
use crate::client::statistics::{LatencyDistribution, PooledStats};
use colored::*;
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Reporter for measurement progress and results.
///
/// Diagnostics go to stderr; only the final mean is written to stdout.
pub struct Reporter {
    confidence_z: f64,
}

impl Reporter {
    pub fn new(confidence_z: f64) -> Self {
        Self { confidence_z }
    }

    /// Formats a sample count for display, using "k"/"M" suffixes.
    ///
    /// # Examples
    ///
    /// ```text
    /// format_count(100)       == "100"
    /// format_count(25_000)    == "25.0k"
    /// format_count(1_500_000) == "1.50M"
    /// ```
    fn format_count(count: u64) -> String {
        if count >= 1_000_000 {
            format!("{:.2}M", count as f64 / 1_000_000.0)
        } else if count >= 1000 {
            format!("{:.1}k", count as f64 / 1000.0)
        } else {
            count.to_string()
        }
    }

    /// Label for the confidence interval: the two-sided level for the usual
    /// z values, the raw z otherwise.
    fn confidence_label(z: f64) -> String {
        const LEVELS: [(f64, &str); 4] = [
            (1.645, "90%"),
            (1.96, "95%"),
            (2.576, "99%"),
            (3.291, "99.9%"),
        ];
        LEVELS
            .iter()
            .find(|(known, _)| (known - z).abs() < 0.005)
            .map(|(_, level)| format!("{} CI:", level))
            .unwrap_or_else(|| format!("CI (z={}):", z))
    }

    fn format_us(nanos: f64) -> String {
        format!("{:.2}us", nanos / 1000.0)
    }

    /// One progress line per generation, on stderr
    pub fn print_generation(&self, summary: &GenerationSummary) {
        if let Err(e) = self.write_generation(&mut io::stderr().lock(), summary) {
            warn!(error = %e, "Failed to write generation summary");
        }
    }

    pub fn write_generation<W: Write>(
        &self,
        out: &mut W,
        summary: &GenerationSummary,
    ) -> Result<()> {
        let pooled = &summary.pooled;
        writeln!(
            out,
            "generation {} complete: {}/{} over {} samples ({} per client)",
            summary.generation,
            Self::format_us(pooled.mean),
            Self::format_us(pooled.stddev),
            Self::format_count(pooled.n),
            Self::format_count(summary.per_worker_budget)
        )?;
        if summary.failed_workers > 0 {
            writeln!(
                out,
                "  {}",
                format!("{} worker(s) stopped early", summary.failed_workers).yellow()
            )?;
        }
        match summary.decision {
            Decision::Continue {
                per_worker,
                capped: true,
            } => writeln!(
                out,
                "  need many more samples to achieve statistical significance, doing another {} per client",
                per_worker
            )?,
            Decision::Continue { per_worker, .. } => writeln!(
                out,
                "  running {} more iterations per client to achieve statistical significance",
                per_worker
            )?,
            Decision::Done => {}
        }
        Ok(())
    }

    /// Print the result summary to stderr
    pub fn print_results(
        &self,
        pooled: &PooledStats,
        summary: Option<&RunSummary>,
        distribution: Option<&LatencyDistribution>,
    ) -> Result<()> {
        self.write_results(&mut io::stderr().lock(), pooled, summary, distribution)
    }

    pub fn write_results<W: Write>(
        &self,
        out: &mut W,
        pooled: &PooledStats,
        summary: Option<&RunSummary>,
        distribution: Option<&LatencyDistribution>,
    ) -> Result<()> {
        debug!(n = pooled.n, "Printing measurement results");
        if pooled.is_empty() {
            warn!("No successful measurements recorded");
            writeln!(out, "{}", "No successful measurements recorded.".red())?;
            return Ok(());
        }

        writeln!(out, "\n{}", "┌─────────────────────────────┐".cyan())?;
        writeln!(out, "{}", "│  rttprobe results           │".cyan())?;
        writeln!(out, "{}", "└─────────────────────────────┘".cyan())?;
        writeln!(out)?;

        match summary {
            Some(s) if s.converged => writeln!(
                out,
                "Samples:  {} over {} generation(s)",
                Self::format_count(pooled.n),
                s.generations
            )?,
            Some(s) => writeln!(
                out,
                "Samples:  {} over {} generation(s) {}",
                Self::format_count(pooled.n),
                s.generations,
                "(did not converge)".yellow()
            )?,
            None => writeln!(
                out,
                "Samples:  {} {}",
                Self::format_count(pooled.n),
                "(run interrupted)".red()
            )?,
        }
        writeln!(out)?;

        writeln!(out, "Latency Statistics (round-trip time):")?;
        writeln!(out, "  Mean:      {:>10}", Self::format_us(pooled.mean))?;
        writeln!(out, "  Stddev:    {:>10}", Self::format_us(pooled.stddev))?;
        writeln!(
            out,
            "  {:<10} {:>10}  ← half-width around the mean (z = {})",
            Self::confidence_label(self.confidence_z),
            format!("±{}", Self::format_us(pooled.half_width(self.confidence_z))),
            self.confidence_z
        )?;

        if let Some(dist) = distribution.filter(|d| d.count() > 0) {
            writeln!(out, "  Min:       {:>10}", Self::format_us(dist.min() as f64))?;
            writeln!(out, "  Max:       {:>10}", Self::format_us(dist.max() as f64))?;
            for (label, quantile) in [("P50", 0.5), ("P90", 0.9), ("P99", 0.99), ("P99.9", 0.999)] {
                writeln!(
                    out,
                    "  {:<10} {:>10}",
                    format!("{}:", label),
                    Self::format_us(dist.percentile(quantile) as f64)
                )?;
            }
            if dist.clamped_count() > 0 {
                writeln!(
                    out,
                    "  ⚠ Note: {} measurement(s) exceeded histogram bounds and were clamped",
                    dist.clamped_count()
                )?;
            }
        }
        writeln!(out)?;

        let mean_us = pooled.mean / 1000.0;
        let verdict = if mean_us < EXCELLENT_LATENCY_US {
            format!("✓ Mean latency {:.2}us", mean_us).green().bold()
        } else if mean_us < ACCEPTABLE_LATENCY_US {
            format!("✓ Mean latency {:.2}us", mean_us).yellow().bold()
        } else {
            format!("✗ Mean latency {:.2}us", mean_us).red().bold()
        };
        writeln!(out, "{}", verdict)?;

        info!(
            mean_us = mean_us,
            stddev_us = pooled.stddev / 1000.0,
            n = pooled.n,
            "Results reported"
        );
        Ok(())
    }

    /// Write the mean latency in microseconds to stdout
    pub fn print_mean(&self, pooled: &PooledStats) -> Result<()> {
        let mut out = io::stdout().lock();
        Self::write_mean(&mut out, pooled)?;
        out.flush()?;
        Ok(())
    }

    pub fn write_mean<W: Write>(out: &mut W, pooled: &PooledStats) -> Result<()> {
        writeln!(out, "{:.2}us", pooled.mean / 1000.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<F: FnOnce(&mut Vec<u8>) -> Result<()>>(f: F) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn pooled() -> PooledStats {
        PooledStats {
            n: 25_000,
            mean: 42_500.0,
            stddev: 3_000.0,
        }
    }

    #[test]
    fn test_reporter_format_count() {
        assert_eq!(Reporter::format_count(100), "100");
        assert_eq!(Reporter::format_count(25_000), "25.0k");
        assert_eq!(Reporter::format_count(1_500_000), "1.50M");
    }

    #[test]
    fn test_write_mean() {
        let out = render(|buf| Reporter::write_mean(buf, &pooled()));
        assert_eq!(out, "42.50us\n");
    }

    #[test]
    fn test_write_mean_empty_is_zero() {
        let out = render(|buf| Reporter::write_mean(buf, &PooledStats::default()));
        assert_eq!(out, "0.00us\n");
    }

    #[test]
    fn test_results_empty() {
        let reporter = Reporter::new(1.96);
        let out = render(|buf| reporter.write_results(buf, &PooledStats::default(), None, None));
        assert!(out.contains("No successful measurements recorded."));
    }

    #[test]
    fn test_results_with_distribution() -> Result<()> {
        let reporter = Reporter::new(1.96);
        let mut dist = LatencyDistribution::new()?;
        for latency in [40_000, 42_000, 45_000] {
            dist.record(latency);
        }
        let summary = RunSummary {
            pooled: pooled(),
            generations: 2,
            converged: true,
        };

        let out = render(|buf| reporter.write_results(buf, &pooled(), Some(&summary), Some(&dist)));

        assert!(out.contains("25.0k over 2 generation(s)"));
        assert!(out.contains("42.50us"));
        assert!(out.contains("95% CI:"));
        assert!(out.contains("±0.04us"));
        assert!(out.contains("P99.9:"));
        Ok(())
    }

    #[test]
    fn test_generation_lines() {
        let reporter = Reporter::new(1.96);
        let mut summary = GenerationSummary {
            generation: 1,
            per_worker_budget: 1000,
            pooled: pooled(),
            failed_workers: 1,
            decision: Decision::Continue {
                per_worker: 1000,
                capped: true,
            },
        };

        let out = render(|buf| reporter.write_generation(buf, &summary));
        assert!(out.starts_with(
            "generation 1 complete: 42.50us/3.00us over 25.0k samples (1.0k per client)"
        ));
        assert!(out.contains("1 worker(s) stopped early"));
        assert!(out.contains("doing another 1000 per client"));

        summary.decision = Decision::Continue {
            per_worker: 37,
            capped: false,
        };
        let out = render(|buf| reporter.write_generation(buf, &summary));
        assert!(out.contains("running 37 more iterations per client"));
    }

    #[test]
    fn test_confidence_label_follows_z() {
        assert_eq!(Reporter::confidence_label(1.96), "95% CI:");
        assert_eq!(Reporter::confidence_label(2.576), "99% CI:");
        assert_eq!(Reporter::confidence_label(1.645), "90% CI:");
        assert_eq!(Reporter::confidence_label(2.2), "CI (z=2.2):");
    }

    #[test]
    fn test_results_label_uses_configured_z() {
        let reporter = Reporter::new(2.576);
        let out = render(|buf| reporter.write_results(buf, &pooled(), None, None));
        assert!(out.contains("99% CI:"));
        assert!(!out.contains("95% CI:"));
    }
}
