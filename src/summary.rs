use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;

use crate::format::format_size;
use crate::graphics::ledger::LedgerCounts;
use crate::harness::HarnessSettings;
use crate::logging::ensure_parent_dir;
use crate::system::sampler::UsageSample;

/// First, last and largest value of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Spread {
    pub first: u64,
    pub last: u64,
    pub max: u64,
}

impl Spread {
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let mut spread = Spread {
            first,
            last: first,
            max: first,
        };
        for value in iter {
            spread.last = value;
            spread.max = spread.max.max(value);
        }
        Some(spread)
    }

    /// Last minus first.
    pub fn growth(&self) -> i128 {
        i128::from(self.last) - i128::from(self.first)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub iterations_requested: u64,
    pub iterations_completed: u64,
    pub elapsed_ms: u64,
    pub decode_mode: &'static str,
    pub release: &'static str,
    pub probe: &'static str,
    pub samples: usize,
    pub resident_bytes: Option<Spread>,
    pub heap_live_bytes: Option<Spread>,
    pub max_threads: Option<usize>,
    pub ledger: LedgerCounts,
}

impl RunSummary {
    pub fn collect(
        settings: &HarnessSettings,
        completed: u64,
        elapsed: Duration,
        samples: &[UsageSample],
        ledger: LedgerCounts,
    ) -> Self {
        RunSummary {
            iterations_requested: settings.iterations,
            iterations_completed: completed,
            elapsed_ms: elapsed.as_millis() as u64,
            decode_mode: settings.decode_mode.label(),
            release: settings.release.label(),
            probe: settings.probe.label(),
            samples: samples.len(),
            resident_bytes: Spread::from_values(
                samples
                    .iter()
                    .filter_map(UsageSample::resident_kib)
                    .map(|kib| kib * 1024),
            ),
            heap_live_bytes: Spread::from_values(samples.iter().map(|s| s.heap.live_bytes)),
            max_threads: samples.iter().filter_map(|s| s.threads).max(),
            ledger,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).wrap_err_with(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn format_growth(growth: i128) -> String {
    let magnitude = u64::try_from(growth.unsigned_abs()).unwrap_or(u64::MAX);
    let sign = if growth < 0 { '-' } else { '+' };
    format!("{sign}{}", format_size(magnitude))
}

fn write_spread(f: &mut fmt::Formatter<'_>, label: &str, spread: Option<Spread>) -> fmt::Result {
    match spread {
        Some(s) => writeln!(
            f,
            "  {label}: first {}, last {}, max {} ({})",
            format_size(s.first),
            format_size(s.last),
            format_size(s.max),
            format_growth(s.growth())
        ),
        None => writeln!(f, "  {label}: no samples"),
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}/{} iterations in {:.1}s ({} decode, {} release, {} probe)",
            self.iterations_completed,
            self.iterations_requested,
            self.elapsed_ms as f64 / 1000.0,
            self.decode_mode,
            self.release,
            self.probe
        )?;
        writeln!(f, "  samples: {}", self.samples)?;
        write_spread(f, "resident", self.resident_bytes)?;
        write_spread(f, "heap in use", self.heap_live_bytes)?;
        match self.max_threads {
            Some(threads) => writeln!(f, "  threads: max {threads}")?,
            None => writeln!(f, "  threads: no samples")?,
        }
        write!(
            f,
            "  surfaces: {} live / {} created, textures: {} live / {} created",
            self.ledger.live_surfaces,
            self.ledger.surfaces_created,
            self.ledger.live_textures,
            self.ledger.textures_created
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::heap::HeapStats;
    use crate::system::ps::ResidentReading;
    use crate::system::sampler::ProbeMarkers;
    use insta::assert_snapshot;

    fn sample(rss_kib: Option<&str>, live: u64, threads: Option<usize>) -> UsageSample {
        UsageSample {
            elapsed_ms: 0,
            heap: HeapStats {
                live_bytes: live,
                ..HeapStats::default()
            },
            resident: rss_kib.map(|raw| ResidentReading {
                bad_lines: 0,
                rss_kib: Some(raw.to_string()),
            }),
            threads,
            markers: ProbeMarkers::PS,
        }
    }

    #[test]
    fn spread_tracks_first_last_max() {
        let spread = Spread::from_values([5, 9, 7]).unwrap();
        assert_eq!(
            spread,
            Spread {
                first: 5,
                last: 7,
                max: 9
            }
        );
        assert_eq!(spread.growth(), 2);
        assert_eq!(Spread::from_values(Vec::new()), None);
        assert_eq!(Spread::from_values([9, 4]).unwrap().growth(), -5);
    }

    #[test]
    fn collect_skips_failed_probes() {
        let mut settings = HarnessSettings::default();
        settings.iterations = 10;
        let samples = vec![
            sample(Some("2048"), 100, Some(3)),
            sample(None, 200, None),
            sample(Some("4096"), 150, Some(4)),
        ];
        let summary = RunSummary::collect(
            &settings,
            10,
            Duration::from_millis(1500),
            &samples,
            LedgerCounts::default(),
        );
        assert_eq!(summary.samples, 3);
        assert_eq!(
            summary.resident_bytes,
            Some(Spread {
                first: 2048 * 1024,
                last: 4096 * 1024,
                max: 4096 * 1024
            })
        );
        assert_eq!(summary.heap_live_bytes.map(|s| s.max), Some(200));
        assert_eq!(summary.max_threads, Some(4));
    }

    #[test]
    fn text_summary() {
        let mut settings = HarnessSettings::default();
        settings.iterations = 100;
        let samples = vec![
            sample(Some("2048"), 1024, Some(3)),
            sample(Some("3072"), 512, Some(3)),
        ];
        let ledger = LedgerCounts {
            live_surfaces: 0,
            live_textures: 0,
            surfaces_created: 100,
            textures_created: 100,
        };
        let summary =
            RunSummary::collect(&settings, 100, Duration::from_millis(2500), &samples, ledger);
        assert_snapshot!(summary.to_string(), @r"
        100/100 iterations in 2.5s (stream decode, iteration release, ps probe)
          samples: 2
          resident: first 2.0 MB, last 3.0 MB, max 3.0 MB (+1.0 MB)
          heap in use: first 1 KB, last 512 B, max 1 KB (-512 B)
          threads: max 3
          surfaces: 0 live / 100 created, textures: 0 live / 100 created
        ");
    }

    #[test]
    fn text_summary_without_samples() {
        let summary = RunSummary::collect(
            &HarnessSettings::default(),
            0,
            Duration::ZERO,
            &[],
            LedgerCounts::default(),
        );
        let text = summary.to_string();
        assert!(text.contains("resident: no samples"));
        assert!(text.contains("threads: no samples"));
    }

    #[test]
    fn json_round_trips_through_file() {
        let temp = std::env::temp_dir()
            .join("leakprobe_test_summary")
            .join("summary.json");
        let summary = RunSummary::collect(
            &HarnessSettings::default(),
            3,
            Duration::from_millis(10),
            &[sample(Some("1024"), 64, Some(2))],
            LedgerCounts::default(),
        );
        summary.write_json(&temp).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&temp).unwrap()).unwrap();
        assert_eq!(value["iterations_completed"], 3);
        assert_eq!(value["resident_bytes"]["max"], 1024 * 1024);
        assert_eq!(value["decode_mode"], "stream");
        let _ = std::fs::remove_file(&temp);
    }
}
