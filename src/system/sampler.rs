//! One-line resource usage reports.
//!
//! A report is the heap statistics followed by what a [`ProcessProbe`] says
//! about resident memory and thread count. Probe failures never abort a
//! report; they show up as fixed markers in the line instead.

use std::fmt;
use std::time::Instant;

use color_eyre::Result;
use serde::Serialize;

use super::collector::SysinfoProbe;
use super::heap::HeapStats;
use super::ps::{ResidentReading, count_threads, format_rss, parse_resident, run_ps};

pub trait ProcessProbe: Send {
    fn resident(&mut self) -> Result<ResidentReading>;
    fn threads(&mut self) -> Result<usize>;
    fn markers(&self) -> ProbeMarkers;
}

/// Fixed strings a probe contributes to the report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeMarkers {
    pub resident_prefix: &'static str,
    pub resident_fail: &'static str,
    pub resident_bad: &'static str,
    pub threads_fail: &'static str,
}

impl ProbeMarkers {
    pub const PS: ProbeMarkers = ProbeMarkers {
        resident_prefix: "ps: ",
        resident_fail: "ps ux fail ",
        resident_bad: "ps ux bad",
        threads_fail: "ps -eLF fail",
    };

    pub const SYSINFO: ProbeMarkers = ProbeMarkers {
        resident_prefix: "rss: ",
        resident_fail: "sysinfo rss fail ",
        resident_bad: "sysinfo rss bad",
        threads_fail: "sysinfo th fail",
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeSource {
    #[default]
    Ps,
    Sysinfo,
}

impl ProbeSource {
    pub fn from_config(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ps" => Some(ProbeSource::Ps),
            "sysinfo" => Some(ProbeSource::Sysinfo),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProbeSource::Ps => "ps",
            ProbeSource::Sysinfo => "sysinfo",
        }
    }
}

/// Shells out to `ps ux` and `ps -eLf` and looks for `executable`.
pub struct PsProbe {
    executable: String,
}

impl PsProbe {
    pub fn new(executable: impl Into<String>) -> Self {
        PsProbe {
            executable: executable.into(),
        }
    }
}

impl ProcessProbe for PsProbe {
    fn resident(&mut self) -> Result<ResidentReading> {
        let listing = run_ps(&["ux"])?;
        Ok(parse_resident(&listing, &self.executable))
    }

    fn threads(&mut self) -> Result<usize> {
        let listing = run_ps(&["-eLf"])?;
        Ok(count_threads(&listing, &self.executable))
    }

    fn markers(&self) -> ProbeMarkers {
        ProbeMarkers::PS
    }
}

/// argv[0], the name `ps` lists the harness under.
pub fn default_executable() -> String {
    std::env::args()
        .next()
        .filter(|arg| !arg.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSample {
    pub elapsed_ms: u64,
    pub heap: HeapStats,
    pub resident: Option<ResidentReading>,
    pub threads: Option<usize>,
    #[serde(skip)]
    pub markers: ProbeMarkers,
}

impl UsageSample {
    pub fn resident_kib(&self) -> Option<u64> {
        self.resident.as_ref().and_then(ResidentReading::kib)
    }
}

impl fmt::Display for UsageSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.heap.report_fragment())?;

        match &self.resident {
            Some(reading) => {
                for _ in 0..reading.bad_lines {
                    f.write_str(self.markers.resident_bad)?;
                }
                if let Some(raw) = &reading.rss_kib {
                    write!(f, "{}{}", self.markers.resident_prefix, format_rss(raw))?;
                }
            }
            None => f.write_str(self.markers.resident_fail)?,
        }

        match self.threads {
            Some(count) => write!(f, "   th: {count}"),
            None => f.write_str(self.markers.threads_fail),
        }
    }
}

pub struct Sampler {
    probe: Box<dyn ProcessProbe>,
    started: Instant,
}

impl Sampler {
    pub fn new(probe: Box<dyn ProcessProbe>) -> Self {
        Sampler {
            probe,
            started: Instant::now(),
        }
    }

    pub fn from_source(source: ProbeSource, executable: &str) -> Result<Self> {
        let probe: Box<dyn ProcessProbe> = match source {
            ProbeSource::Ps => Box::new(PsProbe::new(executable)),
            ProbeSource::Sysinfo => Box::new(SysinfoProbe::new()?),
        };
        Ok(Sampler::new(probe))
    }

    pub fn sample(&mut self) -> UsageSample {
        let _span = tracing::debug_span!("sampler.sample").entered();

        let heap = HeapStats::current();
        let resident = match self.probe.resident() {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!(error = %e, "resident memory probe failed");
                None
            }
        };
        let threads = match self.probe.threads() {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "thread count probe failed");
                None
            }
        };

        UsageSample {
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            heap,
            resident,
            threads,
            markers: self.probe.markers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::eyre;
    use insta::assert_snapshot;

    struct ScriptedProbe {
        resident: Option<ResidentReading>,
        threads: Option<usize>,
    }

    impl ProcessProbe for ScriptedProbe {
        fn resident(&mut self) -> Result<ResidentReading> {
            self.resident.clone().ok_or_else(|| eyre!("no listing"))
        }

        fn threads(&mut self) -> Result<usize> {
            self.threads.ok_or_else(|| eyre!("no listing"))
        }

        fn markers(&self) -> ProbeMarkers {
            ProbeMarkers::PS
        }
    }

    fn sample_with(resident: Option<ResidentReading>, threads: Option<usize>) -> UsageSample {
        UsageSample {
            elapsed_ms: 0,
            heap: HeapStats::default(),
            resident,
            threads,
            markers: ProbeMarkers::PS,
        }
    }

    #[test]
    fn line_with_resident_and_threads() {
        let sample = sample_with(
            Some(ResidentReading {
                bad_lines: 0,
                rss_kib: Some("151204".to_string()),
            }),
            Some(3),
        );
        assert_snapshot!(
            sample.to_string(),
            @"inuse:    0 M, peak:    0 M, alloc:    0 M, freed:    0 M, blocks: 0     ps: 151 M   th: 3"
        );
    }

    #[test]
    fn line_marks_failures() {
        let sample = sample_with(None, None);
        assert_eq!(
            sample.to_string(),
            "inuse:    0 M, peak:    0 M, alloc:    0 M, freed:    0 M, blocks: 0     ps ux fail ps -eLF fail"
        );
    }

    #[test]
    fn line_repeats_bad_marker_per_short_line() {
        let sample = sample_with(
            Some(ResidentReading {
                bad_lines: 2,
                rss_kib: Some("812".to_string()),
            }),
            Some(1),
        );
        assert!(sample.to_string().ends_with("ps ux badps ux badps: 812 K   th: 1"));
    }

    #[test]
    fn line_without_matching_process_has_no_resident_part() {
        let sample = sample_with(Some(ResidentReading::default()), Some(0));
        assert!(sample.to_string().ends_with("blocks: 0        th: 0"));
    }

    #[test]
    fn sysinfo_markers_label_failures() {
        let mut sample = sample_with(None, None);
        sample.markers = ProbeMarkers::SYSINFO;
        assert!(sample.to_string().ends_with("sysinfo rss fail sysinfo th fail"));
    }

    #[test]
    fn sampler_keeps_going_when_probe_fails() {
        let mut sampler = Sampler::new(Box::new(ScriptedProbe {
            resident: None,
            threads: Some(4),
        }));
        let sample = sampler.sample();
        assert!(sample.resident.is_none());
        assert_eq!(sample.threads, Some(4));
        assert_eq!(sample.resident_kib(), None);
    }

    #[test]
    fn sampler_passes_probe_readings_through() {
        let mut sampler = Sampler::new(Box::new(ScriptedProbe {
            resident: Some(ResidentReading {
                bad_lines: 0,
                rss_kib: Some("2048".to_string()),
            }),
            threads: Some(2),
        }));
        let sample = sampler.sample();
        assert_eq!(sample.resident_kib(), Some(2048));
        assert_eq!(sample.threads, Some(2));
    }

    #[test]
    fn probe_source_parsing() {
        assert_eq!(ProbeSource::from_config("ps"), Some(ProbeSource::Ps));
        assert_eq!(ProbeSource::from_config("SysInfo"), Some(ProbeSource::Sysinfo));
        assert_eq!(ProbeSource::from_config("proc"), None);
        assert_eq!(ProbeSource::Sysinfo.label(), "sysinfo");
    }

    #[test]
    fn default_executable_is_not_empty() {
        assert!(!default_executable().is_empty());
    }
}
