pub mod gate;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use color_eyre::Result;
use ratatui::Terminal;
use ratatui::backend::Backend;

use crate::config::Config;
use crate::graphics::ledger::ResourceLedger;
use crate::graphics::source::{SourceSpec, load_png, source_png};
use crate::graphics::surface::{StoredSurface, Surface};
use crate::graphics::texture::Texture;
use crate::summary::RunSummary;
use crate::system::platform;
use crate::system::sampler::{ProbeSource, Sampler, UsageSample, default_executable};
use crate::ui::{self, StatusLine, WindowView};
use gate::ReportGate;

/// Where each iteration's surface comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Decode the PNG bytes from scratch every iteration.
    #[default]
    Stream,
    /// Decode once, then rebuild the surface from a copy of the pixels.
    Stored,
}

impl DecodeMode {
    pub fn from_config(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stream" => Some(DecodeMode::Stream),
            "stored" => Some(DecodeMode::Stored),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DecodeMode::Stream => "stream",
            DecodeMode::Stored => "stored",
        }
    }
}

/// When a surface/texture pair is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseMode {
    #[default]
    Iteration,
    /// Hold every pair until the loop ends.
    Deferred,
}

impl ReleaseMode {
    pub fn from_config(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "iteration" => Some(ReleaseMode::Iteration),
            "deferred" => Some(ReleaseMode::Deferred),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReleaseMode::Iteration => "iteration",
            ReleaseMode::Deferred => "deferred",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct HarnessSettings {
    pub iterations: u64,
    pub report_interval: Duration,
    pub decode_mode: DecodeMode,
    pub release: ReleaseMode,
    pub trim_heap: bool,
    pub image_path: Option<PathBuf>,
    pub source: SourceSpec,
    pub window: WindowSpec,
    pub probe: ProbeSource,
    pub executable: String,
}

impl HarnessSettings {
    /// Resolve the string-typed config. Unknown mode names fall back to the
    /// defaults with a warning.
    pub fn from_config(config: &Config) -> Self {
        let general = &config.general;
        let decode_mode = DecodeMode::from_config(&general.decode_mode).unwrap_or_else(|| {
            tracing::warn!(value = %general.decode_mode, "unknown decode_mode, using stream");
            DecodeMode::default()
        });
        let release = ReleaseMode::from_config(&general.release).unwrap_or_else(|| {
            tracing::warn!(value = %general.release, "unknown release mode, using iteration");
            ReleaseMode::default()
        });
        let probe = ProbeSource::from_config(&config.sampler.source).unwrap_or_else(|| {
            tracing::warn!(value = %config.sampler.source, "unknown sampler source, using ps");
            ProbeSource::default()
        });

        HarnessSettings {
            iterations: general.iterations,
            report_interval: Duration::from_millis(general.report_interval_ms),
            decode_mode,
            release,
            trim_heap: general.trim_heap,
            image_path: config.image.path.clone(),
            source: SourceSpec {
                width: config.image.width,
                height: config.image.height,
                marker_x: config.image.marker_x,
                marker_y: config.image.marker_y,
            },
            window: WindowSpec {
                title: config.window.title.clone(),
                width: config.window.width,
                height: config.window.height,
            },
            probe,
            executable: config
                .sampler
                .executable
                .clone()
                .filter(|exe| !exe.is_empty())
                .unwrap_or_else(default_executable),
        }
    }
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

enum SurfaceSource {
    Stream {
        png: Vec<u8>,
    },
    Stored {
        stored: StoredSurface,
        scratch: Box<[u8]>,
    },
}

impl SurfaceSource {
    fn surface(&mut self, ledger: &ResourceLedger) -> Result<Surface<'_>> {
        match self {
            SurfaceSource::Stream { png } => Surface::decode(png, ledger),
            SurfaceSource::Stored { stored, scratch } => stored.surface(scratch, ledger),
        }
    }
}

struct Retained {
    _surface: Surface<'static>,
    _texture: Texture,
}

/// The render loop: decode, texture, draw, release, and report on a timer.
pub struct Harness {
    settings: HarnessSettings,
    source: SurfaceSource,
    ledger: ResourceLedger,
    sampler: Sampler,
    retained: Vec<Retained>,
    samples: Vec<UsageSample>,
    last_report: Option<String>,
    completed: u64,
}

impl Harness {
    pub fn new(settings: HarnessSettings) -> Result<Self> {
        let sampler = Sampler::from_source(settings.probe, &settings.executable)?;
        Self::with_sampler(settings, sampler)
    }

    pub fn with_sampler(settings: HarnessSettings, sampler: Sampler) -> Result<Self> {
        let png = match &settings.image_path {
            Some(path) => load_png(path)?,
            None => source_png(settings.source)?,
        };
        let ledger = ResourceLedger::new();
        let source = match settings.decode_mode {
            DecodeMode::Stream => SurfaceSource::Stream { png },
            DecodeMode::Stored => SurfaceSource::Stored {
                stored: StoredSurface::capture(&png, &ledger)?,
                scratch: StoredSurface::scratch(),
            },
        };

        Ok(Harness {
            settings,
            source,
            ledger,
            sampler,
            retained: Vec::new(),
            samples: Vec::new(),
            last_report: None,
            completed: 0,
        })
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn samples(&self) -> &[UsageSample] {
        &self.samples
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn last_report(&self) -> Option<&str> {
        self.last_report.as_deref()
    }

    /// Run until the iteration budget is spent or `shutdown` is raised.
    ///
    /// With `echo` every report line is also printed to stdout.
    pub fn run<B>(
        &mut self,
        terminal: &mut Terminal<B>,
        shutdown: &AtomicBool,
        echo: bool,
    ) -> Result<RunSummary>
    where
        B: Backend,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        tracing::info!(
            iterations = self.settings.iterations,
            decode_mode = self.settings.decode_mode.label(),
            release = self.settings.release.label(),
            probe = self.settings.probe.label(),
            executable = %self.settings.executable,
            "starting render loop"
        );

        let started = Instant::now();
        let mut gate = ReportGate::new(self.settings.report_interval);
        terminal.clear()?;

        for _ in 0..self.settings.iterations {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!(completed = self.completed, "shutdown requested");
                break;
            }
            if gate.due(Instant::now()) {
                self.report(echo);
            }
            self.step(terminal)?;
        }

        let summary = RunSummary::collect(
            &self.settings,
            self.completed,
            started.elapsed(),
            &self.samples,
            self.ledger.counts(),
        );
        self.retained.clear();
        tracing::info!(completed = self.completed, "render loop finished");
        Ok(summary)
    }

    fn report(&mut self, echo: bool) {
        let sample = self.sampler.sample();
        let line = sample.to_string();
        let counts = self.ledger.counts();
        tracing::info!(
            iteration = self.completed,
            live_surfaces = counts.live_surfaces,
            live_textures = counts.live_textures,
            report = %line,
            "usage"
        );
        if echo {
            println!("{line}");
        }
        self.last_report = Some(line);
        self.samples.push(sample);
    }

    fn step<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: Backend,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let _span = tracing::debug_span!("harness.iteration", n = self.completed).entered();

        let surface = self.source.surface(&self.ledger)?;
        let texture = Texture::from_surface(&surface, &self.ledger);

        let view = WindowView {
            title: &self.settings.window.title,
            width: self.settings.window.width,
            height: self.settings.window.height,
            texture: &texture,
            status: StatusLine {
                iteration: self.completed + 1,
                iterations: self.settings.iterations,
                report: self.last_report.as_deref(),
                ledger: self.ledger.counts(),
            },
        };
        terminal.draw(|frame| ui::draw(frame, &view))?;

        if self.settings.trim_heap {
            platform::release_free_memory();
        }

        match self.settings.release {
            ReleaseMode::Iteration => {
                drop(texture);
                drop(surface);
            }
            ReleaseMode::Deferred => self.retained.push(Retained {
                _surface: surface.into_owned(),
                _texture: texture,
            }),
        }

        self.completed += 1;
        Ok(())
    }
}
