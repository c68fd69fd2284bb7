use std::sync::atomic::AtomicBool;
use std::time::Duration;

use color_eyre::Result;
use leakprobe::graphics::source::{SourceSpec, source_png};
use leakprobe::harness::{DecodeMode, Harness, HarnessSettings, ReleaseMode};
use leakprobe::system::ps::ResidentReading;
use leakprobe::system::sampler::{ProbeMarkers, ProcessProbe, Sampler};
use ratatui::Terminal;
use ratatui::backend::TestBackend;

struct FixedProbe;

impl ProcessProbe for FixedProbe {
    fn resident(&mut self) -> Result<ResidentReading> {
        Ok(ResidentReading {
            bad_lines: 0,
            rss_kib: Some("4096".to_string()),
        })
    }

    fn threads(&mut self) -> Result<usize> {
        Ok(2)
    }

    fn markers(&self) -> ProbeMarkers {
        ProbeMarkers::PS
    }
}

fn settings(iterations: u64, decode_mode: DecodeMode, release: ReleaseMode) -> HarnessSettings {
    let mut settings = HarnessSettings::default();
    settings.iterations = iterations;
    settings.report_interval = Duration::ZERO;
    settings.decode_mode = decode_mode;
    settings.release = release;
    settings.trim_heap = false;
    settings.source = SourceSpec {
        width: 30,
        height: 20,
        marker_x: 1,
        marker_y: 1,
    };
    settings
}

fn harness(settings: HarnessSettings) -> Harness {
    Harness::with_sampler(settings, Sampler::new(Box::new(FixedProbe))).unwrap()
}

fn terminal() -> Terminal<TestBackend> {
    Terminal::new(TestBackend::new(60, 20)).unwrap()
}

fn first_line(terminal: &Terminal<TestBackend>) -> String {
    let buf = terminal.backend().buffer();
    (0..buf.area.width)
        .map(|x| buf.cell((x, 0)).unwrap().symbol().to_string())
        .collect()
}

#[test]
fn streaming_decode_releases_every_iteration() {
    let mut harness = harness(settings(5, DecodeMode::Stream, ReleaseMode::Iteration));
    let mut terminal = terminal();
    let shutdown = AtomicBool::new(false);

    let summary = harness.run(&mut terminal, &shutdown, false).unwrap();

    assert_eq!(summary.iterations_completed, 5);
    assert_eq!(harness.completed(), 5);
    assert_eq!(summary.ledger.live_surfaces, 0);
    assert_eq!(summary.ledger.live_textures, 0);
    assert_eq!(summary.ledger.surfaces_created, 5);
    assert_eq!(summary.ledger.textures_created, 5);
    assert!(summary.samples >= 1);
    assert_eq!(summary.samples, harness.samples().len());
    assert_eq!(summary.max_threads, Some(2));
    assert!(
        harness
            .last_report()
            .is_some_and(|line| line.ends_with("ps: 4 M   th: 2"))
    );
    assert!(first_line(&terminal).contains("ICO Memory Test"));
}

#[test]
fn stored_decode_touches_the_decoder_once() {
    let mut harness = harness(settings(4, DecodeMode::Stored, ReleaseMode::Iteration));
    let mut terminal = terminal();
    let shutdown = AtomicBool::new(false);

    let summary = harness.run(&mut terminal, &shutdown, false).unwrap();

    assert_eq!(summary.iterations_completed, 4);
    assert_eq!(summary.decode_mode, "stored");
    // one decode at capture time plus one rebuilt surface per iteration
    assert_eq!(summary.ledger.surfaces_created, 5);
    assert_eq!(summary.ledger.live_surfaces, 0);
    assert_eq!(summary.ledger.live_textures, 0);
}

#[test]
fn deferred_release_holds_handles_until_the_loop_ends() {
    for mode in [DecodeMode::Stream, DecodeMode::Stored] {
        let mut harness = harness(settings(3, mode, ReleaseMode::Deferred));
        let mut terminal = terminal();
        let shutdown = AtomicBool::new(false);

        let summary = harness.run(&mut terminal, &shutdown, false).unwrap();

        assert_eq!(summary.release, "deferred");
        assert_eq!(summary.ledger.live_surfaces, 3);
        assert_eq!(summary.ledger.live_textures, 3);
        let after = harness.ledger().counts();
        assert_eq!(after.live_surfaces, 0);
        assert_eq!(after.live_textures, 0);
    }
}

#[test]
fn raised_shutdown_flag_stops_before_the_first_iteration() {
    let mut harness = harness(settings(1_000, DecodeMode::Stream, ReleaseMode::Iteration));
    let mut terminal = terminal();
    let shutdown = AtomicBool::new(true);

    let summary = harness.run(&mut terminal, &shutdown, false).unwrap();

    assert_eq!(summary.iterations_completed, 0);
    assert_eq!(summary.iterations_requested, 1_000);
    assert_eq!(summary.samples, 0);
    assert_eq!(summary.ledger.surfaces_created, 0);
}

#[test]
fn slow_gate_produces_no_reports_in_a_short_run() {
    let mut settings = settings(3, DecodeMode::Stream, ReleaseMode::Iteration);
    settings.report_interval = Duration::from_secs(3600);
    let mut harness = harness(settings);
    let mut terminal = terminal();
    let shutdown = AtomicBool::new(false);

    let summary = harness.run(&mut terminal, &shutdown, false).unwrap();

    assert_eq!(summary.iterations_completed, 3);
    assert_eq!(summary.samples, 0);
    assert_eq!(harness.last_report(), None);
}

#[test]
fn png_file_on_disk_replaces_generated_image() {
    let path = std::env::temp_dir().join("leakprobe_harness_loop_input.png");
    let png = source_png(SourceSpec {
        width: 8,
        height: 8,
        marker_x: 3,
        marker_y: 3,
    })
    .unwrap();
    std::fs::write(&path, png).unwrap();

    let mut settings = settings(2, DecodeMode::Stream, ReleaseMode::Iteration);
    settings.image_path = Some(path.clone());
    let mut harness = harness(settings);
    let mut terminal = terminal();
    let shutdown = AtomicBool::new(false);

    let summary = harness.run(&mut terminal, &shutdown, false).unwrap();
    assert_eq!(summary.iterations_completed, 2);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_png_file_fails_setup() {
    let mut settings = settings(1, DecodeMode::Stream, ReleaseMode::Iteration);
    settings.image_path = Some("/nonexistent/leakprobe/input.png".into());
    assert!(Harness::with_sampler(settings, Sampler::new(Box::new(FixedProbe))).is_err());
}
