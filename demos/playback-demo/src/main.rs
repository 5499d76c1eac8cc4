//! Thread-only CLI harness for `Controller`: opens a file, drives a
//! framebuffer-backed `VideoSurface` and a discard audio sink, and exercises
//! open/start/seek/pause/release end to end. Grounded in
//! `dariusbakunas-audio-bridge`'s own small `clap::Parser` CLI binaries —
//! same shape, swapped for this workspace's own playback core instead of
//! CPAL decode-and-play.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use player_codec::{SurfaceWriteGuard, VideoSurface};
use player_core::Options;
use player_pipeline::Controller;

#[derive(Parser, Debug)]
#[command(name = "playback-demo")]
struct Args {
    /// Media file path or URL to open.
    path: String,

    #[arg(long, default_value_t = 1280)]
    width: u32,
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Total wall-clock time to play before releasing, in seconds.
    #[arg(long, default_value_t = 10)]
    run_secs: u64,

    /// If set, seeks to this position (seconds) at the run's midpoint.
    #[arg(long)]
    seek_secs: Option<f64>,

    /// If set, pauses for this many seconds at the run's midpoint.
    #[arg(long)]
    pause_for_secs: Option<u64>,
}

/// An in-memory RGBA surface. Stands in for a real display surface the way
/// a host platform (App/SurfaceTexture, a window's pixel buffer) would
/// provide one — this demo never reads the pixels back, it only counts
/// completed blits.
struct Framebuffer {
    width: u32,
    height: u32,
    bits: Vec<u8>,
    frames_written: Arc<AtomicU64>,
}

impl Framebuffer {
    fn new(width: u32, height: u32, frames_written: Arc<AtomicU64>) -> Self {
        Self { width, height, bits: vec![0u8; width as usize * height as usize * 4], frames_written }
    }
}

struct FramebufferGuard<'a> {
    fb: &'a mut Framebuffer,
}

impl SurfaceWriteGuard for FramebufferGuard<'_> {
    fn bits_mut(&mut self) -> &mut [u8] {
        &mut self.fb.bits
    }

    fn stride_px(&self) -> usize {
        self.fb.width as usize
    }

    fn width(&self) -> u32 {
        self.fb.width
    }

    fn height(&self) -> u32 {
        self.fb.height
    }
}

impl Drop for FramebufferGuard<'_> {
    fn drop(&mut self) {
        self.fb.frames_written.fetch_add(1, Ordering::Relaxed);
    }
}

impl VideoSurface for Framebuffer {
    fn lock(&mut self) -> Option<Box<dyn SurfaceWriteGuard + '_>> {
        Some(Box::new(FramebufferGuard { fb: self }))
    }
}

/// Simulates the host's dedicated audio callback thread (spec.md §6): pulls
/// PCM at a steady cadence and discards it. A real host would write `buf`
/// into its device instead.
fn spawn_audio_drain(sink: Arc<std::sync::Mutex<player_pipeline::AudioSync>>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("demo-audio-drain".into())
        .spawn(move || {
            use player_codec::AudioSink;
            let format = sink.lock().unwrap().negotiated_format();
            let frames_per_pull = format.sample_rate as usize / 100;
            let mut buf = vec![0u8; frames_per_pull * format.channels as usize * 2];
            while !stop.load(Ordering::Relaxed) {
                sink.lock().unwrap().fill(&mut buf);
                thread::sleep(Duration::from_millis(10));
            }
        })
        .expect("failed to spawn audio drain thread")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let controller = Controller::new(Options::default());
    controller.set_data_source(args.path.clone());

    let frames_written = Arc::new(AtomicU64::new(0));
    controller.set_surface(Box::new(Framebuffer::new(args.width, args.height, frames_written.clone())));

    controller.prepare().with_context(|| format!("prepare {}", args.path))?;
    if let Some(duration) = controller.get_duration() {
        tracing::info!(seconds = duration.as_secs_f64(), "opened stream");
    }

    let audio_stop = Arc::new(AtomicBool::new(false));
    let audio_thread = controller.audio_sink().map(|sink| spawn_audio_drain(sink, audio_stop.clone()));

    controller.start();

    let run = Duration::from_secs(args.run_secs);
    let half = run / 2;
    thread::sleep(half);

    if let Some(target) = args.seek_secs {
        tracing::info!(target, "seeking");
        controller.seek_to((target * 1_000_000.0) as i64);
    }

    if let Some(pause_secs) = args.pause_for_secs {
        tracing::info!(pause_secs, "pausing");
        controller.pause();
        thread::sleep(Duration::from_secs(pause_secs));
        controller.start();
    }

    thread::sleep(run.saturating_sub(half));

    controller.release();
    audio_stop.store(true, Ordering::Relaxed);
    if let Some(h) = audio_thread {
        let _ = h.join();
    }

    tracing::info!(frames_displayed = frames_written.load(Ordering::Relaxed), "released");
    Ok(())
}
