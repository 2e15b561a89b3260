#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod sink;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use structopt::StructOpt;

use model::Track;
use replay::{FrameQueue, SystemClock, TimelineEngine};

use self::sink::GeoJsonDirSink;

#[derive(StructOpt)]
#[structopt(about = "Replays recorded GPS tracks together, looping forever")]
struct Args {
    /// GPX or CSV files to replay together
    #[structopt(parse(from_os_str))]
    files: Vec<PathBuf>,
    /// The path to a .zip file full of GPX or CSV files
    #[structopt(long, parse(from_os_str))]
    zip: Option<PathBuf>,
    /// How much recorded time passes per real second
    #[structopt(long, default_value = "10")]
    speed: f64,
    /// Every frame, runners-history.geojson and runners-head.geojson are replaced here
    #[structopt(long, parse(from_os_str), default_value = "data/output")]
    output_dir: PathBuf,
    /// Frames drawn per real second
    #[structopt(long, default_value = "60")]
    fps: f64,
    /// Stop after this many real seconds, instead of looping forever
    #[structopt(long)]
    run_for: Option<f64>,
}

impl Args {
    fn load(&self) -> Result<Vec<Track>> {
        if self.files.is_empty() && self.zip.is_none() {
            bail!("No input specified; pass some files or --zip");
        }
        let mut tracks = Vec::new();
        if !self.files.is_empty() {
            match model::import::load_files(self.files.as_slice()) {
                Ok(list) => tracks.extend(list),
                Err(err) => warn!("{err}"),
            }
        }
        if let Some(ref path) = self.zip {
            let bytes = fs_err::read(path)?;
            match model::import::load_zip_bytes(bytes) {
                Ok(list) => tracks.extend(list),
                Err(err) => warn!("{}: {err}", path.display()),
            }
        }
        if tracks.is_empty() {
            bail!("No valid track files could be loaded. Check the errors above.");
        }
        Ok(tracks)
    }

    fn frame_interval(&self) -> Result<Duration> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            bail!("--fps must be positive, not {}", self.fps);
        }
        match Duration::try_from_secs_f64(1.0 / self.fps) {
            Ok(interval) => Ok(interval),
            Err(err) => bail!("--fps {} is too small: {err}", self.fps),
        }
    }

    fn deadline(&self, now: Instant) -> Result<Option<Instant>> {
        match self.run_for {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                match Duration::try_from_secs_f64(secs)
                    .ok()
                    .and_then(|dt| now.checked_add(dt))
                {
                    Some(deadline) => Ok(Some(deadline)),
                    None => bail!("--run-for {secs} is too long"),
                }
            }
            Some(secs) => bail!("--run-for must be a number of seconds, not {secs}"),
            None => Ok(None),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::from_args();
    if let Err(err) = run(args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let frame_interval = args.frame_interval()?;
    let tracks = args.load()?;
    for (idx, track) in tracks.iter().enumerate() {
        info!(
            "Track {idx} ({}): {} points over {}s, starting {}",
            track.name(),
            track.points().len(),
            track.duration_ms() as f64 / 1000.0,
            track.start_time()
        );
    }

    let sink = GeoJsonDirSink::new(&args.output_dir)?;
    info!("Writing frames to {}", args.output_dir.display());

    let frames = FrameQueue::new();
    let mut engine = TimelineEngine::new(SystemClock::new(), frames.clone());
    let handle = engine.start(tracks, args.speed, sink)?;
    let deadline = args.deadline(Instant::now())?;

    // Stand-in for a display's refresh callback. Only frames the engine asked for get drawn, so
    // this ends once the replay is cancelled.
    let mut loops = 0;
    while !frames.is_empty() {
        std::thread::sleep(frame_interval);
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline && !handle.is_cancelled() {
                info!("Stopping after {}s", args.run_for.unwrap_or(0.0));
                handle.cancel();
            }
        }
        for report in engine.step() {
            if report.looped {
                loops += 1;
                info!("Finished loop {loops}; starting over");
            }
        }
    }
    Ok(())
}
