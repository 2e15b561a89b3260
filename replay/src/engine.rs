use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use geojson::FeatureCollection;

use model::Track;

use crate::geometry::{head_feature, history_feature};
use crate::{Clock, FrameQueue, FrameScheduler, Layer, RenderSink};

/// After every track has finished, hold the final positions this long before starting over
pub const LOOP_PAUSE: Duration = Duration::from_millis(2000);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionID(pub usize);

/// Drives one replay at a time. The host asks for frames through the `FrameScheduler`, then calls
/// `on_frame` for each one.
pub struct TimelineEngine<C, S> {
    clock: C,
    scheduler: S,
    session: Option<Session>,
    id_counter: usize,
}

struct Session {
    id: SessionID,
    tracks: Vec<Track>,
    speed: f64,
    max_duration_ms: i64,
    /// Real time when virtual time was last zero
    clock_origin: Duration,
    cancelled: Rc<Cell<bool>>,
    sink: Box<dyn RenderSink>,
}

/// Lets whoever started a replay stop it. Stopping happens at the next frame; a frame already
/// being drawn finishes.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: SessionID,
    cancelled: Rc<Cell<bool>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionID {
        self.id
    }

    /// Idempotent
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// What happened during one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub session: SessionID,
    /// The virtual time everything was drawn at
    pub virtual_elapsed_ms: f64,
    /// True if the clock restarted from zero at the end of this frame
    pub looped: bool,
}

impl<C: Clock, S: FrameScheduler> TimelineEngine<C, S> {
    pub fn new(clock: C, scheduler: S) -> Self {
        Self {
            clock,
            scheduler,
            session: None,
            id_counter: 0,
        }
    }

    /// Starts replaying all of the tracks from the beginning, replacing any previous replay.
    /// Nothing changes if the input is invalid.
    pub fn start<R: RenderSink + 'static>(
        &mut self,
        tracks: Vec<Track>,
        speed: f64,
        sink: R,
    ) -> Result<SessionHandle> {
        if tracks.is_empty() {
            bail!("Can't replay without any tracks");
        }
        if !(speed.is_finite() && speed > 0.0) {
            bail!("Speed multiplier must be positive, not {speed}");
        }

        if let Some(old) = self.session.take() {
            debug!("Replacing replay {:?}", old.id);
            old.cancelled.set(true);
        }

        let id = SessionID(self.id_counter);
        self.id_counter += 1;
        let cancelled = Rc::new(Cell::new(false));
        let max_duration_ms = tracks.iter().map(|t| t.duration_ms()).max().unwrap_or(0);
        info!(
            "Replaying {} tracks at {speed}x, longest lasting {}s",
            tracks.len(),
            max_duration_ms as f64 / 1000.0
        );

        self.session = Some(Session {
            id,
            tracks,
            speed,
            max_duration_ms,
            clock_origin: self.clock.now(),
            cancelled: cancelled.clone(),
            sink: Box::new(sink),
        });
        self.scheduler.request_frame(id);

        Ok(SessionHandle { id, cancelled })
    }

    pub fn cancel(&mut self, handle: &SessionHandle) {
        handle.cancel();
    }

    /// True if the current replay hasn't been cancelled
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| !s.cancelled.get())
            .unwrap_or(false)
    }

    /// Draws one frame for `session`, then asks for another. Frames for replaced or cancelled
    /// sessions do nothing and aren't rescheduled.
    pub fn on_frame(&mut self, session: SessionID) -> Option<TickReport> {
        let current = match self.session {
            Some(ref mut current) if current.id == session => current,
            _ => {
                debug!("Ignoring frame for stale replay {:?}", session);
                return None;
            }
        };
        if current.cancelled.get() {
            info!("Replay {:?} cancelled", session);
            // Releases the sink
            self.session = None;
            return None;
        }

        let now = self.clock.now();
        let virtual_elapsed_ms = now.saturating_sub(current.clock_origin).as_secs_f64()
            * 1000.0
            * current.speed;
        current.draw(virtual_elapsed_ms);

        let looped = virtual_elapsed_ms
            > (current.max_duration_ms as f64) + (LOOP_PAUSE.as_millis() as f64);
        if looped {
            debug!("Replay {:?} finished; starting over", session);
            current.clock_origin = now;
        }

        if !current.cancelled.get() {
            self.scheduler.request_frame(session);
        }

        Some(TickReport {
            session,
            virtual_elapsed_ms,
            looped,
        })
    }
}

impl<C: Clock> TimelineEngine<C, FrameQueue> {
    /// Services every frame requested so far, once each
    pub fn step(&mut self) -> Vec<TickReport> {
        let pending = self.scheduler.take_pending();
        pending
            .into_iter()
            .filter_map(|id| self.on_frame(id))
            .collect()
    }
}

impl Session {
    fn draw(&mut self, virtual_elapsed_ms: f64) {
        let mut history = Vec::new();
        let mut heads = Vec::new();
        for (idx, track) in self.tracks.iter().enumerate() {
            let sample = track.sample(virtual_elapsed_ms);
            history.push(history_feature(idx, track, track.history(sample)));
            heads.push(head_feature(idx, track, sample.pos));
        }

        self.sink.set_data(Layer::History, collection(history));
        self.sink.set_data(Layer::Head, collection(heads));
    }
}

fn collection(features: Vec<geojson::Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
