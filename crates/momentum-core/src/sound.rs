//! Bounded alarm sound loop.
//!
//! Plays the alarm asset `max_plays` times, `interval` apart, then stops on
//! its own. A second `play_alarm` while a loop is running is refused.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::AudioError;
use crate::storage::config::SoundConfig;

/// Audio output. Implementations must not block for the length of the asset.
pub trait AudioPlayer: Send + Sync {
    fn play(&self) -> Result<(), AudioError>;
    fn stop(&self);
}

/// Player that makes no sound; used when sound is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl AudioPlayer for SilentPlayer {
    fn play(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop(&self) {}
}

pub struct AlarmSound {
    player: Arc<dyn AudioPlayer>,
    max_plays: u32,
    interval: Duration,
    active: Mutex<Option<JoinHandle<()>>>,
}

impl AlarmSound {
    pub fn new(player: Arc<dyn AudioPlayer>, max_plays: u32, interval: Duration) -> Self {
        Self {
            player,
            max_plays,
            interval,
            active: Mutex::new(None),
        }
    }

    pub fn from_config(player: Arc<dyn AudioPlayer>, config: &SoundConfig) -> Self {
        let player: Arc<dyn AudioPlayer> = if config.enabled {
            player
        } else {
            Arc::new(SilentPlayer)
        };
        Self::new(
            player,
            config.max_plays,
            Duration::from_millis(config.interval_ms),
        )
    }

    /// Start the loop. Returns `false` if one is already playing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn play_alarm(&self) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        if active.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("alarm sound already playing");
            return false;
        }

        let player = Arc::clone(&self.player);
        let plays = self.max_plays;
        let interval = self.interval;
        *active = Some(tokio::spawn(async move {
            for n in 1..=plays {
                if let Err(e) = player.play() {
                    warn!(error = %e, play = n, "alarm sound playback failed");
                }
                tokio::time::sleep(interval).await;
            }
            player.stop();
            debug!(plays, "alarm sound loop finished");
        }));
        true
    }

    /// Stop the loop early. No-op when nothing is playing.
    pub fn stop(&self) {
        let task = self.active.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            if !task.is_finished() {
                task.abort();
                self.player.stop();
                debug!("alarm sound stopped");
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for AlarmSound {
    fn drop(&mut self) {
        if let Some(task) = self.active.get_mut().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
        }
    }
}
