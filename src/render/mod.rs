//! Renderer seam: everything the drawing layer needs for one frame

use tracing::{info, trace};

use crate::game::{Outcome, PlayerView};

/// HUD values, already mapped to the viewer's perspective
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hud {
    /// Left HP bar
    pub my_hp: Option<i32>,
    /// Right HP bar
    pub opponent_hp: Option<i32>,
    pub timer_secs: Option<u32>,
    pub ping_ms: Option<u64>,
}

/// One renderable frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Fighter poses in arena coordinates
    pub fighters: Vec<PlayerView>,
    pub hud: Hud,
    /// Round banner, present while a round is over
    pub outcome: Option<Outcome>,
}

/// Turns frames into output. Implementations must not feed back into the
/// simulation.
pub trait Renderer {
    fn draw(&mut self, frame: &Frame);
}

/// Renderer that reports frames through `tracing` instead of pixels
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
    last_outcome: Option<Outcome>,
    last_hp: (Option<i32>, Option<i32>),
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }
}

impl Renderer for LogRenderer {
    fn draw(&mut self, frame: &Frame) {
        self.frames += 1;

        for (index, fighter) in frame.fighters.iter().enumerate() {
            trace!(
                index,
                name = %fighter.name,
                x = fighter.x,
                y = fighter.y,
                facing = ?fighter.facing,
                action = ?fighter.action,
                "fighter"
            );
        }

        let hp = (frame.hud.my_hp, frame.hud.opponent_hp);
        if hp != self.last_hp {
            info!(
                my_hp = ?frame.hud.my_hp,
                opponent_hp = ?frame.hud.opponent_hp,
                timer = ?frame.hud.timer_secs,
                ping_ms = ?frame.hud.ping_ms,
                "HP changed"
            );
            self.last_hp = hp;
        }

        if frame.outcome != self.last_outcome {
            if let Some(outcome) = frame.outcome {
                info!(%outcome, "Round over");
            }
            self.last_outcome = frame.outcome;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_frames() {
        let mut renderer = LogRenderer::new();
        let frame = Frame {
            outcome: Some(Outcome::YouWin),
            ..Frame::default()
        };
        renderer.draw(&frame);
        renderer.draw(&frame);
        assert_eq!(renderer.frames_drawn(), 2);
    }
}
