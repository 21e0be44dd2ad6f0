//! Time-gated special abilities
//!
//! A skill is usable once `now >= ready_at`. Using it pushes `ready_at` out by
//! its cooldown whether or not the effect changed anything. The effects
//! themselves live on the session, which owns everything they touch.

use std::time::{Duration, Instant};

/// The three skills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkillKind {
    /// Temporarily lengthens the gravity interval
    Slow,
    /// Removes one random non-empty row
    ClearRandomRow,
    /// Replaces the falling piece with the next one
    SwapNext,
}

impl SkillKind {
    pub fn all() -> [SkillKind; 3] {
        [SkillKind::Slow, SkillKind::ClearRandomRow, SkillKind::SwapNext]
    }

    pub fn name(&self) -> &'static str {
        match self {
            SkillKind::Slow => "Slow",
            SkillKind::ClearRandomRow => "Clear Row",
            SkillKind::SwapNext => "Swap Next",
        }
    }
}

/// Cooldown and effect durations for every skill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillTimings {
    pub slow_cooldown: Duration,
    pub slow_duration: Duration,
    pub clear_row_cooldown: Duration,
    pub swap_next_cooldown: Duration,
}

impl Default for SkillTimings {
    fn default() -> Self {
        Self {
            slow_cooldown: Duration::from_secs(30),
            slow_duration: Duration::from_secs(10),
            clear_row_cooldown: Duration::from_secs(20),
            swap_next_cooldown: Duration::from_secs(15),
        }
    }
}

/// One skill's cooldown gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skill {
    pub kind: SkillKind,
    pub cooldown: Duration,
    /// How long the effect lasts, for skills with a lasting effect
    pub effect: Option<Duration>,
    /// None until first use: a fresh skill is ready
    ready_at: Option<Instant>,
}

impl Skill {
    pub fn new(kind: SkillKind, cooldown: Duration, effect: Option<Duration>) -> Self {
        Self {
            kind,
            cooldown,
            effect,
            ready_at: None,
        }
    }

    pub fn can_use(&self, now: Instant) -> bool {
        self.ready_at.is_none_or(|ready_at| now >= ready_at)
    }

    /// Consume the skill if ready. Returns false (and changes nothing) while on
    /// cooldown.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if !self.can_use(now) {
            return false;
        }
        self.ready_at = Some(now + self.cooldown);
        true
    }

    /// Time left until usable, zero when ready
    pub fn remaining(&self, now: Instant) -> Duration {
        self.ready_at
            .map(|ready_at| ready_at.saturating_duration_since(now))
            .unwrap_or_default()
    }
}

/// Readiness of one skill, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillStatus {
    pub kind: SkillKind,
    pub ready: bool,
    pub remaining: Duration,
}

/// All three skills of a session
#[derive(Debug, Clone)]
pub struct Skills {
    slow: Skill,
    clear_row: Skill,
    swap_next: Skill,
}

impl Default for Skills {
    fn default() -> Self {
        Self::new(SkillTimings::default())
    }
}

impl Skills {
    pub fn new(timings: SkillTimings) -> Self {
        Self {
            slow: Skill::new(
                SkillKind::Slow,
                timings.slow_cooldown,
                Some(timings.slow_duration),
            ),
            clear_row: Skill::new(SkillKind::ClearRandomRow, timings.clear_row_cooldown, None),
            swap_next: Skill::new(SkillKind::SwapNext, timings.swap_next_cooldown, None),
        }
    }

    pub fn get(&self, kind: SkillKind) -> &Skill {
        match kind {
            SkillKind::Slow => &self.slow,
            SkillKind::ClearRandomRow => &self.clear_row,
            SkillKind::SwapNext => &self.swap_next,
        }
    }

    pub fn get_mut(&mut self, kind: SkillKind) -> &mut Skill {
        match kind {
            SkillKind::Slow => &mut self.slow,
            SkillKind::ClearRandomRow => &mut self.clear_row,
            SkillKind::SwapNext => &mut self.swap_next,
        }
    }

    pub fn status(&self, now: Instant) -> [SkillStatus; 3] {
        SkillKind::all().map(|kind| {
            let skill = self.get(kind);
            SkillStatus {
                kind: skill.kind,
                ready: skill.can_use(now),
                remaining: skill.remaining(now),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_skill_is_ready() {
        let skills = Skills::default();
        let now = Instant::now();
        for kind in SkillKind::all() {
            assert!(skills.get(kind).can_use(now));
            assert_eq!(skills.get(kind).remaining(now), Duration::ZERO);
        }
    }

    #[test]
    fn test_trigger_starts_cooldown() {
        let now = Instant::now();
        let mut skill = Skill::new(SkillKind::SwapNext, Duration::from_secs(15), None);
        assert!(skill.trigger(now));
        assert_eq!(skill.ready_at, Some(now + Duration::from_secs(15)));
        assert!(!skill.can_use(now + Duration::from_secs(14)));
        assert!(skill.can_use(now + Duration::from_secs(15)));
    }

    #[test]
    fn test_trigger_on_cooldown_keeps_ready_at() {
        let now = Instant::now();
        let mut skill = Skill::new(SkillKind::Slow, Duration::from_secs(30), None);
        assert!(skill.trigger(now));
        assert!(!skill.trigger(now + Duration::from_secs(5)));
        assert_eq!(skill.ready_at, Some(now + Duration::from_secs(30)));
        assert_eq!(
            skill.remaining(now + Duration::from_secs(5)),
            Duration::from_secs(25)
        );
    }

    #[test]
    fn test_default_timings() {
        let skills = Skills::default();
        assert_eq!(skills.get(SkillKind::Slow).cooldown, Duration::from_secs(30));
        assert_eq!(skills.get(SkillKind::Slow).effect, Some(Duration::from_secs(10)));
        assert_eq!(
            skills.get(SkillKind::ClearRandomRow).cooldown,
            Duration::from_secs(20)
        );
        assert_eq!(skills.get(SkillKind::SwapNext).cooldown, Duration::from_secs(15));
    }
}
