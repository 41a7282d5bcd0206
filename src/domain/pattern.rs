// Tank identity catalog: colors, pattern kinds and uniqueness rules.

use crate::domain::errors::GameError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Colors a tank pattern may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Brown,
    Black,
    White,
    Gray,
    Cyan,
}

impl Color {
    pub const ALL: [Color; 12] = [
        Color::Red,
        Color::Orange,
        Color::Yellow,
        Color::Green,
        Color::Blue,
        Color::Purple,
        Color::Pink,
        Color::Brown,
        Color::Black,
        Color::White,
        Color::Gray,
        Color::Cyan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Orange => "orange",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::Pink => "pink",
            Color::Brown => "brown",
            Color::Black => "black",
            Color::White => "white",
            Color::Gray => "gray",
            Color::Cyan => "cyan",
        }
    }

    /// CSS color code used by the board renderer.
    pub fn hex(self) -> &'static str {
        match self {
            Color::Red => "#E53935",
            Color::Orange => "#FB8C00",
            Color::Yellow => "#FDD835",
            Color::Green => "#43A047",
            Color::Blue => "#1E88E5",
            Color::Purple => "#8E24AA",
            Color::Pink => "#EC407A",
            Color::Brown => "#6D4C41",
            Color::Black => "#212121",
            Color::White => "#FAFAFA",
            Color::Gray => "#9E9E9E",
            Color::Cyan => "#00ACC1",
        }
    }
}

/// Two-color pattern kinds. A solid tank has no kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Stripes,
    DiagonalStripes,
    Checkers,
    Dots,
    Ring,
    Cross,
}

impl PatternKind {
    pub const ALL: [PatternKind; 6] = [
        PatternKind::Stripes,
        PatternKind::DiagonalStripes,
        PatternKind::Checkers,
        PatternKind::Dots,
        PatternKind::Ring,
        PatternKind::Cross,
    ];

    // `$1` is the primary color, `$2` the secondary.
    fn template(self) -> &'static str {
        match self {
            PatternKind::Stripes => "$1 and $2 stripes",
            PatternKind::DiagonalStripes => "$1 and $2 diagonal stripes",
            PatternKind::Checkers => "$1 and $2 checkers",
            PatternKind::Dots => "$1 with $2 dots",
            PatternKind::Ring => "$1 with a $2 ring",
            PatternKind::Cross => "$1 with a $2 cross",
        }
    }
}

/// The visual identity of one tank. Unique within a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TankPattern {
    pub primary: Color,
    pub secondary: Option<Color>,
    pub kind: Option<PatternKind>,
}

impl TankPattern {
    pub const fn solid(primary: Color) -> Self {
        Self {
            primary,
            secondary: None,
            kind: None,
        }
    }

    pub const fn patterned(primary: Color, secondary: Color, kind: PatternKind) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
            kind: Some(kind),
        }
    }

    /// Checks the shape rules that hold regardless of other players.
    pub fn is_well_formed(&self) -> bool {
        match (self.kind, self.secondary) {
            (None, None) => true,
            (Some(_), Some(secondary)) => secondary != self.primary,
            _ => false,
        }
    }

    /// Human readable name, e.g. `red and blue stripes` or `green`.
    pub fn display_name(&self) -> String {
        match (self.kind, self.secondary) {
            (Some(kind), Some(secondary)) => kind
                .template()
                .replace("$1", self.primary.name())
                .replace("$2", secondary.name()),
            _ => self.primary.name().to_string(),
        }
    }
}

/// True when no existing identity equals the candidate.
pub fn is_unique<'a, I>(existing: I, candidate: &TankPattern) -> bool
where
    I: IntoIterator<Item = &'a TankPattern>,
{
    existing.into_iter().all(|pattern| pattern != candidate)
}

/// Draws a random identity that is well formed and not already taken.
///
/// Gives up after `max_attempts` draws so an exhausted catalog cannot stall the caller.
pub fn random_identity<R: Rng + ?Sized>(
    rng: &mut R,
    existing: &[TankPattern],
    max_attempts: u32,
) -> Result<TankPattern, GameError> {
    for _ in 0..max_attempts {
        let candidate = random_draw(rng);
        if candidate.is_well_formed() && is_unique(existing, &candidate) {
            return Ok(candidate);
        }
    }
    Err(GameError::IdentityExhausted)
}

fn random_draw<R: Rng + ?Sized>(rng: &mut R) -> TankPattern {
    let primary = Color::ALL[rng.gen_range(0..Color::ALL.len())];
    let secondary = Color::ALL[rng.gen_range(0..Color::ALL.len())];
    // One extra slot stands for the solid pattern.
    let slot = rng.gen_range(0..=PatternKind::ALL.len());
    match PatternKind::ALL.get(slot) {
        Some(&kind) => TankPattern::patterned(primary, secondary, kind),
        None => TankPattern::solid(primary),
    }
}
