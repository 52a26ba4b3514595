use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uuid::Uuid;

use crate::SegmentId;

/// Pastel fills offered for new activities. The gap color is deliberately absent.
pub const PALETTE: [&str; 11] = [
    "#fee2e2", "#ffedd5", "#fef3c7", "#dcfce7", "#d1fae5", "#ccfbf1", "#e0f2fe", "#e0e7ff",
    "#fae8ff", "#fce7f3", "#ffe4e6",
];

/// Supplies the color of a freshly created activity.
pub trait ColorPicker {
    fn pick(&mut self) -> String;
}

/// Supplies ids for freshly created segments. Ids must not repeat.
pub trait IdGenerator {
    fn next_id(&mut self) -> SegmentId;
}

/// Random choice from [`PALETTE`].
#[derive(Debug, Clone)]
pub struct PaletteColorPicker {
    rng: StdRng,
}

impl PaletteColorPicker {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for PaletteColorPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorPicker for PaletteColorPicker {
    fn pick(&mut self) -> String {
        PALETTE
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(PALETTE[0])
            .to_string()
    }
}

/// Walks a fixed list of colors in order, wrapping around.
#[derive(Debug, Clone)]
pub struct CyclingColorPicker {
    colors: Vec<String>,
    next: usize,
}

impl CyclingColorPicker {
    pub fn new(colors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut colors: Vec<String> = colors.into_iter().map(Into::into).collect();
        if colors.is_empty() {
            colors = PALETTE.iter().map(|c| c.to_string()).collect();
        }
        Self { colors, next: 0 }
    }
}

impl Default for CyclingColorPicker {
    fn default() -> Self {
        Self::new(PALETTE)
    }
}

impl ColorPicker for CyclingColorPicker {
    fn pick(&mut self) -> String {
        let color = self.colors[self.next % self.colors.len()].clone();
        self.next += 1;
        color
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&mut self) -> SegmentId {
        SegmentId(Uuid::new_v4().simple().to_string())
    }
}

/// `prefix-1`, `prefix-2`, ...
#[derive(Debug, Clone)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("seg")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self) -> SegmentId {
        self.counter += 1;
        SegmentId(format!("{}-{}", self.prefix, self.counter))
    }
}
