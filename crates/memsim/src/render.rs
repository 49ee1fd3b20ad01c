//! Human-readable views of an allocator.

use std::fmt;

use allocator::{MemoryStats, ProcessId, Slot, SlotState, Technique};

use crate::style::{Color, Palette};

/// Formats slots, statistics and page tables for one technique.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    label: &'static str,
    ranges: bool,
    palette: Palette,
}

impl Renderer {
    pub fn new(technique: &Technique, palette: Palette) -> Self {
        Self {
            label: technique.slot_label(),
            ranges: !technique.is_paging(),
            palette,
        }
    }

    pub fn slot<'a>(&self, slot: &'a Slot) -> SlotLine<'a> {
        SlotLine {
            renderer: *self,
            slot,
        }
    }

    /// Names the slot at `index`, such as `Partition 4`.
    pub fn slot_name(&self, index: usize) -> String {
        format!("{} {index}", self.label)
    }

    pub fn stats(&self, stats: &MemoryStats) -> StatsBlock {
        StatsBlock {
            palette: self.palette,
            stats: *stats,
        }
    }

    pub fn page_table(&self, id: ProcessId, frames: &[usize]) -> String {
        let pages = frames
            .iter()
            .enumerate()
            .map(|(page, frame)| format!("{page} -> frame {frame}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Process {id} pages: {pages}")
    }

    /// Describes where one process of a trace landed.
    pub fn placement(&self, id: usize, size: usize, slot: Option<usize>) -> String {
        match slot {
            Some(index) => format!("Process {id} ({size}): {}", self.slot_name(index)),
            None => format!(
                "Process {id} ({size}): {}",
                self.palette.paint(Color::Red, "not allocated")
            ),
        }
    }
}

pub struct SlotLine<'a> {
    renderer: Renderer,
    slot: &'a Slot,
}

impl fmt::Display for SlotLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { renderer, slot } = self;
        write!(f, "{} {}", renderer.label, slot.index)?;
        if renderer.ranges {
            write!(f, " ({}-{})", slot.start, slot.end())?;
        }
        match slot.state {
            SlotState::Free => write!(f, ": {}", renderer.palette.paint(Color::Green, "Free")),
            SlotState::Occupied(id) => write!(
                f,
                ": {} ({} used)",
                renderer
                    .palette
                    .paint(Color::Yellow, format_args!("Occupied by process {id}")),
                slot.used
            ),
        }
    }
}

pub struct StatsBlock {
    palette: Palette,
    stats: MemoryStats,
}

impl fmt::Display for StatsBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { palette, stats } = self;
        let title = |name| palette.paint(Color::Cyan, name);
        writeln!(f, "{}: {}", title("Total memory"), stats.capacity)?;
        writeln!(
            f,
            "{}: {} ({} requested)",
            title("Allocated"),
            stats.allocated,
            stats.requested
        )?;
        writeln!(
            f,
            "{}: {} in {} slot(s), largest {}",
            title("Free memory"),
            stats.free,
            stats.free_slots,
            stats.largest_free_slot
        )?;
        writeln!(
            f,
            "{}: {}",
            title("Internal fragmentation"),
            stats.internal_fragmentation()
        )?;
        write!(
            f,
            "{}: {}",
            title("External fragmentation"),
            stats.external_fragmentation()
        )
    }
}
