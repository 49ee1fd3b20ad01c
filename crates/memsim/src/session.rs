//! Replays script operations against one allocator.

use std::{collections::BTreeMap, io::Write};

use allocator::{Allocator as _, Memory, Policy, Process, ProcessId, Technique, trace::trace};
use log::{info, warn};
use snafu::{ResultExt as _, ensure};

use crate::{
    error::{CliError, cli_error},
    render::Renderer,
    script::Op,
};

/// An allocator together with the processes submitted to it.
pub struct Session<W> {
    technique: Technique,
    memory: Memory,
    policy: Policy,
    strict: bool,
    renderer: Renderer,
    processes: BTreeMap<ProcessId, Process>,
    out: W,
}

impl<W> Session<W>
where
    W: Write,
{
    pub fn new(
        technique: Technique,
        memory: Memory,
        policy: Policy,
        renderer: Renderer,
        out: W,
    ) -> Self {
        Self {
            technique,
            memory,
            policy,
            strict: false,
            renderer,
            processes: BTreeMap::new(),
            out,
        }
    }

    /// Makes the first failed operation end the run.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Places processes `0..n` with the given sizes and prints where each
    /// one landed. The processes stay allocated and can be freed by id.
    pub fn trace(&mut self, sizes: &[usize]) -> Result<(), CliError> {
        let placed = trace(&mut self.memory, sizes, self.policy);
        for (id, (&size, &slot)) in sizes.iter().zip(&placed).enumerate() {
            let line = self.renderer.placement(id, size, slot);
            writeln!(self.out, "{line}").context(cli_error::WriteOutputSnafu)?;
        }
        Ok(())
    }

    /// Runs one operation. `origin` names it in messages, such as
    /// `script.txt:3`.
    pub fn run(&mut self, origin: &str, op: Op) -> Result<(), CliError> {
        match op {
            Op::Alloc { id, size, policy } => self.alloc(origin, id, size, policy),
            Op::Free { id } => self.free(origin, id),
            Op::Status => self.status(),
            Op::Stats => self.stats(),
            Op::Pages { id } => self.pages(origin, id),
        }
    }

    fn alloc(
        &mut self,
        origin: &str,
        id: ProcessId,
        size: usize,
        policy: Option<Policy>,
    ) -> Result<(), CliError> {
        let policy = policy.unwrap_or(self.policy);
        let mut process = Process::new(id.get(), size);
        match self.memory.allocate(&mut process, policy) {
            Ok(()) => {
                let slots = self.memory.slots_of(id);
                let names = slots
                    .iter()
                    .map(|&index| self.renderer.slot_name(index))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!("{origin}: process {id} ({size}) allocated in {names}");
                self.processes.insert(id, process);
                Ok(())
            }
            Err(source) if !self.strict => {
                warn!("{origin}: {source}");
                Ok(())
            }
            Err(source) => Err(source).context(cli_error::AllocateSnafu { origin }),
        }
    }

    fn free(&mut self, origin: &str, id: ProcessId) -> Result<(), CliError> {
        let result = match self.processes.get_mut(&id) {
            Some(process) => self.memory.release(process),
            None => self.memory.deallocate(id),
        };
        match result {
            Ok(()) => {
                self.processes.remove(&id);
                info!("{origin}: process {id} deallocated");
                Ok(())
            }
            Err(source) if !self.strict => {
                warn!("{origin}: {source}");
                Ok(())
            }
            Err(source) => Err(source).context(cli_error::DeallocateSnafu { origin }),
        }
    }

    fn status(&mut self) -> Result<(), CliError> {
        for slot in self.memory.status() {
            let line = self.renderer.slot(&slot);
            writeln!(self.out, "{line}").context(cli_error::WriteOutputSnafu)?;
        }
        Ok(())
    }

    fn stats(&mut self) -> Result<(), CliError> {
        let stats = self.renderer.stats(&self.memory.stats());
        writeln!(self.out, "{stats}").context(cli_error::WriteOutputSnafu)
    }

    fn pages(&mut self, origin: &str, id: ProcessId) -> Result<(), CliError> {
        let paging = self.memory.as_paging();
        if paging.is_none() && !self.strict {
            warn!("{origin}: page tables only exist with paging");
            return Ok(());
        }
        ensure!(
            paging.is_some(),
            cli_error::NotPagingSnafu {
                origin,
                technique: self.technique.clone(),
            }
        );

        let line = match paging.and_then(|paging| paging.page_table(id)) {
            Some(frames) => self.renderer.page_table(id, frames),
            None => format!("Process {id} has no pages"),
        };
        writeln!(self.out, "{line}").context(cli_error::WriteOutputSnafu)
    }

    pub fn into_output(self) -> W {
        self.out
    }
}
