use std::path::Path;

use jsd_lang::Debugger;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::handles::HandleRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointEntry {
    pub file: SmolStr,
    pub line: u32,
    pub column: Option<u32>,
    /// Id in the engine's own breakpoint store, once registered there.
    pub engine_id: Option<usize>,
}

/// A line (and optional column) requested by `setBreakpoints`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedBreakpoint {
    pub line: u32,
    pub column: Option<u32>,
}

/// Per-file breakpoint sets, mirrored into the engine once a program is loaded.
#[derive(Debug, Default)]
pub struct BreakpointTable {
    entries: HandleRegistry<BreakpointEntry>,
    program: Option<SmolStr>,
}

fn basename(path: &str) -> Option<&str> {
    Path::new(path).file_name().and_then(|name| name.to_str())
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self) -> Option<&SmolStr> {
        self.program.as_ref()
    }

    /// Maps a client path onto the loaded program when their basenames agree.
    pub fn normalize(&self, path: &str) -> SmolStr {
        match &self.program {
            Some(program) if path != program.as_str() && basename(path).is_some() && basename(path) == basename(program) => {
                debug!(from = path, to = %program, "Normalized breakpoint source");
                program.clone()
            }
            _ => SmolStr::new(path),
        }
    }

    /// Records the loaded program and re-keys breakpoints submitted under another spelling of its path.
    ///
    /// Each launch brings a fresh engine, so every entry goes back to unregistered until
    /// [`BreakpointTable::apply`] runs against it.
    pub fn set_program(&mut self, program: &str) {
        self.program = Some(SmolStr::new(program));

        let renamed = self
            .entries
            .iter()
            .map(|(id, entry)| (id, self.normalize(&entry.file)))
            .collect::<Vec<_>>();

        for (id, entry) in self.entries.iter_mut() {
            if let Some((_, file)) = renamed.iter().find(|(renamed_id, _)| *renamed_id == id) {
                entry.file = file.clone();
            }
            entry.engine_id = None;
        }
    }

    /// Replaces every breakpoint of `path` with `requested`, returning the new entries.
    ///
    /// Without a `debugger` the entries are only recorded; [`BreakpointTable::apply`]
    /// registers them once the engine exists.
    pub fn replace_for_file(
        &mut self,
        path: &str,
        requested: &[RequestedBreakpoint],
        debugger: Option<&Debugger>,
    ) -> Vec<(i64, BreakpointEntry)> {
        let file = self.normalize(path);
        let removed = self.entries.clear(|entry| entry.file == file);

        match debugger {
            Some(debugger) => {
                for (_, entry) in &removed {
                    if let Some(engine_id) = entry.engine_id {
                        debugger.remove_breakpoint(engine_id);
                    }
                }
                for stale in debugger.breakpoints().into_iter().filter(|bp| bp.file == file) {
                    debugger.remove_breakpoint(stale.id);
                }
            }
            None => debug!(file = %file, "No engine yet, recording breakpoints locally"),
        }

        requested
            .iter()
            .map(|bp| {
                let entry = BreakpointEntry {
                    file: file.clone(),
                    line: bp.line,
                    column: bp.column,
                    engine_id: debugger.map(|debugger| debugger.add_breakpoint(&file, bp.line, bp.column)),
                };
                let id = self.entries.allocate(entry.clone());
                debug!(id, file = %file, line = bp.line, engine_id = ?entry.engine_id, "Added breakpoint");
                (id, entry)
            })
            .collect()
    }

    /// Registers every entry the engine does not know about yet.
    pub fn apply(&mut self, debugger: &Debugger) {
        for (id, entry) in self.entries.iter_mut() {
            if entry.engine_id.is_none() {
                entry.engine_id = Some(debugger.add_breakpoint(&entry.file, entry.line, entry.column));
                debug!(id, file = %entry.file, line = entry.line, "Applied deferred breakpoint");
            }
        }
    }

    /// The client id of the entry registered under `engine_id`.
    pub fn client_id(&self, engine_id: usize) -> Option<i64> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.engine_id == Some(engine_id))
            .map(|(id, _)| id)
    }

    /// Client ids of the breakpoints on `line` of `file`.
    pub fn ids_at(&self, file: &str, line: u32) -> Vec<i64> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.file == file && entry.line == line)
            .map(|(id, _)| id)
            .collect()
    }

    /// Client ids for a stop the engine attributed to `engine_id`, or, when the engine
    /// reported no breakpoint, for any entry on the stopped line.
    pub fn hit_ids(&self, engine_id: Option<usize>, file: &str, line: u32) -> Vec<i64> {
        match engine_id {
            Some(engine_id) => match self.client_id(engine_id) {
                Some(id) => vec![id],
                None => self.ids_at(file, line),
            },
            None => {
                let ids = self.ids_at(file, line);
                if !ids.is_empty() {
                    warn!(file, line, ?ids, "Breakpoint table reports a hit the engine did not confirm");
                }
                ids
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
