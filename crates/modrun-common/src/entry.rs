//! Entry-point stages.
//!
//! A freshly instantiated module is started by invoking at most one of a
//! fixed list of exports. [`EntryStage::ORDER`] is that list, first match wins.

use std::fmt;

/// One tier of the entry-point resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStage {
    /// WASI reactor initializer, `_initialize`.
    WasiInitialize,
    /// WASI command entry, `_start`.
    Start,
    /// Plain `init` export.
    Init,
}

impl EntryStage {
    /// Resolution order. Earlier stages shadow later ones.
    pub const ORDER: [EntryStage; 3] = [Self::WasiInitialize, Self::Start, Self::Init];

    /// Name of the export looked up for this stage.
    pub const fn export_name(self) -> &'static str {
        match self {
            Self::WasiInitialize => "_initialize",
            Self::Start => "_start",
            Self::Init => "init",
        }
    }
}

impl fmt::Display for EntryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.export_name())
    }
}
