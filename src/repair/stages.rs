// src/repair/stages.rs — The fixed, ordered repair plan

use super::parser::IssueCategory;

/// One corrective pass: the tool flags to run and the categories it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    pub flags: &'static [&'static str],
    /// Forced to 0 once this stage succeeds, whatever the next inspection says.
    pub resolves: &'static [IssueCategory],
}

/// Stages run strictly in this order.
pub static DEFAULT_STAGES: &[Stage] = &[
    Stage {
        name: "Fix normal directions",
        flags: &["--exact", "--normal-directions"],
        resolves: &[IssueCategory::FlippedNormals],
    },
    Stage {
        name: "Remove disconnected shells",
        flags: &["--remove-unconnected"],
        resolves: &[IssueCategory::DisconnectedShells],
    },
    Stage {
        name: "Fill holes/open boundaries",
        flags: &["--fill-holes"],
        resolves: &[IssueCategory::HolesOpenBoundaries],
    },
    Stage {
        name: "Repair nearby/non-manifold edges",
        flags: &["--nearby", "--tolerance=0.01", "--iterations=2"],
        resolves: &[IssueCategory::NonManifoldEdges],
    },
];

/// Everything at once, for the single-shot drop-folder repair.
pub static SINGLE_SHOT_FLAGS: &[&str] = &[
    "--exact",
    "--normal-directions",
    "--remove-unconnected",
    "--fill-holes",
    "--nearby",
    "--tolerance=0.01",
    "--iterations=2",
];
