// src/repair/parser.rs — Turn free-form repair-tool diagnostics into issue counts
//
// The tool's phrasing is the real source of truth and changes between
// releases, so the pattern and keyword tables below are pinned by tests.
// Bump PATTERN_SET_VERSION whenever either table changes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const PATTERN_SET_VERSION: &str = "admesh-0.98/2";

/// The fixed set of defect categories tracked per mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    NonManifoldEdges,
    HolesOpenBoundaries,
    FlippedNormals,
    DisconnectedShells,
}

impl IssueCategory {
    pub const ALL: [IssueCategory; 4] = [
        IssueCategory::NonManifoldEdges,
        IssueCategory::HolesOpenBoundaries,
        IssueCategory::FlippedNormals,
        IssueCategory::DisconnectedShells,
    ];

    pub fn key(self) -> &'static str {
        match self {
            IssueCategory::NonManifoldEdges => "non_manifold_edges",
            IssueCategory::HolesOpenBoundaries => "holes_open_boundaries",
            IssueCategory::FlippedNormals => "flipped_normals",
            IssueCategory::DisconnectedShells => "disconnected_shells",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IssueCategory::NonManifoldEdges => "Non-manifold edges",
            IssueCategory::HolesOpenBoundaries => "Holes / open boundaries",
            IssueCategory::FlippedNormals => "Flipped / inconsistent normals",
            IssueCategory::DisconnectedShells => "Disconnected shells",
        }
    }

    /// Regexes tried in order; group 1 must be the count.
    fn patterns(self) -> &'static [Regex] {
        &ISSUE_PATTERNS[self as usize]
    }

    /// Fallback when no pattern matched: any of these present means "at least one".
    fn keywords(self) -> &'static [&'static str] {
        match self {
            IssueCategory::NonManifoldEdges => &["non-manifold", "backwards edges"],
            IssueCategory::HolesOpenBoundaries => &["holes", "open edge", "open boundary"],
            IssueCategory::FlippedNormals => &["normal", "flipped"],
            IssueCategory::DisconnectedShells => &["unconnected", "disconnected", "number of parts"],
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Non-negative count per category. Serializes as a flat JSON object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    pub non_manifold_edges: u32,
    pub holes_open_boundaries: u32,
    pub flipped_normals: u32,
    pub disconnected_shells: u32,
}

impl IssueSnapshot {
    pub fn get(&self, category: IssueCategory) -> u32 {
        match category {
            IssueCategory::NonManifoldEdges => self.non_manifold_edges,
            IssueCategory::HolesOpenBoundaries => self.holes_open_boundaries,
            IssueCategory::FlippedNormals => self.flipped_normals,
            IssueCategory::DisconnectedShells => self.disconnected_shells,
        }
    }

    pub fn set(&mut self, category: IssueCategory, value: u32) {
        let slot = match category {
            IssueCategory::NonManifoldEdges => &mut self.non_manifold_edges,
            IssueCategory::HolesOpenBoundaries => &mut self.holes_open_boundaries,
            IssueCategory::FlippedNormals => &mut self.flipped_normals,
            IssueCategory::DisconnectedShells => &mut self.disconnected_shells,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (IssueCategory, u32)> + '_ {
        IssueCategory::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    /// Sum of all categories.
    pub fn total(&self) -> u64 {
        self.iter().map(|(_, v)| u64::from(v)).sum()
    }
}

/// Mesh size figures; absent when the tool output didn't include them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshMetrics {
    pub triangle_count: Option<u64>,
    pub part_count: Option<u64>,
}

static ISSUE_PATTERNS: LazyLock<[Vec<Regex>; 4]> = LazyLock::new(|| {
    [
        compile(&[
            r"non[- ]manifold edges?\s*:\s*(\d+)",
            r"backwards edges?\s*:\s*(\d+)",
        ]),
        compile(&[r"holes?\s*:\s*(\d+)", r"open edges?\s*:\s*(\d+)"]),
        compile(&[
            r"flipped normals?\s*:\s*(\d+)",
            r"inconsistent normals?\s*:\s*(\d+)",
            r"incorrect normals?\s*:\s*(\d+)",
            r"normal(?:s| vectors?) fixed\s*:\s*(\d+)",
        ]),
        compile(&[
            r"disconnected shells?\s*:\s*(\d+)",
            r"unconnected facets?\s*:\s*(\d+)",
        ]),
    ]
});

static PARTS_PATTERN: LazyLock<Regex> = LazyLock::new(|| ci(r"number of parts\s*:\s*(\d+)"));
static FACETS_PATTERN: LazyLock<Regex> = LazyLock::new(|| ci(r"number of facets\s*:\s*(\d+)"));

fn ci(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("built-in pattern compiles")
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| ci(p)).collect()
}

/// First pattern whose capture parses as a count wins.
fn pick_count(text: &str, patterns: &[Regex]) -> Option<u32> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    })
}

fn pick_u64(text: &str, re: &Regex) -> Option<u64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse diagnostic text into a snapshot. Pure; never fails.
///
/// Categories with no matching pattern fall back to a keyword check that
/// yields 1 or 0, so every category always resolves to a concrete count.
/// A "number of parts" figure above 1 raises disconnected shells to at
/// least `parts - 1`.
pub fn parse(text: &str) -> IssueSnapshot {
    let mut found: [Option<u32>; 4] = IssueCategory::ALL.map(|c| pick_count(text, c.patterns()));

    let shells = IssueCategory::DisconnectedShells as usize;
    if let Some(parts) = pick_u64(text, &PARTS_PATTERN) {
        if parts > 1 {
            let from_parts = u32::try_from(parts - 1).unwrap_or(u32::MAX);
            found[shells] = Some(found[shells].map_or(from_parts, |v| v.max(from_parts)));
        } else if found[shells].is_none() {
            found[shells] = Some(0);
        }
    }

    let lower = text.to_lowercase();
    let mut snapshot = IssueSnapshot::default();
    for category in IssueCategory::ALL {
        let value = found[category as usize].unwrap_or_else(|| {
            let hit = category.keywords().iter().any(|k| lower.contains(k));
            u32::from(hit)
        });
        snapshot.set(category, value);
    }
    snapshot
}

/// Triangle and part counts, when present.
pub fn parse_metrics(text: &str) -> MeshMetrics {
    MeshMetrics {
        triangle_count: pick_u64(text, &FACETS_PATTERN),
        part_count: pick_u64(text, &PARTS_PATTERN),
    }
}

/// Sum of all counts in a snapshot.
pub fn total(snapshot: &IssueSnapshot) -> u64 {
    snapshot.total()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ADMESH_REPORT: &str = "\
================= Results produced by ADMesh version 0.98.4 ================
Input file         : bracket.stl
File type          : Binary STL file
========= Facet Status ========== Original ============ Final ====
Number of facets                 :  3656                3650
Facets with 1 disconnected edge  :     4                   0
Total disconnected facets        :     4                   0
=== Processing Statistics ===     ===== Other Statistics =====
Number of parts       :     3        Volume   :  1024.000000
Degenerate facets     :     0
Edges fixed           :     2
Facets removed        :     6
Facets added          :     0
Facets reversed       :     1
Backwards edges       :     5
Normals fixed         :     7
";

    #[test]
    fn test_parse_admesh_report() {
        let snap = parse(ADMESH_REPORT);
        assert_eq!(
            snap,
            IssueSnapshot {
                non_manifold_edges: 5,
                // "disconnected edge" doesn't contain "holes"/"open edge"
                holes_open_boundaries: 0,
                flipped_normals: 7,
                disconnected_shells: 2,
            }
        );
        assert_eq!(total(&snap), 14);
    }

    #[test]
    fn test_parse_explicit_labels() {
        let text = "Non-manifold edges: 3\nHoles: 2\nFlipped normals: 0\nDisconnected shells: 1";
        let snap = parse(text);
        assert_eq!(snap.non_manifold_edges, 3);
        assert_eq!(snap.holes_open_boundaries, 2);
        assert_eq!(snap.flipped_normals, 0);
        assert_eq!(snap.disconnected_shells, 1);
    }

    #[test]
    fn test_case_insensitive_and_first_pattern_wins() {
        let text = "NON MANIFOLD EDGE: 9\nbackwards edges: 4\nOPEN EDGES : 11";
        let snap = parse(text);
        assert_eq!(snap.non_manifold_edges, 9);
        assert_eq!(snap.holes_open_boundaries, 11);
    }

    #[test]
    fn test_unparseable_number_falls_through_to_next_pattern() {
        // Overflows u32, so the second pattern supplies the count.
        let text = "non-manifold edges: 99999999999999\nbackwards edges: 2";
        assert_eq!(parse(text).non_manifold_edges, 2);
    }

    #[test]
    fn test_keyword_fallback() {
        let text = "warning: mesh has flipped faces and some open boundary loops";
        let snap = parse(text);
        assert_eq!(snap.flipped_normals, 1);
        assert_eq!(snap.holes_open_boundaries, 1);
        assert_eq!(snap.non_manifold_edges, 0);
        assert_eq!(snap.disconnected_shells, 0);
    }

    #[test]
    fn test_parts_raise_shells_but_never_lower() {
        assert_eq!(parse("Number of parts : 4").disconnected_shells, 3);
        assert_eq!(
            parse("Disconnected shells: 10\nNumber of parts : 4").disconnected_shells,
            10
        );
        assert_eq!(
            parse("Disconnected shells: 1\nNumber of parts : 4").disconnected_shells,
            3
        );
    }

    #[test]
    fn test_single_part_means_no_shells_without_keyword_guess() {
        // "number of parts" is itself a shells keyword; a count of 1 must win over it.
        assert_eq!(parse("Number of parts : 1").disconnected_shells, 0);
    }

    #[test]
    fn test_empty_and_garbage_text() {
        assert_eq!(parse(""), IssueSnapshot::default());
        let garbage = "\u{0}\u{fffd}::::: 12 :::: -5 holes: -3 ¯\\_(ツ)_/¯";
        let snap = parse(garbage);
        // "holes: -3" has no digit right after the colon: keyword fallback applies.
        assert_eq!(snap.holes_open_boundaries, 1);
        assert_eq!(snap.non_manifold_edges, 0);
    }

    #[test]
    fn test_parse_is_deterministic() {
        for text in [ADMESH_REPORT, "", "normal", "holes: 3 holes: 4"] {
            assert_eq!(parse(text), parse(text));
        }
        assert_eq!(parse("holes: 3 holes: 4").holes_open_boundaries, 3);
    }

    #[test]
    fn test_parse_metrics() {
        let m = parse_metrics(ADMESH_REPORT);
        assert_eq!(m.triangle_count, Some(3656));
        assert_eq!(m.part_count, Some(3));
        assert_eq!(parse_metrics("nothing here"), MeshMetrics::default());
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let snap = IssueSnapshot {
            non_manifold_edges: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["non_manifold_edges"], 1);
        assert_eq!(json["disconnected_shells"], 0);
        assert_eq!(IssueCategory::HolesOpenBoundaries.to_string(), "holes_open_boundaries");
    }
}
