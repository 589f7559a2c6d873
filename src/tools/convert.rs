// src/tools/convert.rs — 3D format conversion through an external converter
//
// Scene formats (3MF, GLB) keep the scene graph; single-mesh formats are
// exported flattened into one mesh.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::command::{excerpt, run_captured};
use crate::infra::config::ConverterConfig;
use crate::infra::errors::ManifixError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionTarget {
    ThreeMf,
    Stl,
    Obj,
    Ply,
    Off,
    Glb,
}

pub const DEFAULT_TARGET: ConversionTarget = ConversionTarget::Stl;

impl ConversionTarget {
    pub const ALL: [ConversionTarget; 6] = [
        ConversionTarget::ThreeMf,
        ConversionTarget::Stl,
        ConversionTarget::Obj,
        ConversionTarget::Ply,
        ConversionTarget::Off,
        ConversionTarget::Glb,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ConversionTarget::ThreeMf => "3mf",
            ConversionTarget::Stl => "stl",
            ConversionTarget::Obj => "obj",
            ConversionTarget::Ply => "ply",
            ConversionTarget::Off => "off",
            ConversionTarget::Glb => "glb",
        }
    }

    /// Targets that export the whole scene rather than one flattened mesh.
    pub fn is_scene(self) -> bool {
        matches!(self, ConversionTarget::ThreeMf | ConversionTarget::Glb)
    }

    /// Comma-separated list of supported extensions, sorted.
    pub fn supported_list() -> String {
        let mut exts: Vec<_> = Self::ALL.iter().map(|t| t.extension()).collect();
        exts.sort_unstable();
        exts.join(", ")
    }

    /// Whether a filename's extension is something we can read.
    pub fn accepts_input(filename: &str) -> bool {
        crate::infra::paths::file_extension(filename)
            .parse::<ConversionTarget>()
            .is_ok()
    }
}

impl FromStr for ConversionTarget {
    type Err = ManifixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.extension() == wanted)
            .ok_or_else(|| ManifixError::UnsupportedFormat {
                format: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

impl std::fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[async_trait]
pub trait MeshConverter: Send + Sync {
    /// Write `input` as `target` to `output`, or explain why not.
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: ConversionTarget,
    ) -> Result<(), ManifixError>;
}

/// Converter backed by the `assimp` command line.
pub struct CommandConverter {
    program: String,
    timeout: Duration,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(
            config.program.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

/// `assimp export <in> <out> -f<fmt> [-ptv]`; `-ptv` pre-transforms vertices,
/// collapsing the scene graph into a single mesh.
pub fn export_args(input: &Path, output: &Path, target: ConversionTarget) -> Vec<OsString> {
    let mut args = vec![
        OsString::from("export"),
        input.as_os_str().to_owned(),
        output.as_os_str().to_owned(),
        OsString::from(format!("-f{}", target.extension())),
    ];
    if !target.is_scene() {
        args.push("-ptv".into());
    }
    args
}

#[async_trait]
impl MeshConverter for CommandConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: ConversionTarget,
    ) -> Result<(), ManifixError> {
        let run =
            run_captured(&self.program, export_args(input, output, target), self.timeout).await?;

        if !run.exit_ok {
            let detail = excerpt(&run.output, 500);
            return Err(ManifixError::Conversion(format!(
                "Could not export to {target}: {detail}"
            )));
        }

        let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(ManifixError::Conversion(
                "Conversion produced an empty output file.".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!("3MF".parse::<ConversionTarget>().unwrap(), ConversionTarget::ThreeMf);
        assert_eq!(".glb".parse::<ConversionTarget>().unwrap(), ConversionTarget::Glb);
        let err = "fbx".parse::<ConversionTarget>().unwrap_err();
        assert!(err.to_string().contains("3mf, glb, obj, off, ply, stl"));
    }

    #[test]
    fn test_scene_routing() {
        let scene: Vec<_> = ConversionTarget::ALL
            .into_iter()
            .filter(|t| t.is_scene())
            .collect();
        assert_eq!(scene, [ConversionTarget::ThreeMf, ConversionTarget::Glb]);
    }

    #[test]
    fn test_export_args_flatten_mesh_targets() {
        let a = export_args(Path::new("a.3mf"), Path::new("a.stl"), ConversionTarget::Stl);
        assert_eq!(a.last().unwrap(), "-ptv");
        let b = export_args(Path::new("a.stl"), Path::new("a.glb"), ConversionTarget::Glb);
        assert_eq!(b.last().unwrap(), "-fglb");
    }

    #[test]
    fn test_accepts_input() {
        assert!(ConversionTarget::accepts_input("part.OBJ"));
        assert!(!ConversionTarget::accepts_input("part.step"));
        assert!(!ConversionTarget::accepts_input("part"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.stl");
        // `true` exits 0 and writes nothing.
        let conv = CommandConverter::new("true", Duration::from_secs(5));
        let err = conv
            .convert(&dir.path().join("in.obj"), &out, ConversionTarget::Stl)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty output"));
    }
}
