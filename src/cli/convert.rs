// src/cli/convert.rs — `manifix convert`

use std::path::{Path, PathBuf};

use crate::infra::config::Config;
use crate::infra::errors::ManifixError;
use crate::infra::paths;
use crate::tools::convert::{CommandConverter, ConversionTarget, MeshConverter};

pub async fn run_convert(
    config: &Config,
    file: &Path,
    to: &str,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let name = file.to_string_lossy();
    if !ConversionTarget::accepts_input(&name) {
        return Err(ManifixError::UnsupportedFormat {
            format: paths::file_extension(&name),
            supported: ConversionTarget::supported_list(),
        }
        .into());
    }
    let target: ConversionTarget = to.parse()?;

    let out_dir = super::output_dir_for(file, out_dir);
    tokio::fs::create_dir_all(&out_dir).await?;
    let output = paths::unique_output_path(
        &out_dir,
        &paths::safe_stem(file),
        &format!(".converted.{}", target.extension()),
    );

    CommandConverter::from_config(&config.converter)
        .convert(file, &output, target)
        .await?;
    println!("Wrote {}", output.display());
    Ok(())
}
