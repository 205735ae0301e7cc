use std::path::{Path, PathBuf};

use tracing::info;

use super::{has_entries, sorted_files};
use crate::config::PipelinePaths;
use crate::errors::PipelineError;
use crate::pipeline_config::ToolsConfig;
use crate::tools::ToolRunner;

/// First `*.GRP` archive in `game_dir`, by name.
pub fn find_grp(game_dir: &Path) -> Result<PathBuf, PipelineError> {
    sorted_files(game_dir)?
        .into_iter()
        .find(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("grp"))
        })
        .ok_or_else(|| {
            PipelineError::Resource(format!("No .GRP file found in {}", game_dir.display()))
        })
}

/// Unpack the staged GRP archive into `10_extract` with `kextract`.
pub async fn run(
    paths: &PipelinePaths,
    tools: &ToolsConfig,
    runner: &ToolRunner,
) -> Result<PathBuf, PipelineError> {
    if !has_entries(&paths.game_dir) {
        return Err(PipelineError::Resource(format!(
            "Missing game files in {}",
            paths.game_dir.display()
        )));
    }
    let grp = find_grp(&paths.game_dir)?;
    std::fs::create_dir_all(&paths.extract_dir)
        .map_err(|e| PipelineError::io(&paths.extract_dir, e))?;

    info!(grp = %grp.display(), dest = %paths.extract_dir.display(), "extracting");
    runner
        .run(&tools.kextract, [grp.as_os_str(), paths.extract_dir.as_os_str()])
        .await?;

    if !has_entries(&paths.extract_dir) {
        return Err(PipelineError::Resource(format!(
            "{} extracted nothing into {}",
            tools.kextract,
            paths.extract_dir.display()
        )));
    }
    Ok(grp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::retry::RetryPolicy;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_find_grp_ignores_other_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("DUKE.RTS"), "").unwrap();
        std::fs::write(dir.path().join("DUKE3D.GRP"), "").unwrap();
        assert!(find_grp(dir.path()).unwrap().ends_with("DUKE3D.GRP"));
    }

    #[test]
    fn test_find_grp_none() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("DUKE.RTS"), "").unwrap();
        assert!(matches!(
            find_grp(dir.path()),
            Err(PipelineError::Resource(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_game_dir_is_resource_error() {
        let dir = tempdir().unwrap();
        let paths = PipelinePaths::new(dir.path());
        let runner = ToolRunner::new(Duration::from_secs(5), RetryPolicy::for_file());
        let err = run(&paths, &ToolsConfig::default(), &runner)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }

    #[tokio::test]
    async fn test_missing_kextract_is_permanent() {
        let dir = tempdir().unwrap();
        let paths = PipelinePaths::new(dir.path());
        std::fs::create_dir_all(&paths.game_dir).unwrap();
        std::fs::write(paths.game_dir.join("DUKE3D.GRP"), "grp").unwrap();
        let tools = ToolsConfig {
            kextract: "kextract-not-installed-0f3a".to_string(),
            ..ToolsConfig::default()
        };
        let runner = ToolRunner::new(Duration::from_secs(5), RetryPolicy::for_file());

        let err = run(&paths, &tools, &runner).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonRetryable);
    }
}
