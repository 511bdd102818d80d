//! Transform command - run one unit through the launched pipeline

use crate::bridge::PrivilegedDefiner;
use crate::cli::args::TransformArgs;
use crate::config::ConfigManager;
use crate::dump::dump_path;
use crate::error::{WeaveError, WeaveResult};
use crate::launch::Launcher;
use crate::pipeline::Outcome;
use crate::ui;
use crate::unit::UnitName;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Defines privileged units by writing them under a directory
struct DirectoryDefiner {
    dir: PathBuf,
}

impl PrivilegedDefiner for DirectoryDefiner {
    fn define(&self, unit: &UnitName, bytes: &[u8]) -> WeaveResult<()> {
        let path = dump_path(&self.dir, &unit.transformed_name);
        let fail = |e: std::io::Error| WeaveError::PrivilegedDefine {
            unit: unit.name.clone(),
            reason: format!("{}: {}", path.display(), e),
        };
        if path.exists() {
            return Err(fail(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "already defined",
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(fail)?;
        }
        std::fs::write(&path, bytes).map_err(fail)
    }
}

/// Execute the transform command
pub async fn execute(args: TransformArgs, manager: ConfigManager) -> WeaveResult<()> {
    if !args.input.exists() {
        return Err(WeaveError::PathNotFound(args.input));
    }
    let input = fs::read(&args.input)
        .await
        .map_err(|e| WeaveError::io(format!("reading {}", args.input.display()), e))?;

    let privileged_dir = args
        .privileged_dir
        .unwrap_or_else(|| ConfigManager::state_dir().join("privileged"));
    let definer = Arc::new(DirectoryDefiner {
        dir: privileged_dir.clone(),
    });

    let launched = Launcher::new(definer)
        .with_config(manager)
        .with_disk_cache()
        .launch()
        .await?;

    let unit = match args.transformed_name {
        Some(transformed) => UnitName::with_transformed(&args.name, transformed),
        None => UnitName::new(&args.name),
    };
    debug!("Transforming {} from {}", unit, args.input.display());

    let result = launched.pipeline.transform(&unit, Some(&input));
    launched.shutdown();

    match result? {
        Outcome::Bytes(bytes) => {
            let detail = if bytes == input {
                "unchanged".to_string()
            } else {
                format!("{} -> {} bytes", input.len(), bytes.len())
            };
            match args.output {
                Some(output) => {
                    fs::write(&output, &bytes).await.map_err(|e| {
                        WeaveError::io(format!("writing {}", output.display()), e)
                    })?;
                    ui::step_ok_detail(&format!("Wrote {}", output.display()), &detail);
                }
                None => ui::step_ok_detail(&format!("Transformed {}", unit), &detail),
            }
        }
        Outcome::Consumed => {
            let path = dump_path(&privileged_dir, &unit.transformed_name);
            ui::step_ok_detail(
                &format!("Defined {} in the privileged domain", unit),
                &path.display().to_string(),
            );
        }
        Outcome::Empty => {
            ui::step_warn_hint(
                &format!("No output for {}", unit),
                "The delegate produced nothing",
            );
        }
    }

    Ok(())
}
