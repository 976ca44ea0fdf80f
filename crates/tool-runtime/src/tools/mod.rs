pub mod execute_code;
pub mod frame;
pub mod list_files;
pub mod load_data;
pub mod log_experiment;
pub mod save_text;
pub mod summarize_data;

pub use execute_code::ExecuteCodeTool;
pub use list_files::ListFilesTool;
pub use load_data::LoadDataTool;
pub use log_experiment::LogExperimentTool;
pub use save_text::SaveTextTool;
pub use summarize_data::SummarizeDataTool;

use std::path::{Path, PathBuf};

/// Absolute paths are kept; relative ones resolve against `base`.
pub(crate) fn resolve(base: &Path, requested: &str) -> PathBuf {
    let candidate = Path::new(requested);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}
