//! Output naming and input-type checks.

use std::path::{Path, PathBuf};

/// Suffix appended to the input stem for generated files.
pub const OUTPUT_SUFFIX: &str = "_3d";

/// Extensions accepted as conversion input.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["sdf", "mol", "mdl", "smi"];

fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// True if the path's extension is one the external tool can read.
pub fn is_supported_input(path: &Path) -> bool {
    extension_lower(path).is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// True for multi-record SD files (handled by the pipeline rather than single-file mode).
pub fn is_collection(path: &Path) -> bool {
    extension_lower(path).as_deref() == Some("sdf")
}

/// Output extension: SD when several conformers are requested or the input already is SD.
pub fn output_extension(input: &Path, conformers: u32) -> &'static str {
    if conformers > 1 || is_collection(input) {
        "sdf"
    } else {
        "mdl"
    }
}

/// `<dir>/<stem>_3d.<ext>`, or the first of `<stem>_3d_1`, `<stem>_3d_2`, ... that does not exist yet.
pub fn construct_output_path(input: &Path, conformers: u32) -> PathBuf {
    let ext = output_extension(input, conformers);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = input.parent().unwrap_or(Path::new(""));
    let base = format!("{stem}{OUTPUT_SUFFIX}");

    let mut candidate = parent.join(format!("{base}.{ext}"));
    let mut cnt = 1_u32;
    while candidate.exists() {
        candidate = parent.join(format!("{base}_{cnt}.{ext}"));
        cnt += 1;
    }
    candidate
}
