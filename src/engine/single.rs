//! Single-file mode: one external run per input file, no pipeline.

use log::debug;
use std::path::{Path, PathBuf};

use crate::engine::converter::Converter;
use crate::engine::naming::{construct_output_path, is_supported_input};
use crate::error::ConversionError;
use crate::pipeline::CancelToken;

/// Convert `input` to `output` (derived from the input name when None). Returns the written path.
pub fn convert_file<C: Converter + ?Sized>(
    input: &Path,
    output: Option<&Path>,
    conformers: u32,
    converter: &C,
    cancel: &CancelToken,
) -> Result<PathBuf, ConversionError> {
    if output == Some(input) {
        return Err(ConversionError::InvalidArgument(format!(
            "output must differ from input ({})",
            input.display()
        )));
    }
    if !is_supported_input(input) {
        return Err(ConversionError::InvalidArgument(format!(
            "{} is not a supported input type",
            input.display()
        )));
    }
    if !input.is_file() {
        return Err(ConversionError::Io(format!("{} does not exist", input.display())));
    }
    let output = match output {
        Some(p) => p.to_path_buf(),
        None => construct_output_path(input, conformers),
    };
    debug!("{} -> {}", input.display(), output.display());
    converter.convert(input, &output, conformers, cancel)?;
    debug!("wrote {}", output.display());
    Ok(output)
}

/// Convert each input in turn with derived output names. Stops at the first failure.
pub fn convert_files<C: Converter + ?Sized>(
    inputs: &[PathBuf],
    conformers: u32,
    converter: &C,
    cancel: &CancelToken,
) -> Result<Vec<PathBuf>, ConversionError> {
    let mut outputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        if cancel.is_cancelled() {
            break;
        }
        outputs.push(convert_file(input, None, conformers, converter, cancel)?);
    }
    Ok(outputs)
}
