use std::{error::Error, io::Write, path::Path};

use tracing::info;

/// Destination of generated output.
pub trait Emit {
    fn emit(&self, path: &Path, payload: &str) -> Result<(), Box<dyn Error>>;
}

/// Writes payloads to disk, creating missing parent directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileEmitter;

impl Emit for FileEmitter {
    fn emit(&self, path: &Path, payload: &str) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, payload)?;
        info!("wrote {}", path.display());
        Ok(())
    }
}

/// Writes payloads to standard output, ignoring the path.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutEmitter;

impl Emit for StdoutEmitter {
    fn emit(&self, _: &Path, payload: &str) -> Result<(), Box<dyn Error>> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(payload.as_bytes())?;
        if !payload.ends_with('\n') {
            writeln!(stdout)?;
        }
        Ok(())
    }
}
