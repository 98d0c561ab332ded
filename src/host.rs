// ABOUTME: Host collaborator table — file-path handling, subprocess execution, stdout

use crate::error::RumError;
use crate::value::Value;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Everything the core asks of its embedder: a stdout sink plus the file-path/subprocess
/// boundary the spec calls out as external collaborators. Path handles are represented as
/// plain `Value::String`s holding a normalized path, never a new `Value` variant.
pub trait Host {
    fn write_stdout(&self, text: &str);
    fn path_handle(&self, raw: &str) -> Result<Value, RumError>;
    fn read_path(&self, handle: &Value) -> Result<String, RumError>;
    fn import(&self, handle: &Value) -> Result<String, RumError>;
    fn exec(&self, args: &[Value]) -> Result<Value, RumError>;
}

/// Writes to real stdout; refuses everything gated behind a sandbox since none was installed.
pub struct NullHost;

impl Host for NullHost {
    fn write_stdout(&self, text: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn path_handle(&self, _raw: &str) -> Result<Value, RumError> {
        Err(RumError::host("'$' is unsupported in this build"))
    }

    fn read_path(&self, _handle: &Value) -> Result<String, RumError> {
        Err(RumError::host("'read' is unsupported in this build"))
    }

    fn import(&self, _handle: &Value) -> Result<String, RumError> {
        Err(RumError::host("'import' is unsupported in this build"))
    }

    fn exec(&self, _args: &[Value]) -> Result<Value, RumError> {
        Err(RumError::host("'@' is unsupported in this build"))
    }
}

/// A capability-directory-backed host: file paths resolve only inside a single sandboxed
/// root, opened once via `cap_std::fs::Dir::open_ambient_dir`.
pub struct CapStdHost {
    root: cap_std::fs::Dir,
}

impl CapStdHost {
    pub fn open(root: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let root = cap_std::fs::Dir::open_ambient_dir(root, cap_std::ambient_authority())?;
        Ok(Self { root })
    }
}

impl Host for CapStdHost {
    fn write_stdout(&self, text: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn path_handle(&self, raw: &str) -> Result<Value, RumError> {
        Ok(Value::String(raw.trim_start_matches('/').to_string()))
    }

    fn read_path(&self, handle: &Value) -> Result<String, RumError> {
        match handle {
            Value::String(path) => self
                .root
                .read_to_string(path)
                .map_err(|e| RumError::host(format!("cannot read '{}': {}", path, e))),
            _ => Err(RumError::host("'read' expects a path handle")),
        }
    }

    fn import(&self, handle: &Value) -> Result<String, RumError> {
        self.read_path(handle)
    }

    fn exec(&self, _args: &[Value]) -> Result<Value, RumError> {
        Err(RumError::host("'@' subprocess execution is disabled under the capability sandbox"))
    }
}

thread_local! {
    static ACTIVE_HOST: RefCell<Rc<dyn Host>> = RefCell::new(Rc::new(NullHost));
}

/// Installs the collaborator table for the remainder of this interpreter's lifetime.
pub fn install(host: Rc<dyn Host>) {
    ACTIVE_HOST.with(|h| *h.borrow_mut() = host);
}

pub fn with_host<T>(f: impl FnOnce(&dyn Host) -> T) -> T {
    ACTIVE_HOST.with(|h| f(h.borrow().as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_host_rejects_path_boundary_operations() {
        assert!(NullHost.path_handle("x").is_err());
        assert!(NullHost.read_path(&Value::String("x".to_string())).is_err());
        assert!(NullHost.exec(&[]).is_err());
    }
}
