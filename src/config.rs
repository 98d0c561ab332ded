// ABOUTME: Version/banner constants and RISP_LIB prelude loading

use crate::env::Environment;
use crate::eval;
use crate::reader;
use std::path::PathBuf;
use std::rc::Rc;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "RumLisp";
pub const WELCOME_SUBTITLE: &str = "Type :exit to quit, :help for a quick reference.";

pub const PRELUDE_FILENAME: &str = "prelude.risp";
pub const RISP_LIB_VAR: &str = "RISP_LIB";

/// Reads `$RISP_LIB/prelude.risp` and evaluates it into `env`, before any user code runs.
/// A missing `RISP_LIB` is a non-fatal warning, not an error — the interpreter still starts.
pub fn load_prelude(env: &Rc<Environment>) {
    let dir = match std::env::var(RISP_LIB_VAR) {
        Ok(dir) => dir,
        Err(_) => {
            eprintln!("warning: {} is not set; skipping prelude", RISP_LIB_VAR);
            return;
        }
    };
    let path = PathBuf::from(dir).join(PRELUDE_FILENAME);
    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("warning: cannot read {}: {}", path.display(), e);
            return;
        }
    };
    match reader::read_program(&source) {
        Ok(exprs) => {
            for expr in &exprs {
                if let Err(e) = eval::eval(expr, env) {
                    eprintln!("warning: error evaluating prelude: {}", e.render());
                    break;
                }
            }
        }
        Err(e) => eprintln!("warning: cannot parse prelude: {}", e.render()),
    }
}
