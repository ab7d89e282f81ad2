use std::path::PathBuf;

/// Returns a possible path to the Tabula JAR file, assuming that the process is running as part
/// of a distribution.
pub fn tabula_jar() -> Option<PathBuf> {
    form_path("tabula.jar")
}

fn form_path(file_name: &str) -> Option<PathBuf> {
    let mut exec_path = std::env::current_exe().ok()?;
    exec_path.set_file_name(file_name);
    if !exec_path.is_file() {
        return None;
    }
    Some(exec_path)
}
