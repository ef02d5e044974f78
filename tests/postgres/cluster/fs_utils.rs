//! Reads cluster state written by `PostgreSQL` back into the settings.

use super::BoxError;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use postgresql_embedded::Settings;
use std::io::ErrorKind;
use std::path::Path;

/// Picks up the password the bootstrap wrote to its password file.
pub(super) fn sync_password_from_file(settings: &mut Settings) -> Result<(), BoxError> {
    let Some(contents) = read_optional(&settings.password_file)? else {
        return Ok(());
    };
    let password = contents.trim_end();
    if !password.is_empty() {
        password.clone_into(&mut settings.password);
    }
    Ok(())
}

/// Picks up the port the server actually bound, from line four of
/// `postmaster.pid`.
pub(super) fn sync_port_from_pid(settings: &mut Settings) -> Result<(), BoxError> {
    let pid_file = settings.data_dir.join("postmaster.pid");
    let Some(contents) = read_optional(&pid_file)? else {
        return Ok(());
    };
    if let Some(port) = contents
        .lines()
        .nth(3)
        .and_then(|line| line.trim().parse::<u16>().ok())
    {
        settings.port = port;
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>, BoxError> {
    let utf8 = Utf8Path::from_path(path)
        .ok_or_else(|| std::io::Error::other(format!("non UTF-8 path: {}", path.display())))?;
    let file_name = utf8
        .file_name()
        .ok_or_else(|| std::io::Error::other(format!("path must name a file: {utf8}")))?;
    let parent = utf8.parent().unwrap_or_else(|| Utf8Path::new("."));
    let read = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read_to_string(file_name));
    match read {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Box::new(err)),
    }
}
