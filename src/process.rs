//! External process collaborator
//!
//! All communication with the running deployment goes through synchronous,
//! blocking subprocess calls: the deployment-control tool itself and
//! management commands executed inside running services. A non-zero exit
//! aborts the current operation with the captured output attached. There is
//! no timeout; a hung subprocess hangs the whole operation.

use std::process::Command;

use tracing::{debug, info};

use crate::error::SetupError;

const COMPOSE: &str = "docker-compose";
const SEARCH_CONTAINER_FILTER: &str = "name=docker-setup_search";

/// Run a command and return its combined stdout/stderr, failing on a
/// non-zero exit status.
pub fn run(program: &str, args: &[&str]) -> Result<String, SetupError> {
    debug!(program, ?args, "Running external command");
    let output = Command::new(program).args(args).output()?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(SetupError::ExternalCommandFailure {
            command: format!("{program} {}", args.join(" ")),
            status: output.status.code().unwrap_or(-1),
            output: text,
        });
    }
    Ok(text)
}

pub fn compose(args: &[&str]) -> Result<String, SetupError> {
    run(COMPOSE, args)
}

/// Delete a collection's search index from inside its running admin service.
pub fn remove_index(collection: &str) -> Result<String, SetupError> {
    info!(collection, "Removing search index");
    let service = format!("snoop--{collection}");
    compose(&[
        "run",
        "--rm",
        &service,
        "./manage.py",
        "deletecollection",
        collection,
    ])
}

/// Export a collection's index to a tar archive inside the exports volume.
pub fn export_index(collection: &str, archive: &str) -> Result<String, SetupError> {
    info!(collection, archive, "Exporting search index");
    let service = format!("snoop--{collection}");
    compose(&["run", "--rm", &service, "./manage.py", "exportindex", archive])
}

/// Import a previously exported index under a new collection's service.
pub fn import_index(
    old_index: &str,
    collection: &str,
    archive: &str,
) -> Result<String, SetupError> {
    info!(collection, archive, "Importing search index");
    let service = format!("snoop--{collection}");
    compose(&[
        "run",
        "--rm",
        &service,
        "./manage.py",
        "importindex",
        "-i",
        old_index,
        archive,
    ])
}

/// Drop a collection's index from the search side.
pub fn remove_search_index(collection: &str) -> Result<String, SetupError> {
    info!(collection, "Removing index from search");
    compose(&[
        "run",
        "--rm",
        "search",
        "./manage.py",
        "removeindex",
        collection,
    ])
}

/// Rename a collection on the search side.
pub fn rename_search_collection(old: &str, new: &str) -> Result<String, SetupError> {
    info!(old, new, "Renaming collection in search");
    compose(&[
        "run",
        "--rm",
        "search",
        "./manage.py",
        "renamecollection",
        old,
        new,
    ])
}

/// Stop the stack if the search service is currently up.
pub fn ensure_stack_stopped() -> Result<(), SetupError> {
    let out = run("docker", &["ps", "--filter", SEARCH_CONTAINER_FILTER])?;
    if out.contains("docker-setup_search") {
        info!("Stopping the deployment stack");
        compose(&["down"])?;
    }
    Ok(())
}

/// Start the stack and wait for the search service (and optionally one
/// collection's service) when it is not already running.
pub fn ensure_stack_running(collection: Option<&str>) -> Result<(), SetupError> {
    let out = run("docker", &["ps", "--filter", SEARCH_CONTAINER_FILTER])?;
    if !out.contains("docker-setup_search") {
        info!("Starting the deployment stack");
        compose(&["up", "-d"])?;
        compose(&["run", "--rm", "search", "/wait"])?;
        if let Some(collection) = collection {
            let service = format!("snoop--{collection}");
            compose(&["run", "--rm", &service, "/wait"])?;
        }
    }
    Ok(())
}
