//! Runs embedded `PostgreSQL` lifecycle steps on behalf of the integration
//! tests when they run as root.
//!
//! Usage:
//!
//! ```text
//! pg_worker <setup|start|stop> <config-path>
//! ```
//!
//! The file at `config-path` holds a `pg_embedded_setup_unpriv` worker
//! payload: the cluster settings plus environment overrides. `PostgreSQL`
//! refuses to run as root, so a root worker switches to `nobody` after
//! reading the payload and before touching the cluster.

#[cfg(unix)]
mod worker {
    use camino::Utf8Path;
    use cap_std::ambient_authority;
    use cap_std::fs_utf8::Dir;
    use nix::unistd::{Uid, User, initgroups, setgid, setuid};
    use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
    use postgresql_embedded::{PostgreSQL, Status};
    use std::ffi::CString;
    use std::fmt;
    use std::mem::ManuallyDrop;
    use std::str::FromStr;
    use thiserror::Error;

    const UNPRIVILEGED_USER: &str = "nobody";

    /// Failures reported by the worker.
    #[derive(Error)]
    pub enum WorkerError {
        #[error("invalid arguments: {0}")]
        InvalidArgs(String),
        #[error("failed to read worker config {path}: {source}")]
        ConfigRead {
            path: String,
            #[source]
            source: std::io::Error,
        },
        #[error("failed to parse worker config: {0}")]
        ConfigParse(#[from] serde_json::Error),
        #[error("invalid cluster settings: {0}")]
        Settings(String),
        #[error("failed to drop privileges: {0}")]
        PrivilegeDrop(String),
        #[error("failed to build runtime: {0}")]
        Runtime(#[source] std::io::Error),
        #[error("postgres operation failed: {0}")]
        Postgres(#[from] postgresql_embedded::Error),
    }

    // `main` prints its error with `Debug`.
    impl fmt::Debug for WorkerError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Display::fmt(self, f)
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Operation {
        Setup,
        Start,
        Stop,
    }

    impl FromStr for Operation {
        type Err = WorkerError;

        fn from_str(value: &str) -> Result<Self, Self::Err> {
            match value {
                "setup" => Ok(Self::Setup),
                "start" => Ok(Self::Start),
                "stop" => Ok(Self::Stop),
                other => Err(WorkerError::InvalidArgs(format!(
                    "unknown pg_worker operation '{other}', expected setup, start, or stop"
                ))),
            }
        }
    }

    pub fn run() -> Result<(), WorkerError> {
        let args = std::env::args_os()
            .skip(1)
            .map(|arg| {
                arg.into_string()
                    .map_err(|_| WorkerError::InvalidArgs("argument is not valid UTF-8".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let (operation, config_path) = parse_args(args)?;
        let payload = load_payload(Utf8Path::new(&config_path))?;
        drop_privileges_if_root()?;
        let settings = payload
            .settings
            .into_settings()
            .map_err(|err| WorkerError::Settings(err.to_string()))?;
        apply_environment(&payload.environment);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WorkerError::Runtime)?;
        runtime.block_on(execute(operation, PostgreSQL::new(settings)))
    }

    fn parse_args(args: Vec<String>) -> Result<(Operation, String), WorkerError> {
        let mut remaining = args.into_iter();
        let operation = remaining
            .next()
            .ok_or_else(|| WorkerError::InvalidArgs("missing operation argument".into()))?
            .parse::<Operation>()?;
        let config_path = remaining
            .next()
            .ok_or_else(|| WorkerError::InvalidArgs("missing config path argument".into()))?;
        if let Some(extra) = remaining.next() {
            return Err(WorkerError::InvalidArgs(format!(
                "unexpected extra argument: {extra}"
            )));
        }
        Ok((operation, config_path))
    }

    fn load_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
        let read_error = |source| WorkerError::ConfigRead {
            path: path.to_string(),
            source,
        };
        let file_name = path.file_name().ok_or_else(|| {
            read_error(std::io::Error::other("config path must name a file"))
        })?;
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let json = Dir::open_ambient_dir(parent, ambient_authority())
            .and_then(|dir| dir.read_to_string(file_name))
            .map_err(read_error)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn drop_privileges_if_root() -> Result<(), WorkerError> {
        if !Uid::effective().is_root() {
            return Ok(());
        }
        let privilege_error = |err: nix::Error| WorkerError::PrivilegeDrop(err.to_string());
        let user = User::from_name(UNPRIVILEGED_USER)
            .map_err(privilege_error)?
            .ok_or_else(|| {
                WorkerError::PrivilegeDrop(format!("user '{UNPRIVILEGED_USER}' not found"))
            })?;
        let user_name = CString::new(user.name.clone())
            .map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;
        initgroups(&user_name, user.gid).map_err(privilege_error)?;
        setgid(user.gid).map_err(privilege_error)?;
        setuid(user.uid).map_err(privilege_error)?;

        // SAFETY: no other threads exist yet.
        unsafe {
            std::env::set_var("HOME", &user.dir);
            std::env::set_var("USER", &user.name);
            std::env::set_var("LOGNAME", &user.name);
        }
        Ok(())
    }

    fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
        for (key, value) in environment {
            // SAFETY: no other threads exist yet.
            unsafe {
                match value {
                    Some(secret) => std::env::set_var(key, secret.expose()),
                    None => std::env::remove_var(key),
                }
            }
        }
    }

    async fn execute(operation: Operation, mut postgres: PostgreSQL) -> Result<(), WorkerError> {
        match operation {
            Operation::Setup => {
                postgres.setup().await?;
                ensure_started(&mut postgres).await?;
            }
            Operation::Start => ensure_started(&mut postgres).await?,
            Operation::Stop => return Ok(postgres.stop().await?),
        }
        // Dropping the handle would stop the server the tests are about to use.
        let _running = ManuallyDrop::new(postgres);
        Ok(())
    }

    async fn ensure_started(postgres: &mut PostgreSQL) -> Result<(), WorkerError> {
        if !matches!(postgres.status(), Status::Started) {
            postgres.start().await?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn main() -> Result<(), worker::WorkerError> {
    worker::run()
}

#[cfg(not(unix))]
fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    Err("pg_worker is only supported on Unix platforms".into())
}
