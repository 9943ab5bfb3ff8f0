use anyhow::{Context, Result};

use super::Session;

pub fn execute(
    session: &Session,
    command: &str,
    working_dir: Option<&str>,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let gateway = session.terminal();
    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    let result = runtime.block_on(gateway.execute(command, working_dir, timeout_secs));

    if session.json {
        return session.emit(result);
    }
    match result {
        Ok(output) => {
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            if output.success {
                Ok(())
            } else {
                Err(anyhow::anyhow!("command exited with code {}", output.exit_code))
            }
        }
        Err(err) => session.emit::<()>(Err(err)),
    }
}

pub fn current_directory(session: &Session) -> Result<()> {
    let gateway = session.terminal();
    session.emit(gateway.current_directory())
}

pub fn environment(session: &Session) -> Result<()> {
    let gateway = session.terminal();
    let listing = gateway.environment();
    if session.json {
        return session.emit(Ok(listing));
    }
    for (name, value) in &listing.environment_variables {
        println!("{name}={value}");
    }
    Ok(())
}
