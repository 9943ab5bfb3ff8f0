use anyhow::{bail, Result};

use reporting::human::{render_command_decision, render_path_decision};
use reporting::json::render_json;

use super::Session;

pub fn check_path(session: &Session, path: &str, entry: bool) -> Result<()> {
    let decision = if entry {
        session.gatekeeper.authorize_path_entry(path)
    } else {
        session.gatekeeper.authorize_path(path)
    };
    if session.json {
        println!("{}", render_json(&decision));
    } else {
        println!(
            "{}",
            render_path_decision(&decision, session.context.home_dir.as_deref())
        );
    }
    if !decision.allowed {
        bail!("path is not allowed");
    }
    Ok(())
}

pub fn check_command(session: &Session, command: &str) -> Result<()> {
    let decision = session.gatekeeper.authorize_command(command);
    if session.json {
        println!("{}", render_json(&decision));
    } else {
        println!("{}", render_command_decision(&decision));
    }
    if decision.blocked {
        bail!("command is blocked");
    }
    Ok(())
}

pub fn roots(session: &Session) -> Result<()> {
    for root in session.gatekeeper.roots().roots() {
        println!("{:<10} {}", root.kind, root.path.display());
    }
    Ok(())
}
