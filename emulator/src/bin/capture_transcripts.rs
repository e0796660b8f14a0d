use std::io;
use std::path::Path;

#[path = "../command.rs"]
mod command;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::Session;

const TRANSCRIPT_DIR: &str = "transcripts";

fn main() -> io::Result<()> {
    record("scheduled-sleep", &[
        "status",
        "send SLEEPTIME 2min:0",
        "send reboot: System halted",
        "status",
        "wait 1min",
        "wait 1min",
        "status",
    ])?;
    record("fallback-wake", &[
        "send reboot: System halted",
        "status",
        "tick 40",
        "status",
        "press",
        "log",
    ])?;
    record("button-shutdown", &[
        "press",
        "wait 5s",
        "raw reboot: Sys",
        "raw tem halted",
        "status",
    ])?;
    Ok(())
}

fn record(name: &str, script: &[&str]) -> io::Result<()> {
    let path = Path::new(TRANSCRIPT_DIR).join(format!("{name}.log"));
    let mut session = Session::new(Some(&path))?;
    session.drain_startup()?;
    for line in script {
        session.handle_command(line)?;
    }
    println!("wrote {}", path.display());
    Ok(())
}
