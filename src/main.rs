use std::{
    io::BufRead,
    sync::mpsc::{channel, Sender},
    thread,
};

use env_logger::Env;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use crate::core::{config::PoseMgrConfig, Command, PoseMgr};

mod core;

fn main() -> anyhow::Result<()> {
    let logger = env_logger::Builder::from_env(Env::default().default_filter_or("info")).build();
    let level = logger.filter();
    let multi = MultiProgress::new();
    LogWrapper::new(multi.clone(), logger).try_init()?;
    log::set_max_level(level);

    let config = PoseMgrConfig::load();

    let (sender, receiver) = channel();
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || read_commands(sender))?;

    log::info!("Press Enter to calibrate, q + Enter to quit.");
    let mut app = PoseMgr::new(config, &multi);
    app.run(receiver)
}

fn read_commands(sender: Sender<Command>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let command = match line.trim() {
            "" | "c" => Command::Calibrate,
            "q" => Command::Quit,
            other => {
                log::warn!("Unknown command: {}", other);
                continue;
            }
        };
        if sender.send(command).is_err() {
            break;
        }
    }
}
