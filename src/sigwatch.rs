//! `sigwatch`: report the signals this process receives until it is interrupted.
use crate::{
    common::Error,
    log::{dev_info, user_error, user_info},
    manager::SignalManager,
    system::{
        interface::ProcessId,
        signal::{consts::*, signal_name, SignalInfo, SignalNumber},
    },
};

/// Signals that are reported and otherwise ignored.
const WATCHED: &[SignalNumber] = &[SIGHUP, SIGUSR1, SIGUSR2, SIGWINCH];

/// Signals that end the watch.
const TERMINATING: &[SignalNumber] = &[SIGINT, SIGTERM];

fn report(signal: SignalNumber, info: &SignalInfo) {
    if info.is_user_signaled() {
        user_info!(
            "received {} from process {} (uid {})",
            signal_name(signal),
            info.pid(),
            info.uid()
        );
    } else {
        user_info!("received {} (code {})", signal_name(signal), info.code());
    }
}

fn watch_process() -> Result<(), Error> {
    crate::log::DispatchLogger::new("sigwatch: ").into_global_logger();

    dev_info!("development logs are enabled");

    let manager = SignalManager::new()?;

    for &signal in WATCHED {
        manager.try_set_handler(signal, report)?;
    }

    for &signal in TERMINATING {
        let stop = manager.stop_handle();
        manager.try_set_handler(signal, move |signal, info| {
            report(signal, info);
            stop.stop();
        })?;
    }

    user_info!("watching signals as process {}", ProcessId::current());
    manager.signals_processing();

    if manager.dropped_signals() > 0 {
        user_info!("{} signals were lost", manager.dropped_signals());
    }

    Ok(())
}

pub fn main() {
    match watch_process() {
        Ok(()) => (),
        Err(error) => {
            user_error!("{error}");
            std::process::exit(1);
        }
    }
}
