use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::LevelFilter;
use signal_hook::consts::{SIGINT, SIGTERM};
use thread_priority::{
    RealtimeThreadSchedulePolicy, ScheduleParams, ThreadBuilder, ThreadPriority, ThreadSchedulePolicy
};

use hover::config::HoverParameters;
use hover::control_loop::ControlLoop;
use hover::feed::{FeedBoard, FeedListener};
use hover::flight_link::MultiWii;
use hover::log::Logger;
use hover::timer::SleepTimer;

fn main() -> ExitCode {
    let mut log_sink = Logger::init(LevelFilter::Info);

    let result = start().and_then(|(controller, feed, stop)| {
        while !controller.is_finished() {
            log_sink.handle_logs();
            thread::sleep(Duration::from_millis(10));
        }
        let status = controller.join().map_err(|_| anyhow::anyhow!("Control thread panicked"))?;
        stop.store(true, Ordering::Relaxed);
        let feed_status = feed.join().map_err(|_| anyhow::anyhow!("Feed thread panicked"))?;
        status.and(feed_status)
    });

    if let Err(e) = &result {
        log::error!("{:#}", e);
    }
    log_sink.handle_logs();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

type Handles = (thread::JoinHandle<Result<()>>, thread::JoinHandle<Result<()>>, Arc<AtomicBool>);

fn start() -> Result<Handles> {
    let params = HoverParameters::load()?;
    log::info!("Parameters:\n{}", params.dump()?);
    let config = params.control_config().context("Invalid hover parameters")?;

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, stop.clone()).context("Registering signal handler")?;
    }

    let link = MultiWii::open(&params.serial_device)?;

    let board = Arc::new(FeedBoard::new());
    let feed_addr: SocketAddr = params.feed_addr.parse().context("Parsing feed address")?;
    let mut listener = FeedListener::bind(feed_addr, board.clone())?;
    let feed = {
        let stop = stop.clone();
        thread::Builder::new()
            .name("feed".into())
            .spawn(move || {
                let status = listener.run(&stop);
                // without a feed the control loop would starve, stop it as well
                stop.store(true, Ordering::Relaxed);
                status
            })
            .context("Spawning feed thread")?
    };

    let timer = SleepTimer::new(config.period);
    let mut control = ControlLoop::new(config, board, link, timer, stop.clone())?;
    let controller = ThreadBuilder::default()
        .name("controller")
        .policy(ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo))
        .priority(ThreadPriority::from_posix(ScheduleParams {
            sched_priority: 40,
        }))
        .spawn_careless(move || control.run())
        .context("Spawning control thread")?;

    Ok((controller, feed, stop))
}
