use std::fs::{self, File};
use std::io::Write;
use std::process;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rdev::{listen, Event};

use crate::capture::{CaptureEngine, CaptureUpdate, InputEvent};
use crate::config::{
    ensure_config_dir, get_pid_file_path, is_daemon_running, CaptureConfig,
};
use crate::emoji::EmojiIndex;
use crate::engine::ExpansionService;
use crate::error::{Result, TagletError};
use crate::keyboard::translate_event;
use crate::models::Namespace;
use crate::replace::{EnigoSink, KeystrokeSink};
use crate::store::TagStore;
use crate::suggest::SuggestionList;

/// Depth of the keystroke queue between the OS hook and the capture
/// loop. Typing cannot realistically outrun this.
pub const EVENT_QUEUE_DEPTH: usize = 256;

/// Latest published suggestion state, shared between the suggestion
/// worker and the UI layer. Queries carry a generation stamp; the
/// worker publishes a result only while its stamp is still current, so
/// results for a superseded prefix are discarded instead of displayed.
#[derive(Debug, Default)]
pub struct SuggestionBoard {
    submitted: u64,
    current: Option<PublishedSuggestions>,
}

#[derive(Debug)]
pub struct PublishedSuggestions {
    pub generation: u64,
    pub buffer: String,
    pub list: SuggestionList,
}

impl SuggestionBoard {
    /// Stamp a new query; anything in flight becomes stale.
    pub fn next_generation(&mut self) -> u64 {
        self.submitted += 1;
        self.submitted
    }

    pub fn clear(&mut self) {
        self.submitted += 1;
        self.current = None;
    }

    /// Publish results for `generation`; stale results are dropped.
    pub fn publish(&mut self, generation: u64, buffer: String, list: SuggestionList) -> bool {
        if generation != self.submitted {
            debug!("discarding stale suggestions for {:?}", buffer);
            return false;
        }
        self.current = Some(PublishedSuggestions {
            generation,
            buffer,
            list,
        });
        true
    }

    pub fn current(&self) -> Option<&PublishedSuggestions> {
        self.current.as_ref()
    }
}

/// Spawn the background worker that answers prefix queries off the
/// keystroke path.
pub fn spawn_suggestion_worker<S>(
    service: Arc<ExpansionService<S>>,
    queries: Receiver<(u64, String)>,
    board: Arc<Mutex<SuggestionBoard>>,
) -> JoinHandle<()>
where
    S: KeystrokeSink + Send + 'static,
{
    thread::spawn(move || {
        for (generation, buffer) in queries {
            let suggestions = service.suggest(&buffer);
            if let Ok(mut board) = board.lock() {
                board.publish(generation, buffer, SuggestionList::new(suggestions));
            }
        }
    })
}

/// Single-consumer capture loop: the only writer of capture state.
/// Runs until the event channel closes. Suggestion queries are
/// fire-and-forget; replacement runs inline so it fully completes
/// before the next capture session can begin.
pub fn run_capture_loop<S: KeystrokeSink>(
    events: Receiver<InputEvent>,
    mut engine: CaptureEngine,
    service: &ExpansionService<S>,
    queries: SyncSender<(u64, String)>,
    board: &Arc<Mutex<SuggestionBoard>>,
) {
    let suggestions_enabled = engine.config().suggestions_enabled;

    for event in events {
        match engine.feed(event) {
            CaptureUpdate::NotCapturing => {}
            CaptureUpdate::Capturing { buffer } => {
                if suggestions_enabled {
                    let generation = match board.lock() {
                        Ok(mut board) => board.next_generation(),
                        Err(_) => continue,
                    };
                    // Fire-and-forget; a full queue only delays the
                    // popup, never the keystroke path.
                    if queries.try_send((generation, buffer)).is_err() {
                        debug!("suggestion queue full; skipping query");
                    }
                }
            }
            CaptureUpdate::Aborted => {
                if let Ok(mut board) = board.lock() {
                    board.clear();
                }
            }
            CaptureUpdate::Completed(outcome) => {
                if let Ok(mut board) = board.lock() {
                    board.clear();
                }
                match service.handle_completion(&outcome) {
                    Ok(true) => info!("expanded tag {:?} (x{})", outcome.tag, outcome.repeat),
                    Ok(false) => {}
                    Err(e) => warn!("replacement failed for {:?}: {}", outcome.tag, e),
                }
                engine.reset();
            }
        }
    }
}

/// Build the production service: one store per namespace, the built-in
/// emoji catalog, and enigo as the synthetic-input sink.
pub fn build_service() -> Result<Arc<ExpansionService<EnigoSink>>> {
    let texts = Arc::new(RwLock::new(TagStore::open(Namespace::CustomText)));
    let images = Arc::new(RwLock::new(TagStore::open(Namespace::Image)));
    let emoji = Arc::new(EmojiIndex::with_builtin());
    Ok(Arc::new(ExpansionService::new(
        texts,
        images,
        emoji,
        EnigoSink,
    )))
}

/// Start the daemon process
pub fn start_daemon() -> Result<()> {
    if let Some(pid) = is_daemon_running()? {
        return Err(TagletError::DaemonAlreadyRunning(pid));
    }

    ensure_config_dir()?;

    #[cfg(unix)]
    {
        use daemonize::Daemonize;
        println!("Starting taglet daemon in the background");

        let daemonize = Daemonize::new()
            .pid_file(get_pid_file_path())
            .chown_pid_file(true)
            .working_directory("/tmp")
            .stdout(File::create("/dev/null")?)
            .stderr(File::create("/dev/null")?);

        match daemonize.start() {
            Ok(_) => run_daemon_worker(),
            Err(e) => Err(TagletError::Other(format!("Error starting daemon: {}", e))),
        }
    }

    #[cfg(not(unix))]
    {
        println!("Starting taglet daemon in the foreground (background not supported on this OS)");
        run_daemon_worker()
    }
}

/// The daemon worker: wires the OS keyboard hook into the capture loop
/// and blocks for the lifetime of the process.
pub fn run_daemon_worker() -> Result<()> {
    let pid_file = get_pid_file_path();
    let mut file = File::create(&pid_file)?;
    write!(file, "{}", process::id())?;

    let config = CaptureConfig::load();
    let service = build_service()?;
    let engine = CaptureEngine::new(config);

    let (event_tx, event_rx) = sync_channel::<InputEvent>(EVENT_QUEUE_DEPTH);
    let (query_tx, query_rx) = sync_channel::<(u64, String)>(EVENT_QUEUE_DEPTH);
    let board = Arc::new(Mutex::new(SuggestionBoard::default()));

    let worker = spawn_suggestion_worker(Arc::clone(&service), query_rx, Arc::clone(&board));

    let loop_service = Arc::clone(&service);
    let loop_board = Arc::clone(&board);
    let capture_thread = thread::spawn(move || {
        run_capture_loop(event_rx, engine, &loop_service, query_tx, &loop_board);
    });

    info!("taglet daemon listening (pid {})", process::id());

    // The OS hook callback must never block: a full queue drops the
    // event with a warning rather than stalling keystroke delivery.
    let callback = move |event: Event| {
        if let Some(input) = translate_event(&event) {
            if event_tx.try_send(input).is_err() {
                warn!("keystroke queue full; dropping event");
            }
        }
    };

    let mut retry_count = 0;
    let max_retries = 5;
    while retry_count < max_retries {
        match listen(callback.clone()) {
            Ok(_) => break,
            Err(e) => {
                error!("keyboard listener error: {:?}", e);
                retry_count += 1;
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
    if retry_count >= max_retries {
        error!("failed to start keyboard listener after {} attempts", max_retries);
    }

    // Dropping the callback closes the event channel, which winds down
    // the capture loop and, through it, the suggestion worker.
    drop(callback);
    let _ = capture_thread.join();
    let _ = worker.join();
    let _ = fs::remove_file(&pid_file);
    Ok(())
}

/// Stop a running daemon by PID
pub fn stop_daemon() -> Result<()> {
    let Some(pid) = is_daemon_running()? else {
        return Err(TagletError::DaemonNotRunning);
    };

    #[cfg(unix)]
    {
        use std::process::Command;
        let status = Command::new("kill").arg(pid.to_string()).status()?;
        if !status.success() {
            return Err(TagletError::Other(format!(
                "Failed to stop daemon with PID {}",
                pid
            )));
        }
    }

    #[cfg(not(unix))]
    {
        return Err(TagletError::Other(format!(
            "Stop the process with PID {} manually on this platform",
            pid
        )));
    }

    let _ = fs::remove_file(get_pid_file_path());
    println!("Stopped taglet daemon (PID {})", pid);
    Ok(())
}

/// Print daemon status
pub fn daemon_status() -> Result<()> {
    match is_daemon_running()? {
        Some(pid) => println!("taglet daemon is running with PID {}", pid),
        None => println!("taglet daemon is not running"),
    }
    Ok(())
}
