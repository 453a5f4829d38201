use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use catalogd_listener::Listener;
use catalogd_notify::NotifySink;
use catalogd_types::State;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::change::{Change, NodeMeta};
use crate::error::{Result, WatchError};
use crate::source::CatalogSource;

/// How long the coalescer waits for the catalog to go quiet before
/// dispatching a snapshot to listeners. A single deploy touches many
/// services in quick succession; this window absorbs that burst into one
/// dispatch instead of one per change.
pub const QUIESCENCE_WINDOW: Duration = Duration::from_secs(5);

/// Bound on the change channel, sized well above any plausible burst so a
/// slow coalescer never forces a watch task to block mid-poll.
const CHANGE_CHANNEL_CAPACITY: usize = 1000;

enum Control {
    NodeDiscovered(String, Option<FirstTickWatch>),
    NodeGone(String),
}

/// Shared countdown letting the nodes-watch task's first tick wait for every
/// services-watch it spawned during that same tick to deliver its own first
/// change, before the nodes-watch decrements the outer initial-sync counter.
#[derive(Clone)]
struct FirstTickWatch {
    remaining: Arc<AtomicUsize>,
    done: Arc<Notify>,
}

/// Runs the watch/coalesce/dispatch engine until `cancel` fires or a fatal
/// error occurs.
///
/// Opens the nodes watch and one KV watch per distinct prefix any listener
/// declared, fans a per-node services watch out as nodes are discovered,
/// and feeds every change into a coalescer that dispatches an isolated
/// snapshot to each listener once the catalog has settled. Any watch or
/// listener error cancels the whole group: listeners must never observe a
/// catalog that is only partially mirrored.
pub async fn watch(
    source: Arc<dyn CatalogSource>,
    listeners: Vec<Arc<dyn Listener>>,
    notify: Arc<dyn NotifySink>,
    cancel: CancellationToken,
) -> Result<()> {
    let self_node = source.agent_self().await?;
    let state = State::new(self_node);

    let kv_prefixes: BTreeSet<String> = listeners
        .iter()
        .flat_map(|l| l.kv_prefixes().iter().cloned())
        .collect();

    let (change_tx, change_rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();

    // Only the statically-known watches gate readiness; per-node service
    // watches are discovered dynamically and don't hold up the first
    // dispatch, unlike the node-count barrier the catalog's own agent uses.
    let init_remaining = Arc::new(AtomicUsize::new(1 + kv_prefixes.len()));
    let init_done = Arc::new(Notify::new());
    let fatal: Arc<Mutex<Option<WatchError>>> = Arc::new(Mutex::new(None));

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    tasks.spawn(watch_nodes_task(
        source.clone(),
        change_tx.clone(),
        control_tx.clone(),
        cancel.clone(),
        init_remaining.clone(),
        init_done.clone(),
    ));

    for prefix in &kv_prefixes {
        tasks.spawn(watch_kv_task(
            source.clone(),
            prefix.clone(),
            change_tx.clone(),
            cancel.clone(),
            init_remaining.clone(),
            init_done.clone(),
        ));
    }

    tasks.spawn(coalesce_task(
        state,
        change_rx,
        listeners,
        notify,
        cancel.clone(),
        init_done,
        fatal.clone(),
    ));

    let mut node_tasks: HashMap<String, CancellationToken> = HashMap::new();

    let outcome: Result<()> = loop {
        tokio::select! {
            () = cancel.cancelled() => break Ok(()),
            control = control_rx.recv() => {
                match control {
                    Some(Control::NodeDiscovered(name, first_tick)) => {
                        if let std::collections::hash_map::Entry::Vacant(entry) = node_tasks.entry(name.clone()) {
                            let child = cancel.child_token();
                            entry.insert(child.clone());
                            tasks.spawn(watch_services_task(
                                source.clone(),
                                name,
                                change_tx.clone(),
                                child,
                                first_tick,
                            ));
                        }
                    }
                    Some(Control::NodeGone(name)) => {
                        if let Some(token) = node_tasks.remove(&name) {
                            token.cancel();
                        }
                        let _ = change_tx.send(Change::NodeRemoved(name)).await;
                    }
                    None => {}
                }
            }
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(err))) => {
                        error!(error = %err, "watch task failed, cancelling group");
                        *fatal.lock().await = Some(err);
                        cancel.cancel();
                    }
                    Some(Err(join_err)) => {
                        warn!(error = %join_err, "watch task panicked, cancelling group");
                        cancel.cancel();
                    }
                    None => break Ok(()),
                }
            }
        }
    };

    drop(change_tx);
    drop(control_tx);
    cancel.cancel();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Err(err)) = result {
            let mut fatal = fatal.lock().await;
            if fatal.is_none() {
                *fatal = Some(err);
            }
        }
    }

    outcome?;
    match fatal.lock().await.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn watch_nodes_task(
    source: Arc<dyn CatalogSource>,
    change_tx: mpsc::Sender<Change>,
    control_tx: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    init_remaining: Arc<AtomicUsize>,
    init_done: Arc<Notify>,
) -> Result<()> {
    let mut index = 0u64;
    let mut known: BTreeSet<String> = BTreeSet::new();
    let mut first = true;

    loop {
        let poll = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            poll = source.watch_nodes(index) => poll?,
        };

        if poll.index == index && !first {
            continue;
        }
        index = poll.index;

        let listing = poll.value;
        let fresh: BTreeSet<String> = listing.iter().map(|n| n.name.clone()).collect();

        let new_names: Vec<String> = fresh.difference(&known).cloned().collect();

        // On the first tick, every services-watch spawned below must deliver
        // its own first change before this task decrements the outer
        // initial-sync counter; a barrier with no waiter spawned never
        // notifies, so only build one when there's at least one new node.
        let first_tick_barrier = if first && !new_names.is_empty() {
            Some(FirstTickWatch {
                remaining: Arc::new(AtomicUsize::new(new_names.len())),
                done: Arc::new(Notify::new()),
            })
        } else {
            None
        };

        for name in &new_names {
            let _ = control_tx.send(Control::NodeDiscovered(name.clone(), first_tick_barrier.clone()));
        }
        for name in known.difference(&fresh) {
            let _ = control_tx.send(Control::NodeGone(name.clone()));
        }
        known = fresh;

        let metas = listing
            .into_iter()
            .map(|n| NodeMeta {
                id: n.id,
                name: n.name,
                address: n.address,
                meta: n.meta,
            })
            .collect();

        if change_tx.send(Change::NodesUpdated(metas)).await.is_err() {
            return Ok(());
        }

        if first {
            first = false;
            if let Some(barrier) = first_tick_barrier {
                tokio::select! {
                    () = cancel.cancelled() => return Ok(()),
                    () = barrier.done.notified() => {}
                }
            }
            if init_remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                init_done.notify_one();
            }
        }
    }
}

async fn watch_kv_task(
    source: Arc<dyn CatalogSource>,
    prefix: String,
    change_tx: mpsc::Sender<Change>,
    cancel: CancellationToken,
    init_remaining: Arc<AtomicUsize>,
    init_done: Arc<Notify>,
) -> Result<()> {
    let mut index = 0u64;
    let mut first = true;

    loop {
        let poll = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            poll = source.watch_kv(&prefix, index) => poll?,
        };

        if poll.index == index && !first {
            continue;
        }
        index = poll.index;

        let mut entries = std::collections::BTreeMap::new();
        for entry in poll.value {
            if let Some(relative) = entry.key.strip_prefix(&format!("{prefix}/")) {
                entries.insert(relative.to_string(), entry.value);
            } else if entry.key == prefix {
                entries.insert(String::new(), entry.value);
            }
        }

        let change = Change::KvUpdated {
            prefix: prefix.clone(),
            entries,
        };
        if change_tx.send(change).await.is_err() {
            return Ok(());
        }

        if first {
            first = false;
            if init_remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                init_done.notify_one();
            }
        }
    }
}

async fn watch_services_task(
    source: Arc<dyn CatalogSource>,
    node: String,
    change_tx: mpsc::Sender<Change>,
    cancel: CancellationToken,
    first_tick: Option<FirstTickWatch>,
) -> Result<()> {
    let mut index = 0u64;
    let mut first = true;

    loop {
        let poll = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            poll = source.watch_node_services(&node, index) => poll?,
        };

        if poll.index == index && !first {
            continue;
        }
        index = poll.index;

        let change = Change::ServicesUpdated {
            node: node.clone(),
            services: poll.value,
        };
        if change_tx.send(change).await.is_err() {
            return Ok(());
        }

        if first {
            first = false;
            if let Some(barrier) = &first_tick {
                if barrier.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    barrier.done.notify_one();
                }
            }
        }
    }
}

/// Applies every change as it arrives, then dispatches the accumulated
/// snapshot to every listener once `QUIESCENCE_WINDOW` has passed without a
/// further change. Every change starts a fresh timer, so a burst keeps
/// pushing the deadline out rather than firing on the first change's
/// schedule; the generation counter lets a stale timer recognize it's been
/// superseded and skip its fire instead of dispatching an out-of-date
/// snapshot.
async fn coalesce_task(
    mut state: State,
    mut change_rx: mpsc::Receiver<Change>,
    listeners: Vec<Arc<dyn Listener>>,
    notify: Arc<dyn NotifySink>,
    cancel: CancellationToken,
    init_done: Arc<Notify>,
    fatal: Arc<Mutex<Option<WatchError>>>,
) -> Result<()> {
    init_done.notified().await;
    notify.ready().await;

    let generation = Arc::new(AtomicU64::new(0));
    let prev: Arc<Mutex<Option<State>>> = Arc::new(Mutex::new(None));
    let (fire_tx, mut fire_rx) = mpsc::unbounded_channel::<u64>();

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            change = change_rx.recv() => {
                match change {
                    Some(change) => {
                        change.apply(&mut state);
                        let generation_id = generation.fetch_add(1, Ordering::SeqCst) + 1;
                        let fire_tx = fire_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(QUIESCENCE_WINDOW).await;
                            let _ = fire_tx.send(generation_id);
                        });
                    }
                    None => return Ok(()),
                }
            }
            fired = fire_rx.recv() => {
                let Some(fired_gen) = fired else { continue };
                if fired_gen != generation.load(Ordering::SeqCst) {
                    // a newer change arrived mid-sleep; its own timer is
                    // already scheduled and will dispatch once it fires
                    continue;
                }

                let mut prev_guard = prev.lock().await;
                if prev_guard.as_ref() == Some(&state) {
                    continue;
                }

                debug!(generation = fired_gen, "catalog settled, dispatching snapshot");
                for listener in &listeners {
                    if let Err(err) = listener.notify(&state).await {
                        let err = WatchError::Listener {
                            listener: listener.name().to_string(),
                            source: err,
                        };
                        *fatal.lock().await = Some(err);
                        cancel.cancel();
                        return Ok(());
                    }
                }
                *prev_guard = Some(state.clone());
            }
        }
    }
}
