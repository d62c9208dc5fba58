//! Worker contexts and the JSON message protocol
//!
//! A [`WorkerPool`] runs requests on a small number of OS threads. Each
//! context owns an [`AIEngine`], so transposition tables are never shared.
//! Jobs wait on one shared queue; a request that finds every context busy
//! starts another one, up to the pool limit.
//!
//! # Example
//!
//! ```
//! use fractal::config::EngineConfig;
//! use fractal::worker::{Request, Response, WorkerPool};
//!
//! let pool = WorkerPool::new(EngineConfig { tt_size_mb: 1, ..Default::default() });
//! let request: Request = serde_json::from_str(r#"{"kind":"benchmark","boardDepth":2,"timeMs":20}"#).unwrap();
//! match pool.request(request).unwrap() {
//!     Response::Benchmark(report) => assert!(report.nodes_visited > 0),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use log::{debug, error};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::{run_ai_benchmark, AIEngine, BenchmarkReport, SearchRequest};
use crate::error::{EngineError, EngineResult};

/// Incoming message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Request {
    Search(SearchRequest),
    /// Flush every context's transposition table
    Clear,
    Benchmark {
        #[serde(rename = "boardDepth")]
        board_depth: usize,
        #[serde(rename = "timeMs")]
        time_ms: u64,
    },
}

/// Outgoing message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
    Result {
        #[serde(rename = "move")]
        mv: Vec<u8>,
        score: i32,
        #[serde(rename = "nodesVisited")]
        nodes_visited: u64,
        #[serde(rename = "depthReached")]
        depth_reached: u8,
    },
    Cleared,
    Benchmark(BenchmarkReport),
    Error {
        message: String,
    },
}

impl Response {
    /// Reply used when a search could not produce anything
    pub fn empty_result() -> Self {
        Response::Result {
            mv: Vec::new(),
            score: 0,
            nodes_visited: 0,
            depth_reached: 0,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}

/// Decode one protocol line
pub fn parse_request(line: &str) -> EngineResult<Request> {
    Ok(serde_json::from_str(line)?)
}

struct Job {
    request: Request,
    reply: Sender<Response>,
}

enum Control {
    Clear(Sender<()>),
}

struct Context {
    control: Sender<Control>,
    handle: JoinHandle<()>,
}

/// Pool of worker contexts, each owning its own engine
pub struct WorkerPool {
    jobs: Sender<Job>,
    queue: Receiver<Job>,
    contexts: Mutex<Vec<Context>>,
    idle: Arc<AtomicUsize>,
    /// Jobs queued but not yet picked up by a context
    pending: Arc<AtomicUsize>,
    config: EngineConfig,
}

impl WorkerPool {
    /// Create an empty pool; contexts start on demand
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let (jobs, queue) = unbounded();
        Self {
            jobs,
            queue,
            contexts: Mutex::new(Vec::new()),
            idle: Arc::new(AtomicUsize::new(0)),
            pending: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Number of running contexts
    pub fn size(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Queue a request; the reply arrives on the returned channel.
    pub fn submit(&self, request: Request) -> Receiver<Response> {
        let (reply, rx) = bounded(1);
        self.submit_to(request, reply);
        rx
    }

    /// Queue a request whose reply goes to `reply`.
    ///
    /// Several requests may share one reply channel; replies then arrive in
    /// completion order.
    pub fn submit_to(&self, request: Request, reply: Sender<Response>) {
        if matches!(request, Request::Clear) {
            let cleared = self.clear();
            debug!("cleared {} contexts", cleared);
            let _ = reply.send(Response::Cleared);
            return;
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.jobs.send(Job { request, reply }).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            error!("job queue closed");
            return;
        }
        self.ensure_context();
    }

    /// Submit and wait for the reply
    pub fn request(&self, request: Request) -> EngineResult<Response> {
        self.submit(request)
            .recv()
            .map_err(|_| EngineError::WorkerUnavailable)
    }

    /// Clear every context's transposition table and wait for each to
    /// acknowledge. Busy contexts acknowledge after their current job.
    pub fn clear(&self) -> usize {
        let contexts = self.contexts.lock();
        let acks: Vec<Receiver<()>> = contexts
            .iter()
            .filter_map(|ctx| {
                let (tx, rx) = bounded(1);
                ctx.control.send(Control::Clear(tx)).ok().map(|_| rx)
            })
            .collect();
        drop(contexts);

        acks.iter().filter(|rx| rx.recv().is_ok()).count()
    }

    fn ensure_context(&self) {
        let mut contexts = self.contexts.lock();
        let limit = self.config.pool_size.max(1);
        if contexts.len() >= limit {
            return;
        }
        // a context marks itself busy before it releases its claim on a job,
        // so reading `pending` first never undercounts the backlog
        let pending = self.pending.load(Ordering::Acquire);
        let idle = self.idle.load(Ordering::Acquire);
        if pending <= idle {
            return;
        }

        let (control, control_rx) = unbounded();
        let counters = Counters {
            idle: Arc::clone(&self.idle),
            pending: Arc::clone(&self.pending),
        };
        let queue = self.queue.clone();
        let config = self.config;
        let id = contexts.len();

        counters.idle.fetch_add(1, Ordering::AcqRel);
        let handle = thread::spawn(move || run_context(id, config, queue, control_rx, counters));
        debug!("started worker context {}", id);
        contexts.push(Context { control, handle });
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let contexts = std::mem::take(&mut *self.contexts.lock());
        // closing the control channel ends the context loop
        let handles: Vec<JoinHandle<()>> = contexts
            .into_iter()
            .map(|Context { control, handle }| {
                drop(control);
                handle
            })
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("worker context panicked during shutdown");
            }
        }
    }
}

/// Load counters shared between the pool and its contexts
struct Counters {
    idle: Arc<AtomicUsize>,
    pending: Arc<AtomicUsize>,
}

fn run_context(id: usize, config: EngineConfig, queue: Receiver<Job>, control: Receiver<Control>, counters: Counters) {
    let mut engine = AIEngine::with_config(config);

    loop {
        select! {
            recv(control) -> msg => match msg {
                Ok(Control::Clear(ack)) => {
                    engine.clear_cache();
                    let _ = ack.send(());
                }
                Err(_) => break,
            },
            recv(queue) -> job => match job {
                Ok(Job { request, reply }) => {
                    counters.idle.fetch_sub(1, Ordering::AcqRel);
                    counters.pending.fetch_sub(1, Ordering::AcqRel);
                    let response = serve(&mut engine, request);
                    counters.idle.fetch_add(1, Ordering::AcqRel);
                    let _ = reply.send(response);
                }
                Err(_) => break,
            },
        }
    }
    debug!("worker context {} stopped", id);
}

/// Run one request, turning panics into a safe reply
fn serve(engine: &mut AIEngine, request: Request) -> Response {
    let is_search = matches!(request, Request::Search(_));
    let outcome = catch_unwind(AssertUnwindSafe(|| match request {
        Request::Search(req) => {
            let result = engine.think(&req);
            Response::Result {
                mv: result.best_move,
                score: result.score,
                nodes_visited: result.nodes,
                depth_reached: result.depth,
            }
        }
        Request::Clear => {
            engine.clear_cache();
            Response::Cleared
        }
        Request::Benchmark { board_depth, time_ms } => match run_ai_benchmark(board_depth, time_ms) {
            Ok(report) => Response::Benchmark(report),
            Err(e) => Response::error(e.to_string()),
        },
    }));

    outcome.unwrap_or_else(|_| {
        error!("request panicked");
        if is_search {
            Response::empty_result()
        } else {
            Response::error("internal error")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{is_legal_path, TreeNode};
    use crate::board::Player;
    use crate::config::SearchConfig;

    fn small_pool() -> WorkerPool {
        WorkerPool::new(EngineConfig {
            tt_size_mb: 1,
            ..Default::default()
        })
    }

    fn search_request(time_ms: u64) -> (TreeNode, Request) {
        let mut board = TreeNode::empty(2);
        board.play(&[4, 4], Player::X).unwrap();
        let request = Request::Search(SearchRequest {
            board: board.clone(),
            player: Player::O,
            constraint: vec![4],
            config: SearchConfig {
                max_time_ms: time_ms,
                max_search_depth: 4,
                board_depth: 2,
            },
        });
        (board, request)
    }

    #[test]
    fn test_parse_requests() {
        let req = parse_request(r#"{"kind":"clear"}"#).unwrap();
        assert_eq!(req, Request::Clear);

        let req = parse_request(r#"{"kind":"benchmark","boardDepth":3,"timeMs":500}"#).unwrap();
        assert_eq!(req, Request::Benchmark { board_depth: 3, time_ms: 500 });

        let req = parse_request(
            r#"{"kind":"search","board":{"value":"empty"},"player":"x","constraint":[],"config":{"maxTimeMs":10,"maxSearchDepth":2,"boardDepth":2}}"#,
        )
        .unwrap();
        match req {
            Request::Search(s) => {
                assert_eq!(s.player, Player::X);
                assert_eq!(s.config.max_search_depth, 2);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(parse_request("{\"kind\":\"nope\"}"), Err(EngineError::Protocol(_))));
        assert!(parse_request("not json").is_err());
    }

    #[test]
    fn test_response_json() {
        let json = serde_json::to_string(&Response::Result {
            mv: vec![4, 0],
            score: -12,
            nodes_visited: 99,
            depth_reached: 3,
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"result","move":[4,0],"score":-12,"nodesVisited":99,"depthReached":3}"#);

        assert_eq!(serde_json::to_string(&Response::Cleared).unwrap(), r#"{"kind":"cleared"}"#);

        let json = serde_json::to_string(&Response::Benchmark(BenchmarkReport {
            nodes_visited: 10,
            nodes_per_second: 1000,
            elapsed_ms: 10,
            depth_reached: 2,
        }))
        .unwrap();
        assert!(json.starts_with(r#"{"kind":"benchmark","nodesVisited":10"#));

        let json = serde_json::to_string(&Response::error("bad")).unwrap();
        assert_eq!(json, r#"{"kind":"error","message":"bad"}"#);
    }

    #[test]
    fn test_pool_serves_search() {
        let pool = small_pool();
        let (board, request) = search_request(200);
        match pool.request(request).unwrap() {
            Response::Result { mv, nodes_visited, .. } => {
                assert!(is_legal_path(&board, &[4], &mv, 2));
                assert!(nodes_visited > 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_pool_never_exceeds_limit() {
        let pool = small_pool();
        let receivers: Vec<_> = (0..5).map(|_| pool.submit(search_request(100).1)).collect();
        assert!(pool.size() <= 2);
        for rx in receivers {
            assert!(matches!(rx.recv().unwrap(), Response::Result { .. }));
        }
        assert!(pool.size() <= 2);
    }

    #[test]
    fn test_burst_starts_second_context() {
        let pool = small_pool();
        let long_search = || {
            Request::Search(SearchRequest {
                board: TreeNode::empty(3),
                player: Player::X,
                constraint: vec![],
                config: SearchConfig {
                    max_time_ms: 500,
                    max_search_depth: 16,
                    board_depth: 3,
                },
            })
        };

        let first = pool.submit(long_search());
        let second = pool.submit(long_search());
        // the first context is still busy, so the second request starts another
        assert_eq!(pool.size(), 2);

        assert!(matches!(first.recv().unwrap(), Response::Result { .. }));
        assert!(matches!(second.recv().unwrap(), Response::Result { .. }));
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_shared_reply_channel() {
        let pool = small_pool();
        let (tx, rx) = unbounded();
        pool.submit_to(search_request(50).1, tx.clone());
        pool.submit_to(Request::Benchmark { board_depth: 2, time_ms: 20 }, tx.clone());
        pool.submit_to(Request::Clear, tx);

        let replies: Vec<Response> = rx.iter().collect();
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().any(|r| matches!(r, Response::Result { .. })));
        assert!(replies.iter().any(|r| matches!(r, Response::Benchmark(_))));
        assert!(replies.contains(&Response::Cleared));
    }

    #[test]
    fn test_pool_clear_broadcast() {
        let pool = small_pool();
        let _ = pool.request(search_request(50).1).unwrap();
        assert_eq!(pool.request(Request::Clear).unwrap(), Response::Cleared);
        assert_eq!(pool.clear(), pool.size());
    }

    #[test]
    fn test_bad_search_gives_empty_result() {
        let pool = small_pool();
        let request = Request::Search(SearchRequest {
            board: TreeNode::empty(2),
            player: Player::X,
            constraint: vec![],
            config: SearchConfig {
                board_depth: 4,
                ..Default::default()
            },
        });
        assert_eq!(pool.request(request).unwrap(), Response::empty_result());
    }

    #[test]
    fn test_benchmark_error_reply() {
        let pool = small_pool();
        let reply = pool.request(Request::Benchmark { board_depth: 9, time_ms: 10 }).unwrap();
        assert!(matches!(reply, Response::Error { .. }));
    }

    #[test]
    fn test_drop_joins_contexts() {
        let pool = small_pool();
        let _ = pool.request(search_request(20).1).unwrap();
        drop(pool);
    }
}
