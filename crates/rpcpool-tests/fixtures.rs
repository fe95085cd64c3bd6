//! Test fixtures: a loopback RPC server and a TCP connection that talks to it
//!
//! The wire format is one JSON object per line in each direction. Requests
//! carry `method` and `args`; responses carry either `result` or `error`.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rpcpool::ChannelPool;
use rpcpool_core::{CompletionSender, PendingCall, Result, RpcConnection, RpcError, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize, Deserialize)]
struct Request {
    method: String,
    args: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Pool of connections to a [`LoopbackServer`]
pub type LoopbackPool = ChannelPool<LoopbackConnection>;

/// Method that makes the server hang up without replying
pub const DROP_CONNECTION: &str = "Conn.Drop";

/// A line-delimited JSON RPC server listening on an ephemeral loopback port
///
/// The listener thread runs for the rest of the test process.
pub struct LoopbackServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    disconnected: Arc<AtomicUsize>,
}

impl LoopbackServer {
    pub fn start() -> anyhow::Result<Self> {
        initialize_logging();

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let disconnected = Arc::new(AtomicUsize::new(0));

        {
            let accepted = Arc::clone(&accepted);
            let disconnected = Arc::clone(&disconnected);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                            let disconnected = Arc::clone(&disconnected);
                            thread::spawn(move || {
                                if let Err(e) = serve(stream) {
                                    tracing::debug!(error = %e, "loopback session ended with error");
                                }
                                disconnected.fetch_add(1, Ordering::SeqCst);
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "loopback server stopped accepting");
                            break;
                        }
                    }
                }
            });
        }

        tracing::debug!(%addr, "loopback server listening");
        Ok(Self {
            addr,
            accepted,
            disconnected,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of client connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Number of client connections that have ended
    pub fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Factory dialing this server
    pub fn factory(&self) -> impl Fn() -> Result<LoopbackConnection> + Send + Sync + use<> {
        let addr = self.addr;
        move || LoopbackConnection::dial(addr)
    }

    /// Factory that dials successfully `successes` times and then fails
    pub fn flaky_factory(
        &self,
        successes: usize,
    ) -> impl Fn() -> Result<LoopbackConnection> + Send + Sync + use<> {
        let addr = self.addr;
        let attempts = AtomicUsize::new(0);
        move || {
            if attempts.fetch_add(1, Ordering::SeqCst) >= successes {
                return Err(RpcError::Connection(format!("dial tcp {addr}: refused")));
            }
            LoopbackConnection::dial(addr)
        }
    }
}

fn serve(stream: TcpStream) -> anyhow::Result<()> {
    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    for line in reader.lines() {
        let request: Request = serde_json::from_str(&line?)?;
        if request.method == DROP_CONNECTION {
            writer.shutdown(Shutdown::Both)?;
            return Ok(());
        }

        let response = match dispatch(&request.method, request.args) {
            Ok(result) => Response {
                result: Some(result),
                error: None,
            },
            Err(error) => Response {
                result: None,
                error: Some(error),
            },
        };
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    Ok(())
}

fn dispatch(method: &str, args: Value) -> std::result::Result<Value, String> {
    match method {
        "Echo.Say" => Ok(args),
        "Arith.Add" => {
            let terms = args.as_array().ok_or("Arith.Add expects an array")?;
            let mut sum = 0i64;
            for term in terms {
                sum += term.as_i64().ok_or("Arith.Add expects integers")?;
            }
            Ok(json!(sum))
        }
        "Arith.Fail" => Err("deliberate failure".to_string()),
        other => Err(format!("rpc: can't find method {other}")),
    }
}

struct Stream {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

struct Inner {
    /// `None` once closed
    stream: Mutex<Option<Stream>>,
}

impl Inner {
    fn call(&self, method: &str, args: &Value) -> Result<Value> {
        let mut guard = self.stream.lock();
        let Some(stream) = guard.as_mut() else {
            return Err(RpcError::Connection("connection is shut down".into()));
        };

        let request = Request {
            method: method.to_string(),
            args: args.clone(),
        };
        serde_json::to_writer(&mut stream.writer, &request)?;
        stream.writer.write_all(b"\n")?;
        stream.writer.flush()?;

        let mut line = String::new();
        if stream.reader.read_line(&mut line)? == 0 {
            return Err(RpcError::Connection("connection reset by peer".into()));
        }

        let response: Response = serde_json::from_str(&line)?;
        match response.error {
            Some(error) => Err(RpcError::Call(error)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }
}

/// Client connection to a [`LoopbackServer`]
///
/// Calls on one connection are serialized. Closing twice fails, so a pool
/// that double-closes would show up as an error.
pub struct LoopbackConnection {
    inner: Arc<Inner>,
}

impl LoopbackConnection {
    pub fn dial(addr: SocketAddr) -> Result<Self> {
        let writer = TcpStream::connect(addr)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self {
            inner: Arc::new(Inner {
                stream: Mutex::new(Some(Stream { reader, writer })),
            }),
        })
    }
}

impl RpcConnection for LoopbackConnection {
    fn call(&self, method: &str, args: &Value) -> Result<Value> {
        self.inner.call(method, args)
    }

    fn call_async(&self, method: &str, args: Value, done: CompletionSender) -> PendingCall {
        let pending = PendingCall::new(method);
        let inner = Arc::clone(&self.inner);
        let call = pending.clone();
        thread::spawn(move || {
            let result = inner.call(&call.method, &args);
            call.deliver(&done, result);
        });
        pending
    }

    fn close(&self) -> Result<()> {
        let Some(stream) = self.inner.stream.lock().take() else {
            return Err(RpcError::Connection("connection is shut down".into()));
        };
        match stream.writer.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != std::io::ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.inner.stream.lock().is_none()
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Initialize logging for tests if not already initialized
///
/// This sets up tracing with appropriate filters for test output.
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rpcpool=debug,rpcpool_tests=debug"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
