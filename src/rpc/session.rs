use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rmpv::Value;

use crate::msg::Msg;
use crate::plugin::Host;
use crate::rpc::{Message, RpcError};

type Writer = Box<dyn Write + Send>;
type Reply = Result<Value, RpcError>;

/// Handle to the Neovim instance on the other end of the channel.
///
/// Cheap to clone; every clone shares the writer and the table of requests
/// still waiting for a response.
#[derive(Clone)]
pub struct Nvim {
    inner: Arc<Inner>,
}

struct Inner {
    writer: Mutex<Writer>,
    pending: Mutex<HashMap<u32, mpsc::Sender<Reply>>>,
    next_id: AtomicU32,
    // Written only while `pending` is locked.
    closed: AtomicBool,
    timeout: Duration,
}

impl Nvim {
    pub fn new(writer: impl Write + Send + 'static, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                writer: Mutex::new(Box::new(writer)),
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU32::new(1),
                closed: AtomicBool::new(false),
                timeout,
            }),
        }
    }

    /// Call `method` and block until Neovim answers or the timeout elapses.
    pub fn request(&self, method: &str, params: Vec<Value>) -> Reply {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        {
            let mut pending = self.pending();
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(RpcError::Closed);
            }
            pending.insert(id, tx);
        }

        let sent = self.send(Message::Request {
            id,
            method: method.to_string(),
            params,
        });
        if let Err(err) = sent {
            self.pending().remove(&id);
            return Err(err);
        }

        match rx.recv_timeout(self.inner.timeout) {
            Ok(reply) => reply,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.pending().remove(&id);
                tracing::warn!(id, method, "request timed out");
                Err(RpcError::Timeout {
                    method: method.to_string(),
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RpcError::Closed),
        }
    }

    pub fn notify(&self, method: &str, params: Vec<Value>) -> Result<(), RpcError> {
        self.send(Message::Notification {
            method: method.to_string(),
            params,
        })
    }

    /// Answer a request Neovim sent us.
    pub fn respond(&self, id: u32, result: Result<Value, String>) -> Result<(), RpcError> {
        let (error, result) = match result {
            Ok(value) => (Value::Nil, value),
            Err(err) => (Value::from(err), Value::Nil),
        };
        self.send(Message::Response { id, error, result })
    }

    /// Show `text` as an error message in Neovim.
    pub fn err_writeln(&self, text: &str) -> Result<(), RpcError> {
        self.notify("nvim_err_writeln", vec![Value::from(text)])
    }

    /// Hand a response to the request waiting on it.
    pub fn resolve(&self, id: u32, error: Value, result: Value) {
        let Some(waiter) = self.pending().remove(&id) else {
            tracing::warn!(id, "response for unknown request");
            return;
        };

        let reply = if error.is_nil() {
            Ok(result)
        } else {
            Err(RpcError::Remote(describe_error(&error)))
        };

        // The waiter may have timed out and gone away.
        let _ = waiter.send(reply);
    }

    /// Fail every outstanding request. Called once the channel is gone.
    /// Later requests fail immediately with `RpcError::Closed`.
    pub fn close(&self) {
        let mut pending = self.pending();
        self.inner.closed.store(true, Ordering::SeqCst);
        for (_, waiter) in pending.drain() {
            let _ = waiter.send(Err(RpcError::Closed));
        }
    }

    /// Read messages until EOF, routing responses to their waiters and
    /// forwarding everything else to the dispatch loop.
    pub fn spawn_reader<R>(&self, mut reader: R, tx: mpsc::Sender<Msg>) -> thread::JoinHandle<()>
    where
        R: Read + Send + 'static,
    {
        let nvim = self.clone();
        thread::spawn(move || {
            loop {
                let msg = match Message::read_from(&mut reader) {
                    Ok(Some(Message::Response { id, error, result })) => {
                        nvim.resolve(id, error, result);
                        continue;
                    }
                    Ok(Some(Message::Request { id, method, params })) => {
                        Msg::Request { id, method, params }
                    }
                    Ok(Some(Message::Notification { method, params })) => {
                        Msg::Notification { method, params }
                    }
                    Ok(None) => {
                        tracing::info!("rpc channel reached eof");
                        break;
                    }
                    // The whole frame was consumed; the stream is still in sync.
                    Err(RpcError::Protocol(reason)) => {
                        tracing::warn!("skipping malformed rpc message: {reason}");
                        continue;
                    }
                    Err(err) => {
                        tracing::error!("rpc read failed: {err}");
                        break;
                    }
                };

                if tx.send(msg).is_err() {
                    break;
                }
            }

            nvim.close();
            let _ = tx.send(Msg::Closed);
        })
    }

    fn send(&self, message: Message) -> Result<(), RpcError> {
        let mut writer = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        message.write_to(&mut *writer)
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<u32, mpsc::Sender<Reply>>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Host for Nvim {
    fn out_write(&self, text: &str) -> Result<(), RpcError> {
        self.request("nvim_out_write", vec![Value::from(text)])
            .map(|_| ())
    }
}

/// Neovim reports errors as `[type, message]`.
fn describe_error(error: &Value) -> String {
    error
        .as_array()
        .and_then(|parts| parts.get(1))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}
