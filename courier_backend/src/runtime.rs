use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::chat::{ChatCore, CoreRequest, PushOutcome};
use crate::keys::KeyEvent;
use crate::navigator::{Navigator, Screen};

/// The display collaborator. Receives a fresh frame after anything that may
/// have changed what the operator sees.
pub trait OperatorSurface: Send + 'static {
    fn present(&mut self, screen: &Screen);
}

/// Surface for running without a display; frames only go to the log.
pub struct HeadlessSurface;

impl OperatorSurface for HeadlessSurface {
    fn present(&mut self, screen: &Screen) {
        tracing::trace!("Screen: {} (unread: {})", screen.page.title(), screen.unread);
    }
}

/// The one cooperative loop. Owns the [`ChatCore`] and feeds it HTTP
/// requests, key events and push timer ticks, one at a time.
pub struct EventLoop<S> {
    core: ChatCore,
    navigator: Navigator,
    requests: flume::Receiver<CoreRequest>,
    keys: Option<flume::Receiver<KeyEvent>>,
    surface: S,
    poll_interval: Duration,
}

impl<S: OperatorSurface> EventLoop<S> {
    pub fn new(
        core: ChatCore,
        requests: flume::Receiver<CoreRequest>,
        surface: S,
        poll_interval: Duration,
    ) -> Self {
        Self {
            core,
            navigator: Navigator::new(),
            requests,
            keys: None,
            surface,
            poll_interval,
        }
    }

    pub fn with_keys(mut self, keys: flume::Receiver<KeyEvent>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn core(&self) -> &ChatCore {
        &self.core
    }

    /// Run until `shutdown` resolves (normal exit) or the server task ends
    /// (always an error).
    pub async fn run<F>(mut self, mut server: JoinHandle<Result<()>>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        self.present();
        loop {
            tokio::select! {
                request = self.requests.recv_async() => {
                    let Ok(request) = request else {
                        return Err(anyhow!("request channel closed"));
                    };
                    self.core.handle(request);
                    self.present();
                }
                key = next_key(&self.keys) => match key {
                    Some(key) => {
                        self.navigator.handle_key(key, &mut self.core);
                        self.present();
                    }
                    None => {
                        tracing::info!("Operator input closed; continuing without keyboard");
                        self.keys = None;
                    }
                },
                _ = ticker.tick() => {
                    if self.core.tick_push(Instant::now()) != PushOutcome::Idle {
                        self.present();
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down");
                    return Ok(());
                }
                joined = &mut server => {
                    return match joined {
                        Ok(Ok(())) => Err(anyhow!("server stopped unexpectedly")),
                        Ok(Err(e)) => Err(e.context("server failed")),
                        Err(e) => Err(anyhow!("server task aborted: {}", e)),
                    };
                }
            }
        }
    }

    fn present(&mut self) {
        let screen = self.navigator.screen(&self.core);
        self.surface.present(&screen);
    }
}

async fn next_key(keys: &Option<flume::Receiver<KeyEvent>>) -> Option<KeyEvent> {
    match keys {
        Some(rx) => rx.recv_async().await.ok(),
        None => std::future::pending().await,
    }
}

/// Run the loop on its own task and release the storage namespace however it
/// ends, including a panic inside the loop.
pub async fn run_with_release<S, F>(
    event_loop: EventLoop<S>,
    server: JoinHandle<Result<()>>,
    shutdown: F,
) -> Result<()>
where
    S: OperatorSurface,
    F: Future<Output = ()> + Send + 'static,
{
    let namespace = event_loop.core().namespace().clone();
    let outcome = match tokio::spawn(event_loop.run(server, shutdown)).await {
        Ok(result) => result,
        Err(e) => Err(anyhow!("event loop crashed: {}", e)),
    };
    if let Err(e) = &outcome {
        tracing::error!("Event loop failed: {:#}", e);
    }
    if let Err(e) = namespace.release() {
        tracing::warn!("Failed to release storage namespace: {}", e);
    }
    outcome
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CourierConfig;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSurface {
        frames: Arc<Mutex<Vec<Screen>>>,
    }

    impl OperatorSurface for RecordingSurface {
        fn present(&mut self, screen: &Screen) {
            self.frames.lock().unwrap().push(screen.clone());
        }
    }

    fn open_core(dir: &tempfile::TempDir) -> ChatCore {
        let config = CourierConfig {
            data_dir: dir.path().to_string_lossy().into_owned(),
            push_interval_ms: 20,
            ..CourierConfig::default()
        };
        ChatCore::open(&config).unwrap()
    }

    fn idle_server() -> JoinHandle<Result<()>> {
        tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn keys_drive_navigator_and_frames_are_presented() {
        let dir = tempfile::tempdir().unwrap();
        let (_req_tx, req_rx) = flume::unbounded();
        let (key_tx, key_rx) = flume::unbounded();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let surface = RecordingSurface::default();
        let frames = surface.frames.clone();

        let event_loop = EventLoop::new(open_core(&dir), req_rx, surface, Duration::from_millis(5))
            .with_keys(key_rx);
        let handle = tokio::spawn(event_loop.run(idle_server(), async {
            let _ = stop_rx.await;
        }));

        key_tx.send(KeyEvent::Char('2')).unwrap();
        key_tx.send(KeyEvent::Char('h')).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        let frames = frames.lock().unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last.page.title(), "Writing to: another");
        assert!(frames.len() >= 3);
    }

    #[tokio::test]
    async fn server_exit_is_an_error_and_namespace_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let (_req_tx, req_rx) = flume::unbounded();
        let event_loop =
            EventLoop::new(open_core(&dir), req_rx, HeadlessSurface, Duration::from_millis(5));
        let failing = tokio::spawn(async { Err::<(), _>(anyhow!("bind lost")) });

        let err = run_with_release(event_loop, failing, std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("bind lost"));
    }

    #[tokio::test]
    async fn closed_keyboard_does_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (req_tx, req_rx) = flume::unbounded();
        let (key_tx, key_rx) = flume::unbounded::<KeyEvent>();
        drop(key_tx);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let event_loop =
            EventLoop::new(open_core(&dir), req_rx, HeadlessSurface, Duration::from_millis(5))
                .with_keys(key_rx);
        let handle = tokio::spawn(event_loop.run(idle_server(), async {
            let _ = stop_rx.await;
        }));

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        req_tx
            .send_async(CoreRequest::ReceiveMessage {
                username: "alice".to_string(),
                body: "still here".to_string(),
                reply: reply_tx,
            })
            .await
            .unwrap();
        let msg = reply_rx.await.unwrap().unwrap();
        assert_eq!(msg.body, "still here");

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn staged_message_reaches_attached_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (req_tx, req_rx) = flume::unbounded();
        let (key_tx, key_rx) = flume::unbounded();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let event_loop =
            EventLoop::new(open_core(&dir), req_rx, HeadlessSurface, Duration::from_millis(5))
                .with_keys(key_rx);
        let handle = tokio::spawn(event_loop.run(idle_server(), async {
            let _ = stop_rx.await;
        }));

        let (push_tx, push_rx) = flume::unbounded();
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        req_tx
            .send_async(CoreRequest::AttachChannel {
                outbound: push_tx,
                reply: reply_tx,
            })
            .await
            .unwrap();
        reply_rx.await.unwrap();

        for key in [
            KeyEvent::Char('2'),
            KeyEvent::Char('y'),
            KeyEvent::Char('o'),
            KeyEvent::SendCombo,
        ] {
            key_tx.send(key).unwrap();
        }

        let payload = tokio::time::timeout(Duration::from_secs(2), push_rx.recv_async())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["data"], "yo");
        assert_eq!(value["to"], 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(push_rx.try_recv().is_err());

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
