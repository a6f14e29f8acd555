//! 프로세스 종료 신호.
//!
//! 바이너리마다 [`Lifecycle`] 하나를 두고, 장기 실행 태스크는 `subscribe()`로 받은
//! 수신기를 `select!`에 건다. 신호는 한 번 켜지면 꺼지지 않는다.

use tokio::sync::watch;
use tracing::info;

/// 종료 신호 수신기
pub type ShutdownRx = watch::Receiver<bool>;

/// 종료 신호 소유자
#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<bool>,
}

impl Lifecycle {
    /// 꺼진 상태로 시작하는 종료 신호 소유자
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// 새 수신기
    pub fn subscribe(&self) -> ShutdownRx {
        self.tx.subscribe()
    }

    /// 종료가 시작됐는지
    pub fn is_stopping(&self) -> bool {
        *self.tx.borrow()
    }

    /// 종료 신호를 켠다. 두 번째 호출부터는 무시된다.
    pub fn trigger(&self, reason: &str) {
        let first = self.tx.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });
        if first {
            info!("종료 시작: {reason}");
        }
    }

    /// OS 종료 시그널을 기다렸다가 종료 신호를 켠다.
    ///
    /// 다른 경로로 종료가 먼저 시작되면 시그널 없이 돌아온다.
    pub async fn stop_on_signal(&self) -> std::io::Result<()> {
        let mut rx = self.subscribe();
        tokio::select! {
            received = os_signal() => self.trigger(received?),
            _ = stopped(&mut rx) => {}
        }
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn os_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    Ok(tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    })
}

#[cfg(not(unix))]
async fn os_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

/// 종료 신호가 켜질 때까지 대기. 소유자가 사라지면 영원히 대기한다.
pub async fn stopped(rx: &mut ShutdownRx) {
    if rx.wait_for(|stopping| *stopping).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn trigger_reaches_every_subscriber_once() {
        let lifecycle = Lifecycle::new();
        let first = lifecycle.subscribe();
        let second = lifecycle.subscribe();
        assert!(!lifecycle.is_stopping());

        lifecycle.trigger("test");
        lifecycle.trigger("again");

        assert!(lifecycle.is_stopping());
        assert!(*first.borrow());
        assert!(*second.borrow());
    }

    #[tokio::test]
    async fn stopped_sees_earlier_trigger() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.subscribe();
        lifecycle.trigger("test");
        tokio::time::timeout(Duration::from_secs(1), stopped(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stopped_waits_forever_without_owner() {
        let mut rx = Lifecycle::new().subscribe();
        let waited = tokio::time::timeout(Duration::from_millis(50), stopped(&mut rx)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn signal_wait_ends_on_manual_trigger() {
        let lifecycle = Lifecycle::new();
        lifecycle.trigger("manual");
        tokio::time::timeout(Duration::from_secs(1), lifecycle.stop_on_signal())
            .await
            .unwrap()
            .unwrap();
    }
}
