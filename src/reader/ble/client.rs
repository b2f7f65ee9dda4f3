//! Command/status correlation over an established GATT link.
//!
//! The status characteristic is the shared mailbox: `waiting` while idle,
//! then exactly one `success` or `error:<reason>` per command. The client
//! subscribes to status events before the command goes out, waits for the
//! first non-`waiting` value, and gives up after its own timeout, which is
//! deliberately longer than the bridge's scan window.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::card::CardId;
use crate::reader::TapReading;
use crate::reader::error::ReaderError;
use crate::reader::protocol::{self, ReaderCommand, ReaderStatus};

use super::link::{GattLink, LinkConnector, LinkEvent};

/// Connection lifecycle of the one BLE session this server may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Operator-facing view of the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

enum Session {
    Disconnected,
    Connecting,
    Connected(Arc<dyn GattLink>),
}

pub struct BleReader {
    session: Arc<Mutex<Session>>,
    // Single-outstanding-operation guard. A second command while one is
    // pending fails fast instead of racing on the status mailbox.
    op: tokio::sync::Mutex<()>,
    default_timeout: Duration,
}

impl BleReader {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::Disconnected)),
            op: tokio::sync::Mutex::new(()),
            default_timeout,
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_info(&self) -> SessionInfo {
        match &*self.lock_session() {
            Session::Disconnected => SessionInfo {
                state: ConnectionState::Disconnected,
                device: None,
            },
            Session::Connecting => SessionInfo {
                state: ConnectionState::Connecting,
                device: None,
            },
            Session::Connected(link) => SessionInfo {
                state: ConnectionState::Connected,
                device: Some(link.device_name().to_owned()),
            },
        }
    }

    /// Establishes the session. A no-op returning the current device name
    /// when already connected; otherwise scans and pairs, which the caller
    /// only triggers on an explicit operator action.
    pub async fn connect(&self, connector: &dyn LinkConnector) -> Result<String, ReaderError> {
        {
            let mut session = self.lock_session();
            match &*session {
                Session::Connected(link) => return Ok(link.device_name().to_owned()),
                Session::Connecting => return Err(ReaderError::Busy),
                Session::Disconnected => *session = Session::Connecting,
            }
        }

        let link: Arc<dyn GattLink> = match connector.connect().await {
            Ok(link) => Arc::from(link),
            Err(e) => {
                *self.lock_session() = Session::Disconnected;
                return Err(e);
            }
        };
        let device = link.device_name().to_owned();
        tracing::info!(device = %device, "BLE card reader connected");

        *self.lock_session() = Session::Connected(Arc::clone(&link));
        self.watch_link(link);
        Ok(device)
    }

    /// Clears the session state as soon as the link reports a disconnect,
    /// so an idle session does not pretend to be connected until the next
    /// command fails.
    fn watch_link(&self, link: Arc<dyn GattLink>) {
        let session = Arc::clone(&self.session);
        let mut events = link.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(LinkEvent::Disconnected) | Err(RecvError::Closed) => break,
                    Ok(LinkEvent::Status(_)) | Err(RecvError::Lagged(_)) => {}
                }
            }
            let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
            if let Session::Connected(current) = &*guard {
                if Arc::ptr_eq(current, &link) {
                    tracing::info!("BLE card reader disconnected");
                    *guard = Session::Disconnected;
                }
            }
        });
    }

    /// Severs the session. Calling while already disconnected is a no-op.
    pub async fn disconnect(&self) {
        let link = {
            let mut session = self.lock_session();
            match mem::replace(&mut *session, Session::Disconnected) {
                Session::Connected(link) => Some(link),
                _ => None,
            }
        };
        if let Some(link) = link {
            link.close().await;
        }
    }

    pub async fn read(&self, timeout_secs: Option<u64>) -> Result<TapReading, ReaderError> {
        let payload = self.execute(ReaderCommand::Read, timeout_secs).await?;
        match payload {
            Some(text) if !text.is_empty() => {
                let card = CardId::new(text).map_err(|e| ReaderError::Payload(e.to_string()))?;
                Ok(TapReading::Card(card))
            }
            _ => Ok(TapReading::Blank),
        }
    }

    pub async fn write(&self, card: &CardId, timeout_secs: Option<u64>) -> Result<(), ReaderError> {
        self.execute(ReaderCommand::Write(card.clone()), timeout_secs)
            .await
            .map(|_| ())
    }

    pub async fn format(&self, timeout_secs: Option<u64>) -> Result<(), ReaderError> {
        self.execute(ReaderCommand::Format, timeout_secs)
            .await
            .map(|_| ())
    }

    /// Runs one command through the correlation protocol. Returns the data
    /// characteristic payload for READ, `None` otherwise.
    async fn execute(
        &self,
        command: ReaderCommand,
        timeout_secs: Option<u64>,
    ) -> Result<Option<String>, ReaderError> {
        let _guard = self.op.try_lock().map_err(|_| ReaderError::Busy)?;
        let link = match &*self.lock_session() {
            Session::Connected(link) => Arc::clone(link),
            _ => return Err(ReaderError::NotConnected),
        };
        let timeout = timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        // Subscribe before the command goes out; a fast bridge can answer
        // before a late listener would attach. The receiver is dropped on
        // every exit path below, releasing the subscription.
        let mut events = link.events();
        tracing::debug!(command = command.label(), "sending BLE reader command");
        link.write_command(command.encode().as_bytes()).await?;

        let deadline = Instant::now() + timeout;
        loop {
            let event = match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => return Err(ReaderError::Timeout),
                Ok(Err(RecvError::Closed)) => return Err(ReaderError::ConnectionLost),
                Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Ok(event)) => event,
            };
            match event {
                LinkEvent::Disconnected => return Err(ReaderError::ConnectionLost),
                LinkEvent::Status(raw) => {
                    let text = protocol::decode_payload(&raw);
                    match ReaderStatus::parse(&text)? {
                        // Idle sentinel, keep waiting for the outcome.
                        ReaderStatus::Waiting => continue,
                        status => {
                            status.into_outcome()?;
                            break;
                        }
                    }
                }
            }
        }

        match command {
            ReaderCommand::Read => {
                let data = link.read_data().await?;
                Ok(Some(protocol::decode_payload(&data)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use super::*;

    struct MockLink {
        events: broadcast::Sender<LinkEvent>,
        // Events emitted in response to each successive command write.
        replies: StdMutex<VecDeque<Vec<LinkEvent>>>,
        data: StdMutex<Vec<u8>>,
        commands: StdMutex<Vec<String>>,
    }

    impl MockLink {
        fn new(replies: Vec<Vec<LinkEvent>>) -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                events,
                replies: StdMutex::new(replies.into()),
                data: StdMutex::new(Vec::new()),
                commands: StdMutex::new(Vec::new()),
            })
        }

        fn set_data(&self, data: &[u8]) {
            *self.data.lock().unwrap() = data.to_vec();
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }

        fn subscriber_count(&self) -> usize {
            self.events.receiver_count()
        }
    }

    struct SharedLink(Arc<MockLink>);

    #[async_trait]
    impl GattLink for SharedLink {
        fn device_name(&self) -> &str {
            "HOS-Reader"
        }

        fn events(&self) -> broadcast::Receiver<LinkEvent> {
            self.0.events.subscribe()
        }

        async fn write_command(&self, payload: &[u8]) -> Result<(), ReaderError> {
            self.0
                .commands
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(payload).into_owned());
            if let Some(reply) = self.0.replies.lock().unwrap().pop_front() {
                for event in reply {
                    let _ = self.0.events.send(event);
                }
            }
            Ok(())
        }

        async fn read_data(&self) -> Result<Vec<u8>, ReaderError> {
            Ok(self.0.data.lock().unwrap().clone())
        }

        async fn close(&self) {}
    }

    struct MockConnector {
        link: Arc<MockLink>,
        calls: AtomicUsize,
    }

    impl MockConnector {
        fn new(link: Arc<MockLink>) -> Self {
            Self {
                link,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LinkConnector for MockConnector {
        async fn connect(&self) -> Result<Box<dyn GattLink>, ReaderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(SharedLink(Arc::clone(&self.link))))
        }
    }

    fn status(raw: &[u8]) -> LinkEvent {
        LinkEvent::Status(raw.to_vec())
    }

    async fn connected_reader(link: &Arc<MockLink>) -> BleReader {
        let reader = BleReader::new(Duration::from_millis(100));
        let connector = MockConnector::new(Arc::clone(link));
        reader.connect(&connector).await.unwrap();
        reader
    }

    #[tokio::test]
    async fn read_returns_card_from_data_characteristic() {
        let link = MockLink::new(vec![vec![status(b"success\0\0")]]);
        link.set_data(b"A1B2C3D4E5F6A7B8\0\0\0");
        let reader = connected_reader(&link).await;

        let reading = reader.read(None).await.unwrap();
        assert_eq!(
            reading,
            TapReading::Card(CardId::new("A1B2C3D4E5F6A7B8").unwrap())
        );
        assert_eq!(link.commands(), vec!["READ"]);
    }

    #[tokio::test]
    async fn read_with_empty_data_is_a_blank_card_not_an_error() {
        let link = MockLink::new(vec![vec![status(b"success")]]);
        link.set_data(b"\0\0\0\0");
        let reader = connected_reader(&link).await;

        assert_eq!(reader.read(None).await.unwrap(), TapReading::Blank);
    }

    #[tokio::test]
    async fn waiting_sentinel_is_skipped_until_the_outcome_arrives() {
        let link = MockLink::new(vec![vec![
            status(b"waiting"),
            status(b"waiting"),
            status(b"success"),
        ]]);
        link.set_data(b"FFFFFFFFFFFFFFFF");
        let reader = connected_reader(&link).await;

        let reading = reader.read(None).await.unwrap();
        assert_eq!(
            reading,
            TapReading::Card(CardId::new("FFFFFFFFFFFFFFFF").unwrap())
        );
    }

    #[tokio::test]
    async fn device_scan_timeout_reports_no_card() {
        let link = MockLink::new(vec![vec![status(b"error:timeout")]]);
        let reader = connected_reader(&link).await;

        assert!(matches!(
            reader.read(None).await,
            Err(ReaderError::NoCard)
        ));
    }

    #[tokio::test]
    async fn device_failure_reason_is_surfaced() {
        let link = MockLink::new(vec![vec![status(b"error:write-failed")]]);
        let reader = connected_reader(&link).await;
        let card = CardId::new("A1B2C3D4E5F6A7B8").unwrap();

        let err = reader.write(&card, None).await.unwrap_err();
        assert!(matches!(err, ReaderError::Device(r) if r == "write-failed"));
        assert_eq!(link.commands(), vec!["WRITE:A1B2C3D4E5F6A7B8"]);
    }

    #[tokio::test]
    async fn unexpected_status_is_a_protocol_error() {
        let link = MockLink::new(vec![vec![status(b"BUSY")]]);
        let reader = connected_reader(&link).await;

        let err = reader.read(None).await.unwrap_err();
        assert!(matches!(err, ReaderError::UnexpectedStatus(s) if s == "BUSY"));
    }

    #[tokio::test]
    async fn silent_bridge_times_out_and_releases_the_subscription() {
        // No reply scripted: the status never leaves "waiting".
        let link = MockLink::new(vec![vec![]]);
        let reader = connected_reader(&link).await;
        let baseline = link.subscriber_count();

        let err = reader.read(None).await.unwrap_err();
        // Client-side timeout, not the device-reported one.
        assert!(matches!(err, ReaderError::Timeout));
        assert_eq!(link.subscriber_count(), baseline);
    }

    #[tokio::test]
    async fn subscription_is_released_after_success_too() {
        let link = MockLink::new(vec![vec![status(b"success")]]);
        let reader = connected_reader(&link).await;
        let baseline = link.subscriber_count();

        reader.format(None).await.unwrap();
        assert_eq!(link.subscriber_count(), baseline);
        assert_eq!(link.commands(), vec!["FORMAT"]);
    }

    #[tokio::test]
    async fn disconnect_mid_operation_rejects_promptly() {
        let link = MockLink::new(vec![vec![LinkEvent::Disconnected]]);
        let reader = connected_reader(&link).await;

        let started = std::time::Instant::now();
        let err = reader.read(Some(35)).await.unwrap_err();
        assert!(matches!(err, ReaderError::ConnectionLost));
        // Rejected on the disconnect event, not after the 35 s window.
        assert!(started.elapsed() < Duration::from_secs(1));

        // The watcher clears the session as well.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            reader.session_info().state,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn second_operation_while_one_is_pending_fails_fast() {
        let link = MockLink::new(vec![vec![]]);
        let reader = Arc::new(connected_reader(&link).await);

        let pending = {
            let reader = Arc::clone(&reader);
            tokio::spawn(async move { reader.read(None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(
            reader.format(None).await,
            Err(ReaderError::Busy)
        ));
        assert!(matches!(
            pending.await.unwrap(),
            Err(ReaderError::Timeout)
        ));
    }

    #[tokio::test]
    async fn operations_require_an_established_session() {
        let reader = BleReader::new(Duration::from_millis(100));
        assert!(matches!(
            reader.read(None).await,
            Err(ReaderError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let link = MockLink::new(vec![]);
        let reader = connected_reader(&link).await;

        reader.disconnect().await;
        assert_eq!(reader.session_info().state, ConnectionState::Disconnected);
        // Second call is a no-op.
        reader.disconnect().await;
        assert_eq!(reader.session_info().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_while_connected_reuses_the_session() {
        let link = MockLink::new(vec![]);
        let reader = BleReader::new(Duration::from_millis(100));
        let connector = MockConnector::new(Arc::clone(&link));

        let first = reader.connect(&connector).await.unwrap();
        let second = reader.connect(&connector).await.unwrap();
        assert_eq!(first, "HOS-Reader");
        assert_eq!(second, "HOS-Reader");
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remote_disconnect_clears_an_idle_session() {
        let link = MockLink::new(vec![]);
        let reader = connected_reader(&link).await;
        assert_eq!(reader.session_info().state, ConnectionState::Connected);

        let _ = link.events.send(LinkEvent::Disconnected);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(reader.session_info().state, ConnectionState::Disconnected);
    }
}
