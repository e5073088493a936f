//! Dispatch layer: projects decoded messages into data records and
//! invokes per-variant observers, plus `DroneLink`, the crate's
//! top-level facade over the packet manager (§4.5, §4.6).

use crate::channel::ByteChannel;
use crate::config::ManagerConfig;
use crate::message::{records::*, ConfigRequestData, GpsData, Header, LocEstData, Message, PingData};
use crate::reliable::{AckTimeoutObserver, PacketManager};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque handle returned by `register_*`, passed back to `unregister_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

fn next_observer_id() -> ObserverId {
    ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
}

pub type ObserverFn<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Entry<T> {
    id: ObserverId,
    once: bool,
    callback: ObserverFn<T>,
}

/// Ordered, mutex-guarded list of `(observer, once)` pairs for one
/// message variant (§4.5).
struct ObserverList<T> {
    entries: Mutex<Vec<Entry<T>>>,
}

impl<T: Clone> ObserverList<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, once: bool, callback: ObserverFn<T>) -> ObserverId {
        let id = next_observer_id();
        self.entries.lock().unwrap().push(Entry {
            id,
            once,
            callback,
        });
        id
    }

    fn unregister(&self, id: ObserverId) {
        self.entries.lock().unwrap().retain(|e| e.id != id);
    }

    /// Snapshots the list under lock, invokes every observer outside
    /// the lock, then removes the one-shot observers that just ran.
    fn dispatch(&self, record: T) {
        let snapshot: Vec<(ObserverId, bool, ObserverFn<T>)> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.id, e.once, e.callback.clone()))
            .collect();

        let mut fired_once = Vec::new();
        for (id, once, callback) in snapshot {
            let record = record.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(record);
            }));
            if result.is_err() {
                log::error!("observer panicked while handling a dispatched record");
            }
            if once {
                fired_once.push(id);
            }
        }

        if !fired_once.is_empty() {
            self.entries
                .lock()
                .unwrap()
                .retain(|e| !fired_once.contains(&e.id));
        }
    }
}

/// Holds one observer list per non-Ack variant and routes decoded
/// messages into the matching list (§4.5).
struct Dispatch {
    sync_request: ObserverList<SyncRequestRecord>,
    sync_response: ObserverList<SyncResponseRecord>,
    config_request: ObserverList<ConfigRequestRecord>,
    config_response: ObserverList<ConfigResponseRecord>,
    gps: ObserverList<GpsRecord>,
    ping: ObserverList<PingRecord>,
    loc_est: ObserverList<LocEstRecord>,
    start_request: ObserverList<StartRequestRecord>,
    start_response: ObserverList<StartResponseRecord>,
    stop_request: ObserverList<StopRequestRecord>,
    stop_response: ObserverList<StopResponseRecord>,
    error: ObserverList<ErrorRecord>,
}

impl Dispatch {
    fn new() -> Self {
        Self {
            sync_request: ObserverList::new(),
            sync_response: ObserverList::new(),
            config_request: ObserverList::new(),
            config_response: ObserverList::new(),
            gps: ObserverList::new(),
            ping: ObserverList::new(),
            loc_est: ObserverList::new(),
            start_request: ObserverList::new(),
            start_response: ObserverList::new(),
            stop_request: ObserverList::new(),
            stop_response: ObserverList::new(),
            error: ObserverList::new(),
        }
    }

    /// Projects a decoded message into its data record and dispatches
    /// it. Acks never reach here (the packet manager consumes them);
    /// an unrecognized variant is logged at debug and dropped.
    fn handle(&self, message: Message) {
        match message {
            Message::SyncRequest { header } => self.sync_request.dispatch(SyncRequestRecord {
                packet_id: header.packet_id,
                timestamp: header.timestamp,
            }),
            Message::SyncResponse { header, success } => {
                self.sync_response.dispatch(SyncResponseRecord {
                    success,
                    packet_id: header.packet_id,
                    timestamp: header.timestamp,
                })
            }
            Message::ConfigRequest { header, body } => {
                self.config_request.dispatch(ConfigRequestRecord {
                    data: body,
                    packet_id: header.packet_id,
                    timestamp: header.timestamp,
                })
            }
            Message::ConfigResponse { header, success } => {
                self.config_response.dispatch(ConfigResponseRecord {
                    success,
                    packet_id: header.packet_id,
                    timestamp: header.timestamp,
                })
            }
            Message::GPS { header, body } => self.gps.dispatch(GpsRecord {
                data: body,
                packet_id: header.packet_id,
                timestamp: header.timestamp,
            }),
            Message::Ping { header, body } => self.ping.dispatch(PingRecord {
                data: body,
                packet_id: header.packet_id,
                timestamp: header.timestamp,
            }),
            Message::LocEst { header, body } => self.loc_est.dispatch(LocEstRecord {
                data: body,
                packet_id: header.packet_id,
                timestamp: header.timestamp,
            }),
            Message::StartRequest { header } => {
                self.start_request.dispatch(StartRequestRecord {
                    packet_id: header.packet_id,
                    timestamp: header.timestamp,
                })
            }
            Message::StartResponse { header, success } => {
                self.start_response.dispatch(StartResponseRecord {
                    success,
                    packet_id: header.packet_id,
                    timestamp: header.timestamp,
                })
            }
            Message::StopRequest { header } => self.stop_request.dispatch(StopRequestRecord {
                packet_id: header.packet_id,
                timestamp: header.timestamp,
            }),
            Message::StopResponse { header, success } => {
                self.stop_response.dispatch(StopResponseRecord {
                    success,
                    packet_id: header.packet_id,
                    timestamp: header.timestamp,
                })
            }
            Message::Error { header } => self.error.dispatch(ErrorRecord {
                packet_id: header.packet_id,
                timestamp: header.timestamp,
            }),
            Message::Ack { .. } => {
                log::debug!("unexpected Ack reached the dispatch layer, dropping");
            }
        }
    }
}

/// `(packet_id, need_ack, timestamp)` returned by every `send_*` call.
pub type SendStamp = (u32, bool, u64);

/// Top-level facade: owns the packet manager and the dispatch table,
/// exposing a typed send/register API per non-Ack variant (§4.6).
pub struct DroneLink {
    manager: Arc<PacketManager>,
    dispatch: Arc<Dispatch>,
}

impl DroneLink {
    /// Builds a link over the given channel with default observers.
    pub fn new(config: ManagerConfig, channel: Box<dyn ByteChannel>) -> Self {
        Self::build(config, channel, None)
    }

    /// Builds a link that reports ack-timeout exhaustion to `observer`.
    pub fn with_ack_timeout_observer(
        config: ManagerConfig,
        channel: Box<dyn ByteChannel>,
        observer: AckTimeoutObserver,
    ) -> Self {
        Self::build(config, channel, Some(observer))
    }

    fn build(
        config: ManagerConfig,
        channel: Box<dyn ByteChannel>,
        ack_timeout_observer: Option<AckTimeoutObserver>,
    ) -> Self {
        let dispatch = Arc::new(Dispatch::new());
        let dispatch_for_inbound = dispatch.clone();
        let inbound_handler: Arc<dyn Fn(Message) + Send + Sync> =
            Arc::new(move |msg| dispatch_for_inbound.handle(msg));

        let mut manager = PacketManager::new(config, channel, inbound_handler);
        if let Some(observer) = ack_timeout_observer {
            manager = manager.with_ack_timeout_observer(observer);
        }

        Self {
            manager: Arc::new(manager),
            dispatch,
        }
    }

    /// Connects the channel and starts the sender/receiver workers.
    pub async fn start(&self) -> crate::error::Result<()> {
        self.manager.start().await
    }

    /// Stops both workers and releases the channel. Idempotent.
    pub async fn stop(&self) {
        self.manager.stop().await
    }

    /// Allocates a header and its corresponding return stamp together,
    /// so every `send_*` method below only has to build the message.
    fn header_and_stamp(&self, need_ack: bool) -> (Header, SendStamp) {
        let header = self.manager.new_header(need_ack);
        (header, (header.packet_id, header.need_ack, header.timestamp))
    }

    pub fn send_sync_request(&self) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(true);
        self.manager.enqueue(Message::SyncRequest { header });
        stamp
    }

    pub fn send_sync_response(&self, success: bool) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager
            .enqueue(Message::SyncResponse { header, success });
        stamp
    }

    pub fn send_config_request(&self, body: ConfigRequestData) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(true);
        self.manager
            .enqueue(Message::ConfigRequest { header, body });
        stamp
    }

    pub fn send_config_response(&self, success: bool) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager
            .enqueue(Message::ConfigResponse { header, success });
        stamp
    }

    pub fn send_gps_data(&self, body: GpsData) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager.enqueue(Message::GPS { header, body });
        stamp
    }

    pub fn send_ping_data(&self, body: PingData) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager.enqueue(Message::Ping { header, body });
        stamp
    }

    pub fn send_loc_est_data(&self, body: LocEstData) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager.enqueue(Message::LocEst { header, body });
        stamp
    }

    pub fn send_start_request(&self) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(true);
        self.manager.enqueue(Message::StartRequest { header });
        stamp
    }

    pub fn send_start_response(&self, success: bool) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager
            .enqueue(Message::StartResponse { header, success });
        stamp
    }

    pub fn send_stop_request(&self) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(true);
        self.manager.enqueue(Message::StopRequest { header });
        stamp
    }

    pub fn send_stop_response(&self, success: bool) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager
            .enqueue(Message::StopResponse { header, success });
        stamp
    }

    pub fn send_error(&self) -> SendStamp {
        let (header, stamp) = self.header_and_stamp(false);
        self.manager.enqueue(Message::Error { header });
        stamp
    }

    pub fn register_sync_request(&self, once: bool, callback: ObserverFn<SyncRequestRecord>) -> ObserverId {
        self.dispatch.sync_request.register(once, callback)
    }
    pub fn unregister_sync_request(&self, id: ObserverId) {
        self.dispatch.sync_request.unregister(id)
    }

    pub fn register_sync_response(&self, once: bool, callback: ObserverFn<SyncResponseRecord>) -> ObserverId {
        self.dispatch.sync_response.register(once, callback)
    }
    pub fn unregister_sync_response(&self, id: ObserverId) {
        self.dispatch.sync_response.unregister(id)
    }

    pub fn register_config_request(&self, once: bool, callback: ObserverFn<ConfigRequestRecord>) -> ObserverId {
        self.dispatch.config_request.register(once, callback)
    }
    pub fn unregister_config_request(&self, id: ObserverId) {
        self.dispatch.config_request.unregister(id)
    }

    pub fn register_config_response(&self, once: bool, callback: ObserverFn<ConfigResponseRecord>) -> ObserverId {
        self.dispatch.config_response.register(once, callback)
    }
    pub fn unregister_config_response(&self, id: ObserverId) {
        self.dispatch.config_response.unregister(id)
    }

    pub fn register_gps_data(&self, once: bool, callback: ObserverFn<GpsRecord>) -> ObserverId {
        self.dispatch.gps.register(once, callback)
    }
    pub fn unregister_gps_data(&self, id: ObserverId) {
        self.dispatch.gps.unregister(id)
    }

    pub fn register_ping_data(&self, once: bool, callback: ObserverFn<PingRecord>) -> ObserverId {
        self.dispatch.ping.register(once, callback)
    }
    pub fn unregister_ping_data(&self, id: ObserverId) {
        self.dispatch.ping.unregister(id)
    }

    pub fn register_loc_est_data(&self, once: bool, callback: ObserverFn<LocEstRecord>) -> ObserverId {
        self.dispatch.loc_est.register(once, callback)
    }
    pub fn unregister_loc_est_data(&self, id: ObserverId) {
        self.dispatch.loc_est.unregister(id)
    }

    pub fn register_start_request(&self, once: bool, callback: ObserverFn<StartRequestRecord>) -> ObserverId {
        self.dispatch.start_request.register(once, callback)
    }
    pub fn unregister_start_request(&self, id: ObserverId) {
        self.dispatch.start_request.unregister(id)
    }

    pub fn register_start_response(&self, once: bool, callback: ObserverFn<StartResponseRecord>) -> ObserverId {
        self.dispatch.start_response.register(once, callback)
    }
    pub fn unregister_start_response(&self, id: ObserverId) {
        self.dispatch.start_response.unregister(id)
    }

    pub fn register_stop_request(&self, once: bool, callback: ObserverFn<StopRequestRecord>) -> ObserverId {
        self.dispatch.stop_request.register(once, callback)
    }
    pub fn unregister_stop_request(&self, id: ObserverId) {
        self.dispatch.stop_request.unregister(id)
    }

    pub fn register_stop_response(&self, once: bool, callback: ObserverFn<StopResponseRecord>) -> ObserverId {
        self.dispatch.stop_response.register(once, callback)
    }
    pub fn unregister_stop_response(&self, id: ObserverId) {
        self.dispatch.stop_response.unregister(id)
    }

    pub fn register_error(&self, once: bool, callback: ObserverFn<ErrorRecord>) -> ObserverId {
        self.dispatch.error.register(once, callback)
    }
    pub fn unregister_error(&self, id: ObserverId) {
        self.dispatch.error.unregister(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackChannel;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn test_config() -> ManagerConfig {
        ManagerConfig::new()
            .with_read_timeout(Duration::from_millis(50))
            .with_ack_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn config_response_observer_sees_success_flag() {
        let (a, b) = LoopbackChannel::pair();
        let link_a = DroneLink::new(test_config(), Box::new(a));
        let link_b = DroneLink::new(test_config(), Box::new(b));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        link_a.register_config_response(
            false,
            Arc::new(move |record: ConfigResponseRecord| {
                seen_clone.lock().unwrap().push(record.success);
            }),
        );

        link_a.start().await.unwrap();
        link_b.start().await.unwrap();

        link_b.send_config_response(true);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(seen.lock().unwrap().as_slice(), &[true]);

        link_a.stop().await;
        link_b.stop().await;
    }

    #[tokio::test]
    async fn once_observer_fires_exactly_once() {
        let (a, b) = LoopbackChannel::pair();
        let link_a = DroneLink::new(test_config(), Box::new(a));
        let link_b = DroneLink::new(test_config(), Box::new(b));

        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        link_a.register_config_response(
            true,
            Arc::new(move |_record: ConfigResponseRecord| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        link_a.start().await.unwrap();
        link_b.start().await.unwrap();

        link_b.send_config_response(true);
        link_b.send_config_response(false);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);

        link_a.stop().await;
        link_b.stop().await;
    }
}
