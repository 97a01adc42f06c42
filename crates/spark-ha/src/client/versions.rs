//! 受支持的版本专属主节点客户端。
//!
//! 每个类型只固定协议版本与发行标签，行为全部委托给 [`MasterClientCore`]。
//! 新增协议版本时在此处追加一个类型，并把它的 `ENTRY` 登记到
//! [`ProtocolVersionTable::standard`](crate::protocol::ProtocolVersionTable::standard)。

use std::{borrow::Cow, sync::Arc};

use bytes::Bytes;

use crate::{
    client::{
        ClientContext, MasterClient, MasterClientCore, MasterEndpoint, MasterResponse,
        RequestType, collaborators::MetricsSink,
    },
    error::{ComError, ComponentError, HaError},
    handler::ComExceptionHandler,
    lifecycle::Lifecycle,
    protocol::{ProtocolVersion, ProtocolVersionEntry},
    store::StoreId,
};

macro_rules! versioned_master_client {
    (
        $(#[$meta:meta])*
        $name:ident { application: $application:expr, release: $release:literal }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            core: MasterClientCore,
        }

        impl $name {
            pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::application($application);
            pub const RELEASE: &'static str = $release;
            /// 版本表条目。
            pub const ENTRY: ProtocolVersionEntry =
                ProtocolVersionEntry::new(Self::PROTOCOL_VERSION, Self::RELEASE, Self::build);

            /// 校验地址并构造尚未启动的客户端。
            pub fn new(
                address: &str,
                port: u16,
                metrics: Arc<dyn MetricsSink>,
                store_id: StoreId,
                context: &ClientContext,
            ) -> Result<Self, HaError> {
                let endpoint = MasterEndpoint::new(address, port)?;
                Ok(Self {
                    core: MasterClientCore::new(
                        endpoint,
                        Self::PROTOCOL_VERSION,
                        Self::RELEASE,
                        store_id,
                        metrics,
                        context,
                    ),
                })
            }

            fn build(
                address: &str,
                port: u16,
                metrics: Arc<dyn MetricsSink>,
                store_id: StoreId,
                context: &ClientContext,
            ) -> Result<Arc<dyn MasterClient>, HaError> {
                Ok(Arc::new(Self::new(address, port, metrics, store_id, context)?))
            }
        }

        impl Lifecycle for $name {
            fn component_name(&self) -> Cow<'_, str> {
                Cow::Owned(format!("master-client-{}[{}]", Self::RELEASE, self.core.endpoint()))
            }

            fn start(&self) -> Result<(), ComponentError> {
                self.core.connect().map_err(Into::into)
            }

            fn stop(&self) -> Result<(), ComponentError> {
                self.core.disconnect();
                Ok(())
            }
        }

        impl MasterClient for $name {
            fn protocol_version(&self) -> ProtocolVersion {
                self.core.protocol()
            }

            fn release(&self) -> &'static str {
                self.core.release()
            }

            fn endpoint(&self) -> &MasterEndpoint {
                self.core.endpoint()
            }

            fn store_id(&self) -> StoreId {
                self.core.store_id()
            }

            fn is_started(&self) -> bool {
                self.core.is_started()
            }

            fn set_com_exception_handler(&self, handler: Arc<dyn ComExceptionHandler>) {
                self.core.set_handler(handler);
            }

            fn call(&self, request_type: RequestType, payload: Bytes) -> Result<MasterResponse, ComError> {
                self.core.call(request_type, payload)
            }
        }
    };
}

versioned_master_client! {
    /// 与 2.1.0 主节点通信的客户端（应用协议号 7）。
    MasterClient210 { application: 7, release: "2.1.0" }
}

versioned_master_client! {
    /// 与 2.1.4 主节点通信的客户端（应用协议号 8）。
    MasterClient214 { application: 8, release: "2.1.4" }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::{
        client::{
            MasterRequest,
            collaborators::{MasterConnection, MasterTransport, NoopMetrics, ResponseUnpacker},
        },
        config::ClientSettings,
    };

    struct EchoConnection {
        store_id: StoreId,
        seen: Arc<Mutex<Vec<MasterRequest>>>,
    }

    impl MasterConnection for EchoConnection {
        fn send(&self, request: &MasterRequest) -> Result<MasterResponse, ComError> {
            self.seen.lock().push(request.clone());
            Ok(MasterResponse::new(self.store_id, request.payload().clone()))
        }

        fn close(&self) {}
    }

    struct EchoTransport {
        store_id: StoreId,
        seen: Arc<Mutex<Vec<MasterRequest>>>,
    }

    impl MasterTransport for EchoTransport {
        fn connect(
            &self,
            _endpoint: &MasterEndpoint,
            _protocol: ProtocolVersion,
            _settings: &ClientSettings,
        ) -> Result<Box<dyn MasterConnection>, ComError> {
            Ok(Box::new(EchoConnection {
                store_id: self.store_id,
                seen: Arc::clone(&self.seen),
            }))
        }
    }

    struct AcceptAll;

    impl ResponseUnpacker for AcceptAll {
        fn unpack(&self, _response: &MasterResponse) -> Result<(), ComError> {
            Ok(())
        }
    }

    fn context(master_store: StoreId, seen: &Arc<Mutex<Vec<MasterRequest>>>) -> ClientContext {
        let settings = ClientSettings::new(Duration::from_secs(3), Duration::from_secs(9), 4, 1024)
            .expect("合法设置");
        ClientContext::new(
            settings,
            Arc::new(AcceptAll),
            Arc::new(EchoTransport {
                store_id: master_store,
                seen: Arc::clone(seen),
            }),
        )
    }

    #[test]
    fn requests_carry_protocol_and_timeout_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let client = MasterClient210::new(
            "cluster://localhost",
            44,
            Arc::new(NoopMetrics),
            StoreId::DEFAULT,
            &context(StoreId::DEFAULT, &seen),
        )
        .expect("构造客户端");
        client.start().expect("连接成功");

        client
            .call(RequestType::PullUpdates, Bytes::from_static(b"tx"))
            .expect("普通请求成功");
        client
            .call(RequestType::AcquireExclusiveLock, Bytes::new())
            .expect("锁请求成功");

        let seen = seen.lock();
        assert_eq!(seen[0].protocol(), MasterClient210::PROTOCOL_VERSION);
        assert_eq!(seen[0].timeout(), Duration::from_secs(3));
        assert_eq!(seen[1].timeout(), Duration::from_secs(9), "锁请求必须使用锁读超时");
    }

    #[test]
    fn response_from_foreign_store_is_rejected() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let foreign = StoreId::new(1, 2, 3);
        let client = MasterClient214::new(
            "cluster://localhost",
            55,
            Arc::new(NoopMetrics),
            StoreId::DEFAULT,
            &context(foreign, &seen),
        )
        .expect("构造客户端");
        client.start().expect("连接成功");

        let err = client
            .call(RequestType::Commit, Bytes::new())
            .expect_err("存储不一致必须失败");
        assert_eq!(
            err,
            ComError::StoreIdMismatch {
                expected: StoreId::DEFAULT,
                actual: foreign
            }
        );
    }

    #[test]
    fn calls_before_start_report_not_started() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let client = MasterClient214::new(
            "cluster://localhost",
            55,
            Arc::new(NoopMetrics),
            StoreId::DEFAULT,
            &context(StoreId::DEFAULT, &seen),
        )
        .expect("构造客户端");

        assert!(matches!(
            client.call(RequestType::Handshake, Bytes::new()),
            Err(ComError::NotStarted { .. })
        ));
        assert_eq!(
            client.component_name(),
            "master-client-2.1.4[cluster://localhost:55]"
        );
    }
}
