//! 集成测试共享的内存协作者。
//!
//! `SimulatedMaster` 模拟运行某个应用协议版本的主节点：客户端假定的版本比它新时，
//! 每个请求都以 `IllegalProtocolVersion` 拒绝。
#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use spark_ha::{
    ClientSettings, ComError, ComExceptionHandler, HandlerBinder, MasterClient, MasterClientResolver,
    MasterEndpoint, MasterRequest, MasterResponse, ProtocolVersion, RequestType, StoreId,
    client::collaborators::{
        ClusterClient, ClusterMemberAvailability, MasterConnection, MasterTransport, MetricsSink,
        ResponseUnpacker,
    },
    handler::ClientHandlerBinder,
};

/// 主节点侧的可变状态。
#[derive(Debug)]
pub struct MasterState {
    pub application_protocol: u8,
    pub store_id: StoreId,
    pub refuse_connect: Option<ComError>,
    pub fail_next_request: Option<ComError>,
}

#[derive(Clone)]
pub struct SimulatedMaster {
    state: Arc<Mutex<MasterState>>,
    connects: Arc<Mutex<Vec<(MasterEndpoint, ProtocolVersion)>>>,
    requests: Arc<Mutex<Vec<MasterRequest>>>,
    closes: Arc<AtomicUsize>,
}

impl SimulatedMaster {
    pub fn running(application_protocol: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(MasterState {
                application_protocol,
                store_id: StoreId::DEFAULT,
                refuse_connect: None,
                fail_next_request: None,
            })),
            connects: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn refuse_connect(&self, error: ComError) {
        self.state.lock().refuse_connect = Some(error);
    }

    pub fn fail_next_request(&self, error: ComError) {
        self.state.lock().fail_next_request = Some(error);
    }

    pub fn connects(&self) -> Vec<(MasterEndpoint, ProtocolVersion)> {
        self.connects.lock().clone()
    }

    pub fn requests(&self) -> Vec<MasterRequest> {
        self.requests.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl MasterTransport for SimulatedMaster {
    fn connect(
        &self,
        endpoint: &MasterEndpoint,
        protocol: ProtocolVersion,
        _settings: &ClientSettings,
    ) -> Result<Box<dyn MasterConnection>, ComError> {
        if let Some(error) = self.state.lock().refuse_connect.clone() {
            return Err(error);
        }
        self.connects.lock().push((endpoint.clone(), protocol));
        Ok(Box::new(SimulatedConnection {
            master: self.clone(),
        }))
    }
}

struct SimulatedConnection {
    master: SimulatedMaster,
}

impl MasterConnection for SimulatedConnection {
    fn send(&self, request: &MasterRequest) -> Result<MasterResponse, ComError> {
        self.master.requests.lock().push(request.clone());
        let mut state = self.master.state.lock();
        if let Some(error) = state.fail_next_request.take() {
            return Err(error);
        }
        let assumed = request.protocol().application_protocol();
        if assumed > state.application_protocol {
            return Err(ComError::illegal_protocol_version(
                assumed,
                state.application_protocol,
                "Protocol is too modern",
            ));
        }
        Ok(MasterResponse::new(state.store_id, request.payload().clone()))
    }

    fn close(&self) {
        self.master.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct CountingUnpacker {
    pub unpacked: AtomicUsize,
}

impl ResponseUnpacker for CountingUnpacker {
    fn unpack(&self, _response: &MasterResponse) -> Result<(), ComError> {
        self.unpacked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct ClusterJournal {
    pub elections: AtomicUsize,
    pub unavailable: Mutex<Vec<String>>,
}

impl ClusterClient for ClusterJournal {
    fn request_elections(&self) {
        self.elections.fetch_add(1, Ordering::SeqCst);
    }
}

impl ClusterMemberAvailability for ClusterJournal {
    fn member_is_unavailable(&self, role: &str) {
        self.unavailable.lock().push(role.to_owned());
    }
}

#[derive(Default)]
pub struct MetricsJournal {
    pub completed: Mutex<Vec<RequestType>>,
    pub failed: Mutex<Vec<(RequestType, ComError)>>,
}

impl MetricsSink for MetricsJournal {
    fn request_completed(&self, _endpoint: &MasterEndpoint, request_type: RequestType) {
        self.completed.lock().push(request_type);
    }

    fn request_failed(&self, _endpoint: &MasterEndpoint, request_type: RequestType, error: &ComError) {
        self.failed.lock().push((request_type, error.clone()));
    }
}

/// 挂载处理器的同时把它捕获下来，测试可以直接向它投递失败。
#[derive(Default)]
pub struct CapturingBinder {
    handlers: Mutex<Vec<Arc<dyn ComExceptionHandler>>>,
}

impl CapturingBinder {
    pub fn captured(&self) -> Vec<Arc<dyn ComExceptionHandler>> {
        self.handlers.lock().clone()
    }

    /// 把同一个失败投递给所有已捕获的处理器。
    pub fn deliver(&self, error: &ComError) {
        for handler in self.captured() {
            handler.handle(error);
        }
    }
}

impl HandlerBinder for CapturingBinder {
    fn bind(&self, client: &dyn MasterClient, handler: Arc<dyn ComExceptionHandler>) {
        self.handlers.lock().push(Arc::clone(&handler));
        ClientHandlerBinder.bind(client, handler);
    }
}

pub struct Harness {
    pub resolver: MasterClientResolver,
    pub master: SimulatedMaster,
    pub binder: Arc<CapturingBinder>,
    pub cluster: Arc<ClusterJournal>,
    pub unpacker: Arc<CountingUnpacker>,
}

/// 以 1 秒超时、单通道、1 KiB 分块构造解析器。
pub fn harness(master_protocol: u8) -> Harness {
    let master = SimulatedMaster::running(master_protocol);
    let binder = Arc::new(CapturingBinder::default());
    let cluster = Arc::new(ClusterJournal::default());
    let unpacker = Arc::new(CountingUnpacker::default());
    let settings =
        ClientSettings::new(Duration::from_secs(1), Duration::from_secs(1), 1, 1024).expect("合法设置");
    let resolver = MasterClientResolver::builder(unpacker.clone(), Arc::new(master.clone()))
        .cluster(cluster.clone(), cluster.clone())
        .settings(settings)
        .binder(binder.clone())
        .build();
    Harness {
        resolver,
        master,
        binder,
        cluster,
        unpacker,
    }
}
