//! 客户端与调用方生命周期容器的绑定关系。

mod support;

use std::{
    sync::{
        Arc, mpsc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use bytes::Bytes;
use spark_ha::{
    ComError, ComExceptionHandler, HaError, HandlerBinder, LifeState, LifeSupport, LifecycleError,
    MasterClient, MasterClient210, MasterClient214, MasterClientResolver, RequestType, StoreId,
    client::collaborators::NoopMetrics,
};
use support::{CountingUnpacker, SimulatedMaster, harness};

const ADDRESS: &str = "cluster://localhost";

#[test]
fn client_starts_and_stops_with_its_container() {
    let harness = harness(MasterClient214::PROTOCOL_VERSION.application_protocol());
    let life = LifeSupport::new();

    let client = harness
        .resolver
        .instantiate(ADDRESS, 44, Arc::new(NoopMetrics), StoreId::DEFAULT, &life)
        .expect("客户端");
    assert!(!client.is_started(), "容器未启动前客户端不应连接");
    assert!(matches!(
        client.call(RequestType::Handshake, Bytes::new()),
        Err(ComError::NotStarted { .. })
    ));

    life.start().expect("容器启动");
    assert!(client.is_started());
    assert_eq!(harness.master.connects().len(), 1);

    life.stop().expect("容器停止");
    assert!(!client.is_started());
    assert_eq!(harness.master.closes(), 1);
}

#[test]
fn registration_into_running_container_connects_immediately() {
    let harness = harness(MasterClient214::PROTOCOL_VERSION.application_protocol());
    let life = LifeSupport::new();
    life.start().expect("容器启动");

    let client = harness
        .resolver
        .instantiate(ADDRESS, 55, Arc::new(NoopMetrics), StoreId::DEFAULT, &life)
        .expect("客户端");

    assert!(client.is_started());
    let (endpoint, protocol) = harness.master.connects()[0].clone();
    assert_eq!(endpoint.to_string(), "cluster://localhost:55");
    assert_eq!(protocol, MasterClient214::PROTOCOL_VERSION);
}

#[test]
fn failed_start_leaves_nothing_registered_and_still_feeds_the_handler() {
    let harness = harness(MasterClient210::PROTOCOL_VERSION.application_protocol());
    harness
        .master
        .refuse_connect(ComError::illegal_protocol_version(8, 7, "Protocol is too modern"));
    let life = LifeSupport::new();
    life.start().expect("容器启动");

    let err = harness
        .resolver
        .instantiate(ADDRESS, 44, Arc::new(NoopMetrics), StoreId::DEFAULT, &life)
        .expect_err("握手被拒绝时注册失败");
    assert!(matches!(
        err,
        HaError::Lifecycle(LifecycleError::StartFailed { .. })
    ));
    assert!(life.is_empty(), "启动失败的客户端不得留在容器中");
    assert_eq!(
        harness.resolver.current_protocol(),
        MasterClient210::PROTOCOL_VERSION,
        "启动期的版本不匹配同样驱动降级"
    );
}

#[test]
fn dropping_the_container_releases_clients() {
    let harness = harness(MasterClient214::PROTOCOL_VERSION.application_protocol());
    let client = {
        let life = LifeSupport::new();
        life.start().expect("容器启动");
        harness
            .resolver
            .instantiate(ADDRESS, 44, Arc::new(NoopMetrics), StoreId::DEFAULT, &life)
            .expect("客户端")
    };

    assert!(!client.is_started(), "容器析构后客户端必须已停止");
    assert_eq!(harness.master.closes(), 1);
}

#[test]
fn shut_down_container_rejects_new_clients() {
    let harness = harness(MasterClient214::PROTOCOL_VERSION.application_protocol());
    let life = LifeSupport::new();
    life.shutdown().expect("关闭");
    assert_eq!(life.state(), LifeState::Shutdown);

    let err = harness
        .resolver
        .instantiate(ADDRESS, 44, Arc::new(NoopMetrics), StoreId::DEFAULT, &life)
        .expect_err("终态容器不接受注册");
    assert!(matches!(
        err,
        HaError::Lifecycle(LifecycleError::AlreadyShutdown)
    ));
}

/// 挂载时包一层处理器：每观察到一次失败，就回头查询调用方的容器。
struct ContainerAwareBinder {
    life: Arc<LifeSupport>,
    observed: Arc<AtomicUsize>,
}

impl HandlerBinder for ContainerAwareBinder {
    fn bind(&self, client: &dyn MasterClient, handler: Arc<dyn ComExceptionHandler>) {
        let life = Arc::clone(&self.life);
        let observed = Arc::clone(&self.observed);
        client.set_com_exception_handler(Arc::new(move |error: &ComError| {
            handler.handle(error);
            if life.len() == 0 {
                observed.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
}

#[test]
fn handlers_may_consult_the_container_while_a_start_fails() {
    //
    // 教案级说明：启动失败时处理器链在 `register` 内部同步执行；
    // 处理器回访同一个容器不得让 `instantiate` 挂起。
    let master = SimulatedMaster::running(MasterClient210::PROTOCOL_VERSION.application_protocol());
    master.refuse_connect(ComError::illegal_protocol_version(8, 7, "Protocol is too modern"));
    let life = Arc::new(LifeSupport::new());
    life.start().expect("容器启动");
    let observed = Arc::new(AtomicUsize::new(0));
    let resolver = Arc::new(
        MasterClientResolver::builder(Arc::new(CountingUnpacker::default()), Arc::new(master.clone()))
            .binder(Arc::new(ContainerAwareBinder {
                life: Arc::clone(&life),
                observed: Arc::clone(&observed),
            }))
            .build(),
    );

    let (done, outcome) = mpsc::channel();
    let worker = {
        let resolver = Arc::clone(&resolver);
        let life = Arc::clone(&life);
        thread::spawn(move || {
            let result = resolver
                .instantiate(ADDRESS, 44, Arc::new(NoopMetrics), StoreId::DEFAULT, &life)
                .map(|_| ());
            let _ = done.send(result);
        })
    };
    let result = outcome
        .recv_timeout(Duration::from_secs(5))
        .expect("处理器回访容器时 instantiate 不得挂起");
    worker.join().expect("工作线程不应 panic");

    assert!(matches!(
        result,
        Err(HaError::Lifecycle(LifecycleError::StartFailed { .. }))
    ));
    assert_eq!(observed.load(Ordering::SeqCst), 1, "处理器观察到失败时容器仍为空");
    assert!(life.is_empty());
    assert_eq!(resolver.current_protocol(), MasterClient210::PROTOCOL_VERSION);
}

#[test]
fn concurrent_registrations_into_a_running_container_all_start() {
    let harness = harness(MasterClient214::PROTOCOL_VERSION.application_protocol());
    let life = Arc::new(LifeSupport::new());
    life.start().expect("容器启动");
    let resolver = Arc::new(harness.resolver);

    let workers: Vec<_> = (0..4u16)
        .map(|offset| {
            let resolver = Arc::clone(&resolver);
            let life = Arc::clone(&life);
            thread::spawn(move || {
                resolver
                    .instantiate(ADDRESS, 40 + offset, Arc::new(NoopMetrics), StoreId::DEFAULT, &life)
                    .expect("并发注册")
            })
        })
        .collect();
    let clients: Vec<_> = workers
        .into_iter()
        .map(|worker| worker.join().expect("工作线程不应 panic"))
        .collect();

    assert!(clients.iter().all(|client| client.is_started()));
    assert_eq!(life.len(), 4);
    assert_eq!(harness.master.connects().len(), 4);
}
