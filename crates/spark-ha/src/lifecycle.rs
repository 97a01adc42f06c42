//! # LifeSupport：作用域化的组件生命周期容器
//!
//! ## 核心意图（Why）
//! - 每个调用点持有一个 [`LifeSupport`]，解析器创建的客户端注册进去后，启动/停止与容器绑定；
//! - 获取（构造 + 注册 + 启动）与释放（随容器停止）在所有退出路径上成对出现，
//!   包括启动失败与容器被 `Drop` 的情形。
//!
//! ## 行为契约（What）
//! - 状态：`Stopped`（初始）→ `Starting` → `Started` → `Stopping` → `Stopped` → `Shutdown`（终态）；
//!   `Starting`/`Stopping` 是过渡态，此时对容器的 `start`/`stop`/`shutdown` 返回
//!   [`LifecycleError::InTransition`]；
//! - `register`：容器已启动（或正在启动）时立即启动新组件；启动失败时先停止该组件再返回错误，
//!   组件不会留在容器内；
//! - `start`：按注册顺序启动；中途失败时逆序停止已启动的组件（含启动期间新注册的组件），
//!   容器回到 `Stopped`；
//! - `stop`：逆序停止全部组件，单个失败不会中断其余组件的停止，失败汇总为
//!   [`LifecycleError::StopFailed`]；
//! - `shutdown`：停止后清空组件并进入终态；`Drop` 时自动执行。
//!
//! ## 实现要点（How）
//! - 内部锁只保护状态与组件列表；组件的 `start`/`stop` 一律在锁外执行，
//!   因而组件（及其失败时触发的异常处理器）可以回头查询甚至注册到同一个容器；
//! - 锁外启动的组件在重新加锁后再核对一次状态：期间容器已停止则把组件留在容器中并停止它，
//!   期间容器已终止则停止它并返回 [`LifecycleError::AlreadyShutdown`]。

use std::{borrow::Cow, mem, sync::Arc};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ComponentError, LifecycleError, StopFailure};

/// 可被生命周期容器托管的组件。
pub trait Lifecycle: Send + Sync + 'static {
    /// 日志与错误报告中使用的组件名。
    fn component_name(&self) -> Cow<'_, str>;

    /// 启动组件；重复启动应当是幂等的。
    fn start(&self) -> Result<(), ComponentError>;

    /// 停止组件；重复停止应当是幂等的。
    fn stop(&self) -> Result<(), ComponentError>;
}

/// 容器状态。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LifeState {
    Stopped,
    /// `start` 正在逐个启动组件。
    Starting,
    Started,
    /// `stop` 正在逐个停止组件。
    Stopping,
    Shutdown,
}

/// 作用域化的生命周期容器。
pub struct LifeSupport {
    inner: Mutex<Inner>,
}

struct Inner {
    state: LifeState,
    instances: Vec<Arc<dyn Lifecycle>>,
}

impl LifeSupport {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LifeState::Stopped,
                instances: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> LifeState {
        self.inner.lock().state
    }

    /// 当前托管的组件数量。
    pub fn len(&self) -> usize {
        self.inner.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().instances.is_empty()
    }

    /// 注册组件，使其随容器启停。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - **前置条件**：容器未进入 `Shutdown`，否则返回 [`LifecycleError::AlreadyShutdown`]；
    ///   - **后置条件**：返回 `Ok` 时组件已在容器中，且其运行状态与容器一致；
    ///     返回 `Err` 时组件不在容器中，且已尝试停止。
    /// - **执行 (How)**：组件的 `start` 在锁外执行，成功后重新加锁并按当时的容器状态收尾。
    pub fn register(&self, instance: Arc<dyn Lifecycle>) -> Result<(), LifecycleError> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                LifeState::Shutdown => return Err(LifecycleError::AlreadyShutdown),
                LifeState::Stopped | LifeState::Stopping => {
                    debug!(component = %instance.component_name(), state = ?inner.state, "component registered");
                    inner.instances.push(instance);
                    return Ok(());
                }
                LifeState::Starting | LifeState::Started => {}
            }
        }

        if let Err(source) = instance.start() {
            let component = instance.component_name().into_owned();
            release_after_failed_start(instance.as_ref());
            warn!(component = %component, error = %source, "component failed to start on registration");
            return Err(LifecycleError::StartFailed { component, source });
        }

        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            LifeState::Starting | LifeState::Started => {
                debug!(component = %instance.component_name(), state = ?state, "component registered");
                inner.instances.push(instance);
                Ok(())
            }
            LifeState::Stopped | LifeState::Stopping => {
                inner.instances.push(Arc::clone(&instance));
                drop(inner);
                debug!(component = %instance.component_name(), state = ?state, "container stopped during registration");
                if let Err(err) = instance.stop() {
                    warn!(component = %instance.component_name(), error = %err, "late stop after registration failed");
                }
                Ok(())
            }
            LifeState::Shutdown => {
                drop(inner);
                release_after_failed_start(instance.as_ref());
                Err(LifecycleError::AlreadyShutdown)
            }
        }
    }

    /// 按注册顺序启动全部组件。
    pub fn start(&self) -> Result<(), LifecycleError> {
        let snapshot = {
            let mut inner = self.inner.lock();
            match inner.state {
                LifeState::Shutdown => return Err(LifecycleError::AlreadyShutdown),
                LifeState::Started => return Ok(()),
                state @ (LifeState::Starting | LifeState::Stopping) => {
                    return Err(LifecycleError::InTransition { state });
                }
                LifeState::Stopped => {}
            }
            inner.state = LifeState::Starting;
            inner.instances.clone()
        };

        for (position, instance) in snapshot.iter().enumerate() {
            if let Err(source) = instance.start() {
                let component = instance.component_name().into_owned();
                warn!(component = %component, error = %source, "component failed to start, rolling back");
                release_after_failed_start(instance.as_ref());

                // 启动期间新注册的组件已自行启动，同样需要回滚。
                let late = {
                    let mut inner = self.inner.lock();
                    inner.state = LifeState::Stopped;
                    inner
                        .instances
                        .get(snapshot.len()..)
                        .map(<[_]>::to_vec)
                        .unwrap_or_default()
                };
                for started in snapshot[..position].iter().chain(&late).rev() {
                    if let Err(err) = started.stop() {
                        warn!(component = %started.component_name(), error = %err, "rollback stop failed");
                    }
                }
                return Err(LifecycleError::StartFailed { component, source });
            }
        }

        let mut inner = self.inner.lock();
        inner.state = LifeState::Started;
        info!(components = inner.instances.len(), "life support started");
        Ok(())
    }

    /// 逆序停止全部组件。
    pub fn stop(&self) -> Result<(), LifecycleError> {
        let snapshot = {
            let mut inner = self.inner.lock();
            match inner.state {
                LifeState::Stopped | LifeState::Shutdown => return Ok(()),
                state @ (LifeState::Starting | LifeState::Stopping) => {
                    return Err(LifecycleError::InTransition { state });
                }
                LifeState::Started => {}
            }
            inner.state = LifeState::Stopping;
            inner.instances.clone()
        };

        let mut failures = Vec::new();
        for instance in snapshot.iter().rev() {
            if let Err(source) = instance.stop() {
                let component = instance.component_name().into_owned();
                warn!(component = %component, error = %source, "component failed to stop");
                failures.push(StopFailure { component, source });
            }
        }

        self.inner.lock().state = LifeState::Stopped;
        info!(components = snapshot.len(), failed = failures.len(), "life support stopped");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::StopFailed { failures })
        }
    }

    /// 停止并释放全部组件，进入终态。
    pub fn shutdown(&self) -> Result<(), LifecycleError> {
        let mut outcome = Ok(());
        let released = loop {
            let mut inner = self.inner.lock();
            match inner.state {
                LifeState::Shutdown => return outcome,
                state @ (LifeState::Starting | LifeState::Stopping) => {
                    return Err(LifecycleError::InTransition { state });
                }
                LifeState::Stopped => {
                    inner.state = LifeState::Shutdown;
                    break mem::take(&mut inner.instances);
                }
                LifeState::Started => {
                    drop(inner);
                    outcome = self.stop();
                }
            }
        };

        info!(components = released.len(), "life support shut down");
        drop(released);
        outcome
    }
}

impl Default for LifeSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifeSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LifeSupport")
            .field("state", &inner.state)
            .field("components", &inner.instances.len())
            .finish()
    }
}

impl Drop for LifeSupport {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "life support dropped with components that failed to stop");
        }
    }
}

/// 启动失败的组件可能已部分获取资源，尽力停止一次。
fn release_after_failed_start(instance: &dyn Lifecycle) {
    if let Err(err) = instance.stop() {
        warn!(component = %instance.component_name(), error = %err, "stop after failed start also failed");
    }
}
