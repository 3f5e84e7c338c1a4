//! 规则集加载与热更新
//!
//! 当前生效的规则集保存在 `ArcSwap` 中，请求侧读取只是一次原子 load。
//! `RulesWatcher` 监听规则文件，变更后经 debounce 窗口重新加载；
//! 新文件加载失败时保留当前规则集。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use httptables::{Rule, RuleLoader};
use httptables_shared::observability::metrics;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::error::{GatewayError, Result};

/// 当前生效的规则集快照
pub type RuleSetHandle = Arc<ArcSwap<Vec<Rule>>>;

pub fn new_rule_set(rules: Vec<Rule>) -> RuleSetHandle {
    Arc::new(ArcSwap::from_pointee(rules))
}

/// 从 JSON 文件加载规则
///
/// 文件不存在时返回空规则集，所有请求走默认策略。
#[instrument(skip(path, loader), fields(path = %path.display()))]
pub fn load_rules_file(path: &Path, loader: &RuleLoader) -> Result<Vec<Rule>> {
    if !path.exists() {
        warn!("规则文件不存在，使用空规则集");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|source| GatewayError::RulesFile {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = loader.load_str(&content)?;

    info!(rules = rules.len(), "规则文件已加载");
    Ok(rules)
}

/// 规则文件监听器
pub struct RulesWatcher {
    path: PathBuf,
    debounce: Duration,
    loader: RuleLoader,
    rules: RuleSetHandle,
}

impl RulesWatcher {
    pub fn new(
        path: impl AsRef<Path>,
        debounce: Duration,
        loader: RuleLoader,
        rules: RuleSetHandle,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            debounce,
            loader,
            rules,
        }
    }

    /// 重新加载规则文件并替换当前规则集
    ///
    /// 文件缺失或格式错误时返回错误，当前规则集保持不变。
    pub fn reload(&self) -> Result<usize> {
        let result = if self.path.exists() {
            load_rules_file(&self.path, &self.loader)
        } else {
            Err(GatewayError::RulesFile {
                path: self.path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        };

        match result {
            Ok(rules) => {
                let count = rules.len();
                self.rules.store(Arc::new(rules));
                metrics::record_rule_reload(true, count);
                Ok(count)
            }
            Err(e) => {
                metrics::record_rule_reload(false, 0);
                Err(e)
            }
        }
    }

    /// 启动监听
    ///
    /// 监听规则文件所在目录，以便覆盖编辑器先删后建的写入方式。
    pub fn start(self) -> Result<RulesWatchHandle> {
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, mut event_rx) = mpsc::channel::<()>(16);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        let _ = event_tx.try_send(());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "文件监听器事件错误");
                }
            })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        info!(path = %self.path.display(), "规则文件监听已启动");

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = event_rx.recv() => {
                        tokio::time::sleep(self.debounce).await;
                        while event_rx.try_recv().is_ok() {}

                        match self.reload() {
                            Ok(count) => info!(rules = count, "规则文件变更，已重新加载"),
                            Err(e) => error!(error = %e, "规则文件重新加载失败，保留当前规则集"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        // 发送端随句柄一起 drop 时同样退出
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("规则文件监听已停止");
                            break;
                        }
                    }
                }
            }
        });

        Ok(RulesWatchHandle {
            _watcher: watcher,
            shutdown_tx,
            task,
        })
    }
}

/// 运行中的监听器
///
/// 调用 [`RulesWatchHandle::stop`] 或直接 drop 都会结束后台任务。
pub struct RulesWatchHandle {
    _watcher: RecommendedWatcher,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RulesWatchHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
