//! 决策引擎
//!
//! 选择理论、按执行顺序调度计算、容忍单个理论失败，再交给调和器融合；
//! 严重冲突时追加一个第三方理论裁决。
//! 理论计算是纯 CPU 的同步函数，放到阻塞线程池中执行并各自受超时约束；
//! 完成回调严格按执行顺序触发，同一输入的进度序列在多次运行间保持一致。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, FuturesOrdered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;

use tj_core::{Event, EventKind, RawResult, Result, StandardAnswer, TianjiError, UserInput};
use tj_theory::{Theory, TheoryRegistry};

use crate::arbitration::Arbitrator;
use crate::config::EngineConfig;
use crate::narrative::{Narrative, NarrativeChain};
use crate::resolver::{ConflictResolver, ContributingAnswer, FinalDecision, ResolutionStrategy};
use crate::selector::{Selection, TheorySelector};

/// 单个理论的进度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Started,
    Completed,
    Failed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Started => "started",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Failed => "failed",
        }
    }
}

/// 一次问询的完整报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub decision: FinalDecision,
    /// 叙事失败或关闭时为空，不影响决策
    pub narrative: Option<Narrative>,
    /// 本次问询的事件日志
    pub events: Vec<Event>,
}

impl AnalysisReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_warning())
    }
}

type TheoryOutcome = Result<(RawResult, StandardAnswer)>;

/// 在阻塞线程池中计算单个理论，超时或任务异常均视为该理论失败
fn execute(
    theory: Arc<dyn Theory>,
    input: Arc<UserInput>,
    limit: Duration,
) -> impl Future<Output = TheoryOutcome> + Send + 'static {
    let name = theory.name().to_string();
    async move {
        let job = tokio::task::spawn_blocking(move || {
            let raw = theory.calculate(&input)?;
            let answer = theory.to_standard_answer(&raw);
            Ok::<_, TianjiError>((raw, answer))
        });
        match tokio::time::timeout(limit, job).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Err(TianjiError::Calculation {
                theory: name,
                message: format!("计算任务异常终止: {e}"),
            }),
            Err(_) => Err(TianjiError::TheoryTimeout {
                theory: name,
                secs: limit.as_secs(),
            }),
        }
    }
}

/// 单次问询的可变状态，不跨问询共享
#[derive(Default)]
struct QueryState {
    answers: Vec<ContributingAnswer>,
    failed: Vec<String>,
    events: Vec<Event>,
}

impl QueryState {
    fn started(&mut self, name: &str, progress: &mut dyn FnMut(&str, ProgressStatus)) {
        self.events
            .push(Event::new(EventKind::TheoryStarted, serde_json::Value::Null).for_theory(name));
        progress(name, ProgressStatus::Started);
    }

    fn record(
        &mut self,
        name: &str,
        fitness: f64,
        outcome: TheoryOutcome,
        progress: &mut dyn FnMut(&str, ProgressStatus),
    ) {
        match outcome {
            Ok((raw, answer)) => {
                for event in raw.events {
                    if event.kind == EventKind::SubjectsNarrowed {
                        tracing::warn!("{} 不支持多人分析，只分析主要咨询者", name);
                    }
                    self.events.push(event);
                }
                tracing::info!(
                    "{} 完成: {} ({:.2}, 置信度 {:.2})",
                    name,
                    answer.label,
                    answer.judgment_level,
                    answer.confidence
                );
                self.events.push(
                    Event::new(
                        EventKind::TheoryCompleted,
                        json!({
                            "label": answer.label,
                            "judgment": answer.judgment.as_str(),
                            "judgment_level": answer.judgment_level,
                            "confidence": answer.confidence,
                        }),
                    )
                    .for_theory(name),
                );
                progress(name, ProgressStatus::Completed);
                self.answers
                    .push(ContributingAnswer::new(name, fitness, answer));
            }
            Err(e) => {
                if matches!(e, TianjiError::InsufficientData { .. }) {
                    tracing::error!("{} 通过了筛选却缺少必需字段: {}", name, e);
                } else {
                    tracing::warn!("{} 分析失败，已排除: {}", name, e);
                }
                self.events.push(
                    Event::new(EventKind::TheoryFailed, json!({ "error": e.to_string() }))
                        .for_theory(name),
                );
                progress(name, ProgressStatus::Failed);
                self.failed.push(name.to_string());
            }
        }
    }
}

/// 决策引擎
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    selector: TheorySelector,
    resolver: ConflictResolver,
    arbitrator: Arbitrator,
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(registry: Arc<TheoryRegistry>, config: EngineConfig) -> Self {
        Self {
            selector: TheorySelector::new(registry, config.selector.clone()),
            resolver: ConflictResolver::new(config.resolver.clone()),
            arbitrator: Arbitrator::new(config.arbitration.clone()),
            config,
        }
    }

    /// 内置理论 + 默认配置
    pub fn default_engine() -> Self {
        Self::new(
            Arc::new(TheoryRegistry::with_defaults()),
            EngineConfig::default(),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn selector(&self) -> &TheorySelector {
        &self.selector
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn arbitrator(&self) -> &Arbitrator {
        &self.arbitrator
    }

    pub fn registry(&self) -> &Arc<TheoryRegistry> {
        self.selector.registry()
    }

    /// 以引擎的叙事配置构建仅含简化解读的降级链
    pub fn simplified_narrator(&self) -> NarrativeChain {
        NarrativeChain::simplified_only(self.config.narrative.clone())
    }

    /// 执行完整分析
    pub async fn analyze<F>(&self, input: &UserInput, mut progress: F) -> Result<FinalDecision>
    where
        F: FnMut(&str, ProgressStatus) + Send,
    {
        let (decision, _) = self.run(input, &mut progress).await?;
        Ok(decision)
    }

    /// 与取消信号竞速，信号先到则丢弃进行中的计算
    pub async fn analyze_until<F, C>(
        &self,
        input: &UserInput,
        progress: F,
        cancel: C,
    ) -> Result<FinalDecision>
    where
        F: FnMut(&str, ProgressStatus) + Send,
        C: Future<Output = ()> + Send,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::info!("分析已被取消");
                Err(TianjiError::Cancelled)
            }
            result = self.analyze(input, progress) => result,
        }
    }

    /// 分析并生成叙事，叙事失败只记录事件
    pub async fn analyze_with_narrative<F>(
        &self,
        input: &UserInput,
        mut progress: F,
        narrator: &NarrativeChain,
    ) -> Result<AnalysisReport>
    where
        F: FnMut(&str, ProgressStatus) + Send,
    {
        let (decision, mut events) = self.run(input, &mut progress).await?;

        let narrative = if narrator.config().enabled {
            match narrator.narrate(&decision, input).await {
                Ok(narrative) => {
                    let kind = if narrative.degraded {
                        EventKind::NarrativeDegraded
                    } else {
                        EventKind::NarrativeCompleted
                    };
                    events.push(Event::new(kind, json!({ "provider": narrative.provider })));
                    Some(narrative)
                }
                Err(e) => {
                    tracing::warn!("叙事生成失败，仅返回决策: {}", e);
                    events.push(Event::new(
                        EventKind::NarrativeFailed,
                        json!({ "error": e.to_string() }),
                    ));
                    None
                }
            }
        } else {
            tracing::debug!("叙事生成已关闭");
            None
        };

        Ok(AnalysisReport {
            decision,
            narrative,
            events,
        })
    }

    async fn run<F>(&self, input: &UserInput, progress: &mut F) -> Result<(FinalDecision, Vec<Event>)>
    where
        F: FnMut(&str, ProgressStatus) + Send,
    {
        let selection = self.selector.select_theories(input);
        let order = self.selector.determine_execution_order(&selection.selected);
        tracing::info!(
            "选中 {} 个理论，执行顺序: {}",
            order.len(),
            order.join(" → ")
        );

        let mut state = QueryState::default();
        state.events.push(selection_event(&selection, &order));

        let planned: Vec<(Arc<dyn Theory>, f64)> = order
            .iter()
            .filter_map(|name| {
                let fitness = selection
                    .selected
                    .iter()
                    .find(|s| &s.name == name)
                    .map(|s| s.fitness)?;
                self.registry().get(name).map(|theory| (theory, fitness))
            })
            .collect();

        let shared = Arc::new(input.clone());
        let limit = Duration::from_secs(self.config.execution.theory_timeout_secs);

        if self.config.execution.parallel {
            for (theory, _) in &planned {
                state.started(theory.name(), &mut *progress);
            }
            let pending: FuturesOrdered<_> = planned
                .iter()
                .map(|(theory, _)| execute(Arc::clone(theory), Arc::clone(&shared), limit))
                .collect();
            let mut results = pending.zip(stream::iter(planned.iter()));
            while let Some((outcome, (theory, fitness))) = results.next().await {
                state.record(theory.name(), *fitness, outcome, &mut *progress);
            }
        } else {
            for (theory, fitness) in &planned {
                state.started(theory.name(), &mut *progress);
                let outcome = execute(Arc::clone(theory), Arc::clone(&shared), limit).await;
                state.record(theory.name(), *fitness, outcome, &mut *progress);
            }
        }

        if state.answers.is_empty() {
            tracing::error!("所有理论分析都失败了: {}", order.join(", "));
            return Err(TianjiError::AllTheoriesFailed { attempted: order });
        }

        let mut decision = self.resolver.resolve(&state.answers)?;
        if decision.strategy == ResolutionStrategy::NeedsArbitration
            && self.config.arbitration.enabled
        {
            decision = self
                .arbitrate(decision, &order, shared, limit, &mut state, &mut *progress)
                .await?;
        }
        for conflict in &decision.conflicts {
            state.events.push(Event::new(
                EventKind::ConflictDetected,
                json!({
                    "theory_a": conflict.theory_a,
                    "theory_b": conflict.theory_b,
                    "gap": conflict.gap,
                    "level": conflict.level.label(),
                }),
            ));
        }
        state.events.push(Event::new(
            EventKind::DecisionReached,
            json!({
                "judgment": decision.judgment.as_str(),
                "consensus_level": decision.consensus_level,
                "agreement": decision.agreement,
                "confidence": decision.confidence,
                "theories": decision.theories(),
                "failed": state.failed,
                "strategy": decision.strategy.label(),
            }),
        ));

        Ok((decision, state.events))
    }

    /// 追加执行裁决理论；没有可用理论或裁决理论失败时保留原决策
    async fn arbitrate(
        &self,
        decision: FinalDecision,
        attempted: &[String],
        input: Arc<UserInput>,
        limit: Duration,
        state: &mut QueryState,
        progress: &mut (dyn FnMut(&str, ProgressStatus) + Send),
    ) -> Result<FinalDecision> {
        let Some(conflict) = Arbitrator::target(&decision).cloned() else {
            return Ok(decision);
        };

        let scores = self.selector.score_all(&input);
        let chosen = self
            .arbitrator
            .choose_arbiter(&input.question_type, attempted, |name| {
                scores.iter().any(|s| s.name == name && s.eligible)
            })
            .and_then(|name| {
                let fitness = scores.iter().find(|s| s.name == name)?.fitness;
                self.registry().get(name).map(|theory| (theory, fitness))
            });
        let Some((theory, fitness)) = chosen else {
            tracing::warn!(
                "{} 与 {} 严重冲突，但没有可用的裁决理论",
                conflict.theory_a,
                conflict.theory_b
            );
            state.events.push(Event::new(
                EventKind::ArbitrationUnavailable,
                json!({ "theory_a": conflict.theory_a, "theory_b": conflict.theory_b }),
            ));
            return Ok(decision);
        };

        let name = theory.name().to_string();
        tracing::info!(
            "{} 与 {} 严重冲突，引入 {} 裁决",
            conflict.theory_a,
            conflict.theory_b,
            name
        );
        let contributing = state.answers.len();
        state.started(&name, &mut *progress);
        let outcome = execute(theory, input, limit).await;
        state.record(&name, fitness, outcome, &mut *progress);

        let Some(arbiter) = state.answers.get(contributing).cloned() else {
            state.events.push(
                Event::new(
                    EventKind::ArbitrationUnavailable,
                    json!({
                        "theory_a": conflict.theory_a,
                        "theory_b": conflict.theory_b,
                        "arbiter_failed": true,
                    }),
                )
                .for_theory(&name),
            );
            return Ok(decision);
        };

        let arbitrated =
            self.arbitrator
                .arbitrate(&self.resolver, &state.answers[..contributing], arbiter)?;
        if let Some(record) = &arbitrated.arbitration {
            state.events.push(
                Event::new(
                    EventKind::ArbitrationCompleted,
                    json!({
                        "theory_a": record.theory_a,
                        "theory_b": record.theory_b,
                        "arbiter_judgment": record.arbiter_judgment.as_str(),
                        "final_judgment": record.final_judgment.as_str(),
                        "vote_share": record.vote_share,
                    }),
                )
                .for_theory(&name),
            );
        }
        Ok(arbitrated)
    }
}

fn selection_event(selection: &Selection, order: &[String]) -> Event {
    let missing = selection
        .missing_info
        .as_ref()
        .map(|fields| fields.iter().map(|f| f.as_str()).collect::<Vec<_>>());
    Event::new(
        EventKind::TheoriesSelected,
        json!({
            "selected": selection.names(),
            "execution_order": order,
            "missing_info": missing,
        }),
    )
}
