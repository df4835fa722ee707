// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Swarm Manager - Agent Registry, Assignment, Messaging
//
// Owns the agent registry and matches queued tasks to idle,
// capability-matching agents. Assignment is two reservations: the agent is
// flipped Idle -> Busy under its registry entry, then the task's Queued ->
// Assigned compare-and-swap runs in the Task Manager; losing the task race
// releases the agent. Dispatch scans are serialized and run exactly once per
// agent-becomes-available state change, so a flood of completions cannot
// stampede the queue.

use crate::domain::{
    AgentMessage, AssignmentOutcome, SwarmError, TaskOutcome, AGENT_FAULT_REASON,
};
use chrono::Utc;
use dashmap::DashMap;
use hivemind_core::application::task_manager::{TaskFilter, TaskManager};
use hivemind_core::domain::agent::{Agent, AgentDescriptor, AgentId, AgentStatus};
use hivemind_core::domain::events::AgentEvent;
use hivemind_core::domain::task::{Task, TaskError, TaskId, TaskStatus, TaskTransition};
use hivemind_core::infrastructure::event_bus::EventBus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

struct AgentSlot {
    agent: Agent,
    /// Monotonic registration sequence; FIFO tie-break among equally
    /// capable idle agents.
    seq: u64,
    current_task: Option<TaskId>,
    mailbox_tx: mpsc::UnboundedSender<AgentMessage>,
    /// Taken once by the agent's consumer loop.
    mailbox_rx: Option<mpsc::UnboundedReceiver<AgentMessage>>,
}

pub struct SwarmManager {
    tasks: Arc<TaskManager>,
    events: EventBus,
    agents: DashMap<AgentId, AgentSlot>,
    registration_seq: AtomicU64,
    /// Serializes dispatch scans; each state change triggers at most one.
    dispatch_lock: Mutex<()>,
}

impl SwarmManager {
    pub fn new(tasks: Arc<TaskManager>, events: EventBus) -> Self {
        Self {
            tasks,
            events,
            agents: DashMap::new(),
            registration_seq: AtomicU64::new(0),
            dispatch_lock: Mutex::new(()),
        }
    }

    pub fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }

    /// Register an agent and immediately offer it queued work.
    pub async fn register_agent(
        &self,
        descriptor: AgentDescriptor,
    ) -> Result<Agent, SwarmError> {
        if let Some(id) = descriptor.id {
            if self.agents.contains_key(&id) {
                return Err(SwarmError::DuplicateAgent(id));
            }
        }

        let agent = Agent::from_descriptor(descriptor);
        let snapshot = agent.clone();
        let seq = self.registration_seq.fetch_add(1, Ordering::SeqCst);
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        self.agents.insert(
            agent.id,
            AgentSlot {
                agent,
                seq,
                current_task: None,
                mailbox_tx,
                mailbox_rx: Some(mailbox_rx),
            },
        );

        info!("Agent {} registered (seq {})", snapshot.id, seq);
        self.events.publish_agent_event(AgentEvent::AgentRegistered {
            agent_id: snapshot.id,
            registered_at: Utc::now(),
        });

        // A new idle agent is a state change worth one dispatch scan.
        self.dispatch_queued().await;
        Ok(snapshot)
    }

    /// Remove an idle agent. Tasks that still reference its id keep the
    /// dangling reference; readers treat it as "unknown agent".
    pub fn deregister_agent(&self, agent_id: AgentId) -> Result<(), SwarmError> {
        match self.agents.get(&agent_id) {
            None => return Err(SwarmError::UnknownAgent(agent_id)),
            Some(slot) if slot.agent.status != AgentStatus::Idle => {
                return Err(SwarmError::AgentNotIdle(agent_id));
            }
            Some(_) => {}
        }
        self.agents.remove(&agent_id);
        self.events
            .publish_agent_event(AgentEvent::AgentDeregistered {
                agent_id,
                deregistered_at: Utc::now(),
            });
        Ok(())
    }

    pub fn get_agent(&self, agent_id: AgentId) -> Option<Agent> {
        self.agents.get(&agent_id).map(|slot| slot.agent.clone())
    }

    pub fn list_agents(&self) -> Vec<Agent> {
        let mut agents: Vec<(u64, Agent)> = self
            .agents
            .iter()
            .map(|entry| (entry.value().seq, entry.value().agent.clone()))
            .collect();
        agents.sort_by_key(|(seq, _)| *seq);
        agents.into_iter().map(|(_, agent)| agent).collect()
    }

    /// Match one queued task to an idle, capability-matching agent. The
    /// task's `assigned_agent_hint` wins when that agent qualifies;
    /// otherwise FIFO by registration sequence.
    pub async fn assign(&self, task: &Task) -> Result<AssignmentOutcome, SwarmError> {
        let mut candidates: Vec<(u64, AgentId)> = self
            .agents
            .iter()
            .filter(|entry| {
                entry.value().agent.status == AgentStatus::Idle
                    && entry.value().agent.can_handle(&task.tags)
            })
            .map(|entry| (entry.value().seq, entry.value().agent.id))
            .collect();
        candidates.sort_by_key(|(seq, _)| *seq);

        if let Some(hint) = task.assigned_agent_hint {
            if let Some(position) = candidates.iter().position(|(_, id)| *id == hint) {
                let preferred = candidates.remove(position);
                candidates.insert(0, preferred);
            }
        }

        for (_, agent_id) in candidates {
            // Reserve the agent before the task CAS; both sides race.
            if !self.reserve_agent(agent_id, task.id) {
                continue;
            }

            match self
                .tasks
                .transition(task.id, TaskTransition::Assign { agent_id })
                .await
            {
                Ok(_) => {
                    debug!("Task {} assigned to agent {}", task.id, agent_id);
                    return Ok(AssignmentOutcome::Assigned(agent_id));
                }
                Err(TaskError::InvalidTransition { .. }) => {
                    // Lost the race: the task left Queued under our feet.
                    self.release_agent(agent_id);
                    return Ok(AssignmentOutcome::NoAgentAvailable);
                }
                Err(e) => {
                    self.release_agent(agent_id);
                    return Err(e.into());
                }
            }
        }

        Ok(AssignmentOutcome::NoAgentAvailable)
    }

    /// Flip the agent back to idle and forward the outcome to the Task
    /// Manager. Idempotent: a second call for the same (agent, task) pair is
    /// a no-op.
    pub async fn complete_assignment(
        &self,
        agent_id: AgentId,
        task_id: TaskId,
        outcome: TaskOutcome,
    ) -> Result<(), SwarmError> {
        {
            let mut slot = self
                .agents
                .get_mut(&agent_id)
                .ok_or(SwarmError::UnknownAgent(agent_id))?;
            if slot.current_task != Some(task_id) {
                debug!(
                    "Ignoring duplicate completion of task {} by agent {}",
                    task_id, agent_id
                );
                return Ok(());
            }
            slot.current_task = None;
            slot.agent.status = AgentStatus::Idle;
        }

        let transition = match outcome {
            TaskOutcome::Success { payload } => TaskTransition::Complete { payload },
            TaskOutcome::Failure { reason } => TaskTransition::Fail { reason },
        };
        match self.tasks.transition(task_id, transition).await {
            Ok(_) => {}
            Err(TaskError::InvalidTransition { from, .. }) if from.is_terminal() => {
                // Advisory cancellation: the task was failed while the
                // agent's call was in flight; the result is discarded.
                debug!("Discarding outcome for {} task {}", status_name(from), task_id);
            }
            Err(e) => {
                warn!("Recording outcome for task {} failed: {}", task_id, e);
            }
        }

        self.events.publish_agent_event(AgentEvent::AgentIdle {
            agent_id,
            idle_at: Utc::now(),
        });

        // Agent-becomes-idle: exactly one dispatch scan.
        self.dispatch_queued().await;
        Ok(())
    }

    /// An agent crashed mid-task: its task fails with the fault reason and
    /// the agent is excluded from assignment until explicitly reset.
    pub async fn report_fault(&self, agent_id: AgentId) -> Result<(), SwarmError> {
        let abandoned = {
            let mut slot = self
                .agents
                .get_mut(&agent_id)
                .ok_or(SwarmError::UnknownAgent(agent_id))?;
            slot.agent.status = AgentStatus::Error;
            slot.current_task.take()
        };

        if let Some(task_id) = abandoned {
            match self
                .tasks
                .transition(
                    task_id,
                    TaskTransition::Fail {
                        reason: AGENT_FAULT_REASON.to_string(),
                    },
                )
                .await
            {
                Ok(_) | Err(TaskError::InvalidTransition { .. }) => {}
                Err(e) => warn!("Failing task {} after agent fault: {}", task_id, e),
            }
        }

        warn!("Agent {} faulted", agent_id);
        self.events.publish_agent_event(AgentEvent::AgentFaulted {
            agent_id,
            task_id: abandoned,
            faulted_at: Utc::now(),
        });
        Ok(())
    }

    /// Operator reset of a faulted agent, returning it to the idle pool.
    pub async fn reset_agent(&self, agent_id: AgentId) -> Result<(), SwarmError> {
        {
            let mut slot = self
                .agents
                .get_mut(&agent_id)
                .ok_or(SwarmError::UnknownAgent(agent_id))?;
            if slot.agent.status != AgentStatus::Error {
                return Err(SwarmError::NotInErrorState(agent_id));
            }
            slot.agent.status = AgentStatus::Idle;
        }

        info!("Agent {} reset", agent_id);
        self.events.publish_agent_event(AgentEvent::AgentReset {
            agent_id,
            reset_at: Utc::now(),
        });

        self.dispatch_queued().await;
        Ok(())
    }

    /// Deliver an inter-agent message. FIFO per ordered sender/receiver
    /// pair; nothing is promised across pairs.
    pub fn route_message(
        &self,
        from: AgentId,
        to: AgentId,
        payload: serde_json::Value,
    ) -> Result<(), SwarmError> {
        if !self.agents.contains_key(&from) {
            return Err(SwarmError::UnknownAgent(from));
        }
        let slot = self
            .agents
            .get(&to)
            .ok_or(SwarmError::UnknownAgent(to))?;
        slot.mailbox_tx
            .send(AgentMessage::new(from, to, payload))
            .map_err(|_| SwarmError::MailboxClosed(to))
    }

    /// Hand the agent's mailbox receiver to its consumer loop. Callable
    /// once per registration.
    pub fn take_mailbox(
        &self,
        agent_id: AgentId,
    ) -> Result<mpsc::UnboundedReceiver<AgentMessage>, SwarmError> {
        let mut slot = self
            .agents
            .get_mut(&agent_id)
            .ok_or(SwarmError::UnknownAgent(agent_id))?;
        slot.mailbox_rx
            .take()
            .ok_or(SwarmError::MailboxTaken(agent_id))
    }

    /// One assignment scan over the queued tasks, highest priority first.
    /// Serialized so concurrent state changes collapse into sequential
    /// scans instead of a thundering herd.
    pub async fn dispatch_queued(&self) {
        let _guard = self.dispatch_lock.lock().await;

        let mut queued = self
            .tasks
            .list(TaskFilter::with_status(TaskStatus::Queued))
            .await;
        queued.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        for task in queued {
            match self.assign(&task).await {
                Ok(AssignmentOutcome::Assigned(agent_id)) => {
                    debug!("Dispatched task {} to agent {}", task.id, agent_id);
                }
                Ok(AssignmentOutcome::NoAgentAvailable) => {}
                Err(e) => warn!("Dispatch of task {} failed: {}", task.id, e),
            }
        }
    }

    fn reserve_agent(&self, agent_id: AgentId, task_id: TaskId) -> bool {
        match self.agents.get_mut(&agent_id) {
            Some(mut slot) if slot.agent.status == AgentStatus::Idle => {
                slot.agent.status = AgentStatus::Busy;
                slot.current_task = Some(task_id);
                true
            }
            _ => false,
        }
    }

    fn release_agent(&self, agent_id: AgentId) {
        if let Some(mut slot) = self.agents.get_mut(&agent_id) {
            slot.agent.status = AgentStatus::Idle;
            slot.current_task = None;
        }
    }
}

fn status_name(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Queued => "queued",
        TaskStatus::Assigned => "assigned",
        TaskStatus::Running => "running",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}
