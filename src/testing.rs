//! In-memory repositories for aggregator and workflow tests.
//!
//! Writes never emit notifications on their own; tests fire them explicitly
//! with [`MemoryStore::notify_topic`] to control interleavings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::aggregator::ProposalAggregator;
use crate::db::{
    ChangeCallback, ChangeEvent, ChangeOp, ProposalFilter, ProposalRepository, RecordKind,
    Subscription, VoteFilter, VoteRepository,
};
use crate::errors::AppError;
use crate::models::{NewProposal, NewVote, Proposal, Vote};

enum Watch {
    Proposals(ProposalFilter),
    Votes(VoteFilter),
}

struct Subscriber {
    watch: Watch,
    cancelled: Arc<AtomicBool>,
    callback: ChangeCallback,
}

#[derive(Default)]
struct Inner {
    proposals: Mutex<Vec<Proposal>>,
    votes: Mutex<Vec<Vote>>,
    subscribers: Mutex<Vec<Subscriber>>,
    gates: Mutex<VecDeque<Arc<Notify>>>,
    fail_proposal_queries: AtomicBool,
    fail_vote_queries: AtomicBool,
    proposal_saves: AtomicUsize,
    vote_saves: AtomicUsize,
    sequence: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregator(&self) -> ProposalAggregator {
        ProposalAggregator::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    fn next_seq(&self) -> usize {
        self.inner.sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn timestamp(seq: usize) -> String {
        format!("2024-01-01T00:00:00.{seq:06}Z")
    }

    /// Insert a proposal with `votes` distinct voters, without notifying.
    pub fn seed_proposal(&self, topic_id: &str, title: &str, votes: usize) -> Proposal {
        let seq = self.next_seq();
        let proposal = Proposal {
            id: format!("proposal-{seq}"),
            topic_id: topic_id.to_string(),
            title: title.to_string(),
            description: format!("{title} description"),
            user_id: "author".to_string(),
            created_at: Self::timestamp(seq),
        };
        self.inner.proposals.lock().unwrap().push(proposal.clone());

        for voter in 0..votes {
            let seq = self.next_seq();
            self.inner.votes.lock().unwrap().push(Vote {
                id: format!("vote-{seq}"),
                proposal_id: proposal.id.clone(),
                user_id: format!("voter-{voter}"),
                created_at: Self::timestamp(seq),
            });
        }
        proposal
    }

    pub fn vote_count(&self, proposal_id: &str) -> usize {
        self.inner
            .votes
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.proposal_id == proposal_id)
            .count()
    }

    pub fn proposal_saves(&self) -> usize {
        self.inner.proposal_saves.load(Ordering::SeqCst)
    }

    pub fn vote_saves(&self) -> usize {
        self.inner.vote_saves.load(Ordering::SeqCst)
    }

    pub fn fail_proposal_queries(&self, fail: bool) {
        self.inner.fail_proposal_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_vote_queries(&self, fail: bool) {
        self.inner.fail_vote_queries.store(fail, Ordering::SeqCst);
    }

    /// The next proposal query takes its snapshot, then waits for the
    /// returned gate to be notified before returning it.
    pub fn hold_next_proposal_query(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.gates.lock().unwrap().push_back(gate.clone());
        gate
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Deliver a proposal change for `topic_id` to live subscribers.
    pub fn notify_topic(&self, topic_id: &str) {
        self.deliver(topic_id, false);
    }

    /// Deliver as if the notification raced with cancellation.
    pub fn notify_topic_including_cancelled(&self, topic_id: &str) {
        self.deliver(topic_id, true);
    }

    fn deliver(&self, topic_id: &str, include_cancelled: bool) {
        let event = ChangeEvent {
            kind: RecordKind::Proposal,
            op: ChangeOp::Created,
            id: String::new(),
            parent_id: topic_id.to_string(),
        };
        let callbacks: Vec<ChangeCallback> = self
            .inner
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|s| include_cancelled || !s.cancelled.load(Ordering::SeqCst))
            .filter(|s| match &s.watch {
                Watch::Proposals(filter) => filter.matches(&event),
                Watch::Votes(filter) => filter.matches(&event),
            })
            .map(|s| s.callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    fn register(&self, watch: Watch, callback: ChangeCallback) -> Subscription {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.inner.subscribers.lock().unwrap().push(Subscriber {
            watch,
            cancelled: cancelled.clone(),
            callback,
        });
        Subscription::from_flag(cancelled)
    }
}

#[async_trait]
impl ProposalRepository for MemoryStore {
    async fn query(&self, filter: &ProposalFilter) -> Result<Vec<Proposal>, AppError> {
        if self.inner.fail_proposal_queries.load(Ordering::SeqCst) {
            return Err(AppError::Repository("proposal query failed".to_string()));
        }
        let snapshot: Vec<Proposal> = self
            .inner
            .proposals
            .lock()
            .unwrap()
            .iter()
            .filter(|p| match filter {
                ProposalFilter::All => true,
                ProposalFilter::Topic(topic_id) => p.topic_id == *topic_id,
            })
            .cloned()
            .collect();

        let gate = self.inner.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(snapshot)
    }

    async fn get(&self, id: &str) -> Result<Option<Proposal>, AppError> {
        Ok(self
            .inner
            .proposals
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn save(&self, proposal: NewProposal) -> Result<Proposal, AppError> {
        self.inner.proposal_saves.fetch_add(1, Ordering::SeqCst);
        let seq = self.next_seq();
        let saved = Proposal {
            id: format!("proposal-{seq}"),
            topic_id: proposal.topic_id,
            title: proposal.title,
            description: proposal.description,
            user_id: proposal.user_id,
            created_at: Self::timestamp(seq),
        };
        self.inner.proposals.lock().unwrap().push(saved.clone());
        Ok(saved)
    }

    async fn subscribe(
        &self,
        filter: ProposalFilter,
        on_change: ChangeCallback,
    ) -> Result<Subscription, AppError> {
        Ok(self.register(Watch::Proposals(filter), on_change))
    }
}

#[async_trait]
impl VoteRepository for MemoryStore {
    async fn query(&self, filter: &VoteFilter) -> Result<Vec<Vote>, AppError> {
        if self.inner.fail_vote_queries.load(Ordering::SeqCst) {
            return Err(AppError::Repository("vote query failed".to_string()));
        }
        Ok(self
            .inner
            .votes
            .lock()
            .unwrap()
            .iter()
            .filter(|v| match filter {
                VoteFilter::All => true,
                VoteFilter::Proposal(proposal_id) => v.proposal_id == *proposal_id,
            })
            .cloned()
            .collect())
    }

    async fn save(&self, vote: NewVote) -> Result<Vote, AppError> {
        self.inner.vote_saves.fetch_add(1, Ordering::SeqCst);
        let mut votes = self.inner.votes.lock().unwrap();
        if votes
            .iter()
            .any(|v| v.proposal_id == vote.proposal_id && v.user_id == vote.user_id)
        {
            return Err(AppError::DuplicateVote {
                proposal_id: vote.proposal_id,
                user_id: vote.user_id,
            });
        }
        let seq = self.next_seq();
        let saved = Vote {
            id: format!("vote-{seq}"),
            proposal_id: vote.proposal_id,
            user_id: vote.user_id,
            created_at: Self::timestamp(seq),
        };
        votes.push(saved.clone());
        Ok(saved)
    }

    async fn subscribe(
        &self,
        filter: VoteFilter,
        on_change: ChangeCallback,
    ) -> Result<Subscription, AppError> {
        Ok(self.register(Watch::Votes(filter), on_change))
    }
}
