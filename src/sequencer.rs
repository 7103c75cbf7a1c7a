//! # Account transaction sequencing
//!
//! One signing account has one nonce counter per ledger. Every write for an
//! `(account, chain_id)` pair goes through a single worker task that hands
//! out nonces in queue order, so on-ledger order always equals admission
//! order.
//!
//! The worker releases its slot once the ledger has accepted the broadcast.
//! Confirmation happens in the caller's task, so a slow block never holds
//! up the queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, TxHash, U256};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::ledger::LedgerClient;
use crate::submitter::TransactionSubmitter;
use crate::types::{PendingCall, ResourceBudget, TransactionOutcome};

type Broadcast = Result<(TxHash, U256), OrchestratorError>;

struct Job {
    call: PendingCall,
    budget: ResourceBudget,
    reply: oneshot::Sender<Broadcast>,
}

/// Single-worker queue for one account on one ledger.
pub struct Sequencer {
    jobs: mpsc::Sender<Job>,
    submitter: TransactionSubmitter,
}

impl Sequencer {
    /// Spawns the worker. Must be called inside a tokio runtime.
    pub fn spawn(submitter: TransactionSubmitter, capacity: usize) -> Self {
        let (jobs, queue) = mpsc::channel(capacity);
        tokio::spawn(Self::run(submitter.clone(), queue));
        Self { jobs, submitter }
    }

    /// Admits `call` to the queue, waits for its broadcast, then for its
    /// finality.
    ///
    /// Dropping the returned future after admission does not withdraw the
    /// call once the worker has picked it up.
    pub async fn submit(
        &self,
        call: PendingCall,
        budget: ResourceBudget,
    ) -> Result<TransactionOutcome, OrchestratorError> {
        let cross_chain = call.cross_chain;
        let (reply, broadcast) = oneshot::channel();

        self.jobs
            .send(Job { call, budget, reply })
            .await
            .map_err(|_| OrchestratorError::SubmissionFailed("sequencer stopped".to_string()))?;

        let (tx_hash, nonce) = broadcast.await.map_err(|_| {
            OrchestratorError::SubmissionFailed("sequencer dropped the call".to_string())
        })??;

        Ok(self.submitter.confirm(tx_hash, nonce, cross_chain).await)
    }

    async fn run(submitter: TransactionSubmitter, mut queue: mpsc::Receiver<Job>) {
        let ledger = submitter.ledger().clone();
        let signer = ledger.signer();
        let mut next_nonce: Option<U256> = None;

        debug!("Sequencer started for {:?} on chain {}", signer, ledger.chain_id());

        while let Some(job) = queue.recv().await {
            if job.reply.is_closed() {
                debug!("Skipping {}: caller went away before broadcast", job.call.function);
                continue;
            }

            let result = Self::broadcast(&submitter, signer, &mut next_nonce, &job).await;
            // the caller may be gone by now; the nonce slot is settled either way
            let _ = job.reply.send(result);
        }

        debug!("Sequencer for {:?} on chain {} stopped", signer, ledger.chain_id());
    }

    async fn broadcast(
        submitter: &TransactionSubmitter,
        signer: Address,
        next_nonce: &mut Option<U256>,
        job: &Job,
    ) -> Broadcast {
        let nonce = match *next_nonce {
            Some(nonce) => nonce,
            None => submitter.ledger().pending_nonce(signer).await.map_err(|e| {
                OrchestratorError::SubmissionFailed(format!("nonce lookup failed: {e}"))
            })?,
        };

        match submitter.send(&job.call, &job.budget, nonce).await {
            Ok(tx_hash) => {
                *next_nonce = Some(nonce + 1);
                info!("Sequenced {} at nonce {}", job.call.function, nonce);
                Ok((tx_hash, nonce))
            }
            Err(e) => {
                // unknown whether the slot was consumed; ask the ledger next time
                *next_nonce = None;
                warn!("{} at nonce {} not sequenced: {}", job.call.function, nonce, e);
                Err(e)
            }
        }
    }
}

/// Sequencers keyed by `(signer, chain_id)`, spawned on first use.
pub struct SequencerPool {
    sequencers: RwLock<HashMap<(Address, u64), Arc<Sequencer>>>,
    capacity: usize,
    confirmation_timeout: Duration,
}

impl SequencerPool {
    pub fn new(capacity: usize, confirmation_timeout: Duration) -> Self {
        Self {
            sequencers: RwLock::new(HashMap::new()),
            capacity,
            confirmation_timeout,
        }
    }

    /// Sequencer for the ledger's signer, creating it if needed.
    pub async fn for_ledger(&self, ledger: &Arc<dyn LedgerClient>) -> Arc<Sequencer> {
        let key = (ledger.signer(), ledger.chain_id());
        if let Some(sequencer) = self.sequencers.read().await.get(&key) {
            return sequencer.clone();
        }

        let mut sequencers = self.sequencers.write().await;
        sequencers
            .entry(key)
            .or_insert_with(|| {
                let submitter = TransactionSubmitter::new(ledger.clone(), self.confirmation_timeout);
                Arc::new(Sequencer::spawn(submitter, self.capacity))
            })
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.sequencers.read().await.len()
    }
}
