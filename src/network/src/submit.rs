//! Bounded submission and polling.
//!
//! A commitment is signed once; every retry sends the identical request. Polling stops
//! at the first verified inclusion proof, treats a verified exclusion proof as "not yet"
//! and fails on anything that does not verify. Nothing here touches a token, so
//! cancelling or timing out leaves local state as it was.

use crate::client::AggregatorClient;
use crate::errors::NetworkError;
use crate::types::{SubmitCommitmentRequest, SubmitStatus};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use txf_core::proof::{verify_exclusion, verify_inclusion};
use txf_core::{
    Commitment, CommitmentStatus, InclusionProof, ProofStatus, RequestId, TransactionData,
    TrustBase,
};

/// How often a failed submission is retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// How long to wait for an inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(1),
        }
    }
}

/// Submits `commitment`, retrying network failures with the same request.
pub async fn submit_with_retry<C, T>(
    client: &C,
    commitment: &Commitment<T>,
    policy: &RetryPolicy,
) -> Result<RequestId, NetworkError>
where
    C: AggregatorClient + ?Sized,
    T: TransactionData,
{
    let request = SubmitCommitmentRequest::from_commitment(commitment);
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match client.submit_commitment(&request).await {
            Ok(request_id) if request_id == commitment.request_id => {
                info!("submitted request {} on attempt {}", request_id, attempt);
                return Ok(request_id);
            }
            Ok(request_id) => {
                warn!(
                    "aggregator recorded {} for request {}",
                    request_id, commitment.request_id
                );
                return Err(NetworkError::Rejected(SubmitStatus::RequestIdMismatch));
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(
                    "submission attempt {}/{} failed: {}; retrying",
                    attempt, attempts, e
                );
                attempt += 1;
                sleep(policy.backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn poll_until_included<C>(
    client: &C,
    request_id: &RequestId,
    trust_base: &TrustBase,
    interval: Duration,
) -> Result<InclusionProof, NetworkError>
where
    C: AggregatorClient + ?Sized,
{
    loop {
        match client.get_inclusion_proof(request_id).await {
            Ok(proof) => match proof.status()? {
                ProofStatus::Inclusion => {
                    verify_inclusion(&proof, trust_base, request_id)?;
                    return Ok(proof);
                }
                ProofStatus::Exclusion => {
                    verify_exclusion(&proof, trust_base, request_id)?;
                    debug!(
                        "request {} not included as of round {}",
                        request_id, proof.unicity_certificate.round
                    );
                }
            },
            Err(e) if e.is_retryable() => warn!("polling {} failed: {}", request_id, e),
            Err(e) => return Err(e),
        }
        sleep(interval).await;
    }
}

/// Polls until a verified inclusion proof for `request_id` arrives or the policy
/// timeout expires.
pub async fn wait_for_inclusion<C>(
    client: &C,
    request_id: &RequestId,
    trust_base: &TrustBase,
    policy: &PollPolicy,
) -> Result<InclusionProof, NetworkError>
where
    C: AggregatorClient + ?Sized,
{
    match timeout(
        policy.timeout,
        poll_until_included(client, request_id, trust_base, policy.interval),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Timeout(format!(
            "inclusion proof for {} after {:?}",
            request_id, policy.timeout
        ))),
    }
}

/// Tracks one signed commitment through submission and inclusion.
pub struct Submission<T> {
    commitment: Commitment<T>,
    status: CommitmentStatus,
}

impl<T: TransactionData> Submission<T> {
    /// Starts tracking a signed commitment after checking its authenticator.
    pub fn new(commitment: Commitment<T>) -> Result<Self, NetworkError> {
        commitment.verify()?;
        Ok(Self {
            commitment,
            status: CommitmentStatus::Built.advance(CommitmentStatus::Signed)?,
        })
    }

    pub fn commitment(&self) -> &Commitment<T> {
        &self.commitment
    }

    pub fn status(&self) -> CommitmentStatus {
        self.status
    }

    /// Submits with retries; a refusal by the aggregator rejects the commitment.
    pub async fn submit<C>(&mut self, client: &C, policy: &RetryPolicy) -> Result<RequestId, NetworkError>
    where
        C: AggregatorClient + ?Sized,
    {
        self.status.advance(CommitmentStatus::Submitted)?;
        match submit_with_retry(client, &self.commitment, policy).await {
            Ok(request_id) => {
                self.status = CommitmentStatus::Submitted;
                Ok(request_id)
            }
            Err(e) => {
                if !e.is_retryable() {
                    self.status = self.status.advance(CommitmentStatus::Rejected)?;
                }
                Err(e)
            }
        }
    }

    /// Fetches the current proof once.
    ///
    /// A verified exclusion proof records the commitment as `Excluded` and yields
    /// `None`; the next check polls the same commitment again. A verified inclusion
    /// of this very commitment records it as `Included`.
    pub async fn check<C>(
        &mut self,
        client: &C,
        trust_base: &TrustBase,
    ) -> Result<Option<InclusionProof>, NetworkError>
    where
        C: AggregatorClient + ?Sized,
    {
        self.status = self.status.advance(CommitmentStatus::Submitted)?;
        let request_id = self.commitment.request_id;
        let proof = client.get_inclusion_proof(&request_id).await?;
        let verified = match proof.status() {
            Ok(ProofStatus::Inclusion) => verify_inclusion(&proof, trust_base, &request_id),
            Ok(ProofStatus::Exclusion) => verify_exclusion(&proof, trust_base, &request_id),
            Err(e) => Err(e),
        };
        if let Err(e) = verified {
            self.status = self.status.advance(CommitmentStatus::Rejected)?;
            return Err(e.into());
        }

        if proof.authenticator.is_none() {
            debug!(
                "request {} excluded as of round {}",
                request_id, proof.unicity_certificate.round
            );
            self.status = self.status.advance(CommitmentStatus::Excluded)?;
            return Ok(None);
        }
        if proof.authenticator.as_ref() != Some(&self.commitment.authenticator)
            || proof.transaction_hash != Some(self.commitment.transaction_hash())
        {
            self.status = self.status.advance(CommitmentStatus::Rejected)?;
            return Err(NetworkError::Rejected(SubmitStatus::RequestIdExists));
        }
        self.status = self.status.advance(CommitmentStatus::Included)?;
        Ok(Some(proof))
    }

    async fn poll(
        &mut self,
        client: &(impl AggregatorClient + ?Sized),
        trust_base: &TrustBase,
        interval: Duration,
    ) -> Result<InclusionProof, NetworkError> {
        loop {
            match self.check(client, trust_base).await {
                Ok(Some(proof)) => return Ok(proof),
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    warn!("polling {} failed: {}", self.commitment.request_id, e)
                }
                Err(e) => return Err(e),
            }
            sleep(interval).await;
        }
    }

    /// Waits for the inclusion proof; the commitment counts as included once it verifies.
    ///
    /// A timeout keeps the commitment submitted or excluded so the wait can be resumed.
    pub async fn await_inclusion<C>(
        &mut self,
        client: &C,
        trust_base: &TrustBase,
        policy: &PollPolicy,
    ) -> Result<InclusionProof, NetworkError>
    where
        C: AggregatorClient + ?Sized,
    {
        self.status.advance(CommitmentStatus::Submitted)?;
        let request_id = self.commitment.request_id;
        match timeout(policy.timeout, self.poll(client, trust_base, policy.interval)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout(format!(
                "inclusion proof for {} after {:?}",
                request_id, policy.timeout
            ))),
        }
    }

    /// Marks the commitment confirmed once the caller has accepted the result.
    pub fn confirm(&mut self) -> Result<(), NetworkError> {
        self.status = self.status.advance(CommitmentStatus::Confirmed)?;
        Ok(())
    }

    pub fn into_commitment(self) -> Commitment<T> {
        self.commitment
    }
}
