//! Order-preserving batched reads with per-call success.
//!
//! A batch is a list of reads sharing one ABI shape (an alloy [`SolCall`]
//! type) but each with its own target and arguments. The resolver encodes
//! them, hands them to a [`CallTransport`] as one logical batch and decodes
//! the results back into `C::Return`, one [`CallOutcome`] per input in input
//! order. Callers join separate batches by index, so output position `i`
//! always belongs to input position `i`.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use thiserror::Error;
use tracing::{debug, trace};

use crate::transport::{CallTransport, RawCall, RawReturn};

/// Errors that abort a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The transport could not execute the batch at all.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),

    /// The transport broke its length contract.
    #[error("{call}: transport returned {actual} results for {expected} calls")]
    ResultCountMismatch {
        call: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A read that must succeed reverted or returned undecodable data.
    #[error("{call} on {target} failed")]
    CallFailed { call: &'static str, target: Address },
}

/// Decoded result of one read inside a batch.
///
/// `value` is `Some` exactly when `success` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome<T> {
    pub success: bool,
    pub value: Option<T>,
}

impl<T> CallOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            value: None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Map the decoded value, keeping failures as failures.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self.value {
            Some(value) => CallOutcome::ok(f(value)),
            None => CallOutcome::failed(),
        }
    }
}

/// Stateless batch resolver over a shared transport.
#[derive(Clone)]
pub struct BatchResolver {
    transport: Arc<dyn CallTransport>,
}

impl std::fmt::Debug for BatchResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchResolver").finish_non_exhaustive()
    }
}

impl BatchResolver {
    /// Create a resolver over a transport.
    pub fn new(transport: Arc<dyn CallTransport>) -> Self {
        Self { transport }
    }

    /// Latest block of the underlying ledger.
    pub async fn latest_block(&self) -> Result<u64, BatchError> {
        Ok(self.transport.latest_block().await?)
    }

    /// Resolve every call at `block`.
    ///
    /// The result has the same length and order as `calls`. A reverted or
    /// undecodable read yields a failed outcome at its index; only transport
    /// faults return `Err`.
    pub async fn resolve<C: SolCall>(
        &self,
        calls: Vec<(Address, C)>,
        block: u64,
    ) -> Result<Vec<CallOutcome<C::Return>>, BatchError> {
        self.resolve_sparse(calls.into_iter().map(Some).collect(), block)
            .await
    }

    /// Resolve a batch where some entries cannot be issued.
    ///
    /// `None` entries (typically a failed upstream read this call would have
    /// been parameterized with) are not sent; they come back as failed
    /// outcomes at their own index, so alignment with the input is kept.
    pub async fn resolve_sparse<C: SolCall>(
        &self,
        calls: Vec<Option<(Address, C)>>,
        block: u64,
    ) -> Result<Vec<CallOutcome<C::Return>>, BatchError> {
        let total = calls.len();
        let mut slots: Vec<Option<(usize, Address)>> = Vec::with_capacity(total);
        let mut raw: Vec<RawCall> = Vec::with_capacity(total);

        for call in calls {
            match call {
                Some((target, call)) => {
                    slots.push(Some((raw.len(), target)));
                    raw.push(RawCall {
                        target,
                        calldata: Bytes::from(call.abi_encode()),
                    });
                }
                None => slots.push(None),
            }
        }

        let issued = raw.len();
        let returns = if issued == 0 {
            Vec::new()
        } else {
            self.transport.aggregate(raw, block).await?
        };

        if returns.len() != issued {
            return Err(BatchError::ResultCountMismatch {
                call: C::SIGNATURE,
                expected: issued,
                actual: returns.len(),
            });
        }

        let outcomes: Vec<CallOutcome<C::Return>> = slots
            .into_iter()
            .map(|slot| match slot {
                Some((index, target)) => decode_outcome::<C>(&returns[index], target),
                None => CallOutcome::failed(),
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.success).count();
        debug!(
            call = C::SIGNATURE,
            total,
            issued,
            failed,
            block,
            "Batch resolved"
        );

        Ok(outcomes)
    }

    /// Resolve a single read that must succeed.
    pub async fn read_one<C: SolCall>(
        &self,
        target: Address,
        call: C,
        block: u64,
    ) -> Result<C::Return, BatchError> {
        self.resolve(vec![(target, call)], block)
            .await?
            .pop()
            .and_then(CallOutcome::into_value)
            .ok_or(BatchError::CallFailed {
                call: C::SIGNATURE,
                target,
            })
    }
}

fn decode_outcome<C: SolCall>(ret: &RawReturn, target: Address) -> CallOutcome<C::Return> {
    if !ret.success {
        trace!(call = C::SIGNATURE, target = %target, "Call reverted");
        return CallOutcome::failed();
    }

    match C::abi_decode_returns(&ret.data, true) {
        Ok(value) => CallOutcome::ok(value),
        Err(e) => {
            // Typically empty return data from a target without code
            trace!(call = C::SIGNATURE, target = %target, error = %e, "Undecodable return data");
            CallOutcome::failed()
        }
    }
}
