//! In-memory DSS ledger for tests.
//!
//! [`InMemoryLedger`] implements [`CallTransport`] by ABI-decoding each call
//! and answering from local vault and ilk tables, the way the real contracts
//! would: unknown ids read as zero values, calls to addresses without code
//! succeed with empty return data, and individual calls can be forced to
//! revert.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::contracts::{DssContracts, IDssCdpManager, IERC20Metadata, IIlkRegistry, ISpotter, IVat};
use crate::transport::{CallTransport, RawCall, RawReturn};

/// One vault as stored across CdpManager and Vat.
#[derive(Debug, Clone, Default)]
pub struct VaultState {
    pub ilk: B256,
    pub urn: Address,
    pub owner: Address,
    /// Locked collateral [wad]
    pub ink: U256,
    /// Normalized debt [wad]
    pub art: U256,
}

/// Per-ilk parameters across Vat, Spotter, IlkRegistry and the gem token.
#[derive(Debug, Clone)]
pub struct IlkState {
    /// Collateral token
    pub gem: Address,
    /// Collateral token decimals
    pub gem_decimals: u8,
    /// Price feed
    pub pip: Address,
    /// Liquidation ratio [ray]
    pub mat: U256,
    /// Total normalized debt [wad]
    pub total_art: U256,
    /// Accumulated rate [ray]
    pub rate: U256,
    /// Price with safety margin [ray]
    pub spot: U256,
    /// Debt ceiling [rad]
    pub line: U256,
    /// Debt floor [rad]
    pub dust: U256,
}

impl Default for IlkState {
    fn default() -> Self {
        Self {
            gem: Address::ZERO,
            gem_decimals: 18,
            pip: Address::ZERO,
            mat: U256::ZERO,
            total_art: U256::ZERO,
            rate: U256::ZERO,
            spot: U256::ZERO,
            line: U256::ZERO,
            dust: U256::ZERO,
        }
    }
}

/// In-memory ledger answering DSS reads.
#[derive(Debug)]
pub struct InMemoryLedger {
    contracts: DssContracts,
    block: u64,
    vaults: Vec<VaultState>,
    ilks: HashMap<B256, IlkState>,
    token_decimals: HashMap<Address, u8>,
    reverts: HashSet<(Address, Bytes)>,
    calls_issued: AtomicUsize,
    batches_issued: AtomicUsize,
    blocks_seen: Mutex<Vec<u64>>,
}

impl InMemoryLedger {
    /// Empty ledger at `block` (cdpi() == 0).
    pub fn new(contracts: DssContracts, block: u64) -> Self {
        Self {
            contracts,
            block,
            vaults: Vec::new(),
            ilks: HashMap::new(),
            token_decimals: HashMap::new(),
            reverts: HashSet::new(),
            calls_issued: AtomicUsize::new(0),
            batches_issued: AtomicUsize::new(0),
            blocks_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn contracts(&self) -> DssContracts {
        self.contracts
    }

    /// Register an ilk and its gem token.
    pub fn add_ilk(&mut self, ilk: B256, state: IlkState) {
        if !state.gem.is_zero() {
            self.token_decimals.insert(state.gem, state.gem_decimals);
        }
        self.ilks.insert(ilk, state);
    }

    /// Open a vault; returns its cdp id (1-based, dense).
    pub fn open_vault(&mut self, vault: VaultState) -> u64 {
        self.vaults.push(vault);
        self.vaults.len() as u64
    }

    /// Make one exact call revert.
    pub fn revert_on<C: SolCall>(&mut self, target: Address, call: C) {
        self.reverts.insert((target, Bytes::from(call.abi_encode())));
    }

    /// Total individual calls executed.
    pub fn calls_issued(&self) -> usize {
        self.calls_issued.load(Ordering::Relaxed)
    }

    /// Total `aggregate` invocations.
    pub fn batches_issued(&self) -> usize {
        self.batches_issued.load(Ordering::Relaxed)
    }

    /// Block argument of every `aggregate` invocation, in call order.
    pub fn blocks_seen(&self) -> Vec<u64> {
        self.blocks_seen.lock().clone()
    }

    fn vault(&self, cdp: U256) -> Option<&VaultState> {
        let id: usize = cdp.try_into().ok()?;
        id.checked_sub(1).and_then(|index| self.vaults.get(index))
    }

    fn ilk(&self, ilk: &B256) -> IlkState {
        self.ilks.get(ilk).cloned().unwrap_or_default()
    }

    fn execute(&self, call: &RawCall) -> RawReturn {
        if self.reverts.contains(&(call.target, call.calldata.clone())) {
            return RawReturn::reverted();
        }

        let data = &call.calldata[..];
        let c = &self.contracts;
        let answer = if call.target == c.cdp_manager {
            self.cdp_manager(data)
        } else if call.target == c.ilk_registry {
            self.ilk_registry(data)
        } else if call.target == c.vat {
            self.vat(data)
        } else if call.target == c.spotter {
            self.spotter(data)
        } else if let Some(decimals) = self.token_decimals.get(&call.target) {
            token(data, *decimals)
        } else {
            // No code at target: the call succeeds with nothing returned
            return RawReturn::ok(Bytes::new());
        };

        match answer {
            Some(encoded) => RawReturn::ok(encoded),
            None => RawReturn::reverted(),
        }
    }

    fn cdp_manager(&self, data: &[u8]) -> Option<Vec<u8>> {
        let selector = selector(data)?;
        if selector == IDssCdpManager::cdpiCall::SELECTOR {
            Some(U256::from(self.vaults.len()).abi_encode())
        } else if selector == IDssCdpManager::ilksCall::SELECTOR {
            let call = IDssCdpManager::ilksCall::abi_decode(data, true).ok()?;
            Some(self.vault(call.cdp).map(|v| v.ilk).unwrap_or_default().abi_encode())
        } else if selector == IDssCdpManager::urnsCall::SELECTOR {
            let call = IDssCdpManager::urnsCall::abi_decode(data, true).ok()?;
            Some(self.vault(call.cdp).map(|v| v.urn).unwrap_or_default().abi_encode())
        } else if selector == IDssCdpManager::ownsCall::SELECTOR {
            let call = IDssCdpManager::ownsCall::abi_decode(data, true).ok()?;
            Some(self.vault(call.cdp).map(|v| v.owner).unwrap_or_default().abi_encode())
        } else {
            None
        }
    }

    fn ilk_registry(&self, data: &[u8]) -> Option<Vec<u8>> {
        let call = IIlkRegistry::gemCall::abi_decode(data, true).ok()?;
        Some(self.ilk(&call.ilk).gem.abi_encode())
    }

    fn vat(&self, data: &[u8]) -> Option<Vec<u8>> {
        let selector = selector(data)?;
        if selector == IVat::urnsCall::SELECTOR {
            let call = IVat::urnsCall::abi_decode(data, true).ok()?;
            let (ink, art) = self
                .vaults
                .iter()
                .find(|v| v.ilk == call.ilk && v.urn == call.urn)
                .map(|v| (v.ink, v.art))
                .unwrap_or_default();
            Some((ink, art).abi_encode_params())
        } else if selector == IVat::ilksCall::SELECTOR {
            let call = IVat::ilksCall::abi_decode(data, true).ok()?;
            let ilk = self.ilk(&call.ilk);
            Some((ilk.total_art, ilk.rate, ilk.spot, ilk.line, ilk.dust).abi_encode_params())
        } else {
            None
        }
    }

    fn spotter(&self, data: &[u8]) -> Option<Vec<u8>> {
        let call = ISpotter::ilksCall::abi_decode(data, true).ok()?;
        let ilk = self.ilk(&call.ilk);
        Some((ilk.pip, ilk.mat).abi_encode_params())
    }
}

fn token(data: &[u8], decimals: u8) -> Option<Vec<u8>> {
    IERC20Metadata::decimalsCall::abi_decode(data, true).ok()?;
    Some(U256::from(decimals).abi_encode())
}

fn selector(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4)?.try_into().ok()
}

#[async_trait]
impl CallTransport for InMemoryLedger {
    async fn latest_block(&self) -> Result<u64> {
        Ok(self.block)
    }

    async fn aggregate(&self, calls: Vec<RawCall>, block: u64) -> Result<Vec<RawReturn>> {
        self.batches_issued.fetch_add(1, Ordering::Relaxed);
        self.calls_issued.fetch_add(calls.len(), Ordering::Relaxed);
        self.blocks_seen.lock().push(block);

        Ok(calls.iter().map(|call| self.execute(call)).collect())
    }
}
