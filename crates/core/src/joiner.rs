//! Batched field resolution and positional join.
//!
//! Eight batches are read for a list of vault ids, in three dependency
//! stages:
//!
//! | stage | batches | depends on |
//! |-------|---------|------------|
//! | A | `CdpManager.ilks`, `CdpManager.urns`, `CdpManager.owns` | ids |
//! | B | `IlkRegistry.gem`, `Spotter.ilks`, `Vat.urns`, `Vat.ilks` | ilk, urn |
//! | C | `ERC20.decimals` | gem |
//!
//! Batches inside a stage run concurrently. Every batch has one entry per
//! id, so entry `i` of every batch belongs to `ids[i]`. When an upstream read
//! failed, the dependent call is not issued and its entry reads as missing.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use liquidations_chain::{
    BatchError, BatchResolver, CallOutcome, DssContracts, IDssCdpManager, IERC20Metadata, IIlkRegistry, ISpotter,
    IVat,
};
use tracing::{debug, instrument};

use crate::error::SnapshotError;
use crate::position::{CollateralClass, CollateralState, IlkParameters, JoinedPositionRecord, PositionId, SpotParameters};

/// Resolves and joins every field of a vault list at one block.
#[derive(Debug, Clone)]
pub struct FieldJoiner {
    resolver: BatchResolver,
    contracts: DssContracts,
}

impl FieldJoiner {
    pub fn new(resolver: BatchResolver, contracts: DssContracts) -> Self {
        Self { resolver, contracts }
    }

    /// One record per id, in id order.
    #[instrument(skip(self, ids), fields(positions = ids.len()))]
    pub async fn join(&self, ids: &[PositionId], block: u64) -> Result<Vec<JoinedPositionRecord>, SnapshotError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let c = self.contracts;

        // Stage A: vault registry
        let (ilks, urns, owners) = tokio::try_join!(
            self.fetch(
                "ilks",
                ids.iter()
                    .map(|id| Some((c.cdp_manager, IDssCdpManager::ilksCall { cdp: id.as_u256() })))
                    .collect(),
                block,
            ),
            self.fetch(
                "urns",
                ids.iter()
                    .map(|id| Some((c.cdp_manager, IDssCdpManager::urnsCall { cdp: id.as_u256() })))
                    .collect(),
                block,
            ),
            self.fetch(
                "owns",
                ids.iter()
                    .map(|id| Some((c.cdp_manager, IDssCdpManager::ownsCall { cdp: id.as_u256() })))
                    .collect(),
                block,
            ),
        )?;

        let ilks: Vec<Option<CollateralClass>> = ilks.into_iter().map(|r| r.map(|r| CollateralClass(r._0))).collect();
        let urns: Vec<Option<Address>> = urns.into_iter().map(|r| r.map(|r| r._0)).collect();
        let owners: Vec<Option<Address>> = owners.into_iter().map(|r| r.map(|r| r._0)).collect();
        debug!(block, "Vault registry resolved");

        // Stage B: per-ilk and per-urn state
        let (gems, spots, vat_urns, vat_ilks) = tokio::try_join!(
            self.fetch(
                "gem",
                ilks.iter()
                    .map(|ilk| Some((c.ilk_registry, IIlkRegistry::gemCall { ilk: ilk.as_ref()?.0 })))
                    .collect(),
                block,
            ),
            self.fetch(
                "spotter.ilks",
                ilks.iter()
                    .map(|ilk| Some((c.spotter, ISpotter::ilksCall { ilk: ilk.as_ref()?.0 })))
                    .collect(),
                block,
            ),
            self.fetch(
                "vat.urns",
                ilks.iter()
                    .zip(&urns)
                    .map(|(ilk, urn)| {
                        Some((
                            c.vat,
                            IVat::urnsCall {
                                ilk: ilk.as_ref()?.0,
                                urn: (*urn)?,
                            },
                        ))
                    })
                    .collect(),
                block,
            ),
            self.fetch(
                "vat.ilks",
                ilks.iter()
                    .map(|ilk| Some((c.vat, IVat::ilksCall { ilk: ilk.as_ref()?.0 })))
                    .collect(),
                block,
            ),
        )?;

        let tokens: Vec<Option<Address>> = gems.into_iter().map(|r| r.map(|r| r._0)).collect();
        let spots: Vec<Option<SpotParameters>> = spots
            .into_iter()
            .map(|r| r.map(|r| SpotParameters { pip: r.pip, mat: r.mat }))
            .collect();
        let collateral: Vec<Option<CollateralState>> = vat_urns
            .into_iter()
            .map(|r| r.map(|r| CollateralState { ink: r.ink, art: r.art }))
            .collect();
        let ilk_params: Vec<Option<IlkParameters>> = vat_ilks
            .into_iter()
            .map(|r| {
                r.map(|r| IlkParameters {
                    total_art: r.Art,
                    rate: r.rate,
                    spot: r.spot,
                    line: r.line,
                    dust: r.dust,
                })
            })
            .collect();
        debug!(block, "Collateral state resolved");

        // Stage C: token metadata
        let decimals: Vec<Option<u8>> = self
            .fetch(
                "decimals",
                tokens
                    .iter()
                    .map(|token| Some(((*token)?, IERC20Metadata::decimalsCall {})))
                    .collect(),
                block,
            )
            .await?
            .into_iter()
            .map(|r| r.map(|r| r._0))
            .collect();

        let records: Vec<JoinedPositionRecord> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| JoinedPositionRecord {
                id: *id,
                collateral_class: ilks[i],
                urn_handler: urns[i],
                owner: owners[i],
                token: tokens[i],
                decimals: decimals[i],
                spot: spots[i],
                collateral: collateral[i],
                ilk: ilk_params[i],
            })
            .collect();

        debug!(block, records = records.len(), "Fields joined");
        Ok(records)
    }

    /// Resolve one field batch, one entry per id.
    ///
    /// A transport that returns the wrong number of results is reported
    /// against the id count, not the number of calls actually issued.
    async fn fetch<C: SolCall>(
        &self,
        field: &'static str,
        calls: Vec<Option<(Address, C)>>,
        block: u64,
    ) -> Result<Vec<Option<C::Return>>, SnapshotError> {
        let expected = calls.len();
        let outcomes = self
            .resolver
            .resolve_sparse(calls, block)
            .await
            .map_err(|e| match e {
                BatchError::ResultCountMismatch {
                    expected: issued,
                    actual: returned,
                    ..
                } => SnapshotError::BatchLengthMismatch {
                    field,
                    expected,
                    actual: (expected + returned).saturating_sub(issued),
                },
                other => SnapshotError::Batch(other),
            })?;

        Ok(outcomes.into_iter().map(CallOutcome::into_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};
    use async_trait::async_trait;
    use liquidations_chain::testing::{InMemoryLedger, IlkState, VaultState};
    use liquidations_chain::{ilk_from_name, CallTransport, RawCall, RawReturn};
    use std::sync::Arc;

    const BLOCK: u64 = 19_000_000;
    const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
    const WBTC: Address = address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");

    fn wad(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    fn ledger(vaults: u64) -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new(DssContracts::mainnet(), BLOCK);
        ledger.add_ilk(
            ilk_from_name("ETH-A"),
            IlkState {
                gem: WETH,
                rate: U256::from(10u64).pow(U256::from(27)),
                ..Default::default()
            },
        );
        ledger.add_ilk(
            ilk_from_name("WBTC-A"),
            IlkState {
                gem: WBTC,
                gem_decimals: 8,
                ..Default::default()
            },
        );
        for i in 1..=vaults {
            let ilk = if i % 2 == 0 { "WBTC-A" } else { "ETH-A" };
            ledger.open_vault(VaultState {
                ilk: ilk_from_name(ilk),
                urn: Address::with_last_byte(i as u8),
                owner: Address::with_last_byte(0x80 + i as u8),
                ink: wad(i),
                art: wad(1),
            });
        }
        ledger
    }

    fn ids(n: u64) -> Vec<PositionId> {
        (1..=n).map(PositionId).collect()
    }

    fn joiner(ledger: Arc<InMemoryLedger>) -> FieldJoiner {
        FieldJoiner::new(BatchResolver::new(ledger.clone()), ledger.contracts())
    }

    #[tokio::test]
    async fn test_join_one_record_per_id_in_order() {
        let ledger = Arc::new(ledger(6));
        let records = joiner(ledger.clone()).join(&ids(6), BLOCK).await.unwrap();

        assert_eq!(records.len(), 6);
        for (i, record) in records.iter().enumerate() {
            let id = i as u64 + 1;
            assert_eq!(record.id, PositionId(id));
            assert_eq!(record.urn_handler, Some(Address::with_last_byte(id as u8)));
            assert_eq!(record.owner, Some(Address::with_last_byte(0x80 + id as u8)));
            assert_eq!(record.collateral.unwrap().ink, wad(id));
        }

        assert_eq!(records[0].token, Some(WETH));
        assert_eq!(records[0].decimals, Some(18));
        assert_eq!(records[1].token, Some(WBTC));
        assert_eq!(records[1].decimals, Some(8));

        // 3 + 4 + 1 batches, no de-duplication
        assert_eq!(ledger.batches_issued(), 8);
        assert_eq!(ledger.calls_issued(), 8 * 6);
    }

    #[tokio::test]
    async fn test_join_empty() {
        let ledger = Arc::new(ledger(0));
        let records = joiner(ledger.clone()).join(&[], BLOCK).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(ledger.batches_issued(), 0);
    }

    #[tokio::test]
    async fn test_failed_urn_only_affects_its_record() {
        let mut ledger = ledger(5);
        let manager = ledger.contracts().cdp_manager;
        ledger.revert_on(manager, IDssCdpManager::urnsCall { cdp: U256::from(3) });
        let ledger = Arc::new(ledger);

        let records = joiner(ledger.clone()).join(&ids(5), BLOCK).await.unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[2].urn_handler, None);
        assert_eq!(records[2].collateral, None);
        // Independent fields of the same record still resolve
        assert!(records[2].owner.is_some());
        assert!(records[2].ilk.is_some());
        for i in [0, 1, 3, 4] {
            assert!(records[i].collateral.is_some(), "record {i}");
        }
        // vat.urns for cdp 3 was never issued
        assert_eq!(ledger.calls_issued(), 8 * 5 - 1);
    }

    #[tokio::test]
    async fn test_failed_gem_skips_decimals() {
        let mut ledger = ledger(2);
        let registry = ledger.contracts().ilk_registry;
        ledger.revert_on(registry, IIlkRegistry::gemCall { ilk: ilk_from_name("WBTC-A") });
        let records = joiner(Arc::new(ledger)).join(&ids(2), BLOCK).await.unwrap();

        assert_eq!(records[0].decimals, Some(18));
        assert_eq!(records[1].token, None);
        assert_eq!(records[1].decimals, None);
        assert!(records[1].asset().is_none());
    }

    #[tokio::test]
    async fn test_every_batch_pinned_to_block() {
        let ledger = Arc::new(ledger(3));
        joiner(ledger.clone()).join(&ids(3), 42).await.unwrap();

        let blocks = ledger.blocks_seen();
        assert_eq!(blocks.len(), 8);
        assert!(blocks.iter().all(|b| *b == 42));
    }

    /// Drops the last result of every multi-call batch, optionally only
    /// for batches sent to one contract.
    struct TruncatingTransport {
        ledger: InMemoryLedger,
        only: Option<Address>,
    }

    #[async_trait]
    impl CallTransport for TruncatingTransport {
        async fn latest_block(&self) -> anyhow::Result<u64> {
            self.ledger.latest_block().await
        }

        async fn aggregate(&self, calls: Vec<RawCall>, block: u64) -> anyhow::Result<Vec<RawReturn>> {
            let hit = match self.only {
                Some(target) => calls.first().is_some_and(|c| c.target == target),
                None => true,
            };
            let mut returns = self.ledger.aggregate(calls, block).await?;
            if hit && returns.len() > 1 {
                returns.pop();
            }
            Ok(returns)
        }
    }

    #[tokio::test]
    async fn test_length_mismatch_is_fatal() {
        let ledger = ledger(4);
        let contracts = ledger.contracts();
        let transport = TruncatingTransport { ledger, only: None };
        let joiner = FieldJoiner::new(BatchResolver::new(Arc::new(transport)), contracts);

        let err = joiner.join(&ids(4), BLOCK).await.unwrap_err();
        match err {
            SnapshotError::BatchLengthMismatch { expected, actual, .. } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_length_mismatch_counts_positions_in_sparse_batch() {
        let mut ledger = ledger(5);
        let contracts = ledger.contracts();
        ledger.revert_on(contracts.cdp_manager, IDssCdpManager::urnsCall { cdp: U256::from(3) });
        let transport = TruncatingTransport {
            ledger,
            only: Some(contracts.vat),
        };
        let joiner = FieldJoiner::new(BatchResolver::new(Arc::new(transport)), contracts);

        // vat.urns issues 4 calls for 5 ids; one result goes missing
        let err = joiner.join(&ids(5), BLOCK).await.unwrap_err();
        match err {
            SnapshotError::BatchLengthMismatch { field, expected, actual } => {
                assert!(field.starts_with("vat."), "field {field}");
                assert_eq!(expected, 5);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
