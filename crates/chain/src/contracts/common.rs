//! Common contract interfaces shared across protocols.
//!
//! This module provides the ERC20 metadata subset the snapshot reads and the
//! canonical Multicall3 aggregator used to batch every read.

use alloy::primitives::{address, Address};
use alloy::sol;

/// Multicall3 is deployed at the same address on every major EVM chain.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

// ERC20 interface for token metadata
sol! {
    /// ERC20 metadata subset (collateral token decimals)
    #[derive(Debug, PartialEq, Eq)]
    interface IERC20Metadata {
        function decimals() external view returns (uint8);
    }
}

// Multicall3 aggregator for batched reads
sol! {
    /// Multicall3 aggregator interface (aggregate3 subset)
    #[sol(rpc)]
    #[derive(Debug)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct CallResult {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external
            payable
            returns (CallResult[] memory returnData);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn test_common_selectors() {
        // decimals(): 313ce567
        assert_eq!(IERC20Metadata::decimalsCall::SELECTOR, [0x31, 0x3c, 0xe5, 0x67]);
        // aggregate3((address,bool,bytes)[]): 82ad56cb
        assert_eq!(IMulticall3::aggregate3Call::SELECTOR, [0x82, 0xad, 0x56, 0xcb]);
    }
}
