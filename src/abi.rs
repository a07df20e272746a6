// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Generated contract bindings for the handful of on-chain surfaces this
//! service reads: the root chain checkpoint manager, the child chain state
//! receiver and the plasma exit NFT. Read/subscribe only, nothing here
//! submits transactions.

use ethers::contract::abigen;
use ethers::contract::EthEvent;
use ethers::types::H256;

abigen!(
    CheckpointManager,
    r#"[
        event NewHeaderBlock(address indexed proposer, uint256 indexed headerBlockId, uint256 indexed reward, uint256 start, uint256 end, bytes32 root)
        function getLastChildBlock() external view returns (uint256)
    ]"#
);

abigen!(
    StateSender,
    r#"[
        event StateSynced(uint256 indexed id, address indexed contractAddress, bytes data)
    ]"#
);

abigen!(
    StateReceiver,
    r#"[
        function lastStateId() external view returns (uint256)
    ]"#
);

abigen!(
    WithdrawPredicate,
    r#"[
        event ExitStarted(address indexed exitor, uint256 indexed exitId, address indexed token, uint256 amount, bool isRegularExit)
    ]"#
);

abigen!(
    ExitNft,
    r#"[
        function exists(uint256 tokenId) external view returns (bool)
    ]"#
);

/// Topic 0 of `StateSynced(uint256,address,bytes)`; its presence in a deposit
/// receipt proves the root chain contract handed the deposit to state sync.
pub fn state_synced_topic() -> H256 {
    StateSyncedFilter::signature()
}

/// Topic 0 of `ExitStarted(address,uint256,address,uint256,bool)`, emitted by
/// `startExitWithBurntTokens(...)` on the root chain.
pub fn exit_started_topic() -> H256 {
    ExitStartedFilter::signature()
}

/// Topic 0 of `NewHeaderBlock(...)`, emitted on every checkpoint submission.
pub fn new_header_block_topic() -> H256 {
    NewHeaderBlockFilter::signature()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The hex constants come from the deployed contracts; a signature drift
    // here would silently break log matching against real receipts.
    #[test]
    fn test_event_topics_match_deployed_contracts() {
        assert_eq!(
            format!("{:?}", state_synced_topic()),
            "0x103fed9db65eac19c4d870f49ab7520fe03b99f1838e5996caf47e9e43308392"
        );
        assert_eq!(
            format!("{:?}", exit_started_topic()),
            "0xaa5303fdad123ab5ecaefaf69137bf8632257839546d43a3b3dd148cc2879d6f"
        );
        assert_eq!(
            format!("{:?}", new_header_block_topic()),
            "0xba5de06d22af2685c6c7765f60067f7d2b08c2d29f53cdf14d67f6d1c9bfb527"
        );
    }
}
