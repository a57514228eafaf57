//! Ethereum bridge contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings. Only the surface
//! the relay touches is bound: the `LogLock` event of BridgeBank and the
//! claim entry points of CosmosBridge.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// BridgeBank: custody of locked Ethereum assets
    #[sol(rpc)]
    contract BridgeBank {
        /// Emitted when a user locks tokens for transfer to Cosmos
        event LogLock(
            bytes32 _id,
            address _from,
            bytes _to,
            address _token,
            string _symbol,
            uint256 _value,
            uint256 _nonce
        );
    }
}

sol! {
    /// CosmosBridge: prophecy aggregation on the Ethereum side
    #[sol(rpc)]
    contract CosmosBridge {
        /// Emitted for every accepted validator claim
        event LogNewProphecyClaim(
            bytes32 _prophecyID,
            uint8 _claimType,
            bytes _cosmosSender,
            address _ethereumReceiver,
            address _validatorAddress,
            address _tokenAddress,
            string _symbol,
            uint256 _amount
        );

        /// Submit one validator's claim
        function newProphecyClaim(
            uint8 claimType,
            bytes cosmosSender,
            address ethereumReceiver,
            address tokenAddress,
            string symbol,
            uint256 amount,
            bytes32 prophecyId,
            bytes signature
        ) external;

        /// Content hash of an existing claim by `validator`, if any
        function getValidatorClaim(bytes32 prophecyId, address validator)
            external
            view
            returns (bool exists, bytes32 contentHash);
    }
}
