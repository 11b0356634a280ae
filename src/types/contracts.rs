//! Bindings for the Safe contracts the relay calls into.

use alloy::sol;

sol! {
    /// The Safe `MultiSend` and `MultiSendCallOnly` contracts.
    ///
    /// Both share this interface; the call-only variant reverts on delegate calls.
    #[sol(rpc)]
    interface IMultiSend {
        /// Executes the packed `transactions` in order, reverting all of them if one reverts.
        function multiSend(bytes memory transactions) external payable;
    }

    /// The factory deploying Safe EIP-7702 proxies with CREATE2.
    #[sol(rpc)]
    interface ISafeProxyFactory {
        /// Deploys a proxy for `singleton` and calls it with `initializer`.
        ///
        /// The CREATE2 salt is `keccak256(keccak256(initializer) ++ saltNonce)`.
        function createProxyWithNonce(
            address singleton,
            bytes memory initializer,
            uint256 saltNonce
        ) external returns (address proxy);

        /// The creation code of the proxies deployed by this factory.
        function proxyCreationCode() external pure returns (bytes memory);
    }
}
