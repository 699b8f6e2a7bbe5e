//! Contract bindings for the yield engine.

use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IHarvestEngine {
        /// Realize and compound pending yield; pays a bounty to the caller.
        function harvest() external;

        function bountyBps() external view returns (uint256);

        function stackingRouter() external view returns (address);

        function totalAssets() external view returns (uint256);

        event Harvested(uint256 amount);
    }
}
