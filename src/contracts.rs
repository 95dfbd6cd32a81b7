//! Uniswap V3 contract bindings
//!
//! Only the two entry points the executor touches are declared: the router's
//! `exactInputSingle` and the quoter's `quoteExactInputSingle`.

use alloy::sol;

sol! {
    /// Uniswap V3 SwapRouter (periphery v1)
    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params)
            external
            payable
            returns (uint256 amountOut);
    }

    /// Uniswap V3 Quoter (periphery v1). Not a view function on-chain; it must
    /// only ever be invoked through `eth_call`.
    interface IQuoter {
        function quoteExactInputSingle(
            address tokenIn,
            address tokenOut,
            uint24 fee,
            uint256 amountIn,
            uint160 sqrtPriceLimitX96
        ) external returns (uint256 amountOut);
    }
}
